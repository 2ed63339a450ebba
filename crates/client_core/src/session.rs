//! Client-side working state for one dataset session.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use shared::{
    domain::{DatasetId, Operation, Tab},
    protocol::{DatasetInfo, QueryResponse, QueryResult, Visualization},
};

use crate::upload::UploadFile;

pub const DEFAULT_HISTORY_CAPACITY: usize = 8;

/// One in-flight marker per operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BusyFlags {
    pub upload: bool,
    pub analyze: bool,
    pub query: bool,
    pub visualize: bool,
    pub cleanup: bool,
    pub summary: bool,
}

impl BusyFlags {
    pub fn get(&self, op: Operation) -> bool {
        match op {
            Operation::Upload => self.upload,
            Operation::Analyze => self.analyze,
            Operation::Query => self.query,
            Operation::Visualize => self.visualize,
            Operation::Cleanup => self.cleanup,
            Operation::Summary => self.summary,
        }
    }

    pub(crate) fn set(&mut self, op: Operation, busy: bool) {
        let flag = match op {
            Operation::Upload => &mut self.upload,
            Operation::Analyze => &mut self.analyze,
            Operation::Query => &mut self.query,
            Operation::Visualize => &mut self.visualize,
            Operation::Cleanup => &mut self.cleanup,
            Operation::Summary => &mut self.summary,
        };
        *flag = busy;
    }

    pub fn any(&self) -> bool {
        Operation::ALL.iter().any(|op| self.get(*op))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub filename: String,
    pub size_bytes: u64,
}

impl From<&UploadFile> for SelectedFile {
    fn from(file: &UploadFile) -> Self {
        Self {
            filename: file.filename.clone(),
            size_bytes: file.size_bytes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActiveDataset {
    pub id: DatasetId,
    pub info: DatasetInfo,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryRecord {
    pub query: String,
    pub sql: Option<String>,
    pub result: Option<QueryResult>,
    pub ok: bool,
    pub timestamp: DateTime<Utc>,
}

impl QueryRecord {
    pub fn from_response(query: impl Into<String>, response: &QueryResponse, at: DateTime<Utc>) -> Self {
        Self {
            query: query.into(),
            sql: response.sql_query.clone(),
            result: response.result.clone(),
            ok: response.is_ok(),
            timestamp: at,
        }
    }
}

/// Most-recent-first list of executed queries, bounded by `capacity`.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryHistory {
    capacity: usize,
    entries: VecDeque<QueryRecord>,
}

impl QueryHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, record: QueryRecord) {
        self.entries.push_front(record);
        self.entries.truncate(self.capacity);
    }

    pub fn get(&self, index: usize) -> Option<&QueryRecord> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueryRecord> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for QueryHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub active_tab: Tab,
    pub selected_file: Option<SelectedFile>,
    pub dataset: Option<ActiveDataset>,
    pub analysis: String,
    pub summary: String,
    pub query: String,
    pub query_result: Option<QueryResponse>,
    pub visualizations: Vec<Visualization>,
    pub busy: BusyFlags,
    pub last_error: Option<String>,
    pub history: QueryHistory,
}

impl Session {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            active_tab: Tab::Upload,
            selected_file: None,
            dataset: None,
            analysis: String::new(),
            summary: String::new(),
            query: String::new(),
            query_result: None,
            visualizations: Vec::new(),
            busy: BusyFlags::default(),
            last_error: None,
            history: QueryHistory::new(history_capacity),
        }
    }

    pub fn dataset_id(&self) -> Option<&DatasetId> {
        self.dataset.as_ref().map(|dataset| &dataset.id)
    }

    pub fn has_dataset(&self) -> bool {
        self.dataset.is_some()
    }

    pub fn can_navigate(&self, tab: Tab) -> bool {
        !tab.requires_dataset() || self.has_dataset()
    }

    /// Swap in a freshly uploaded dataset. Query text and history survive.
    pub(crate) fn activate_dataset(&mut self, dataset: ActiveDataset) {
        self.dataset = Some(dataset);
        self.analysis.clear();
        self.summary.clear();
        self.query_result = None;
        self.visualizations.clear();
        self.active_tab = Tab::Overview;
        self.last_error = None;
    }

    pub(crate) fn record_query(&mut self, query: &str, response: QueryResponse, at: DateTime<Utc>) {
        self.history.push(QueryRecord::from_response(query, &response, at));
        self.query_result = Some(response);
    }

    pub(crate) fn record_failure(&mut self, op: Operation, message: String) {
        if op == Operation::Query {
            self.query_result = None;
        }
        self.last_error = Some(message);
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new(self.history.capacity());
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
