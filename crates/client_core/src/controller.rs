use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use serde_json::Value;
use shared::{
    domain::{DatasetId, Operation, Tab},
    error::ServiceError,
};
use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    service::DatasetService,
    session::{ActiveDataset, SelectedFile, Session},
    upload::UploadFile,
};

/// Why an operation did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    NoActiveDataset,
    EmptyQuery,
    TabGated(Tab),
    NoHistoryEntry(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The response (or local input) was written into the session.
    Applied,
    /// The call failed and the message now sits in `last_error`.
    Failed(String),
    /// The dataset or a newer request superseded this one; its response was dropped.
    Stale,
    Skipped(Precondition),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Changed,
    Notice(Notice),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ticket {
    op: Operation,
    generation: u64,
    seq: u64,
}

/// Dataset generation plus the newest sequence number handed out per operation.
#[derive(Debug, Default)]
struct RequestTokens {
    generation: u64,
    issued: [u64; Operation::ALL.len()],
}

impl RequestTokens {
    fn slot(op: Operation) -> usize {
        Operation::ALL
            .iter()
            .position(|candidate| *candidate == op)
            .unwrap_or_default()
    }

    fn issue(&mut self, op: Operation) -> Ticket {
        let slot = &mut self.issued[Self::slot(op)];
        *slot += 1;
        Ticket {
            op,
            generation: self.generation,
            seq: *slot,
        }
    }

    fn is_latest(&self, ticket: &Ticket) -> bool {
        self.issued[Self::slot(ticket.op)] == ticket.seq
    }

    /// Uploads create a dataset rather than read one, so only their sequence counts.
    fn is_current(&self, ticket: &Ticket) -> bool {
        self.is_latest(ticket)
            && (ticket.op == Operation::Upload || self.generation == ticket.generation)
    }

    fn advance_generation(&mut self) {
        self.generation += 1;
    }
}

/// Which dataset requests an applied upload starts on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadFollowups {
    pub analysis: bool,
    pub visualizations: bool,
}

impl Default for UploadFollowups {
    fn default() -> Self {
        Self {
            analysis: true,
            visualizations: true,
        }
    }
}

struct ControllerState {
    session: Session,
    tokens: RequestTokens,
}

/// Owns the session and mediates every call to the dataset service.
pub struct SessionController {
    service: Arc<dyn DatasetService>,
    followups: UploadFollowups,
    inner: Mutex<ControllerState>,
    background: Mutex<Vec<JoinHandle<()>>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    pub fn new(service: Arc<dyn DatasetService>, history_capacity: usize) -> Arc<Self> {
        Self::with_followups(service, history_capacity, UploadFollowups::default())
    }

    pub fn with_followups(
        service: Arc<dyn DatasetService>,
        history_capacity: usize,
        followups: UploadFollowups,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            service,
            followups,
            inner: Mutex::new(ControllerState {
                session: Session::new(history_capacity),
                tokens: RequestTokens::default(),
            }),
            background: Mutex::new(Vec::new()),
            events,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> Session {
        self.inner.lock().await.session.clone()
    }

    /// Waits for the analysis/visualization requests an upload kicked off.
    pub async fn wait_for_background(&self) {
        let handles = std::mem::take(&mut *self.background.lock().await);
        for handle in handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "background dataset request panicked");
            }
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn notify(&self, kind: NoticeKind, message: impl Into<String>) {
        self.emit(SessionEvent::Notice(Notice::new(kind, message)));
    }

    pub async fn select_file(&self, file: &UploadFile) {
        self.inner.lock().await.session.selected_file = Some(SelectedFile::from(file));
        self.emit(SessionEvent::Changed);
    }

    pub async fn set_query_text(&self, text: impl Into<String>) {
        self.inner.lock().await.session.query = text.into();
        self.emit(SessionEvent::Changed);
    }

    pub async fn dismiss_error(&self) {
        self.inner.lock().await.session.last_error = None;
        self.emit(SessionEvent::Changed);
    }

    pub async fn select_tab(&self, tab: Tab) -> Outcome {
        let mut inner = self.inner.lock().await;
        if !inner.session.can_navigate(tab) {
            debug!(tab = tab.label(), "tab gated until a dataset is active");
            return Outcome::Skipped(Precondition::TabGated(tab));
        }
        inner.session.active_tab = tab;
        drop(inner);
        self.emit(SessionEvent::Changed);
        Outcome::Applied
    }

    /// Copies a history entry's text back into the query input.
    pub async fn recall_query(&self, index: usize) -> Outcome {
        let mut inner = self.inner.lock().await;
        let Some(query) = inner.session.history.get(index).map(|r| r.query.clone()) else {
            return Outcome::Skipped(Precondition::NoHistoryEntry(index));
        };
        inner.session.query = query;
        drop(inner);
        self.emit(SessionEvent::Changed);
        self.notify(NoticeKind::Info, "Recalled query");
        Outcome::Applied
    }

    pub async fn check_health(&self) -> Result<Value> {
        self.service.health().await
    }

    pub async fn check_status(&self) -> Result<Value> {
        self.service.status().await
    }

    fn begin(&self, inner: &mut ControllerState, op: Operation) -> Ticket {
        let ticket = inner.tokens.issue(op);
        inner.session.busy.set(op, true);
        debug!(operation = %op, seq = ticket.seq, generation = ticket.generation, "request started");
        self.emit(SessionEvent::Changed);
        ticket
    }

    /// Settles a request: clears its busy flag, then applies the result if still current.
    async fn finish<T>(
        &self,
        ticket: Ticket,
        result: Result<T, ServiceError>,
        apply: impl FnOnce(&mut ControllerState, T),
    ) -> Outcome {
        let mut inner = self.inner.lock().await;
        if inner.tokens.is_latest(&ticket) {
            inner.session.busy.set(ticket.op, false);
        }

        if !inner.tokens.is_current(&ticket) {
            drop(inner);
            debug!(operation = %ticket.op, seq = ticket.seq, "discarding stale response");
            self.emit(SessionEvent::Changed);
            return Outcome::Stale;
        }

        let outcome = match result {
            Ok(value) => {
                apply(&mut *inner, value);
                Outcome::Applied
            }
            Err(err) => {
                let message = err.user_message();
                warn!(operation = %ticket.op, error = %err, "dataset request failed");
                inner.session.record_failure(ticket.op, message.clone());
                Outcome::Failed(message)
            }
        };
        drop(inner);

        if let Outcome::Failed(message) = &outcome {
            self.emit(SessionEvent::Error(message.clone()));
        }
        self.emit(SessionEvent::Changed);
        outcome
    }

    /// Uploads `file`; on success starts analysis and visualization without waiting on them.
    pub async fn submit_upload(self: &Arc<Self>, file: UploadFile) -> Outcome {
        if !file.has_accepted_extension() {
            warn!(filename = %file.filename, "file extension is not one the service advertises");
        }

        let ticket = {
            let mut inner = self.inner.lock().await;
            inner.session.selected_file = Some(SelectedFile::from(&file));
            self.begin(&mut inner, Operation::Upload)
        };

        let filename = file.filename.clone();
        let result = self.service.upload(file).await;
        let new_id = result.as_ref().ok().map(|response| response.dataset_id.clone());

        let outcome = self
            .finish(ticket, result, |state, response| {
                state.tokens.advance_generation();
                state.session.activate_dataset(ActiveDataset {
                    id: response.dataset_id,
                    info: response.dataset_info,
                });
            })
            .await;

        if let (Outcome::Applied, Some(dataset_id)) = (&outcome, new_id) {
            info!(%dataset_id, %filename, "dataset uploaded");
            self.notify(NoticeKind::Success, "Upload successful. Analyzing…");
            self.spawn_followups(dataset_id).await;
        }
        outcome
    }

    async fn spawn_followups(self: &Arc<Self>, dataset_id: DatasetId) {
        let mut spawned = Vec::with_capacity(2);
        if self.followups.analysis {
            let controller = Arc::clone(self);
            let dataset_id = dataset_id.clone();
            spawned.push(tokio::spawn(async move {
                controller.request_analysis_for(dataset_id).await;
            }));
        }
        if self.followups.visualizations {
            let controller = Arc::clone(self);
            spawned.push(tokio::spawn(async move {
                controller.request_visualizations_for(dataset_id).await;
            }));
        }

        let mut background = self.background.lock().await;
        background.retain(|handle| !handle.is_finished());
        background.extend(spawned);
    }

    /// Requests addressed to a dataset only start while that dataset is still the active one.
    fn admit(inner: &ControllerState, dataset_id: &DatasetId) -> Option<Outcome> {
        match inner.session.dataset_id() {
            None => Some(Outcome::Skipped(Precondition::NoActiveDataset)),
            Some(active) if active != dataset_id => Some(Outcome::Stale),
            Some(_) => None,
        }
    }

    async fn current_dataset(&self) -> Option<DatasetId> {
        self.inner.lock().await.session.dataset_id().cloned()
    }

    pub async fn request_analysis(&self) -> Outcome {
        match self.current_dataset().await {
            Some(dataset_id) => self.request_analysis_for(dataset_id).await,
            None => Outcome::Skipped(Precondition::NoActiveDataset),
        }
    }

    pub async fn request_analysis_for(&self, dataset_id: DatasetId) -> Outcome {
        let ticket = {
            let mut inner = self.inner.lock().await;
            if let Some(outcome) = Self::admit(&inner, &dataset_id) {
                return outcome;
            }
            self.begin(&mut inner, Operation::Analyze)
        };
        let result = self.service.analyze(&dataset_id).await;
        self.finish(ticket, result, |state, response| {
            state.session.analysis = response.analysis;
        })
        .await
    }

    pub async fn request_visualizations(&self) -> Outcome {
        match self.current_dataset().await {
            Some(dataset_id) => self.request_visualizations_for(dataset_id).await,
            None => Outcome::Skipped(Precondition::NoActiveDataset),
        }
    }

    pub async fn request_visualizations_for(&self, dataset_id: DatasetId) -> Outcome {
        let ticket = {
            let mut inner = self.inner.lock().await;
            if let Some(outcome) = Self::admit(&inner, &dataset_id) {
                return outcome;
            }
            self.begin(&mut inner, Operation::Visualize)
        };
        let result = self.service.visualize(&dataset_id).await;
        self.finish(ticket, result, |state, response| {
            state.session.visualizations = response.visualizations;
        })
        .await
    }

    pub async fn request_summary(&self) -> Outcome {
        let ticket = {
            let mut inner = self.inner.lock().await;
            if !inner.session.has_dataset() {
                return Outcome::Skipped(Precondition::NoActiveDataset);
            }
            self.begin(&mut inner, Operation::Summary)
        };
        let result = self.service.summary().await;
        self.finish(ticket, result, |state, response| {
            state.session.summary = response.summary;
        })
        .await
    }

    pub async fn submit_query(&self, text: impl Into<String>) -> Outcome {
        let text = text.into();
        let (ticket, dataset_id) = {
            let mut inner = self.inner.lock().await;
            if text.trim().is_empty() {
                return Outcome::Skipped(Precondition::EmptyQuery);
            }
            let Some(dataset_id) = inner.session.dataset_id().cloned() else {
                return Outcome::Skipped(Precondition::NoActiveDataset);
            };
            inner.session.query = text.clone();
            (self.begin(&mut inner, Operation::Query), dataset_id)
        };

        let result = self.service.query(&dataset_id, &text).await;
        self.finish(ticket, result, |state, response| {
            info!(%dataset_id, ok = response.is_ok(), "query answered");
            state.session.record_query(&text, response, Utc::now());
        })
        .await
    }

    /// Tells the service to drop the dataset and resets the session, whatever the service says.
    pub async fn remove_dataset(&self) -> Outcome {
        let (ticket, dataset_id) = {
            let mut inner = self.inner.lock().await;
            let Some(dataset_id) = inner.session.dataset_id().cloned() else {
                return Outcome::Skipped(Precondition::NoActiveDataset);
            };
            (self.begin(&mut inner, Operation::Cleanup), dataset_id)
        };

        let result = self.service.cleanup(&dataset_id).await;
        let cleanup_error = result.as_ref().err().map(ServiceError::user_message);
        if let Err(err) = &result {
            warn!(%dataset_id, error = %err, "cleanup failed; resetting session anyway");
        }

        let outcome = self
            .finish(ticket, Ok::<_, ServiceError>(()), |state, ()| {
                state.tokens.advance_generation();
                state.session.reset();
            })
            .await;

        if outcome == Outcome::Applied {
            info!(%dataset_id, "dataset removed");
            match cleanup_error {
                Some(message) => self.notify(NoticeKind::Error, message),
                None => self.notify(NoticeKind::Success, "Dataset removed."),
            }
        }
        outcome
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
