use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque handle the service hands out for an uploaded dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetId(pub String);

impl DatasetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    #[default]
    Upload,
    Overview,
    Query,
    Visualize,
    Summary,
}

impl Tab {
    pub const ALL: [Tab; 5] = [
        Tab::Upload,
        Tab::Overview,
        Tab::Query,
        Tab::Visualize,
        Tab::Summary,
    ];

    /// Tabs that only make sense while a dataset is active.
    pub fn requires_dataset(self) -> bool {
        !matches!(self, Tab::Upload)
    }

    pub fn label(self) -> &'static str {
        match self {
            Tab::Upload => "UPLOAD",
            Tab::Overview => "OVERVIEW",
            Tab::Query => "QUERY",
            Tab::Visualize => "VISUALIZE",
            Tab::Summary => "SUMMARY",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "upload" => Some(Tab::Upload),
            "overview" => Some(Tab::Overview),
            "query" => Some(Tab::Query),
            "visualize" | "visualise" | "charts" => Some(Tab::Visualize),
            "summary" => Some(Tab::Summary),
            _ => None,
        }
    }
}

/// Every request the client can have in flight against the dataset service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Upload,
    Analyze,
    Query,
    Visualize,
    Cleanup,
    Summary,
}

impl Operation {
    pub const ALL: [Operation; 6] = [
        Operation::Upload,
        Operation::Analyze,
        Operation::Query,
        Operation::Visualize,
        Operation::Cleanup,
        Operation::Summary,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::Upload => "upload",
            Operation::Analyze => "analyze",
            Operation::Query => "query",
            Operation::Visualize => "visualize",
            Operation::Cleanup => "cleanup",
            Operation::Summary => "summary",
        }
    }

    /// Message shown when the service answers `success: false` without an `error`.
    pub fn rejected_fallback(self) -> &'static str {
        match self {
            Operation::Upload => "Upload failed",
            Operation::Analyze => "Analysis failed",
            Operation::Query => "Query failed",
            Operation::Visualize => "Visualization failed",
            Operation::Cleanup => "Cleanup failed",
            Operation::Summary => "Summary failed",
        }
    }

    /// Message shown when the request never produced a usable response.
    pub fn transport_message(self) -> &'static str {
        match self {
            Operation::Upload => "Upload error",
            Operation::Analyze => "Analysis error",
            Operation::Query => "Query error",
            Operation::Visualize => "Visualization error",
            Operation::Cleanup => "Cleanup error",
            Operation::Summary => "Summary error",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
