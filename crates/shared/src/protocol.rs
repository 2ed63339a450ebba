use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::DatasetId;

/// One row as the service serialises it: column name to cell value.
pub type Row = Map<String, Value>;

/// Fields every dataset service response carries next to its payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetRequest {
    pub dataset_id: DatasetId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub dataset_id: DatasetId,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    /// `(rows, columns)`.
    pub shape: (u64, u64),
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub numeric_columns: Vec<String>,
    #[serde(default)]
    pub categorical_columns: Vec<String>,
    #[serde(default)]
    pub preview: Vec<Row>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtypes: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub missing_values: Option<BTreeMap<String, u64>>,
}

impl DatasetInfo {
    pub fn row_count(&self) -> u64 {
        self.shape.0
    }

    pub fn column_count(&self) -> u64 {
        self.shape.1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub dataset_id: DatasetId,
    pub dataset_info: DatasetInfo,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    #[serde(default)]
    pub analysis: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<Row>>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResult {
    /// Rows came back and the SQL step reported no error.
    pub fn is_ok(&self) -> bool {
        self.data.is_some() && self.error.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_query: Option<String>,
    /// Free text, or the validator's `{valid, explanation, suggestion}` object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<QueryResult>,
}

impl QueryResponse {
    pub fn is_ok(&self) -> bool {
        self.result.as_ref().is_some_and(QueryResult::is_ok)
    }

    /// Validation report flattened to display text.
    pub fn validation_text(&self) -> Option<String> {
        match self.validation.as_ref()? {
            Value::Null => None,
            Value::String(text) => Some(text.clone()),
            other => Some(serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Visualization {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Base64-encoded PNG.
    #[serde(default)]
    pub image: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualizeResponse {
    #[serde(default)]
    pub visualizations: Vec<Visualization>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryResponse {
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleanupResponse {}
