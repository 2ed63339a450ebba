use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, RequestBuilder,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use shared::{
    domain::{DatasetId, Operation},
    error::ServiceError,
    protocol::{
        AnalyzeResponse, CleanupResponse, DatasetRequest, Envelope, QueryRequest, QueryResponse,
        SummaryResponse, UploadResponse, VisualizeResponse,
    },
};
use tracing::{debug, warn};
use url::Url;

use crate::upload::UploadFile;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// The backend that owns datasets, runs the analysis crew and renders charts.
#[async_trait]
pub trait DatasetService: Send + Sync {
    async fn upload(&self, file: UploadFile) -> Result<UploadResponse, ServiceError>;
    async fn analyze(&self, dataset_id: &DatasetId) -> Result<AnalyzeResponse, ServiceError>;
    async fn query(
        &self,
        dataset_id: &DatasetId,
        query: &str,
    ) -> Result<QueryResponse, ServiceError>;
    async fn visualize(&self, dataset_id: &DatasetId) -> Result<VisualizeResponse, ServiceError>;
    async fn cleanup(&self, dataset_id: &DatasetId) -> Result<CleanupResponse, ServiceError>;
    async fn summary(&self) -> Result<SummaryResponse, ServiceError>;
    async fn health(&self) -> Result<Value>;
    /// Whatever the service reports about its loaded datasets and agents.
    async fn status(&self) -> Result<Value>;
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub base_url: Url,
    pub request_timeout: Duration,
    /// Sent as the `table_name` form field on upload when set.
    pub table_name: Option<String>,
}

impl ServiceConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            table_name: None,
        }
    }
}

pub struct HttpDatasetService {
    http: Client,
    base_url: String,
    table_name: Option<String>,
}

impl HttpDatasetService {
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("failed to build dataset service http client")?;
        Ok(Self {
            http,
            base_url: config.base_url.as_str().trim_end_matches('/').to_string(),
            table_name: config.table_name,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn post_json<B, T>(&self, op: Operation, path: &str, body: &B) -> Result<T, ServiceError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let request = self.http.post(self.endpoint(path)).json(body);
        self.execute(op, "POST", path, request).await
    }

    async fn get<T: DeserializeOwned>(&self, op: Operation, path: &str) -> Result<T, ServiceError> {
        let request = self.http.get(self.endpoint(path));
        self.execute(op, "GET", path, request).await
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        op: Operation,
        method: &str,
        path: &str,
        request: RequestBuilder,
    ) -> Result<T, ServiceError> {
        debug!(operation = %op, method, path, "dataset service request");
        let value = send_for_json(op, request).await?;
        decode_envelope(op, value).inspect_err(|err| {
            warn!(operation = %op, path, error = %err, "dataset service call failed");
        })
    }
}

async fn send_for_json(op: Operation, request: RequestBuilder) -> Result<Value, ServiceError> {
    let response = request.send().await.map_err(|err| {
        warn!(operation = %op, error = %err, timeout = err.is_timeout(), "dataset service unreachable");
        ServiceError::transport(op, err.to_string())
    })?;
    let status = response.status();
    // Error bodies come back with 4xx/5xx statuses, so the body is read regardless.
    let bytes = response
        .bytes()
        .await
        .map_err(|err| ServiceError::transport(op, err.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|err| ServiceError::decode(op, format!("status {status}: {err}")))
}

fn decode_envelope<T: DeserializeOwned>(op: Operation, value: Value) -> Result<T, ServiceError> {
    let envelope =
        Envelope::deserialize(&value).map_err(|err| ServiceError::decode(op, err.to_string()))?;
    if !envelope.success {
        return Err(ServiceError::rejected(op, envelope.error));
    }
    serde_json::from_value(value).map_err(|err| ServiceError::decode(op, err.to_string()))
}

impl HttpDatasetService {
    /// GET for the envelope-less diagnostic endpoints.
    async fn probe(&self, path: &str) -> Result<Value> {
        debug!(method = "GET", path, "probing dataset service");
        let body = self
            .http
            .get(self.endpoint(path))
            .send()
            .await
            .context("dataset service unreachable")?
            .error_for_status()
            .with_context(|| format!("dataset service /{path} check failed"))?
            .json()
            .await
            .with_context(|| format!("/{path} returned a non-JSON body"))?;
        Ok(body)
    }
}

#[async_trait]
impl DatasetService for HttpDatasetService {
    async fn upload(&self, file: UploadFile) -> Result<UploadResponse, ServiceError> {
        let mime_type = file.mime_type();
        let part = Part::bytes(file.bytes)
            .file_name(file.filename)
            .mime_str(mime_type)
            .map_err(|err| ServiceError::transport(Operation::Upload, err.to_string()))?;
        let mut form = Form::new().part("file", part);
        if let Some(table_name) = &self.table_name {
            form = form.text("table_name", table_name.clone());
        }
        let request = self.http.post(self.endpoint("upload")).multipart(form);
        self.execute(Operation::Upload, "POST", "upload", request).await
    }

    async fn analyze(&self, dataset_id: &DatasetId) -> Result<AnalyzeResponse, ServiceError> {
        let body = DatasetRequest {
            dataset_id: dataset_id.clone(),
        };
        self.post_json(Operation::Analyze, "analyze", &body).await
    }

    async fn query(
        &self,
        dataset_id: &DatasetId,
        query: &str,
    ) -> Result<QueryResponse, ServiceError> {
        let body = QueryRequest {
            dataset_id: dataset_id.clone(),
            query: query.to_string(),
        };
        self.post_json(Operation::Query, "query", &body).await
    }

    async fn visualize(&self, dataset_id: &DatasetId) -> Result<VisualizeResponse, ServiceError> {
        let body = DatasetRequest {
            dataset_id: dataset_id.clone(),
        };
        self.post_json(Operation::Visualize, "visualize", &body).await
    }

    async fn cleanup(&self, dataset_id: &DatasetId) -> Result<CleanupResponse, ServiceError> {
        let body = DatasetRequest {
            dataset_id: dataset_id.clone(),
        };
        self.post_json(Operation::Cleanup, "cleanup", &body).await
    }

    async fn summary(&self) -> Result<SummaryResponse, ServiceError> {
        self.get(Operation::Summary, "summary").await
    }

    async fn health(&self) -> Result<Value> {
        self.probe("health").await
    }

    async fn status(&self) -> Result<Value> {
        self.probe("status").await
    }
}

#[cfg(test)]
#[path = "tests/service_tests.rs"]
mod tests;
