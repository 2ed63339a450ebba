use thiserror::Error;

use crate::domain::Operation;

/// Failure talking to the dataset service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// Connect failure, timeout or any other I/O problem below HTTP.
    #[error("{operation} transport failure: {detail}")]
    Transport { operation: Operation, detail: String },
    /// The service answered with `success: false`.
    #[error("{operation} rejected: {}", .message.as_deref().unwrap_or("no message"))]
    Rejected {
        operation: Operation,
        message: Option<String>,
    },
    /// The body was not the JSON shape the endpoint promises.
    #[error("{operation} returned an undecodable body: {detail}")]
    Decode { operation: Operation, detail: String },
}

impl ServiceError {
    pub fn transport(operation: Operation, detail: impl Into<String>) -> Self {
        Self::Transport {
            operation,
            detail: detail.into(),
        }
    }

    pub fn rejected(operation: Operation, message: Option<String>) -> Self {
        Self::Rejected { operation, message }
    }

    pub fn decode(operation: Operation, detail: impl Into<String>) -> Self {
        Self::Decode {
            operation,
            detail: detail.into(),
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            Self::Transport { operation, .. }
            | Self::Rejected { operation, .. }
            | Self::Decode { operation, .. } => *operation,
        }
    }

    /// Text for the session's error banner.
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            Self::Rejected { operation, .. } => operation.rejected_fallback().to_string(),
            Self::Transport { operation, .. } | Self::Decode { operation, .. } => {
                operation.transport_message().to_string()
            }
        }
    }
}
