//! Session orchestration for the DataCrew dataset service.

pub mod controller;
pub mod error;
pub mod service;
pub mod session;
pub mod upload;

pub use controller::{
    Notice, NoticeKind, Outcome, Precondition, SessionController, SessionEvent, UploadFollowups,
};
pub use service::{DatasetService, HttpDatasetService, ServiceConfig, DEFAULT_REQUEST_TIMEOUT};
pub use session::{
    ActiveDataset, BusyFlags, QueryHistory, QueryRecord, SelectedFile, Session,
    DEFAULT_HISTORY_CAPACITY,
};
pub use upload::{UploadFile, ACCEPTED_EXTENSIONS};
