use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum UploadFileError {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("'{0}' has no file name")]
    MissingFileName(PathBuf),
}
