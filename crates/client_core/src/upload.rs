use std::path::Path;

use crate::error::UploadFileError;

/// Extensions the service knows how to load. Only used as a hint; the
/// service has the final say.
pub const ACCEPTED_EXTENSIONS: [&str; 4] = ["csv", "tsv", "xlsx", "sql"];

/// A file picked for upload, held in memory until it is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            bytes: bytes.into(),
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, UploadFileError> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| UploadFileError::MissingFileName(path.to_path_buf()))?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| UploadFileError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self { filename, bytes })
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn extension(&self) -> Option<String> {
        Path::new(&self.filename)
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
    }

    pub fn has_accepted_extension(&self) -> bool {
        self.extension()
            .is_some_and(|ext| ACCEPTED_EXTENSIONS.contains(&ext.as_str()))
    }

    pub fn mime_type(&self) -> &'static str {
        match self.extension().as_deref() {
            Some("csv") => "text/csv",
            Some("tsv") => "text/tab-separated-values",
            Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Some("sql") => "application/sql",
            _ => "application/octet-stream",
        }
    }
}
