//! Text-detection provider abstraction.
//!
//! Defines the [`TextDetector`] trait and its input type so the Textract client
//! and test fakes can be swapped behind the fetcher.

pub mod textract;

use crate::aws::ServiceError;
use crate::schema::DetectionResponse;
use crate::storage::ObjectLocation;
use std::fmt;
use std::path::Path;

/// Input to a text detector: raw bytes or a stored object.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentSource {
    Bytes { name: String, data: Vec<u8> },
    Object(ObjectLocation),
}

impl DocumentSource {
    /// Read a local image into the inline-bytes form.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let data = std::fs::read(path)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::Bytes { name, data })
    }
}

impl fmt::Display for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes { name, data } => write!(f, "{} ({} bytes)", name, data.len()),
            Self::Object(location) => write!(f, "{}", location),
        }
    }
}

/// Async trait implemented by each text-detection backend.
#[async_trait::async_trait]
pub trait TextDetector: Send + Sync {
    fn name(&self) -> &str;
    async fn detect_document_text(
        &self,
        source: &DocumentSource,
    ) -> Result<DetectionResponse, ServiceError>;
}
