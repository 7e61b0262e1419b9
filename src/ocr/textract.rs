//! Textract provider (`DetectDocumentText`).

use super::{DocumentSource, TextDetector};
use crate::aws::{AwsClient, ServiceError};
use crate::schema::DetectionResponse;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Serialize;
use tracing::info;

const SERVICE: &str = "textract";
const TARGET: &str = "Textract.DetectDocumentText";

pub struct TextractClient {
    aws: AwsClient,
}

impl TextractClient {
    pub fn new(aws: AwsClient) -> Self {
        Self { aws }
    }
}

// ── Textract request types ──────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct DetectRequest {
    document: Document,
}

#[derive(Debug, Serialize)]
pub(crate) enum Document {
    #[serde(rename = "Bytes")]
    Bytes(String),
    #[serde(rename = "S3Object")]
    S3Object(S3Object),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct S3Object {
    pub bucket: String,
    pub name: String,
}

impl DetectRequest {
    pub(crate) fn new(source: &DocumentSource) -> Self {
        let document = match source {
            DocumentSource::Bytes { data, .. } => Document::Bytes(BASE64.encode(data)),
            DocumentSource::Object(location) => Document::S3Object(S3Object {
                bucket: location.bucket.clone(),
                name: location.key.clone(),
            }),
        };
        Self { document }
    }
}

// ── Provider implementation ─────────────────────────────────────────────────

#[async_trait::async_trait]
impl TextDetector for TextractClient {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn detect_document_text(
        &self,
        source: &DocumentSource,
    ) -> Result<DetectionResponse, ServiceError> {
        info!("TextractClient: detecting text in {}", source);

        let request = DetectRequest::new(source);
        let response: DetectionResponse = self.aws.call_json(SERVICE, TARGET, &request).await?;

        info!(
            "TextractClient: {} blocks across {} page(s)",
            response.blocks.len(),
            response
                .document_metadata
                .as_ref()
                .map(|m| m.pages)
                .unwrap_or_default()
        );
        Ok(response)
    }
}
