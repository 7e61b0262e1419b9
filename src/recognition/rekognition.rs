//! Rekognition provider (`RecognizeCelebrities`).

use super::CelebrityRecognizer;
use crate::aws::{AwsClient, ServiceError};
use crate::schema::{CelebrityDetection, RecognizeCelebritiesResponse};
use crate::storage::ObjectLocation;
use serde::Serialize;
use tracing::{debug, info};

const SERVICE: &str = "rekognition";
const TARGET: &str = "RekognitionService.RecognizeCelebrities";

pub struct RekognitionClient {
    aws: AwsClient,
}

impl RekognitionClient {
    pub fn new(aws: AwsClient) -> Self {
        Self { aws }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct RecognizeRequest {
    image: Image,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct Image {
    s3_object: S3Object,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct S3Object {
    bucket: String,
    name: String,
}

/// Convert the raw response, rejecting entries without a face box.
fn into_detections(
    response: RecognizeCelebritiesResponse,
) -> Result<Vec<CelebrityDetection>, ServiceError> {
    if !response.unrecognized_faces.is_empty() {
        debug!(
            "RekognitionClient: {} unrecognized face(s) ignored",
            response.unrecognized_faces.len()
        );
    }

    response
        .celebrity_faces
        .into_iter()
        .map(|celebrity| {
            CelebrityDetection::try_from(celebrity).map_err(|e| ServiceError::InvalidResponse {
                service: SERVICE,
                reason: e.to_string(),
            })
        })
        .collect()
}

#[async_trait::async_trait]
impl CelebrityRecognizer for RekognitionClient {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn recognize_celebrities(
        &self,
        image: &ObjectLocation,
    ) -> Result<Vec<CelebrityDetection>, ServiceError> {
        info!("RekognitionClient: recognizing celebrities in {}", image);

        let request = RecognizeRequest {
            image: Image {
                s3_object: S3Object {
                    bucket: image.bucket.clone(),
                    name: image.key.clone(),
                },
            },
        };
        let response: RecognizeCelebritiesResponse =
            self.aws.call_json(SERVICE, TARGET, &request).await?;

        let detections = into_detections(response)?;
        info!("RekognitionClient: {} celebrity face(s)", detections.len());
        Ok(detections)
    }
}
