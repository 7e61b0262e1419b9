//! Celebrity annotation pipeline: recognize → download → draw → upload.

use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};

use crate::annotate::{AnnotateError, Annotator};
use crate::aws::ServiceError;
use crate::config::{CelebrityJobConfig, OutputNaming};
use crate::recognition::CelebrityRecognizer;
use crate::schema::CelebrityDetection;
use crate::storage::{ObjectLocation, ObjectStore};

const JPEG_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Annotate(#[from] AnnotateError),
    #[error("cannot derive an output name from key '{0}'")]
    OutputKey(String),
}

/// What happened to one image.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageOutcome {
    /// Recognition found nobody; nothing was downloaded or uploaded.
    NoCelebrities,
    Annotated {
        output: ObjectLocation,
        detected: usize,
        drawn: usize,
    },
}

/// `{prefix}{file stem}{suffix}`, e.g. `input/contora.jpg` → `results/contora-resultado.jpg`.
pub fn output_key(source_key: &str, naming: &OutputNaming) -> Result<String, PipelineError> {
    let stem = Path::new(source_key)
        .file_stem()
        .map(|s| s.to_string_lossy())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PipelineError::OutputKey(source_key.to_string()))?;
    Ok(format!("{}{}{}", naming.prefix, stem, naming.suffix))
}

pub struct CelebrityPipeline {
    recognizer: Arc<dyn CelebrityRecognizer>,
    store: Arc<dyn ObjectStore>,
    annotator: Annotator,
    input_bucket: String,
    output_bucket: String,
    naming: OutputNaming,
}

impl CelebrityPipeline {
    pub fn new(
        recognizer: Arc<dyn CelebrityRecognizer>,
        store: Arc<dyn ObjectStore>,
        annotator: Annotator,
        job: &CelebrityJobConfig,
    ) -> Self {
        Self {
            recognizer,
            store,
            annotator,
            input_bucket: job.input_bucket.clone(),
            output_bucket: job.output_bucket.clone(),
            naming: job.output.clone(),
        }
    }

    /// Process a single image key from the input bucket.
    pub async fn process(&self, key: &str) -> Result<ImageOutcome, PipelineError> {
        info!("Processing image: {} ({})", key, self.recognizer.name());
        let source = ObjectLocation::new(&self.input_bucket, key);

        let detections = self.recognizer.recognize_celebrities(&source).await?;
        if detections.is_empty() {
            info!("No celebrities found in {}", source);
            return Ok(ImageOutcome::NoCelebrities);
        }

        let output = ObjectLocation::new(&self.output_bucket, output_key(key, &self.naming)?);
        let drawn = self.annotate_and_upload(&source, &output, &detections).await?;

        Ok(ImageOutcome::Annotated {
            output,
            detected: detections.len(),
            drawn,
        })
    }

    /// Download `source`, draw the detections on a copy and upload it as JPEG.
    /// An empty list uploads an unmodified copy. Returns how many were drawn.
    pub async fn annotate_and_upload(
        &self,
        source: &ObjectLocation,
        output: &ObjectLocation,
        detections: &[CelebrityDetection],
    ) -> Result<usize, PipelineError> {
        let original = self.store.get_object(source).await?;
        let rendered = self.annotator.render(&original, detections)?;

        self.store
            .put_object(output, rendered.jpeg, JPEG_CONTENT_TYPE)
            .await?;
        info!(
            "Saved annotated image to {} ({} of {} detection(s) drawn)",
            output,
            rendered.drawn,
            detections.len()
        );
        Ok(rendered.drawn)
    }

    /// Process keys one after another. A failure is logged and the loop goes on.
    pub async fn run(&self, keys: &[String]) -> Vec<(String, Result<ImageOutcome, PipelineError>)> {
        let mut results = Vec::with_capacity(keys.len());
        for key in keys {
            let result = self.process(key).await;
            if let Err(e) = &result {
                error!("Failed to process {}: {}", key, e);
            }
            results.push((key.clone(), result));
        }
        results
    }
}
