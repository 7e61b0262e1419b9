//! Text detection with a local response cache in front of it.

use std::sync::{Arc, OnceLock};
use tracing::{error, info, warn};

use crate::aws::ServiceError;
use crate::cache::{CacheError, ResponseCache};
use crate::ocr::{DocumentSource, TextDetector};
use crate::schema::DetectionResponse;

/// How the cache file is used for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Read it when present, write it after a fetch.
    ReadWrite,
    /// Always fetch, then overwrite it.
    Refresh,
    /// Never touch it.
    Disabled,
}

type DetectorFactory =
    Box<dyn Fn() -> Result<Arc<dyn TextDetector>, ServiceError> + Send + Sync>;

/// Calls the detector exactly once per `fetch`. The detector is built on the
/// first fetch, so a run served from the cache never needs one.
pub struct Fetcher {
    detector: OnceLock<Arc<dyn TextDetector>>,
    factory: DetectorFactory,
}

impl Fetcher {
    pub fn lazy<F>(factory: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn TextDetector>, ServiceError> + Send + Sync + 'static,
    {
        Self {
            detector: OnceLock::new(),
            factory: Box::new(factory),
        }
    }

    fn detector(&self) -> Result<&Arc<dyn TextDetector>, ServiceError> {
        if let Some(detector) = self.detector.get() {
            return Ok(detector);
        }
        let built = (self.factory)()?;
        Ok(self.detector.get_or_init(|| built))
    }

    pub async fn fetch(&self, source: &DocumentSource) -> Result<DetectionResponse, ServiceError> {
        let detector = match self.detector() {
            Ok(detector) => detector,
            Err(e) => {
                error!("Fetcher: cannot set up text detection for {}: {}", source, e);
                return Err(e);
            }
        };

        match detector.detect_document_text(source).await {
            Ok(response) => Ok(response),
            Err(e) => {
                error!("Fetcher: {} failed for {}: {}", detector.name(), source, e);
                Err(e)
            }
        }
    }

    /// Serve from the cache when it holds a response for `source`, otherwise
    /// fetch once and store the result. A failed cache write is logged, not
    /// returned.
    pub async fn read_or_fetch(
        &self,
        cache: &ResponseCache,
        source: &DocumentSource,
        mode: CacheMode,
    ) -> Result<DetectionResponse, ServiceError> {
        if mode == CacheMode::ReadWrite {
            match cache.load_for(source) {
                Ok(response) => {
                    info!("Using cached response for {} from {:?}", source, cache.path());
                    return Ok(response);
                }
                Err(CacheError::Missing { .. }) => {
                    info!("No cached response at {:?}, calling the service", cache.path());
                }
                Err(e) => warn!("{}; calling the service", e),
            }
        }

        let response = self.fetch(source).await?;

        if mode != CacheMode::Disabled {
            match cache.store(&response, source) {
                Ok(()) => info!("Cached response for {} in {:?}", source, cache.path()),
                Err(e) => warn!("Could not write cache: {}", e),
            }
        }
        Ok(response)
    }
}
