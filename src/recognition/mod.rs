//! Celebrity-recognition provider abstraction.

pub mod rekognition;

use crate::aws::ServiceError;
use crate::schema::CelebrityDetection;
use crate::storage::ObjectLocation;

#[async_trait::async_trait]
pub trait CelebrityRecognizer: Send + Sync {
    fn name(&self) -> &str;

    /// Detected subjects, in service order. An empty list means nobody was recognized.
    async fn recognize_celebrities(
        &self,
        image: &ObjectLocation,
    ) -> Result<Vec<CelebrityDetection>, ServiceError>;
}
