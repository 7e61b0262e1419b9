//! Object storage abstraction.
//!
//! The pipelines only need to read an object's bytes and write bytes back with
//! a content type; [`ObjectStore`] is that seam.

pub mod s3;

use std::fmt;

/// A bucket + key pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_object(&self, location: &ObjectLocation) -> Result<Vec<u8>, crate::aws::ServiceError>;

    async fn put_object(
        &self,
        location: &ObjectLocation,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), crate::aws::ServiceError>;
}
