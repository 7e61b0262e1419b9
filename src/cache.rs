//! Local JSON cache for a detection response.
//!
//! The file holds the response exactly as serialized; there is no schema
//! version. An unreadable or undecodable file counts as a miss. The document a
//! response belongs to is recorded next to it in `<file>.source`; a cache
//! written for another document counts as a miss too.

use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::ocr::DocumentSource;
use crate::schema::DetectionResponse;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache file {path:?} not found")]
    Missing { path: PathBuf },
    #[error("cannot access cache file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cache file {path:?} is not a detection response: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("cache file {path:?} holds the response for {cached}, not {requested}")]
    Stale {
        path: PathBuf,
        cached: String,
        requested: String,
    },
}

#[derive(Debug, Clone)]
pub struct ResponseCache {
    path: PathBuf,
}

impl ResponseCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sidecar file naming the document the cached response belongs to.
    pub fn source_path(&self) -> PathBuf {
        let mut path = self.path.clone().into_os_string();
        path.push(".source");
        PathBuf::from(path)
    }

    /// Load the cached response if it was written for `source`. A cache file
    /// without a recorded source is accepted as is.
    pub fn load_for(&self, source: &DocumentSource) -> Result<DetectionResponse, CacheError> {
        let response = self.load()?;
        let requested = source.to_string();

        match std::fs::read_to_string(self.source_path()) {
            Ok(cached) if cached.trim() == requested => Ok(response),
            Ok(cached) => Err(CacheError::Stale {
                path: self.path.clone(),
                cached: cached.trim().to_string(),
                requested,
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("ResponseCache: {:?} has no recorded source", self.path);
                Ok(response)
            }
            Err(source) => Err(CacheError::Io {
                path: self.source_path(),
                source,
            }),
        }
    }

    pub fn load(&self) -> Result<DetectionResponse, CacheError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                CacheError::Missing {
                    path: self.path.clone(),
                }
            } else {
                CacheError::Io {
                    path: self.path.clone(),
                    source,
                }
            }
        })?;

        let response = serde_json::from_str(&raw).map_err(|source| CacheError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        debug!("ResponseCache: loaded {:?} ({} bytes)", self.path, raw.len());
        Ok(response)
    }

    pub fn store(
        &self,
        response: &DetectionResponse,
        source: &DocumentSource,
    ) -> Result<(), CacheError> {
        let io_err = |source: io::Error| CacheError::Io {
            path: self.path.clone(),
            source,
        };

        let json = serde_json::to_string_pretty(response).map_err(|source| CacheError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        std::fs::write(&self.path, json.as_bytes()).map_err(io_err)?;
        std::fs::write(self.source_path(), source.to_string()).map_err(|source| {
            CacheError::Io {
                path: self.source_path(),
                source,
            }
        })?;
        debug!("ResponseCache: stored {:?} ({} bytes)", self.path, json.len());
        Ok(())
    }
}
