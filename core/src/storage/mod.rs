//! Object store publishing
//!
//! Persists synthesized audio as a local scratch file, uploads it to the
//! bucket and mints a short-lived signed URL a cast device can fetch
//! without credentials. The local copy stays behind for duration probing.

mod gcs;
mod naming;

pub use gcs::{sign_v4_url, GcsStore};
pub use naming::{ArtifactName, ArtifactNaming, FixedNaming, UniqueNaming};

use crate::config::{StorageConfig, MAX_URL_EXPIRY_SECS};
use crate::{AnnounceError, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const AUDIO_CONTENT_TYPE: &str = "audio/mpeg";

/// A time-limited, credential-less retrieval link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedUrl {
    pub url: String,
    pub expires_in: Duration,
}

impl SignedUrl {
    pub fn as_str(&self) -> &str {
        &self.url
    }
}

impl std::fmt::Display for SignedUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.url)
    }
}

/// Remote blob storage bound to one bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload the file at `local_path` under `key`, overwriting any previous object.
    async fn upload(&self, key: &str, local_path: &Path, content_type: &str) -> Result<()>;

    /// Signed GET URL for `key`, valid for `expiry`.
    async fn signed_url(&self, key: &str, expiry: Duration) -> Result<SignedUrl>;
}

#[derive(Clone, Debug)]
pub struct PublishedArtifact {
    pub local_path: PathBuf,
    pub object_key: String,
    pub url: SignedUrl,
}

pub struct Publisher {
    store: Arc<dyn ObjectStore>,
    naming: Arc<dyn ArtifactNaming>,
    scratch_dir: PathBuf,
    url_expiry: Duration,
}

fn as_publish_error(err: AnnounceError) -> AnnounceError {
    match err {
        AnnounceError::PublishFailed(_) => err,
        other => AnnounceError::PublishFailed(other.to_string()),
    }
}

impl Publisher {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        naming: Arc<dyn ArtifactNaming>,
        scratch_dir: impl Into<PathBuf>,
        url_expiry: Duration,
    ) -> Result<Self> {
        if url_expiry.is_zero() || url_expiry > Duration::from_secs(MAX_URL_EXPIRY_SECS) {
            return Err(AnnounceError::ConfigError(format!(
                "signed URL expiry must be within (0, {}s], got {:?}",
                MAX_URL_EXPIRY_SECS, url_expiry
            )));
        }
        Ok(Self {
            store,
            naming,
            scratch_dir: scratch_dir.into(),
            url_expiry,
        })
    }

    /// Build a publisher from config, choosing fixed or per-run naming.
    pub fn from_config(store: Arc<dyn ObjectStore>, config: &StorageConfig) -> Result<Self> {
        let naming: Arc<dyn ArtifactNaming> = if config.unique_names {
            Arc::new(UniqueNaming::new(
                config.object_prefix.clone(),
                &config.file_name,
            ))
        } else {
            Arc::new(FixedNaming::new(
                config.object_prefix.clone(),
                config.file_name.clone(),
            ))
        };
        Self::new(store, naming, config.scratch_dir.clone(), config.url_expiry())
    }

    pub fn url_expiry(&self) -> Duration {
        self.url_expiry
    }

    /// Write `audio` to the scratch file, upload it, then sign a URL for it.
    pub async fn publish(&self, audio: &[u8]) -> Result<PublishedArtifact> {
        let name = self.naming.next_name();
        let local_path = self.scratch_dir.join(&name.file_name);

        tokio::fs::create_dir_all(&self.scratch_dir)
            .await
            .map_err(|e| {
                AnnounceError::PublishFailed(format!(
                    "cannot create scratch dir {}: {}",
                    self.scratch_dir.display(),
                    e
                ))
            })?;
        tokio::fs::write(&local_path, audio).await.map_err(|e| {
            AnnounceError::PublishFailed(format!(
                "cannot write scratch file {}: {}",
                local_path.display(),
                e
            ))
        })?;
        debug!(target = "storage", path = %local_path.display(), bytes = audio.len(), "Wrote scratch file");

        self.store
            .upload(&name.object_key, &local_path, AUDIO_CONTENT_TYPE)
            .await
            .map_err(as_publish_error)?;
        info!(target = "storage", key = %name.object_key, "Uploaded audio");

        let url = self
            .store
            .signed_url(&name.object_key, self.url_expiry)
            .await
            .map_err(as_publish_error)?;
        debug!(target = "storage", key = %name.object_key, expiry_secs = self.url_expiry.as_secs(), "Signed retrieval URL");

        Ok(PublishedArtifact {
            local_path,
            object_key: name.object_key,
            url,
        })
    }
}
