/// Google Cloud Storage backend
///
/// Uploads through the JSON API media endpoint and signs V4 GET URLs locally
/// with the service-account key; signing needs no network round trip.
use super::{ObjectStore, SignedUrl};
use crate::auth::{AccessTokenSource, ServiceAccountKey};
use crate::config::StorageConfig;
use crate::{AnnounceError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const SIGNING_HOST: &str = "storage.googleapis.com";
const SIGNING_ALGORITHM: &str = "GOOG4-RSA-SHA256";

pub struct GcsStore {
    bucket: String,
    upload_endpoint: String,
    key: Arc<ServiceAccountKey>,
    tokens: Arc<dyn AccessTokenSource>,
    http_client: reqwest::Client,
}

impl GcsStore {
    pub fn new(
        config: &StorageConfig,
        key: Arc<ServiceAccountKey>,
        tokens: Arc<dyn AccessTokenSource>,
    ) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            bucket: config.bucket.clone(),
            upload_endpoint: config.upload_endpoint.trim_end_matches('/').to_string(),
            key,
            tokens,
            http_client,
        }
    }
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn upload(&self, key: &str, local_path: &Path, content_type: &str) -> Result<()> {
        let body = tokio::fs::read(local_path).await.map_err(|e| {
            AnnounceError::PublishFailed(format!("cannot read {}: {}", local_path.display(), e))
        })?;
        let token = self
            .tokens
            .access_token()
            .await
            .map_err(|e| AnnounceError::PublishFailed(e.to_string()))?;

        let url = format!(
            "{}/b/{}/o?uploadType=media&name={}",
            self.upload_endpoint,
            urlencoding::encode(&self.bucket),
            urlencoding::encode(key)
        );
        debug!(target = "storage", bucket = %self.bucket, key = %key, bytes = body.len(), "Uploading object");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| {
                warn!(target = "storage", error = %e, "Upload request failed");
                AnnounceError::PublishFailed(format!("upload request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(target = "storage", status = %status, "Upload rejected");
            return Err(AnnounceError::PublishFailed(format!(
                "upload returned {}: {}",
                status, text
            )));
        }
        Ok(())
    }

    async fn signed_url(&self, key: &str, expiry: Duration) -> Result<SignedUrl> {
        let url = sign_v4_url(&self.key, &self.bucket, key, expiry, Utc::now())
            .map_err(|e| AnnounceError::PublishFailed(format!("URL signing failed: {}", e)))?;
        Ok(SignedUrl {
            url,
            expires_in: expiry,
        })
    }
}

fn encode_object_path(object_key: &str) -> String {
    object_key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Build a V4 signed GET URL for `bucket/object_key` valid for `expiry` from `now`.
pub fn sign_v4_url(
    key: &ServiceAccountKey,
    bucket: &str,
    object_key: &str,
    expiry: Duration,
    now: DateTime<Utc>,
) -> Result<String> {
    let datestamp = now.format("%Y%m%d").to_string();
    let timestamp = now.format("%Y%m%dT%H%M%SZ").to_string();
    let scope = format!("{}/auto/storage/goog4_request", datestamp);
    let credential = format!("{}/{}", key.client_email, scope);

    let canonical_uri = format!(
        "/{}/{}",
        urlencoding::encode(bucket),
        encode_object_path(object_key)
    );

    // Already in lexicographic order, as the canonical form requires
    let query = [
        ("X-Goog-Algorithm", SIGNING_ALGORITHM.to_string()),
        ("X-Goog-Credential", credential),
        ("X-Goog-Date", timestamp.clone()),
        ("X-Goog-Expires", expiry.as_secs().to_string()),
        ("X-Goog-SignedHeaders", "host".to_string()),
    ]
    .iter()
    .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
    .collect::<Vec<_>>()
    .join("&");

    let canonical_request = format!(
        "GET\n{}\n{}\nhost:{}\n\nhost\nUNSIGNED-PAYLOAD",
        canonical_uri, query, SIGNING_HOST
    );
    let string_to_sign = format!(
        "{}\n{}\n{}\n{}",
        SIGNING_ALGORITHM,
        timestamp,
        scope,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    );

    let signature = hex::encode(key.sign_rs256(string_to_sign.as_bytes())?);
    Ok(format!(
        "https://{}{}?{}&X-Goog-Signature={}",
        SIGNING_HOST, canonical_uri, query, signature
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_path_keeps_separators() {
        assert_eq!(encode_object_path("tts-audio/audio.mp3"), "tts-audio/audio.mp3");
        assert_eq!(encode_object_path("a b/c+d.mp3"), "a%20b/c%2Bd.mp3");
    }
}
