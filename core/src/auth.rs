//! Service-account credentials shared by the synthesis and storage clients.
//!
//! Access tokens come from the OAuth2 JWT-bearer grant and are cached until
//! shortly before they expire. The same RSA key signs storage URLs.

use crate::{AnnounceError, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;
const REFRESH_SKEW: Duration = Duration::from_secs(60);

/// Source of bearer tokens for Google APIs.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String>;
}

/// Fields of a service-account JSON key file we rely on
#[derive(Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

impl std::fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("project_id", &self.project_id)
            .field("token_uri", &self.token_uri)
            .finish_non_exhaustive()
    }
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AnnounceError::CredentialError(format!("cannot read {}: {}", path.display(), e))
        })?;
        let key = Self::from_json(&raw)?;
        info!(target = "auth", client_email = %key.client_email, "Loaded service account");
        Ok(key)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let key: ServiceAccountKey = serde_json::from_str(raw)
            .map_err(|e| AnnounceError::CredentialError(format!("invalid key file: {}", e)))?;
        if key.client_email.is_empty() || key.private_key.is_empty() {
            return Err(AnnounceError::CredentialError(
                "key file lacks client_email or private_key".into(),
            ));
        }
        Ok(key)
    }

    fn encoding_key(&self) -> Result<EncodingKey> {
        EncodingKey::from_rsa_pem(self.private_key.as_bytes())
            .map_err(|e| AnnounceError::CredentialError(format!("invalid private key: {}", e)))
    }

    /// RSA-SHA256 signature over `message`, raw bytes.
    pub fn sign_rs256(&self, message: &[u8]) -> Result<Vec<u8>> {
        let key = self.encoding_key()?;
        let encoded = jsonwebtoken::crypto::sign(message, &key, Algorithm::RS256)
            .map_err(|e| AnnounceError::CredentialError(format!("signing failed: {}", e)))?;
        URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| AnnounceError::CredentialError(format!("signature decode: {}", e)))
    }

    /// Self-signed assertion for the JWT-bearer grant.
    pub fn assertion(&self, scope: &str, issued_at: i64) -> Result<String> {
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope,
            aud: &self.token_uri,
            iat: issued_at,
            exp: issued_at + TOKEN_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.private_key_id.clone();
        jsonwebtoken::encode(&header, &claims, &self.encoding_key()?)
            .map_err(|e| AnnounceError::CredentialError(format!("assertion encode: {}", e)))
    }
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

/// Mints and caches access tokens for a service account.
pub struct ServiceAccountTokenSource {
    key: ServiceAccountKey,
    scope: String,
    http: reqwest::Client,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenSource {
    pub fn new(key: ServiceAccountKey, http: reqwest::Client) -> Self {
        Self {
            key,
            scope: CLOUD_PLATFORM_SCOPE.to_string(),
            http,
            cached: Mutex::new(None),
        }
    }

    /// Token source with its own HTTP client bounded by `timeout`.
    pub fn with_timeout(key: ServiceAccountKey, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self::new(key, http)
    }

    async fn fetch(&self) -> Result<CachedToken> {
        let assertion = self.key.assertion(&self.scope, chrono::Utc::now().timestamp())?;
        debug!(target = "auth", token_uri = %self.key.token_uri, "Requesting access token");

        let response = self
            .http
            .post(&self.key.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| AnnounceError::CredentialError(format!("token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AnnounceError::CredentialError(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| AnnounceError::CredentialError(format!("token response: {}", e)))?;
        let lifetime = Duration::from_secs(parsed.expires_in.unwrap_or(TOKEN_LIFETIME_SECS as u64));
        Ok(CachedToken {
            token: parsed.access_token,
            refresh_at: Instant::now() + lifetime.saturating_sub(REFRESH_SKEW),
        })
    }
}

#[async_trait]
impl AccessTokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(tok) = cached.as_ref() {
            if Instant::now() < tok.refresh_at {
                return Ok(tok.token.clone());
            }
        }
        let fresh = self.fetch().await?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}

/// Fixed bearer token, for emulators and tests.
#[derive(Clone, Debug)]
pub struct StaticTokenSource(pub String);

#[async_trait]
impl AccessTokenSource for StaticTokenSource {
    async fn access_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}
