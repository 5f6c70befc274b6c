//! Runtime configuration.
//!
//! Every section has a `Default` that reads its environment variables and
//! falls back to the values the announcement script has always used. The
//! demo binary overlays an optional TOML file on top of these.

use crate::{AnnounceError, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Longest signed URL lifetime we are willing to mint.
pub const MAX_URL_EXPIRY_SECS: u64 = 300;

#[derive(Clone, Debug)]
pub struct AnnounceConfig {
    pub device: DeviceConfig,
    pub storage: StorageConfig,
    pub synthesis: SynthesisConfig,
    pub ducking: DuckingConfig,
    /// Service-account JSON used for both synthesis and storage
    pub credentials_path: PathBuf,
    /// Bound on each token exchange
    pub auth_timeout_ms: u64,
}

#[derive(Clone, Debug)]
pub struct DeviceConfig {
    pub address: String,
    pub port: u16,
    pub connect_timeout_ms: u64,
    pub ready_timeout_ms: u64,
    pub playback_timeout_ms: u64,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub bucket: String,
    pub scratch_dir: PathBuf,
    pub object_prefix: String,
    pub file_name: String,
    /// Append a per-run id to the artifact name
    pub unique_names: bool,
    pub url_expiry_secs: u64,
    pub upload_endpoint: String,
    pub timeout_ms: u64,
}

#[derive(Clone, Debug)]
pub struct SynthesisConfig {
    pub endpoint: String,
    pub timeout_ms: u64,
}

#[derive(Clone, Debug)]
pub struct DuckingConfig {
    pub enabled: bool,
    /// Announcement volume, 0.0–1.0
    pub volume: f32,
    pub margin_secs: u64,
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|s| {
        matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            address: env_string("IP_ADDR").unwrap_or_default(),
            port: env_parse("CAST_PORT").unwrap_or(8009),
            connect_timeout_ms: env_parse("CAST_CONNECT_TIMEOUT_MS").unwrap_or(5_000),
            ready_timeout_ms: env_parse("CAST_READY_TIMEOUT_MS").unwrap_or(10_000),
            playback_timeout_ms: env_parse("CAST_PLAYBACK_TIMEOUT_MS").unwrap_or(20_000),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: env_string("BUCKET_NAME").unwrap_or_default(),
            scratch_dir: env_string("TTS_SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./tts-audio")),
            object_prefix: env_string("TTS_OBJECT_PREFIX").unwrap_or_else(|| "tts-audio".into()),
            file_name: env_string("TTS_OBJECT_NAME").unwrap_or_else(|| "audio.mp3".into()),
            unique_names: env_flag("TTS_UNIQUE_NAMES").unwrap_or(false),
            url_expiry_secs: env_parse("SIGNED_URL_EXPIRY_SECS").unwrap_or(60),
            upload_endpoint: env_string("STORAGE_UPLOAD_ENDPOINT")
                .unwrap_or_else(|| "https://storage.googleapis.com/upload/storage/v1".into()),
            timeout_ms: env_parse("STORAGE_TIMEOUT_MS").unwrap_or(20_000),
        }
    }
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            endpoint: env_string("TTS_ENDPOINT").unwrap_or_else(|| {
                "https://texttospeech.googleapis.com/v1/text:synthesize".into()
            }),
            timeout_ms: env_parse("TTS_TIMEOUT_MS").unwrap_or(20_000),
        }
    }
}

impl Default for DuckingConfig {
    fn default() -> Self {
        Self {
            enabled: env_flag("DUCKING_ENABLED").unwrap_or(false),
            volume: env_parse::<f32>("DUCKING_VOLUME")
                .unwrap_or(0.3)
                .clamp(0.0, 1.0),
            margin_secs: env_parse("DUCKING_MARGIN_SECS").unwrap_or(5),
        }
    }
}

impl Default for AnnounceConfig {
    fn default() -> Self {
        Self {
            device: DeviceConfig::default(),
            storage: StorageConfig::default(),
            synthesis: SynthesisConfig::default(),
            ducking: DuckingConfig::default(),
            credentials_path: env_string("SERVICE_ACCOUNT_JSON")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("service-account.json")),
            auth_timeout_ms: env_parse("AUTH_TIMEOUT_MS").unwrap_or(20_000),
        }
    }
}

impl AnnounceConfig {
    /// Check required fields and bounds before any network call is made.
    pub fn validate(&self) -> Result<()> {
        if self.device.address.trim().is_empty() {
            return Err(AnnounceError::ConfigError(
                "device address is not set (IP_ADDR)".into(),
            ));
        }
        if self.storage.bucket.trim().is_empty() {
            return Err(AnnounceError::ConfigError(
                "storage bucket is not set (BUCKET_NAME)".into(),
            ));
        }
        if self.storage.url_expiry_secs == 0 || self.storage.url_expiry_secs > MAX_URL_EXPIRY_SECS
        {
            return Err(AnnounceError::ConfigError(format!(
                "signed URL expiry must be within 1..={} seconds, got {}",
                MAX_URL_EXPIRY_SECS, self.storage.url_expiry_secs
            )));
        }
        if !(0.0..=1.0).contains(&self.ducking.volume) {
            return Err(AnnounceError::ConfigError(format!(
                "ducking volume must be within 0.0..=1.0, got {}",
                self.ducking.volume
            )));
        }
        if self.storage.file_name.trim().is_empty() {
            return Err(AnnounceError::ConfigError("artifact file name is empty".into()));
        }
        if self.auth_timeout_ms == 0 {
            return Err(AnnounceError::ConfigError("auth timeout must be non-zero".into()));
        }
        Ok(())
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_millis(self.auth_timeout_ms)
    }
}

impl DeviceConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.ready_timeout_ms)
    }

    pub fn playback_timeout(&self) -> Duration {
        Duration::from_millis(self.playback_timeout_ms)
    }
}

impl StorageConfig {
    pub fn url_expiry(&self) -> Duration {
        Duration::from_secs(self.url_expiry_secs)
    }
}

impl DuckingConfig {
    pub fn margin(&self) -> Duration {
        Duration::from_secs(self.margin_secs)
    }
}
