use std::fs;
use std::path::{Path, PathBuf};

use homecast_core::config::{DeviceConfig, DuckingConfig, StorageConfig, SynthesisConfig};
use homecast_core::{AnnounceConfig, SynthesisOverrides};

/// High-level configuration for the announce binary
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub core: AnnounceConfig,
    pub announcement: AnnouncementConfig,
}

/// What to say and how
#[derive(Clone, Debug)]
pub struct AnnouncementConfig {
    pub text: String,
    pub overrides: SynthesisOverrides,
}

impl Default for AnnouncementConfig {
    fn default() -> Self {
        Self {
            text: std::env::var("ANNOUNCE_TEXT")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "できました".to_string()),
            overrides: SynthesisOverrides::speed(1.4),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            core: AnnounceConfig::default(),
            announcement: AnnouncementConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file (path via ANNOUNCE_CONFIG or ./announce.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let default = Self::default();
        let path = std::env::var("ANNOUNCE_CONFIG").unwrap_or_else(|_| "announce.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(target = "announce", path = %path, "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => match Self::from_toml_str(&s, default.clone()) {
                Ok(cfg) => cfg,
                Err(e) => {
                    tracing::warn!(target = "announce", error = %e, "Failed to parse TOML; using defaults");
                    default
                }
            },
            Err(e) => {
                tracing::warn!(target = "announce", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }

    pub fn from_toml_str(s: &str, base: AppConfig) -> Result<AppConfig, toml::de::Error> {
        toml::from_str::<AppToml>(s).map(|t| t.overlay(base))
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct AppToml {
    pub credentials_path: Option<PathBuf>,
    pub auth_timeout_ms: Option<u64>,
    pub device: Option<DeviceToml>,
    pub storage: Option<StorageToml>,
    pub synthesis: Option<SynthesisToml>,
    pub ducking: Option<DuckingToml>,
    pub announcement: Option<AnnouncementToml>,
}

impl AppToml {
    fn overlay(self, mut base: AppConfig) -> AppConfig {
        if let Some(p) = self.credentials_path {
            base.core.credentials_path = p;
        }
        if let Some(ms) = self.auth_timeout_ms {
            base.core.auth_timeout_ms = ms;
        }
        if let Some(d) = self.device {
            d.apply(&mut base.core.device);
        }
        if let Some(s) = self.storage {
            s.apply(&mut base.core.storage);
        }
        if let Some(s) = self.synthesis {
            s.apply(&mut base.core.synthesis);
        }
        if let Some(d) = self.ducking {
            d.apply(&mut base.core.ducking);
        }
        if let Some(a) = self.announcement {
            a.apply(&mut base.announcement);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct DeviceToml {
    pub address: Option<String>,
    pub port: Option<u16>,
    pub connect_timeout_ms: Option<u64>,
    pub ready_timeout_ms: Option<u64>,
    pub playback_timeout_ms: Option<u64>,
}
impl DeviceToml {
    fn apply(self, d: &mut DeviceConfig) {
        if let Some(v) = self.address {
            d.address = v;
        }
        if let Some(v) = self.port {
            d.port = v;
        }
        if let Some(v) = self.connect_timeout_ms {
            d.connect_timeout_ms = v;
        }
        if let Some(v) = self.ready_timeout_ms {
            d.ready_timeout_ms = v;
        }
        if let Some(v) = self.playback_timeout_ms {
            d.playback_timeout_ms = v;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct StorageToml {
    pub bucket: Option<String>,
    pub scratch_dir: Option<PathBuf>,
    pub object_prefix: Option<String>,
    pub file_name: Option<String>,
    pub unique_names: Option<bool>,
    pub url_expiry_secs: Option<u64>,
    pub upload_endpoint: Option<String>,
    pub timeout_ms: Option<u64>,
}
impl StorageToml {
    fn apply(self, s: &mut StorageConfig) {
        if let Some(x) = self.bucket {
            s.bucket = x;
        }
        if let Some(x) = self.scratch_dir {
            s.scratch_dir = x;
        }
        if let Some(x) = self.object_prefix {
            s.object_prefix = x;
        }
        if let Some(x) = self.file_name {
            s.file_name = x;
        }
        if let Some(x) = self.unique_names {
            s.unique_names = x;
        }
        if let Some(x) = self.url_expiry_secs {
            s.url_expiry_secs = x;
        }
        if let Some(x) = self.upload_endpoint {
            s.upload_endpoint = x;
        }
        if let Some(x) = self.timeout_ms {
            s.timeout_ms = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct SynthesisToml {
    pub endpoint: Option<String>,
    pub timeout_ms: Option<u64>,
}
impl SynthesisToml {
    fn apply(self, s: &mut SynthesisConfig) {
        if let Some(x) = self.endpoint {
            s.endpoint = x;
        }
        if let Some(x) = self.timeout_ms {
            s.timeout_ms = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct DuckingToml {
    pub enabled: Option<bool>,
    pub volume: Option<f32>,
    pub margin_secs: Option<u64>,
}
impl DuckingToml {
    fn apply(self, d: &mut DuckingConfig) {
        if let Some(x) = self.enabled {
            d.enabled = x;
        }
        if let Some(x) = self.volume {
            d.volume = x.clamp(0.0, 1.0);
        }
        if let Some(x) = self.margin_secs {
            d.margin_secs = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct AnnouncementToml {
    pub text: Option<String>,
    // Replaces the default overrides wholesale; keys left out fall back to synthesis defaults
    pub overrides: Option<SynthesisOverrides>,
}
impl AnnouncementToml {
    fn apply(self, a: &mut AnnouncementConfig) {
        if let Some(x) = self.text {
            a.text = x;
        }
        if let Some(x) = self.overrides {
            a.overrides = x;
        }
    }
}
