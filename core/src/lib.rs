// Homecast Core Library
// Speak text on a networked cast speaker: synthesize → publish → cast

pub mod announce;
pub mod audio;
pub mod auth;
pub mod cast;
pub mod config;
pub mod device;
pub mod playback;
pub mod storage;
pub mod tts;

// Export core types
pub use announce::{AnnounceReport, AnnounceStage, Announcer, DuckingPlan};
pub use config::AnnounceConfig;
pub use device::{DeviceLocator, PlaybackDevice};
pub use playback::{DuckedVolume, PlaybackDispatcher};
pub use storage::{ObjectStore, PublishedArtifact, Publisher, SignedUrl};
pub use tts::{SpeechSynthesizer, SynthesisOverrides, SynthesisRequest, VoiceGender};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnnounceError {
    #[error("Device unreachable: {0}")]
    DeviceUnreachable(String),

    #[error("Synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Playback dispatch failed: {0}")]
    PlaybackDispatchFailed(String),

    #[error("Volume operation failed: {0}")]
    VolumeOperationFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Credential error: {0}")]
    CredentialError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl AnnounceError {
    /// Stable short code for the failure category, used in the final log line.
    pub fn category(&self) -> &'static str {
        match self {
            AnnounceError::DeviceUnreachable(_) => "device_unreachable",
            AnnounceError::SynthesisFailed(_) => "synthesis_failed",
            AnnounceError::PublishFailed(_) => "publish_failed",
            AnnounceError::PlaybackDispatchFailed(_) => "playback_dispatch_failed",
            AnnounceError::VolumeOperationFailed(_) => "volume_operation_failed",
            AnnounceError::ConfigError(_) => "config",
            AnnounceError::CredentialError(_) => "credential",
            AnnounceError::IoError(_) => "io",
            AnnounceError::SerializationError(_) => "serialization",
        }
    }
}

pub type Result<T> = std::result::Result<T, AnnounceError>;
