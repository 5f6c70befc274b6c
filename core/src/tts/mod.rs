//! Text-to-Speech (TTS) synthesis
//!
//! Turns announcement text into encoded MP3 bytes through a cloud provider.
//!
//! Defaults applied to every request unless overridden:
//! - lang:    "ja-JP"
//! - gender:  NEUTRAL
//! - volume:  8.0 dB gain
//! - speed:   1.2x speaking rate
//! - profile: "small-bluetooth-speaker-class-device"
//!
//! Env overrides (see `config::SynthesisConfig`):
//! - TTS_ENDPOINT, TTS_TIMEOUT_MS

mod google;
mod request;

pub use google::GoogleSynthesizer;
pub use request::{
    AudioEncoding, SynthesisOverrides, SynthesisRequest, VoiceGender, DEFAULT_GAIN_DB,
    DEFAULT_LANGUAGE, DEFAULT_PROFILE, DEFAULT_SPEAKING_RATE,
};

use crate::Result;
use async_trait::async_trait;

/// Converts a request into encoded audio bytes.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>>;
}
