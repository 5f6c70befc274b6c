use crate::{AnnounceError, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LANGUAGE: &str = "ja-JP";
pub const DEFAULT_GAIN_DB: f64 = 8.0;
pub const DEFAULT_SPEAKING_RATE: f64 = 1.2;
pub const DEFAULT_PROFILE: &str = "small-bluetooth-speaker-class-device";

const MAX_TEXT_BYTES: usize = 5000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoiceGender {
    #[serde(rename = "SSML_VOICE_GENDER_UNSPECIFIED", alias = "unspecified")]
    Unspecified,
    #[serde(rename = "MALE", alias = "male")]
    Male,
    #[serde(rename = "FEMALE", alias = "female")]
    Female,
    #[serde(rename = "NEUTRAL", alias = "neutral")]
    Neutral,
}

impl Default for VoiceGender {
    fn default() -> Self {
        VoiceGender::Neutral
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AudioEncoding {
    Mp3,
}

/// Partial override mapping merged over the defaults.
/// Keys left unset keep their default value.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SynthesisOverrides {
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub gender: Option<VoiceGender>,
    /// Volume gain in dB
    #[serde(default)]
    pub volume: Option<f64>,
    /// Speaking rate multiplier
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub profile: Option<String>,
}

impl SynthesisOverrides {
    pub fn speed(speed: f64) -> Self {
        Self {
            speed: Some(speed),
            ..Default::default()
        }
    }
}

/// A fully resolved synthesis request; immutable once built.
#[derive(Clone, Debug, PartialEq)]
pub struct SynthesisRequest {
    text: String,
    language: String,
    gender: VoiceGender,
    gain_db: f64,
    speaking_rate: f64,
    profile: String,
    encoding: AudioEncoding,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>, overrides: &SynthesisOverrides) -> Self {
        Self {
            text: text.into(),
            language: overrides
                .lang
                .clone()
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            gender: overrides.gender.unwrap_or_default(),
            gain_db: overrides.volume.unwrap_or(DEFAULT_GAIN_DB),
            speaking_rate: overrides.speed.unwrap_or(DEFAULT_SPEAKING_RATE),
            profile: overrides
                .profile
                .clone()
                .unwrap_or_else(|| DEFAULT_PROFILE.to_string()),
            encoding: AudioEncoding::Mp3,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn gender(&self) -> VoiceGender {
        self.gender
    }

    pub fn gain_db(&self) -> f64 {
        self.gain_db
    }

    pub fn speaking_rate(&self) -> f64 {
        self.speaking_rate
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn encoding(&self) -> AudioEncoding {
        self.encoding
    }

    /// Reject requests the provider would refuse anyway.
    pub fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(AnnounceError::SynthesisFailed("text is empty".into()));
        }
        if self.text.len() > MAX_TEXT_BYTES {
            return Err(AnnounceError::SynthesisFailed(format!(
                "text is {} bytes, limit is {}",
                self.text.len(),
                MAX_TEXT_BYTES
            )));
        }
        if self.language.trim().is_empty() {
            return Err(AnnounceError::SynthesisFailed("language tag is empty".into()));
        }
        if !(0.25..=4.0).contains(&self.speaking_rate) {
            return Err(AnnounceError::SynthesisFailed(format!(
                "speaking rate {} outside 0.25..=4.0",
                self.speaking_rate
            )));
        }
        if !(-96.0..=16.0).contains(&self.gain_db) {
            return Err(AnnounceError::SynthesisFailed(format!(
                "volume gain {} dB outside -96.0..=16.0",
                self.gain_db
            )));
        }
        Ok(())
    }
}
