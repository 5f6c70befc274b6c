/// Google Cloud Text-to-Speech client
///
/// Calls the `text:synthesize` REST endpoint with a bearer token from the
/// configured service account and returns the decoded MP3 payload.
use super::{SpeechSynthesizer, SynthesisRequest};
use crate::auth::AccessTokenSource;
use crate::config::SynthesisConfig;
use crate::{AnnounceError, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeBody<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig<'a>,
}

#[derive(Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    ssml_gender: super::VoiceGender,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig<'a> {
    audio_encoding: super::AudioEncoding,
    volume_gain_db: f64,
    speaking_rate: f64,
    effects_profile_id: [&'a str; 1],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    #[serde(default)]
    audio_content: String,
}

pub struct GoogleSynthesizer {
    config: SynthesisConfig,
    tokens: Arc<dyn AccessTokenSource>,
    http_client: reqwest::Client,
}

impl GoogleSynthesizer {
    pub fn new(config: SynthesisConfig, tokens: Arc<dyn AccessTokenSource>) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            config,
            tokens,
            http_client,
        }
    }
}

fn request_body(request: &SynthesisRequest) -> SynthesizeBody<'_> {
    SynthesizeBody {
        input: SynthesisInput {
            text: request.text(),
        },
        voice: VoiceSelection {
            language_code: request.language(),
            ssml_gender: request.gender(),
        },
        audio_config: AudioConfig {
            audio_encoding: request.encoding(),
            volume_gain_db: request.gain_db(),
            speaking_rate: request.speaking_rate(),
            effects_profile_id: [request.profile()],
        },
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleSynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>> {
        request.validate()?;

        let token = self
            .tokens
            .access_token()
            .await
            .map_err(|e| AnnounceError::SynthesisFailed(e.to_string()))?;

        debug!(
            target = "tts",
            lang = %request.language(),
            rate = request.speaking_rate(),
            gain_db = request.gain_db(),
            profile = %request.profile(),
            "Requesting synthesis"
        );

        let response = self
            .http_client
            .post(&self.config.endpoint)
            .bearer_auth(token)
            .json(&request_body(request))
            .send()
            .await
            .map_err(|e| {
                warn!(target = "tts", error = %e, "Synthesis request failed");
                AnnounceError::SynthesisFailed(format!("request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(target = "tts", status = %status, "Synthesis API returned error");
            return Err(AnnounceError::SynthesisFailed(format!(
                "provider returned {}: {}",
                status, body
            )));
        }

        let parsed: SynthesizeResponse = response.json().await.map_err(|e| {
            AnnounceError::SynthesisFailed(format!("failed to parse response: {}", e))
        })?;

        let audio = STANDARD
            .decode(parsed.audio_content.as_bytes())
            .map_err(|e| AnnounceError::SynthesisFailed(format!("invalid audio payload: {}", e)))?;
        if audio.is_empty() {
            return Err(AnnounceError::SynthesisFailed(
                "provider returned no audio".into(),
            ));
        }

        info!(target = "tts", bytes = audio.len(), "Synthesized speech");
        Ok(audio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tts::SynthesisOverrides;

    #[test]
    fn body_uses_provider_field_names() {
        let req = SynthesisRequest::new("できました", &SynthesisOverrides::speed(1.4));
        let json = serde_json::to_value(request_body(&req)).unwrap();

        assert_eq!(json["input"]["text"], "できました");
        assert_eq!(json["voice"]["languageCode"], "ja-JP");
        assert_eq!(json["voice"]["ssmlGender"], "NEUTRAL");
        assert_eq!(json["audioConfig"]["audioEncoding"], "MP3");
        assert_eq!(json["audioConfig"]["volumeGainDb"], 8.0);
        assert_eq!(json["audioConfig"]["speakingRate"], 1.4);
        assert_eq!(
            json["audioConfig"]["effectsProfileId"][0],
            "small-bluetooth-speaker-class-device"
        );
    }
}
