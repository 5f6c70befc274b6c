/// REST clients against a local HTTP stand-in
mod common;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use common::{fixture_path, serve_json};
use homecast_core::auth::{
    AccessTokenSource, ServiceAccountKey, ServiceAccountTokenSource, StaticTokenSource,
    CLOUD_PLATFORM_SCOPE,
};
use homecast_core::config::{StorageConfig, SynthesisConfig};
use homecast_core::storage::{GcsStore, ObjectStore, AUDIO_CONTENT_TYPE};
use homecast_core::tts::GoogleSynthesizer;
use homecast_core::{AnnounceError, SpeechSynthesizer, SynthesisOverrides, SynthesisRequest};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn fixture_key() -> ServiceAccountKey {
    ServiceAccountKey::from_file(&fixture_path("service-account.json")).unwrap()
}

fn synthesis_config(base: &str) -> SynthesisConfig {
    SynthesisConfig {
        endpoint: format!("{}/v1/text:synthesize", base),
        timeout_ms: 5_000,
    }
}

fn storage_config(base: &str) -> StorageConfig {
    StorageConfig {
        bucket: "announcements".into(),
        upload_endpoint: format!("{}/upload/storage/v1", base),
        timeout_ms: 5_000,
        ..StorageConfig::default()
    }
}

#[tokio::test]
async fn synthesize_posts_request_and_decodes_audio() {
    let audio = b"ID3\x04fake-mp3".to_vec();
    let body = json!({ "audioContent": STANDARD.encode(&audio) }).to_string();
    let (base, server) = serve_json(vec![(200, body)]).await;

    let synth = GoogleSynthesizer::new(
        synthesis_config(&base),
        Arc::new(StaticTokenSource("test-token".into())),
    );
    let request = SynthesisRequest::new("テスト", &SynthesisOverrides::speed(1.4));
    let bytes = synth.synthesize(&request).await.unwrap();
    assert_eq!(bytes, audio);

    let captured = server.await.unwrap();
    let req = &captured[0];
    assert_eq!(req.method, "POST");
    assert_eq!(req.target, "/v1/text:synthesize");
    assert_eq!(req.header("authorization"), Some("Bearer test-token"));

    let sent = req.json();
    assert_eq!(sent["input"]["text"], "テスト");
    assert_eq!(sent["voice"]["languageCode"], "ja-JP");
    assert_eq!(sent["voice"]["ssmlGender"], "NEUTRAL");
    assert_eq!(sent["audioConfig"]["audioEncoding"], "MP3");
    assert_eq!(sent["audioConfig"]["speakingRate"], 1.4);
    assert_eq!(sent["audioConfig"]["volumeGainDb"], 8.0);
}

#[tokio::test]
async fn provider_error_is_synthesis_failure() {
    let body = json!({ "error": { "code": 403, "message": "quota exceeded" } }).to_string();
    let (base, _server) = serve_json(vec![(403, body)]).await;

    let synth = GoogleSynthesizer::new(
        synthesis_config(&base),
        Arc::new(StaticTokenSource("test-token".into())),
    );
    let err = synth
        .synthesize(&SynthesisRequest::new("テスト", &SynthesisOverrides::default()))
        .await
        .unwrap_err();

    match err {
        AnnounceError::SynthesisFailed(msg) => assert!(msg.contains("quota exceeded")),
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn empty_audio_is_synthesis_failure() {
    let (base, _server) = serve_json(vec![(200, json!({}).to_string())]).await;
    let synth = GoogleSynthesizer::new(
        synthesis_config(&base),
        Arc::new(StaticTokenSource("t".into())),
    );

    let err = synth
        .synthesize(&SynthesisRequest::new("テスト", &SynthesisOverrides::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, AnnounceError::SynthesisFailed(_)));
}

#[tokio::test]
async fn invalid_request_never_reaches_provider() {
    // Nothing listens here; a request attempt would surface as a connect error
    let synth = GoogleSynthesizer::new(
        synthesis_config("http://127.0.0.1:9"),
        Arc::new(StaticTokenSource("t".into())),
    );
    let err = synth
        .synthesize(&SynthesisRequest::new("   ", &SynthesisOverrides::default()))
        .await
        .unwrap_err();
    match err {
        AnnounceError::SynthesisFailed(msg) => assert!(msg.contains("empty")),
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test]
async fn upload_sends_media_to_bucket_object() {
    let (base, server) = serve_json(vec![(200, json!({ "name": "tts-audio/audio.mp3" }).to_string())]).await;
    let dir = TempDir::new().unwrap();
    let local = dir.path().join("audio.mp3");
    std::fs::write(&local, b"mp3-bytes").unwrap();

    let store = GcsStore::new(
        &storage_config(&base),
        Arc::new(fixture_key()),
        Arc::new(StaticTokenSource("storage-token".into())),
    );
    store
        .upload("tts-audio/audio.mp3", &local, AUDIO_CONTENT_TYPE)
        .await
        .unwrap();

    let captured = server.await.unwrap();
    let req = &captured[0];
    assert_eq!(req.method, "POST");
    assert_eq!(
        req.target,
        "/upload/storage/v1/b/announcements/o?uploadType=media&name=tts-audio%2Faudio.mp3"
    );
    assert_eq!(req.header("authorization"), Some("Bearer storage-token"));
    assert_eq!(req.header("content-type"), Some("audio/mpeg"));
    assert_eq!(req.body, b"mp3-bytes");
}

#[tokio::test]
async fn rejected_upload_is_publish_failure() {
    let (base, _server) = serve_json(vec![(403, json!({ "error": "denied" }).to_string())]).await;
    let dir = TempDir::new().unwrap();
    let local = dir.path().join("audio.mp3");
    std::fs::write(&local, b"mp3-bytes").unwrap();

    let store = GcsStore::new(
        &storage_config(&base),
        Arc::new(fixture_key()),
        Arc::new(StaticTokenSource("t".into())),
    );
    let err = store
        .upload("tts-audio/audio.mp3", &local, AUDIO_CONTENT_TYPE)
        .await
        .unwrap_err();
    assert!(matches!(err, AnnounceError::PublishFailed(_)));
}

#[tokio::test]
async fn token_source_exchanges_assertion_and_caches() {
    let (base, server) = serve_json(vec![(
        200,
        json!({ "access_token": "ya29.fresh", "expires_in": 3599, "token_type": "Bearer" })
            .to_string(),
    )])
    .await;

    let mut key = fixture_key();
    key.token_uri = format!("{}/token", base);
    let source = ServiceAccountTokenSource::new(key.clone(), reqwest::Client::new());

    assert_eq!(source.access_token().await.unwrap(), "ya29.fresh");
    // Served from cache; the stand-in only answers once
    assert_eq!(source.access_token().await.unwrap(), "ya29.fresh");

    let captured = server.await.unwrap();
    assert_eq!(captured.len(), 1);
    let req = &captured[0];
    assert_eq!(req.target, "/token");
    assert_eq!(
        req.header("content-type"),
        Some("application/x-www-form-urlencoded")
    );

    let form = String::from_utf8(req.body.clone()).unwrap();
    assert!(form.contains("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer"));
    let assertion = form
        .split('&')
        .find_map(|pair| pair.strip_prefix("assertion="))
        .unwrap();

    let public_pem = std::fs::read(fixture_path("service-account.pub.pem")).unwrap();
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(&[key.token_uri.as_str()]);
    let decoded = jsonwebtoken::decode::<serde_json::Value>(
        assertion,
        &DecodingKey::from_rsa_pem(&public_pem).unwrap(),
        &validation,
    )
    .unwrap();
    assert_eq!(decoded.claims["iss"], key.client_email.as_str());
    assert_eq!(decoded.claims["scope"], CLOUD_PLATFORM_SCOPE);
    assert_eq!(decoded.header.kid.as_deref(), Some("0123456789abcdef"));
}

#[tokio::test]
async fn token_endpoint_error_is_credential_error() {
    let (base, _server) = serve_json(vec![(400, json!({ "error": "invalid_grant" }).to_string())]).await;
    let mut key = fixture_key();
    key.token_uri = format!("{}/token", base);
    let source = ServiceAccountTokenSource::new(key, reqwest::Client::new());

    let err = source.access_token().await.unwrap_err();
    assert!(matches!(err, AnnounceError::CredentialError(ref m) if m.contains("invalid_grant")));
}

#[tokio::test]
async fn stalled_token_endpoint_times_out() {
    // Accepts connections but never answers
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let holder = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let mut key = fixture_key();
    key.token_uri = format!("http://{}/token", addr);
    let source = ServiceAccountTokenSource::with_timeout(key, Duration::from_millis(200));

    let started = std::time::Instant::now();
    let err = source.access_token().await.unwrap_err();
    assert!(matches!(err, AnnounceError::CredentialError(_)));
    assert!(started.elapsed() < Duration::from_secs(5));
    holder.abort();
}
