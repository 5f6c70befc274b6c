//! Shared stubs for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use homecast_core::storage::{ObjectStore, SignedUrl};
use homecast_core::{AnnounceError, DeviceLocator, PlaybackDevice, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Mono 16-bit WAV of `millis` milliseconds of silence at 8 kHz.
pub fn wav_bytes(millis: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for _ in 0..(8 * millis) {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Silent MPEG-1 Layer III stream: 128 kbps, 44.1 kHz, mono, no Xing header.
/// Each frame carries 1152 samples, so `frames` frames last `frames * 1152 / 44100` s.
pub fn mp3_bytes(frames: usize) -> Vec<u8> {
    const FRAME_LEN: usize = 417;
    let mut out = Vec::with_capacity(frames * FRAME_LEN);
    for _ in 0..frames {
        out.extend_from_slice(&[0xFF, 0xFB, 0x90, 0xC4]);
        out.resize(out.len() + FRAME_LEN - 4, 0);
    }
    out
}

// ---------------------------------------------------------------------------
// Object store stub
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum StoreCall {
    Upload {
        key: String,
        content_type: String,
        /// Contents of the local file at upload time; None if it did not exist
        local_bytes: Option<Vec<u8>>,
    },
    Sign {
        key: String,
        expiry: Duration,
    },
}

#[derive(Clone, Default)]
pub struct RecordingStore {
    pub calls: Arc<Mutex<Vec<StoreCall>>>,
    pub fail_upload: bool,
}

impl RecordingStore {
    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for RecordingStore {
    async fn upload(&self, key: &str, local_path: &Path, content_type: &str) -> Result<()> {
        self.calls.lock().unwrap().push(StoreCall::Upload {
            key: key.to_string(),
            content_type: content_type.to_string(),
            local_bytes: std::fs::read(local_path).ok(),
        });
        if self.fail_upload {
            return Err(AnnounceError::PublishFailed("upload denied".into()));
        }
        Ok(())
    }

    async fn signed_url(&self, key: &str, expiry: Duration) -> Result<SignedUrl> {
        self.calls.lock().unwrap().push(StoreCall::Sign {
            key: key.to_string(),
            expiry,
        });
        Ok(SignedUrl {
            url: format!(
                "https://storage.googleapis.com/test-bucket/{}?X-Goog-Algorithm=GOOG4-RSA-SHA256&X-Goog-Expires={}&X-Goog-Signature=00ff",
                key,
                expiry.as_secs()
            ),
            expires_in: expiry,
        })
    }
}

// ---------------------------------------------------------------------------
// Playback device stub
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq)]
pub enum DeviceCall {
    GetVolume,
    SetVolume(f32),
    Play {
        url: String,
        content_type: String,
        autoplay: bool,
    },
    Hold(Duration),
    Close,
}

#[derive(Clone)]
pub struct RecordingDevice {
    pub level: f32,
    pub calls: Arc<Mutex<Vec<DeviceCall>>>,
    pub fail_play: bool,
    /// Zero-based index of the set_volume call that should fail
    pub fail_set_volume_at: Option<usize>,
}

impl RecordingDevice {
    pub fn new(level: f32) -> Self {
        Self {
            level,
            calls: Arc::new(Mutex::new(Vec::new())),
            fail_play: false,
            fail_set_volume_at: None,
        }
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_volume_calls(&self) -> Vec<f32> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                DeviceCall::SetVolume(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    pub fn play_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, DeviceCall::Play { .. }))
            .count()
    }
}

#[async_trait]
impl PlaybackDevice for RecordingDevice {
    async fn volume(&mut self) -> Result<f32> {
        self.calls.lock().unwrap().push(DeviceCall::GetVolume);
        Ok(self.level)
    }

    async fn set_volume(&mut self, level: f32) -> Result<()> {
        let index = {
            let mut calls = self.calls.lock().unwrap();
            let index = calls
                .iter()
                .filter(|c| matches!(c, DeviceCall::SetVolume(_)))
                .count();
            calls.push(DeviceCall::SetVolume(level));
            index
        };
        if self.fail_set_volume_at == Some(index) {
            return Err(AnnounceError::VolumeOperationFailed("device busy".into()));
        }
        self.level = level;
        Ok(())
    }

    async fn play(&mut self, url: &str, content_type: &str, autoplay: bool) -> Result<()> {
        self.calls.lock().unwrap().push(DeviceCall::Play {
            url: url.to_string(),
            content_type: content_type.to_string(),
            autoplay,
        });
        if self.fail_play {
            return Err(AnnounceError::PlaybackDispatchFailed("LOAD_FAILED".into()));
        }
        Ok(())
    }

    async fn hold(&mut self, duration: Duration) -> Result<()> {
        self.calls.lock().unwrap().push(DeviceCall::Hold(duration));
        tokio::time::sleep(duration).await;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.calls.lock().unwrap().push(DeviceCall::Close);
        Ok(())
    }
}

/// Hands out clones of one recording device, or fails like an unreachable host.
pub struct StubLocator {
    pub device: RecordingDevice,
    pub reachable: bool,
    pub located: Arc<Mutex<Vec<String>>>,
}

impl StubLocator {
    pub fn new(device: RecordingDevice) -> Self {
        Self {
            device,
            reachable: true,
            located: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl DeviceLocator for StubLocator {
    type Device = RecordingDevice;

    async fn locate(&self, address: &str) -> Result<RecordingDevice> {
        self.located.lock().unwrap().push(address.to_string());
        if !self.reachable {
            return Err(AnnounceError::DeviceUnreachable(format!(
                "{}: connection refused",
                address
            )));
        }
        Ok(self.device.clone())
    }
}

// ---------------------------------------------------------------------------
// Minimal HTTP server for exercising the REST clients
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct CapturedRequest {
    pub method: String,
    pub target: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

async fn read_request(sock: &mut tokio::net::TcpStream) -> CapturedRequest {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = sock.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_subslice(&buf, b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split(' ');
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or_default().to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();

    let content_length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = sock.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed mid-body");
        body.extend_from_slice(&chunk[..n]);
    }

    CapturedRequest {
        method,
        target,
        headers,
        body,
    }
}

/// Answer one connection per entry of `responses` (status, JSON body), in order.
/// Returns the base URL and a handle yielding the captured requests.
pub async fn serve_json(
    responses: Vec<(u16, String)>,
) -> (String, JoinHandle<Vec<CapturedRequest>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let mut captured = Vec::new();
        for (status, body) in responses {
            let (mut sock, _) = listener.accept().await.unwrap();
            captured.push(read_request(&mut sock).await);
            let reason = if status < 400 { "OK" } else { "Error" };
            let response = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                reason,
                body.len(),
                body
            );
            sock.write_all(response.as_bytes()).await.unwrap();
            let _ = sock.shutdown().await;
        }
        captured
    });

    (format!("http://{}", addr), handle)
}
