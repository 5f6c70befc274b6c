use super::channel::{CastChannel, Inbound};
use super::messages::{
    self, Envelope, MediaStatusMessage, ReceiverStatus, ReceiverStatusMessage,
    DEFAULT_MEDIA_RECEIVER, NS_CONNECTION, NS_HEARTBEAT, NS_MEDIA, NS_RECEIVER, RECEIVER_ID,
    SENDER_ID,
};
use crate::config::DeviceConfig;
use crate::device::{DeviceLocator, PlaybackDevice};
use crate::{AnnounceError, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Bounds for the blocking waits of a cast session
#[derive(Clone, Copy, Debug)]
pub struct CastTimeouts {
    pub ready: Duration,
    pub playback: Duration,
}

impl Default for CastTimeouts {
    fn default() -> Self {
        Self {
            ready: Duration::from_secs(10),
            playback: Duration::from_secs(20),
        }
    }
}

impl From<&DeviceConfig> for CastTimeouts {
    fn from(cfg: &DeviceConfig) -> Self {
        Self {
            ready: cfg.ready_timeout(),
            playback: cfg.playback_timeout(),
        }
    }
}

#[derive(Debug)]
enum ExchangeError {
    Io(io::Error),
    Timeout(Duration),
    Rejected(String),
}

impl std::fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExchangeError::Io(e) => write!(f, "connection error: {}", e),
            ExchangeError::Timeout(d) => write!(f, "no reply within {:?}", d),
            ExchangeError::Rejected(reason) => write!(f, "device rejected request: {}", reason),
        }
    }
}

/// Session with one cast receiver over an established (TLS) stream.
pub struct CastDevice<S> {
    channel: CastChannel<S>,
    address: String,
    timeouts: CastTimeouts,
    next_request_id: u32,
    status: ReceiverStatus,
    media_transport: Option<String>,
}

impl<S> CastDevice<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    /// Open the virtual connection to the platform receiver.
    pub async fn connect(stream: S, address: &str, timeouts: CastTimeouts) -> Result<Self> {
        let mut device = Self {
            channel: CastChannel::new(stream),
            address: address.to_string(),
            timeouts,
            next_request_id: 1,
            status: ReceiverStatus::default(),
            media_transport: None,
        };
        device
            .channel
            .send(SENDER_ID, RECEIVER_ID, NS_CONNECTION, &messages::connect())
            .await
            .map_err(|e| AnnounceError::DeviceUnreachable(format!("{}: {}", address, e)))?;
        Ok(device)
    }

    /// Block until the receiver reports its initial status.
    pub async fn wait_ready(&mut self) -> Result<()> {
        let status = self
            .query_status()
            .await
            .map_err(|e| AnnounceError::DeviceUnreachable(format!("{}: {}", self.address, e)))?;
        info!(
            target = "cast",
            address = %self.address,
            apps = status.applications.len(),
            volume = ?status.volume.as_ref().and_then(|v| v.level),
            "Device ready"
        );
        Ok(())
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Last receiver status seen on the channel.
    pub fn receiver_status(&self) -> &ReceiverStatus {
        &self.status
    }

    fn request_id(&mut self) -> u32 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1).max(1);
        id
    }

    /// Next application-level message; heartbeats are answered here.
    async fn next_message(&mut self) -> io::Result<Inbound> {
        loop {
            let msg = self.channel.recv().await?;
            let kind = msg
                .payload
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or_default();

            if msg.namespace == NS_HEARTBEAT {
                if kind == "PING" {
                    self.channel
                        .send(SENDER_ID, &msg.source_id, NS_HEARTBEAT, &messages::pong())
                        .await?;
                }
                continue;
            }

            if msg.namespace == NS_CONNECTION && kind == "CLOSE" {
                let ours = msg.source_id == RECEIVER_ID
                    || self.media_transport.as_deref() == Some(msg.source_id.as_str());
                if ours {
                    return Err(io::Error::new(
                        io::ErrorKind::ConnectionAborted,
                        format!("{} closed the connection", msg.source_id),
                    ));
                }
                continue;
            }

            return Ok(msg);
        }
    }

    /// Read messages on `namespace` until `accept` settles the outcome.
    async fn wait_until<T, F>(
        &mut self,
        namespace: &str,
        limit: Duration,
        mut accept: F,
    ) -> std::result::Result<T, ExchangeError>
    where
        F: FnMut(&Envelope, &Value) -> Option<std::result::Result<T, String>> + Send,
        T: Send,
    {
        let wait = async {
            loop {
                let msg = self.next_message().await.map_err(ExchangeError::Io)?;
                if msg.namespace != namespace {
                    debug!(target = "cast", ns = %msg.namespace, "Ignoring message on other namespace");
                    continue;
                }
                let envelope: Envelope = match serde_json::from_value(msg.payload.clone()) {
                    Ok(env) => env,
                    Err(e) => {
                        warn!(target = "cast", error = %e, "Malformed cast payload");
                        continue;
                    }
                };
                if let Some(outcome) = accept(&envelope, &msg.payload) {
                    return outcome.map_err(ExchangeError::Rejected);
                }
            }
        };
        timeout(limit, wait)
            .await
            .map_err(|_| ExchangeError::Timeout(limit))?
    }

    async fn send_receiver(&mut self, payload: &Value) -> std::result::Result<(), ExchangeError> {
        self.channel
            .send(SENDER_ID, RECEIVER_ID, NS_RECEIVER, payload)
            .await
            .map_err(ExchangeError::Io)
    }

    /// Send a receiver request and wait for the status reply carrying its id.
    async fn receiver_request(
        &mut self,
        request_id: u32,
        payload: Value,
    ) -> std::result::Result<ReceiverStatus, ExchangeError> {
        self.send_receiver(&payload).await?;
        let limit = self.timeouts.ready;
        let status = self
            .wait_until(NS_RECEIVER, limit, |env, raw| match env.kind.as_str() {
                "RECEIVER_STATUS" if env.request_id == Some(request_id) => Some(
                    serde_json::from_value::<ReceiverStatusMessage>(raw.clone())
                        .map(|m| m.status)
                        .map_err(|e| e.to_string()),
                ),
                "INVALID_REQUEST" | "LAUNCH_ERROR" if env.request_id == Some(request_id) => {
                    Some(Err(describe_rejection(raw)))
                }
                _ => None,
            })
            .await?;
        self.status = status.clone();
        Ok(status)
    }

    async fn query_status(&mut self) -> std::result::Result<ReceiverStatus, ExchangeError> {
        let id = self.request_id();
        self.receiver_request(id, messages::get_status(id)).await
    }

    /// Default Media Receiver session, launching it when not already running.
    async fn ensure_media_app(&mut self) -> std::result::Result<(String, String), ExchangeError> {
        if let Some(app) = self.status.application(DEFAULT_MEDIA_RECEIVER) {
            return Ok((app.transport_id.clone(), app.session_id.clone()));
        }

        let id = self.request_id();
        self.send_receiver(&messages::launch(id, DEFAULT_MEDIA_RECEIVER))
            .await?;
        let limit = self.timeouts.ready;
        let status = self
            .wait_until(NS_RECEIVER, limit, |env, raw| match env.kind.as_str() {
                "RECEIVER_STATUS" => {
                    let msg = serde_json::from_value::<ReceiverStatusMessage>(raw.clone()).ok()?;
                    msg.status.application(DEFAULT_MEDIA_RECEIVER)?;
                    Some(Ok(msg.status))
                }
                "LAUNCH_ERROR" | "INVALID_REQUEST" if env.request_id == Some(id) => {
                    Some(Err(describe_rejection(raw)))
                }
                _ => None,
            })
            .await?;
        self.status = status;
        let app = self
            .status
            .application(DEFAULT_MEDIA_RECEIVER)
            .ok_or_else(|| ExchangeError::Rejected("media receiver did not start".into()))?;
        info!(target = "cast", session = %app.session_id, "Launched media receiver");
        Ok((app.transport_id.clone(), app.session_id.clone()))
    }
}

fn describe_rejection(raw: &Value) -> String {
    let kind = raw.get("type").and_then(Value::as_str).unwrap_or("ERROR");
    match raw.get("reason").and_then(Value::as_str) {
        Some(reason) => format!("{} ({})", kind, reason),
        None => kind.to_string(),
    }
}

#[async_trait]
impl<S> PlaybackDevice for CastDevice<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn volume(&mut self) -> Result<f32> {
        let status = self
            .query_status()
            .await
            .map_err(|e| AnnounceError::VolumeOperationFailed(e.to_string()))?;
        status
            .volume
            .and_then(|v| v.level)
            .ok_or_else(|| AnnounceError::VolumeOperationFailed("device reported no volume".into()))
    }

    async fn set_volume(&mut self, level: f32) -> Result<()> {
        let level = level.clamp(0.0, 1.0);
        let id = self.request_id();
        self.receiver_request(id, messages::set_volume(id, level))
            .await
            .map_err(|e| AnnounceError::VolumeOperationFailed(e.to_string()))?;
        debug!(target = "cast", level, "Volume set");
        Ok(())
    }

    async fn play(&mut self, url: &str, content_type: &str, autoplay: bool) -> Result<()> {
        let dispatch_err = |e: ExchangeError| AnnounceError::PlaybackDispatchFailed(e.to_string());

        let (transport_id, session_id) = self.ensure_media_app().await.map_err(dispatch_err)?;
        if self.media_transport.as_deref() != Some(transport_id.as_str()) {
            self.channel
                .send(SENDER_ID, &transport_id, NS_CONNECTION, &messages::connect())
                .await
                .map_err(|e| dispatch_err(ExchangeError::Io(e)))?;
            self.media_transport = Some(transport_id.clone());
        }

        let id = self.request_id();
        let load = messages::load(id, &session_id, url, content_type, autoplay);
        self.channel
            .send(SENDER_ID, &transport_id, NS_MEDIA, &load)
            .await
            .map_err(|e| dispatch_err(ExchangeError::Io(e)))?;

        let limit = self.timeouts.playback;
        // Statuses about media loaded earlier must not settle this LOAD: only the
        // reply to our request id, then broadcasts for the session it names, count.
        let mut load_session: Option<i64> = None;
        let state = self
            .wait_until(NS_MEDIA, limit, |env, raw| match env.kind.as_str() {
                "MEDIA_STATUS" => {
                    let msg = serde_json::from_value::<MediaStatusMessage>(raw.clone()).ok()?;
                    let ours = env.request_id == Some(id);
                    msg.status.iter().find_map(|s| {
                        if ours {
                            if load_session.is_none() {
                                load_session = s.media_session_id;
                            }
                        } else if load_session.is_none() || s.media_session_id != load_session {
                            return None;
                        }
                        let state = s.player_state.as_deref()?;
                        match state {
                            "PLAYING" | "BUFFERING" => Some(Ok(state.to_string())),
                            "PAUSED" if !autoplay => Some(Ok(state.to_string())),
                            "IDLE" if s.idle_reason.as_deref() == Some("ERROR") => {
                                Some(Err("playback ended with ERROR".to_string()))
                            }
                            _ => None,
                        }
                    })
                }
                "LOAD_FAILED" | "LOAD_CANCELLED" | "INVALID_REQUEST"
                    if env.request_id.map_or(true, |r| r == id) =>
                {
                    Some(Err(describe_rejection(raw)))
                }
                _ => None,
            })
            .await
            .map_err(dispatch_err)?;

        info!(target = "cast", address = %self.address, state = %state, "Playback active");
        Ok(())
    }

    async fn hold(&mut self, duration: Duration) -> Result<()> {
        let deadline = tokio::time::Instant::now() + duration;
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => return Ok(()),
                msg = self.next_message() => match msg {
                    Ok(msg) => {
                        debug!(target = "cast", ns = %msg.namespace, "Message while holding session");
                    }
                    Err(e) => {
                        // Nothing left to service; the restore will report the lost link
                        warn!(target = "cast", address = %self.address, error = %e, "Session lost while holding");
                        tokio::time::sleep_until(deadline).await;
                        return Ok(());
                    }
                },
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        let close_err = |e: io::Error| AnnounceError::DeviceUnreachable(e.to_string());
        if let Some(transport) = self.media_transport.take() {
            self.channel
                .send(SENDER_ID, &transport, NS_CONNECTION, &messages::close())
                .await
                .map_err(close_err)?;
        }
        self.channel
            .send(SENDER_ID, RECEIVER_ID, NS_CONNECTION, &messages::close())
            .await
            .map_err(close_err)?;
        self.channel.shutdown().await.map_err(close_err)?;
        debug!(target = "cast", address = %self.address, "Session closed");
        Ok(())
    }
}

/// Cast receivers present self-signed certificates; the link is only
/// encrypted, never authenticated.
struct AcceptAnyCert;

impl rustls::client::ServerCertVerifier for AcceptAnyCert {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::Certificate,
        _intermediates: &[rustls::Certificate],
        _server_name: &rustls::ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: std::time::SystemTime,
    ) -> std::result::Result<rustls::client::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::ServerCertVerified::assertion())
    }
}

pub type CastTlsStream = tokio_rustls::client::TlsStream<TcpStream>;

/// Connects to cast receivers over TLS on the configured port.
pub struct CastLocator {
    port: u16,
    connect_timeout: Duration,
    timeouts: CastTimeouts,
    tls: tokio_rustls::TlsConnector,
}

impl CastLocator {
    pub fn new(config: &DeviceConfig) -> Self {
        let tls_config = rustls::ClientConfig::builder()
            .with_safe_defaults()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCert))
            .with_no_client_auth();
        Self {
            port: config.port,
            connect_timeout: config.connect_timeout(),
            timeouts: CastTimeouts::from(config),
            tls: tokio_rustls::TlsConnector::from(Arc::new(tls_config)),
        }
    }
}

#[async_trait]
impl DeviceLocator for CastLocator {
    type Device = CastDevice<CastTlsStream>;

    async fn locate(&self, address: &str) -> Result<Self::Device> {
        let unreachable = |why: String| AnnounceError::DeviceUnreachable(format!("{}: {}", address, why));

        debug!(target = "cast", address = %address, port = self.port, "Connecting");
        let tcp = timeout(self.connect_timeout, TcpStream::connect((address, self.port)))
            .await
            .map_err(|_| unreachable(format!("connect timed out after {:?}", self.connect_timeout)))?
            .map_err(|e| unreachable(e.to_string()))?;

        let server_name = rustls::ServerName::try_from(address)
            .map_err(|e| unreachable(format!("invalid address: {}", e)))?;
        let tls = timeout(self.connect_timeout, self.tls.connect(server_name, tcp))
            .await
            .map_err(|_| unreachable("TLS handshake timed out".into()))?
            .map_err(|e| unreachable(format!("TLS handshake failed: {}", e)))?;

        let mut device = CastDevice::connect(tls, address, self.timeouts).await?;
        device.wait_ready().await?;
        Ok(device)
    }
}
