//! JSON payloads carried on the cast channel namespaces.

use serde::Deserialize;
use serde_json::{json, Value};

pub const NS_CONNECTION: &str = "urn:x-cast:com.google.cast.tp.connection";
pub const NS_HEARTBEAT: &str = "urn:x-cast:com.google.cast.tp.heartbeat";
pub const NS_RECEIVER: &str = "urn:x-cast:com.google.cast.receiver";
pub const NS_MEDIA: &str = "urn:x-cast:com.google.cast.media";

pub const SENDER_ID: &str = "sender-0";
pub const RECEIVER_ID: &str = "receiver-0";

/// App id of the Default Media Receiver
pub const DEFAULT_MEDIA_RECEIVER: &str = "CC1AD845";

/// Fields common to every payload
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "requestId", default)]
    pub request_id: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReceiverStatusMessage {
    #[serde(default)]
    pub status: ReceiverStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReceiverStatus {
    #[serde(default)]
    pub applications: Vec<Application>,
    #[serde(default)]
    pub volume: Option<Volume>,
}

impl ReceiverStatus {
    pub fn application(&self, app_id: &str) -> Option<&Application> {
        self.applications.iter().find(|a| a.app_id == app_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub app_id: String,
    pub session_id: String,
    pub transport_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Volume {
    #[serde(default)]
    pub level: Option<f32>,
    #[serde(default)]
    pub muted: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaStatusMessage {
    #[serde(default)]
    pub status: Vec<MediaStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaStatus {
    #[serde(default)]
    pub media_session_id: Option<i64>,
    #[serde(default)]
    pub player_state: Option<String>,
    #[serde(default)]
    pub idle_reason: Option<String>,
}

pub fn connect() -> Value {
    json!({ "type": "CONNECT" })
}

pub fn close() -> Value {
    json!({ "type": "CLOSE" })
}

pub fn pong() -> Value {
    json!({ "type": "PONG" })
}

pub fn get_status(request_id: u32) -> Value {
    json!({ "type": "GET_STATUS", "requestId": request_id })
}

pub fn set_volume(request_id: u32, level: f32) -> Value {
    json!({ "type": "SET_VOLUME", "requestId": request_id, "volume": { "level": level } })
}

pub fn launch(request_id: u32, app_id: &str) -> Value {
    json!({ "type": "LAUNCH", "requestId": request_id, "appId": app_id })
}

pub fn load(
    request_id: u32,
    session_id: &str,
    content_id: &str,
    content_type: &str,
    autoplay: bool,
) -> Value {
    json!({
        "type": "LOAD",
        "requestId": request_id,
        "sessionId": session_id,
        "media": {
            "contentId": content_id,
            "contentType": content_type,
            "streamType": "BUFFERED",
        },
        "autoplay": autoplay,
        "currentTime": 0,
    })
}
