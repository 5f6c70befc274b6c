//! Cast device client
//!
//! Speaks the cast channel protocol directly: protobuf `CastMessage` frames
//! over TLS (port 8009) carrying JSON payloads on four namespaces
//! (connection, heartbeat, receiver, media).
//!
//! Env overrides (see `config::DeviceConfig`):
//! - CAST_PORT
//! - CAST_CONNECT_TIMEOUT_MS, CAST_READY_TIMEOUT_MS, CAST_PLAYBACK_TIMEOUT_MS

mod channel;
mod client;
pub mod messages;

pub use channel::{CastChannel, Inbound};
pub use client::{CastDevice, CastLocator, CastTimeouts, CastTlsStream};
