//! Length-prefixed `CastMessage` framing over any async byte stream.

use homecast_proto::cast_channel::cast_message::{PayloadType, ProtocolVersion};
use homecast_proto::CastMessage;
use prost::Message;
use serde_json::Value;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Receivers cap messages at 64 KiB; anything larger is a broken stream.
const MAX_FRAME_LEN: usize = 64 * 1024;

/// A decoded inbound message with a JSON payload.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub source_id: String,
    pub destination_id: String,
    pub namespace: String,
    pub payload: Value,
}

// Payloads can carry signed URLs; only the type is logged
fn message_kind(payload: &Value) -> &str {
    payload.get("type").and_then(Value::as_str).unwrap_or("?")
}

pub struct CastChannel<S> {
    stream: S,
    // Bytes read but not yet decoded; keeps `recv` cancel safe
    pending: Vec<u8>,
}

impl<S> CastChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            pending: Vec::new(),
        }
    }

    pub async fn send(
        &mut self,
        source_id: &str,
        destination_id: &str,
        namespace: &str,
        payload: &Value,
    ) -> io::Result<()> {
        let msg = CastMessage {
            protocol_version: ProtocolVersion::Castv210 as i32,
            source_id: source_id.to_string(),
            destination_id: destination_id.to_string(),
            namespace: namespace.to_string(),
            payload_type: PayloadType::String as i32,
            payload_utf8: Some(payload.to_string()),
            payload_binary: None,
        };
        let body = msg.encode_to_vec();
        debug!(target = "cast", to = %destination_id, ns = %namespace, kind = message_kind(payload), "→ cast");

        self.stream.write_u32(body.len() as u32).await?;
        self.stream.write_all(&body).await?;
        self.stream.flush().await
    }

    /// Read the next frame. Binary payloads are skipped.
    ///
    /// Cancel safe: a partially received frame stays buffered for the next call.
    pub async fn recv(&mut self) -> io::Result<Inbound> {
        loop {
            let Some(frame) = self.take_frame()? else {
                let n = self.stream.read_buf(&mut self.pending).await?;
                if n == 0 {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "cast connection closed",
                    ));
                }
                continue;
            };

            let msg = CastMessage::decode(frame.as_slice())
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            let Some(text) = msg.payload_utf8 else {
                debug!(target = "cast", ns = %msg.namespace, "Skipping binary cast payload");
                continue;
            };
            let payload: Value = serde_json::from_str(&text)
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            debug!(target = "cast", from = %msg.source_id, ns = %msg.namespace, kind = message_kind(&payload), "← cast");

            return Ok(Inbound {
                source_id: msg.source_id,
                destination_id: msg.destination_id,
                namespace: msg.namespace,
                payload,
            });
        }
    }

    /// Split one complete frame off the front of the buffer.
    fn take_frame(&mut self) -> io::Result<Option<Vec<u8>>> {
        if self.pending.len() < 4 {
            return Ok(None);
        }
        let mut prefix = [0u8; 4];
        prefix.copy_from_slice(&self.pending[..4]);
        let len = u32::from_be_bytes(prefix) as usize;
        if len > MAX_FRAME_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("cast frame of {} bytes exceeds limit", len),
            ));
        }
        if self.pending.len() < 4 + len {
            return Ok(None);
        }
        let frame = self.pending[4..4 + len].to_vec();
        self.pending.drain(..4 + len);
        Ok(Some(frame))
    }

    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.stream.shutdown().await
    }
}
