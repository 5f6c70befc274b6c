//! Playback device seams.
//!
//! The pipeline only needs a device that can report and change its volume
//! and start streaming a URL; the cast client is one implementation.

use crate::Result;
use async_trait::async_trait;
use std::time::Duration;

/// A live session with one playback device.
#[async_trait]
pub trait PlaybackDevice: Send {
    /// Current output volume, 0.0–1.0
    async fn volume(&mut self) -> Result<f32>;

    async fn set_volume(&mut self, level: f32) -> Result<()>;

    /// Start streaming `url` and return once the device reports active playback.
    async fn play(&mut self, url: &str, content_type: &str, autoplay: bool) -> Result<()>;

    /// Keep the session alive for `duration` while playback runs unattended.
    /// Devices without keepalive traffic just sleep.
    async fn hold(&mut self, duration: Duration) -> Result<()> {
        tokio::time::sleep(duration).await;
        Ok(())
    }

    /// Tear down the session. Called once at the end of a run.
    async fn close(&mut self) -> Result<()>;
}

/// Resolves a network address to a ready device.
#[async_trait]
pub trait DeviceLocator: Send + Sync {
    type Device: PlaybackDevice;

    /// Connect and wait until the device reports its initial status.
    async fn locate(&self, address: &str) -> Result<Self::Device>;
}
