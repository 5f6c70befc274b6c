//! Playback dispatch and volume ducking.

use crate::audio::probe_duration;
use crate::device::PlaybackDevice;
use crate::storage::SignedUrl;
use crate::{AnnounceError, Result};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// MIME type announced to the receiver for synthesized speech
pub const ANNOUNCEMENT_CONTENT_TYPE: &str = "audio/mp3";

#[derive(Clone, Debug)]
pub struct PlaybackDispatcher {
    content_type: String,
    autoplay: bool,
}

impl Default for PlaybackDispatcher {
    fn default() -> Self {
        Self {
            content_type: ANNOUNCEMENT_CONTENT_TYPE.to_string(),
            autoplay: true,
        }
    }
}

impl PlaybackDispatcher {
    /// Point the device at `url` and block until it reports active playback.
    pub async fn dispatch<D>(&self, device: &mut D, url: &SignedUrl) -> Result<()>
    where
        D: PlaybackDevice + ?Sized,
    {
        device
            .play(url.as_str(), &self.content_type, self.autoplay)
            .await
            .map_err(|e| match e {
                AnnounceError::PlaybackDispatchFailed(_) => e,
                other => AnnounceError::PlaybackDispatchFailed(other.to_string()),
            })
    }

    /// Hold the device session for the decoded length of `local_path` plus `margin`.
    ///
    /// Receivers send no completion event for a loaded URL, so this is an
    /// estimate of when the announcement has finished. The session keeps
    /// answering keepalives meanwhile so a later volume restore still lands.
    pub async fn wait_for_completion<D>(
        &self,
        device: &mut D,
        local_path: &Path,
        margin: Duration,
    ) -> Result<Duration>
    where
        D: PlaybackDevice + ?Sized,
    {
        let length = probe_duration(local_path).await?;
        let total = length + margin;
        info!(
            target = "playback",
            audio_ms = length.as_millis() as u64,
            wait_ms = total.as_millis() as u64,
            "Waiting for announcement to finish"
        );
        device.hold(total).await?;
        Ok(total)
    }
}

fn as_volume_error(err: AnnounceError) -> AnnounceError {
    match err {
        AnnounceError::VolumeOperationFailed(_) => err,
        other => AnnounceError::VolumeOperationFailed(other.to_string()),
    }
}

/// Device volume lowered for an announcement.
///
/// Holds the level read before ducking. `restore` must be awaited on every
/// exit path; a guard dropped without it logs a warning because the device
/// is left at the ducked level.
#[must_use = "ducked volume must be restored"]
#[derive(Debug)]
pub struct DuckedVolume {
    original: f32,
    ducked: f32,
    restored: bool,
}

impl DuckedVolume {
    /// Read the current volume, then set `level`.
    pub async fn engage<D>(device: &mut D, level: f32) -> Result<Self>
    where
        D: PlaybackDevice + ?Sized,
    {
        let original = device.volume().await.map_err(as_volume_error)?;
        device.set_volume(level).await.map_err(as_volume_error)?;
        info!(target = "playback", original, ducked = level, "Volume ducked");
        Ok(Self {
            original,
            ducked: level,
            restored: false,
        })
    }

    pub fn original(&self) -> f32 {
        self.original
    }

    pub fn ducked(&self) -> f32 {
        self.ducked
    }

    /// Put the original volume back.
    pub async fn restore<D>(mut self, device: &mut D) -> Result<()>
    where
        D: PlaybackDevice + ?Sized,
    {
        self.restored = true;
        device
            .set_volume(self.original)
            .await
            .map_err(as_volume_error)?;
        info!(target = "playback", level = self.original, "Volume restored");
        Ok(())
    }
}

impl Drop for DuckedVolume {
    fn drop(&mut self) {
        if !self.restored {
            warn!(
                target = "playback",
                original = self.original,
                ducked = self.ducked,
                "Ducked volume dropped without restore"
            );
        }
    }
}
