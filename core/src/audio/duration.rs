//! Playback length of the local scratch file.
//!
//! Cast receivers report no completion event we can wait on, so the ducking
//! variant sleeps for the decoded length of the audio plus a margin. The
//! length comes from container metadata when the format carries it (WAV,
//! MP3 with a Xing/Info header) and otherwise from summing packet durations.

use crate::{AnnounceError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};
use tokio::task;
use tracing::debug;

/// Decode the length of the audio file at `path`.
pub async fn probe_duration(path: &Path) -> Result<Duration> {
    let path: PathBuf = path.to_path_buf();
    task::spawn_blocking(move || probe_blocking(&path))
        .await
        .map_err(|e| AnnounceError::PlaybackDispatchFailed(format!("duration probe task: {}", e)))?
}

fn probe_blocking(path: &Path) -> Result<Duration> {
    let file = std::fs::File::open(path).map_err(|e| {
        AnnounceError::PlaybackDispatchFailed(format!(
            "cannot open {} for duration probe: {}",
            path.display(),
            e
        ))
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AnnounceError::PlaybackDispatchFailed(format!("unrecognised audio: {}", e)))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AnnounceError::PlaybackDispatchFailed("no audio track found".into()))?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    if let (Some(n_frames), Some(time_base)) = (params.n_frames, params.time_base) {
        let d = to_duration(time_base.calc_time(n_frames));
        debug!(target = "audio", path = %path.display(), duration_ms = d.as_millis() as u64, "Duration from metadata");
        return Ok(d);
    }

    let time_base = params
        .time_base
        .or_else(|| params.sample_rate.map(|sr| TimeBase::new(1, sr)))
        .ok_or_else(|| AnnounceError::PlaybackDispatchFailed("audio track has no time base".into()))?;

    let mut total: u64 = 0;
    loop {
        match format.next_packet() {
            Ok(packet) => {
                if packet.track_id() == track_id {
                    total += packet.dur;
                }
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(e) => {
                return Err(AnnounceError::PlaybackDispatchFailed(format!(
                    "failed reading audio packets: {}",
                    e
                )))
            }
        }
    }

    let d = to_duration(time_base.calc_time(total));
    debug!(target = "audio", path = %path.display(), duration_ms = d.as_millis() as u64, "Duration from packets");
    Ok(d)
}

fn to_duration(t: Time) -> Duration {
    Duration::from_secs(t.seconds) + Duration::from_secs_f64(t.frac.clamp(0.0, 1.0))
}
