//! Announcement pipeline
//!
//! One strictly linear pass per run:
//!
//! `Idle → DeviceLocated → (VolumeCaptured) → Synthesized → Published →
//! PlaybackDispatched → (Waited) → (VolumeRestored) → Done`
//!
//! The first failing step aborts the run (`Failed`). When ducking is
//! configured the original volume is restored on every exit path, including
//! synthesis, publish and dispatch failures.

use crate::device::{DeviceLocator, PlaybackDevice};
use crate::playback::{DuckedVolume, PlaybackDispatcher};
use crate::storage::{Publisher, SignedUrl};
use crate::tts::{SpeechSynthesizer, SynthesisOverrides, SynthesisRequest};
use crate::{AnnounceError, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnnounceStage {
    Idle,
    DeviceLocated,
    VolumeCaptured,
    Synthesized,
    Published,
    PlaybackDispatched,
    Waited,
    VolumeRestored,
    Done,
    Failed,
}

/// Volume to announce at and the slack added to the audio length before restoring.
#[derive(Clone, Copy, Debug)]
pub struct DuckingPlan {
    pub volume: f32,
    pub margin: Duration,
}

#[derive(Clone, Debug)]
pub struct AnnounceReport {
    pub stages: Vec<AnnounceStage>,
    pub object_key: String,
    pub url: SignedUrl,
    /// Time slept waiting for playback to finish (ducking only)
    pub waited: Option<Duration>,
}

struct Delivered {
    object_key: String,
    url: SignedUrl,
    waited: Option<Duration>,
}

fn enter(stages: &mut Vec<AnnounceStage>, stage: AnnounceStage) {
    info!(target = "announce", stage = ?stage, "Stage reached");
    stages.push(stage);
}

fn failed(err: &AnnounceError) {
    error!(
        target = "announce",
        stage = ?AnnounceStage::Failed,
        category = err.category(),
        error = %err,
        "Announcement aborted"
    );
}

pub struct Announcer {
    synthesizer: Arc<dyn SpeechSynthesizer>,
    publisher: Publisher,
    dispatcher: PlaybackDispatcher,
    ducking: Option<DuckingPlan>,
}

impl Announcer {
    pub fn new(synthesizer: Arc<dyn SpeechSynthesizer>, publisher: Publisher) -> Self {
        Self {
            synthesizer,
            publisher,
            dispatcher: PlaybackDispatcher::default(),
            ducking: None,
        }
    }

    /// Lower the device to `plan.volume` for the announcement and restore it afterwards.
    pub fn with_ducking(mut self, plan: DuckingPlan) -> Self {
        self.ducking = Some(plan);
        self
    }

    pub fn ducking(&self) -> Option<&DuckingPlan> {
        self.ducking.as_ref()
    }

    /// Locate the device, announce, then close the session.
    pub async fn run<L>(
        &self,
        locator: &L,
        address: &str,
        text: &str,
        overrides: &SynthesisOverrides,
    ) -> Result<AnnounceReport>
    where
        L: DeviceLocator,
    {
        info!(target = "announce", stage = ?AnnounceStage::Idle, address = %address, "Starting announcement");
        let mut device = match locator.locate(address).await {
            Ok(device) => device,
            Err(e) => {
                failed(&e);
                return Err(e);
            }
        };

        let outcome = self.announce(&mut device, text, overrides).await;

        if let Err(e) = device.close().await {
            warn!(target = "announce", error = %e, "Failed to close device session");
        }

        outcome.map(|mut report| {
            report.stages.insert(0, AnnounceStage::Idle);
            report
        })
    }

    /// Announce `text` on an already located device.
    pub async fn announce<D>(
        &self,
        device: &mut D,
        text: &str,
        overrides: &SynthesisOverrides,
    ) -> Result<AnnounceReport>
    where
        D: PlaybackDevice + ?Sized,
    {
        let mut stages = Vec::new();
        enter(&mut stages, AnnounceStage::DeviceLocated);

        let outcome = match self.ducking {
            None => self.deliver(device, text, overrides, None, &mut stages).await,
            Some(plan) => {
                let ducked = match DuckedVolume::engage(device, plan.volume).await {
                    Ok(ducked) => ducked,
                    Err(e) => {
                        failed(&e);
                        return Err(e);
                    }
                };
                enter(&mut stages, AnnounceStage::VolumeCaptured);

                let delivered = self
                    .deliver(device, text, overrides, Some(plan.margin), &mut stages)
                    .await;
                let restored = ducked.restore(device).await;

                match (delivered, restored) {
                    (Ok(d), Ok(())) => {
                        enter(&mut stages, AnnounceStage::VolumeRestored);
                        Ok(d)
                    }
                    (Ok(_), Err(restore_err)) => Err(restore_err),
                    (Err(e), Ok(())) => {
                        info!(target = "announce", "Volume restored after failure");
                        Err(e)
                    }
                    (Err(e), Err(restore_err)) => {
                        error!(target = "announce", error = %restore_err, "Volume restore failed after earlier failure");
                        Err(e)
                    }
                }
            }
        };

        match outcome {
            Ok(d) => {
                enter(&mut stages, AnnounceStage::Done);
                Ok(AnnounceReport {
                    stages,
                    object_key: d.object_key,
                    url: d.url,
                    waited: d.waited,
                })
            }
            Err(e) => {
                failed(&e);
                Err(e)
            }
        }
    }

    async fn deliver<D>(
        &self,
        device: &mut D,
        text: &str,
        overrides: &SynthesisOverrides,
        wait_margin: Option<Duration>,
        stages: &mut Vec<AnnounceStage>,
    ) -> Result<Delivered>
    where
        D: PlaybackDevice + ?Sized,
    {
        let request = SynthesisRequest::new(text, overrides);
        let audio = self
            .synthesizer
            .synthesize(&request)
            .await
            .map_err(|e| match e {
                AnnounceError::SynthesisFailed(_) => e,
                other => AnnounceError::SynthesisFailed(other.to_string()),
            })?;
        enter(stages, AnnounceStage::Synthesized);

        let artifact = self.publisher.publish(&audio).await?;
        enter(stages, AnnounceStage::Published);

        self.dispatcher.dispatch(device, &artifact.url).await?;
        enter(stages, AnnounceStage::PlaybackDispatched);

        let waited = match wait_margin {
            Some(margin) => {
                let waited = self
                    .dispatcher
                    .wait_for_completion(device, &artifact.local_path, margin)
                    .await?;
                enter(stages, AnnounceStage::Waited);
                Some(waited)
            }
            None => None,
        };

        Ok(Delivered {
            object_key: artifact.object_key,
            url: artifact.url,
            waited,
        })
    }
}
