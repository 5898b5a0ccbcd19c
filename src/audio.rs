//! Audible cues for lock-key transitions
//!
//! The client awaits [`CueSink::play`] before reading the next notification,
//! so a slow sink throttles consumption instead of queueing sounds.

use std::f32::consts::TAU;
use std::fmt;
use std::io;

use async_trait::async_trait;
use lockbell_transport::LockState;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Cue length in milliseconds
pub const CUE_MS: u32 = 150;
const ATTACK_MS: u32 = 5;
const RELEASE_MS: u32 = 40;
const LOW_HZ: f32 = 600.0;
const HIGH_HZ: f32 = 1200.0;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No audio output device available")]
    NoDevice,

    #[error("Audio output configuration failed: {0}")]
    Config(String),

    #[error("Playback failed: {0}")]
    Playback(String),

    #[error("Failed to ring terminal bell: {0}")]
    Bell(#[from] io::Error),
}

/// Which sound to play
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    On,
    Off,
}

impl From<LockState> for Cue {
    fn from(state: LockState) -> Self {
        match state {
            LockState::On => Cue::On,
            LockState::Off => Cue::Off,
        }
    }
}

impl fmt::Display for Cue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Cue::On => "on",
            Cue::Off => "off",
        })
    }
}

/// How cues are rendered
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum CueStyle {
    /// Synthesized sweep on the default output device
    #[cfg_attr(feature = "audio", default)]
    Tone,
    /// Terminal bell
    #[cfg_attr(not(feature = "audio"), default)]
    Bell,
    /// Log only
    Silent,
}

#[async_trait]
pub trait CueSink: Send {
    /// Play `cue` and return once it has finished
    async fn play(&mut self, cue: Cue) -> Result<(), AudioError>;
}

#[async_trait]
impl CueSink for Box<dyn CueSink> {
    async fn play(&mut self, cue: Cue) -> Result<(), AudioError> {
        (**self).play(cue).await
    }
}

/// Rings the terminal bell once per cue
#[derive(Debug, Default)]
pub struct BellSink;

#[async_trait]
impl CueSink for BellSink {
    async fn play(&mut self, _cue: Cue) -> Result<(), AudioError> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(b"\x07").await?;
        stdout.flush().await?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct SilentSink;

#[async_trait]
impl CueSink for SilentSink {
    async fn play(&mut self, cue: Cue) -> Result<(), AudioError> {
        info!("Cue: {cue}");
        Ok(())
    }
}

/// Build the sink for `style`. Without the `audio` feature a tone request
/// falls back to the terminal bell.
pub fn sink_for(style: CueStyle, volume: f32) -> Result<Box<dyn CueSink>, AudioError> {
    match style {
        CueStyle::Silent => Ok(Box::new(SilentSink)),
        CueStyle::Bell => Ok(Box::new(BellSink)),
        #[cfg(feature = "audio")]
        CueStyle::Tone => Ok(Box::new(tone::ToneSink::new(volume)?)),
        #[cfg(not(feature = "audio"))]
        CueStyle::Tone => {
            let _ = volume;
            tracing::warn!("Built without audio support, using terminal bell");
            Ok(Box::new(BellSink))
        }
    }
}

/// Render `cue` as mono samples in `[-volume, volume]`.
///
/// On is a rising sweep, Off a falling one, both [`CUE_MS`] long with a short
/// fade in and out.
pub fn synthesize(cue: Cue, sample_rate: u32, volume: f32) -> Vec<f32> {
    let volume = volume.clamp(0.0, 1.0);
    let rate = sample_rate as f32;
    let total = (sample_rate as u64 * CUE_MS as u64 / 1000) as usize;
    let attack = (sample_rate as u64 * ATTACK_MS as u64 / 1000).max(1) as f32;
    let release = (sample_rate as u64 * RELEASE_MS as u64 / 1000).max(1) as f32;
    let (from, to) = match cue {
        Cue::On => (LOW_HZ, HIGH_HZ),
        Cue::Off => (HIGH_HZ, LOW_HZ),
    };

    let mut phase = 0.0f32;
    (0..total)
        .map(|i| {
            let t = i as f32 / total as f32;
            let freq = from + (to - from) * t;
            let sample = phase.sin();
            phase = (phase + TAU * freq / rate) % TAU;

            let remaining = (total - i) as f32;
            let envelope = (i as f32 / attack).min(1.0).min(remaining / release);
            sample * envelope * volume
        })
        .collect()
}

#[cfg(feature = "audio")]
mod tone {
    use std::time::Duration;

    use async_trait::async_trait;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use cpal::{FromSample, SampleFormat, SizedSample, StreamConfig};
    use tracing::{debug, warn};

    use super::{synthesize, AudioError, Cue, CueSink};

    /// Let the device drain its buffer before the stream is dropped
    const TAIL: Duration = Duration::from_millis(30);

    /// Plays synthesized cues on the default output device.
    ///
    /// The device and its config are looked up again for every cue, on the
    /// playback thread. A client outlives audio server restarts and changes
    /// of the default sink, and a `cpal::Device` held from startup would keep
    /// pointing at the old one. [`ToneSink::new`] only checks that an output
    /// exists at all.
    pub struct ToneSink {
        volume: f32,
    }

    impl ToneSink {
        pub fn new(volume: f32) -> Result<Self, AudioError> {
            let device = output_device()?;
            debug!(
                "Audio output: {}",
                device.name().unwrap_or_else(|_| "unknown".to_string())
            );
            Ok(Self { volume })
        }
    }

    fn output_device() -> Result<cpal::Device, AudioError> {
        cpal::default_host()
            .default_output_device()
            .ok_or(AudioError::NoDevice)
    }

    #[async_trait]
    impl CueSink for ToneSink {
        async fn play(&mut self, cue: Cue) -> Result<(), AudioError> {
            let volume = self.volume;
            // cpal::Stream is not Send; build, play and drop it on one thread
            tokio::task::spawn_blocking(move || play_blocking(cue, volume))
                .await
                .map_err(|e| AudioError::Playback(e.to_string()))?
        }
    }

    fn play_blocking(cue: Cue, volume: f32) -> Result<(), AudioError> {
        let device = output_device()?;
        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::Config(e.to_string()))?;
        let format = supported.sample_format();
        let config: StreamConfig = supported.into();

        let samples = synthesize(cue, config.sample_rate.0, volume);
        let duration =
            Duration::from_secs_f32(samples.len() as f32 / config.sample_rate.0 as f32);

        let stream = match format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, samples)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, samples)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, samples)?,
            other => {
                return Err(AudioError::Config(format!(
                    "unsupported sample format {other:?}"
                )))
            }
        };
        stream
            .play()
            .map_err(|e| AudioError::Playback(e.to_string()))?;
        std::thread::sleep(duration + TAIL);
        Ok(())
    }

    fn build_stream<T>(
        device: &cpal::Device,
        config: &StreamConfig,
        samples: Vec<f32>,
    ) -> Result<cpal::Stream, AudioError>
    where
        T: SizedSample + FromSample<f32>,
    {
        let channels = config.channels as usize;
        let mut cursor = 0usize;
        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let value = T::from_sample(samples.get(cursor).copied().unwrap_or(0.0));
                        cursor += 1;
                        for out in frame.iter_mut() {
                            *out = value;
                        }
                    }
                },
                |err| warn!("Audio stream error: {err}"),
                None,
            )
            .map_err(|e| AudioError::Playback(e.to_string()))
    }
}

#[cfg(feature = "audio")]
pub use tone::ToneSink;
