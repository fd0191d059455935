//! Offline rendering: drive an envelope against in-memory gain stages and
//! sample the resulting level, e.g. for previews or WAV export.

use crate::automation::{ParamTimeline, SignalSource};
use crate::envelope::{Envelope, GainStages};
use crate::error::EnvelopeError;
use crate::settings::Settings;

/// A constant-one source that only remembers when it plays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OfflineSource {
    started_at: Option<f64>,
    stopped_at: Option<f64>,
}

impl OfflineSource {
    pub fn is_playing(&self, time: f64) -> bool {
        match self.started_at {
            Some(start) => time >= start && self.stopped_at.is_none_or(|stop| time < stop),
            None => false,
        }
    }

    pub fn stopped_at(&self) -> Option<f64> {
        self.stopped_at
    }
}

impl SignalSource for OfflineSource {
    fn start(&mut self, when: f64) {
        self.started_at = Some(when);
    }

    /// A later stop replaces an earlier one.
    fn stop(&mut self, when: f64) {
        self.stopped_at = Some(when);
    }
}

/// Gain stages as a freshly created host graph would have them: unity gain
/// everywhere except the output, whose intrinsic gain the envelope sets.
pub fn offline_stages() -> GainStages<ParamTimeline> {
    GainStages {
        attack_decay: ParamTimeline::new(1.0),
        release: ParamTimeline::new(1.0),
        amp: ParamTimeline::new(1.0),
        output: ParamTimeline::new(0.0),
    }
}

impl Envelope<OfflineSource, ParamTimeline> {
    pub fn offline(settings: &Settings) -> Self {
        Envelope::new(settings, OfflineSource::default(), offline_stages())
    }

    /// Output level at `time`; silent whenever the source is not playing.
    pub fn level_at(&self, time: f64) -> f64 {
        if !self.source().is_playing(time) {
            return 0.0;
        }
        let stages = self.stages();
        stages.output.value_at(time)
            + stages.amp.value_at(time)
                * stages.attack_decay.value_at(time)
                * stages.release.value_at(time)
    }
}

/// Render `duration` seconds of envelope output starting from time 0.
///
/// The envelope starts at `start` and, if given, releases at `release`.
pub fn render_levels(
    settings: &Settings,
    start: f64,
    release: Option<f64>,
    sample_rate: f64,
    duration: f64,
) -> Result<Vec<f64>, EnvelopeError> {
    let mut env = Envelope::offline(settings);
    env.start(start)?;
    if let Some(when) = release {
        env.release(when)?;
    }

    let frames = (duration * sample_rate).round() as usize;
    Ok((0..frames)
        .map(|i| env.level_at(i as f64 / sample_rate))
        .collect())
}

/// Render envelope output and encode it as a WAV file.
pub fn render_envelope_wav(
    settings: &Settings,
    start: f64,
    release: Option<f64>,
    sample_rate: u32,
    duration: f64,
) -> Result<Vec<u8>, EnvelopeError> {
    let levels = render_levels(settings, start, release, sample_rate as f64, duration)?;
    Ok(render_wav(&levels, sample_rate))
}

/// Encode rendered levels as a mono 16-bit PCM WAV. Levels outside [-1, 1]
/// are clipped.
pub fn render_wav(levels: &[f64], sample_rate: u32) -> Vec<u8> {
    const CHANNELS: u16 = 1;
    const BITS_PER_SAMPLE: u16 = 16;
    let block_align = CHANNELS * BITS_PER_SAMPLE / 8;
    let byte_rate = sample_rate * block_align as u32;
    let data_size = (levels.len() * block_align as usize) as u32;

    let mut buf = Vec::with_capacity(44 + data_size as usize);
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&(36 + data_size).to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes());
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM
    buf.extend_from_slice(&CHANNELS.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for &level in levels {
        let sample = (level.clamp(-1.0, 1.0) * i16::MAX as f64).round() as i16;
        buf.extend_from_slice(&sample.to_le_bytes());
    }
    buf
}
