//! Envelope settings and their resolution into a complete configuration.
//!
//! `Settings` mirrors the loosely-typed settings object a host hands over
//! (every field optional, camelCase keys). `resolve` turns it into an
//! `EnvelopeConfig`, filling defaults and nudging values that would make an
//! exponential ramp undefined.

use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::curve::{CurveKind, CurvePolicy, EXPONENTIAL_FLOOR, Stage};
use crate::error::EnvelopeError;

/// Decay duration used when none (or zero) is given, so the decay ramp never
/// lands on the same instant as the end of the attack.
pub const MIN_DECAY_TIME: f64 = 0.001;

/// Sample rate assumed for value curves when the settings carry none.
pub const DEFAULT_SAMPLE_RATE: f64 = 44100.0;

// ── Raw Settings ────────────────────────────────────────────

/// Raw envelope settings as supplied by the host.
///
/// Curve names are kept as strings: unrecognized values are not an error,
/// they are ignored during resolution. A field holding a value of the wrong
/// type (a number for a curve, a string for a time) is treated as unset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Global ramp law: `"linear"` (default) or `"exponential"`.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub curve: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub attack_curve: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub decay_curve: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub release_curve: Option<String>,
    /// Seconds before the attack begins.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub delay_time: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub attack_time: Option<f64>,
    /// Seconds the peak is held before decaying.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub hold_time: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub decay_time: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub release_time: Option<f64>,
    /// Level before the attack and after the release.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub start_level: Option<f64>,
    /// Level at the end of the attack.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub max_level: Option<f64>,
    /// Fraction of the way from start level to max level held after decay.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub sustain_level: Option<f64>,
    /// Pre-recorded attack/decay shape, replacing the stage ramps.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub initial_value_curve: Option<Vec<f64>>,
    /// Pre-recorded release shape, replacing the release ramp.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub release_value_curve: Option<Vec<f64>>,
    /// Samples per second of the value curves.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<f64>,
}

impl Settings {
    /// Parse settings from a JSON object. Unknown keys are ignored, mistyped
    /// fields fall back to their defaults; only malformed JSON or a
    /// non-object fails.
    pub fn from_json(json: &str) -> Result<Settings, EnvelopeError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Deserialize an optional field, mapping `null` and values of the wrong type
/// to `None`.
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    match T::deserialize(&value) {
        Ok(parsed) => Ok(Some(parsed)),
        Err(e) => {
            warn!("ignoring mistyped setting {value}: {e}");
            Ok(None)
        }
    }
}

// ── Resolved Configuration ──────────────────────────────────

/// A complete, numerically safe envelope configuration.
///
/// Built once by [`resolve`]; the envelope owns it and only lends it out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeConfig {
    #[serde(flatten)]
    pub curves: CurvePolicy,
    pub delay_time: f64,
    pub attack_time: f64,
    pub hold_time: f64,
    pub decay_time: f64,
    pub release_time: f64,
    pub start_level: f64,
    pub max_level: f64,
    pub sustain_level: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_value_curve: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_value_curve: Option<Vec<f64>>,
    pub sample_rate: f64,
}

impl EnvelopeConfig {
    pub fn ramp_kind_for(&self, stage: Stage) -> CurveKind {
        self.curves.ramp_kind_for(stage)
    }

    /// Playback duration of a value curve at this config's sample rate.
    pub fn curve_duration(&self, samples: &[f64]) -> f64 {
        samples.len() as f64 / self.sample_rate
    }
}

impl From<&EnvelopeConfig> for Settings {
    fn from(config: &EnvelopeConfig) -> Self {
        Settings {
            curve: Some(config.curves.curve.name().to_string()),
            attack_curve: config.curves.attack_curve.map(|c| c.name().to_string()),
            decay_curve: config.curves.decay_curve.map(|c| c.name().to_string()),
            release_curve: config.curves.release_curve.map(|c| c.name().to_string()),
            delay_time: Some(config.delay_time),
            attack_time: Some(config.attack_time),
            hold_time: Some(config.hold_time),
            decay_time: Some(config.decay_time),
            release_time: Some(config.release_time),
            start_level: Some(config.start_level),
            max_level: Some(config.max_level),
            sustain_level: Some(config.sustain_level),
            initial_value_curve: config.initial_value_curve.clone(),
            release_value_curve: config.release_value_curve.clone(),
            sample_rate: Some(config.sample_rate),
        }
    }
}

// ── Resolver ────────────────────────────────────────────────

/// Resolve raw settings into a complete configuration. Never fails.
pub fn resolve(raw: &Settings) -> EnvelopeConfig {
    let curves = CurvePolicy::from_names(
        raw.curve.as_deref(),
        raw.attack_curve.as_deref(),
        raw.decay_curve.as_deref(),
        raw.release_curve.as_deref(),
    );
    let attack = curves.ramp_kind_for(Stage::Attack);
    let decay = curves.ramp_kind_for(Stage::Decay);
    let release = curves.ramp_kind_for(Stage::Release);

    let mut start_level = level(raw.start_level, 0.0, "startLevel");
    let mut max_level = level(raw.max_level, 1.0, "maxLevel");
    let mut sustain_level = level(raw.sustain_level, 1.0, "sustainLevel");

    // Exponential ramps can neither leave nor reach zero.
    if start_level == 0.0 && attack.is_exponential() {
        start_level = floor_toward(max_level);
    }
    if max_level == 0.0 && curves.any_exponential() {
        max_level = floor_toward(start_level);
    }
    // Sustain is a multiplier, so its floor is always positive.
    if sustain_level == 0.0 && (decay.is_exponential() || release.is_exponential()) {
        sustain_level = EXPONENTIAL_FLOOR;
    }

    let mut decay_time = duration(raw.decay_time, "decayTime");
    if decay_time == 0.0 {
        decay_time = MIN_DECAY_TIME;
    }

    let initial_value_curve = value_curve(&raw.initial_value_curve);
    let release_value_curve = value_curve(&raw.release_value_curve);
    let sample_rate = match raw.sample_rate {
        Some(rate) if rate.is_finite() && rate > 0.0 => rate,
        other => {
            if initial_value_curve.is_some() || release_value_curve.is_some() {
                warn!(
                    "value curve supplied with sample rate {other:?}; assuming {DEFAULT_SAMPLE_RATE} Hz"
                );
            }
            DEFAULT_SAMPLE_RATE
        }
    };

    let config = EnvelopeConfig {
        curves,
        delay_time: duration(raw.delay_time, "delayTime"),
        attack_time: duration(raw.attack_time, "attackTime"),
        hold_time: duration(raw.hold_time, "holdTime"),
        decay_time,
        release_time: duration(raw.release_time, "releaseTime"),
        start_level,
        max_level,
        sustain_level,
        initial_value_curve,
        release_value_curve,
        sample_rate,
    };
    debug!("resolved envelope config: {config:?}");
    config
}

/// The exponential floor, signed to match `reference`.
fn floor_toward(reference: f64) -> f64 {
    if reference < 0.0 {
        -EXPONENTIAL_FLOOR
    } else {
        EXPONENTIAL_FLOOR
    }
}

fn duration(value: Option<f64>, name: &str) -> f64 {
    match value {
        None => 0.0,
        Some(seconds) if seconds.is_finite() && seconds >= 0.0 => seconds,
        Some(seconds) => {
            warn!("{name} must be a non-negative number of seconds, got {seconds}; using 0");
            0.0
        }
    }
}

fn level(value: Option<f64>, default: f64, name: &str) -> f64 {
    match value {
        None => default,
        Some(level) if level.is_finite() => level,
        Some(level) => {
            warn!("{name} must be a finite number, got {level}; using {default}");
            default
        }
    }
}

fn value_curve(samples: &Option<Vec<f64>>) -> Option<Vec<f64>> {
    samples.as_ref().filter(|s| !s.is_empty()).cloned()
}
