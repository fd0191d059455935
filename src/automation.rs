//! The host boundary: automatable parameters and signal sources.
//!
//! A browser host backs these traits with `AudioParam` and an
//! `AudioBufferSourceNode`. `ParamTimeline` is an in-memory parameter that
//! evaluates scheduled events offline, used for rendering and tests.

use crate::curve::CurveKind;
use crate::timeline::{EnvelopeEvent, EventKind};

/// A real-valued parameter that accepts scheduled automation.
pub trait AutomationParam {
    /// Set the intrinsic value used before any scheduled event.
    fn set_value(&mut self, level: f64);
    fn set_value_at_time(&mut self, level: f64, time: f64);
    fn linear_ramp_to_value_at_time(&mut self, level: f64, time: f64);
    fn exponential_ramp_to_value_at_time(&mut self, level: f64, time: f64);
    fn set_value_curve_at_time(&mut self, samples: &[f64], time: f64, duration: f64);
}

/// The constant signal that drives the gain stages.
pub trait SignalSource {
    fn start(&mut self, when: f64);
    fn stop(&mut self, when: f64);
}

/// A gain stage whose output can be routed onward. The envelope connects
/// its last stage, so the destination receives the shaped signal rather than
/// the raw source.
pub trait Connect {
    /// Where the output ends up, typically a parameter handle.
    type Destination;

    fn connect(&mut self, destination: Self::Destination);
}

/// Hand each event to the matching parameter primitive, in order.
pub fn apply_events<P: AutomationParam + ?Sized>(events: &[EnvelopeEvent], param: &mut P) {
    for event in events {
        match &event.kind {
            EventKind::SetValue { level } => param.set_value_at_time(*level, event.time),
            EventKind::RampTo {
                level,
                curve: CurveKind::Linear,
            } => param.linear_ramp_to_value_at_time(*level, event.time),
            EventKind::RampTo {
                level,
                curve: CurveKind::Exponential,
            } => param.exponential_ramp_to_value_at_time(*level, event.time),
            EventKind::SetValueCurve { samples, duration } => {
                param.set_value_curve_at_time(samples, event.time, *duration)
            }
        }
    }
}

// ── Offline Parameter ───────────────────────────────────────

/// A parameter that records its automation and can be sampled at any time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamTimeline {
    default_value: f64,
    /// Sorted by time; events at the same instant keep insertion order.
    events: Vec<EnvelopeEvent>,
    /// Names of the destinations this stage's output is routed to.
    destinations: Vec<String>,
}

impl ParamTimeline {
    pub fn new(default_value: f64) -> Self {
        ParamTimeline {
            default_value,
            events: Vec::new(),
            destinations: Vec::new(),
        }
    }

    pub fn destinations(&self) -> &[String] {
        &self.destinations
    }

    pub fn default_value(&self) -> f64 {
        self.default_value
    }

    pub fn events(&self) -> &[EnvelopeEvent] {
        &self.events
    }

    fn insert(&mut self, event: EnvelopeEvent) {
        let index = self.events.partition_point(|e| e.time <= event.time);
        self.events.insert(index, event);
    }

    /// Value of the parameter at `time`.
    ///
    /// Values hold between events. A ramp runs from the previous event's
    /// time and value to its own. An exponential ramp whose endpoints are
    /// zero or of opposite sign holds the previous value instead.
    pub fn value_at(&self, time: f64) -> f64 {
        let mut value = self.default_value;
        let mut anchor = 0.0;

        for event in &self.events {
            if event.time > time {
                return match event.kind {
                    EventKind::RampTo { level, curve } => {
                        ramp_value(curve, (anchor, value), (event.time, level), time)
                    }
                    _ => value,
                };
            }
            match &event.kind {
                EventKind::SetValue { level } | EventKind::RampTo { level, .. } => {
                    value = *level;
                    anchor = event.time;
                }
                EventKind::SetValueCurve { samples, duration } => {
                    let end = event.time + duration;
                    if time < end {
                        return curve_value(samples, (time - event.time) / duration);
                    }
                    value = samples.last().copied().unwrap_or(value);
                    anchor = end;
                }
            }
        }
        value
    }
}

fn ramp_value(curve: CurveKind, from: (f64, f64), to: (f64, f64), time: f64) -> f64 {
    let (t0, v0) = from;
    let (t1, v1) = to;
    if time <= t0 {
        return v0;
    }
    let progress = (time - t0) / (t1 - t0);
    match curve {
        CurveKind::Linear => v0 + (v1 - v0) * progress,
        CurveKind::Exponential => {
            if v0 == 0.0 || v0 * v1 <= 0.0 {
                v0
            } else {
                v0 * (v1 / v0).powf(progress)
            }
        }
    }
}

/// Linear interpolation across `samples` at `position` in [0, 1).
fn curve_value(samples: &[f64], position: f64) -> f64 {
    match samples {
        [] => 0.0,
        [only] => *only,
        _ => {
            let scaled = position.clamp(0.0, 1.0) * (samples.len() - 1) as f64;
            let index = (scaled.floor() as usize).min(samples.len() - 2);
            let frac = scaled - index as f64;
            samples[index] + (samples[index + 1] - samples[index]) * frac
        }
    }
}

impl AutomationParam for ParamTimeline {
    fn set_value(&mut self, level: f64) {
        self.default_value = level;
    }

    fn set_value_at_time(&mut self, level: f64, time: f64) {
        self.insert(EnvelopeEvent::set_value(level, time));
    }

    fn linear_ramp_to_value_at_time(&mut self, level: f64, time: f64) {
        self.insert(EnvelopeEvent::ramp_to(level, time, CurveKind::Linear));
    }

    fn exponential_ramp_to_value_at_time(&mut self, level: f64, time: f64) {
        self.insert(EnvelopeEvent::ramp_to(level, time, CurveKind::Exponential));
    }

    fn set_value_curve_at_time(&mut self, samples: &[f64], time: f64, duration: f64) {
        self.insert(EnvelopeEvent::value_curve(samples.to_vec(), time, duration));
    }
}

impl Connect for ParamTimeline {
    type Destination = String;

    fn connect(&mut self, destination: String) {
        self.destinations.push(destination);
    }
}
