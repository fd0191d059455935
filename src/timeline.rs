//! Stage timing and automation event generation.
//!
//! The attack/decay schedule drives a gain stage that rises from silence to
//! 1 and settles on the sustain level; the release schedule drives a second
//! stage that falls from 1 back to silence. Levels here are normalized: the
//! start/max level scaling happens in the gain stages the host wires up.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::curve::{CurveKind, Stage};
use crate::settings::EnvelopeConfig;

// ── Events ──────────────────────────────────────────────────

/// A single automation instruction for a gain stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeEvent {
    /// Absolute time in seconds on the host clock.
    pub time: f64,
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EventKind {
    /// Pin the value from `time` until the next event.
    SetValue { level: f64 },
    /// Ramp from the previous event's value, arriving at `level` at `time`.
    RampTo { level: f64, curve: CurveKind },
    /// Play back `samples` over `duration` seconds starting at `time`.
    SetValueCurve { samples: Vec<f64>, duration: f64 },
}

impl EnvelopeEvent {
    pub fn set_value(level: f64, time: f64) -> Self {
        EnvelopeEvent {
            time,
            kind: EventKind::SetValue { level },
        }
    }

    pub fn ramp_to(level: f64, time: f64, curve: CurveKind) -> Self {
        EnvelopeEvent {
            time,
            kind: EventKind::RampTo { level, curve },
        }
    }

    pub fn value_curve(samples: Vec<f64>, time: f64, duration: f64) -> Self {
        EnvelopeEvent {
            time,
            kind: EventKind::SetValueCurve { samples, duration },
        }
    }

    /// The instant this event stops affecting the value on its own.
    pub fn end_time(&self) -> f64 {
        match &self.kind {
            EventKind::SetValueCurve { duration, .. } => self.time + duration,
            _ => self.time,
        }
    }
}

/// Boundary instants of the pre-release stages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTimes {
    pub start: f64,
    pub attack_start: f64,
    pub attack_end: f64,
    pub decay_start: f64,
    pub decay_end: f64,
}

impl StageTimes {
    pub fn new(config: &EnvelopeConfig, start: f64) -> Self {
        let attack_start = start + config.delay_time;
        let attack_end = attack_start + config.attack_time;
        let decay_start = attack_end + config.hold_time;
        let decay_end = decay_start + config.decay_time;
        StageTimes {
            start,
            attack_start,
            attack_end,
            decay_start,
            decay_end,
        }
    }
}

/// Release events plus how long the release actually lasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseSchedule {
    pub events: Vec<EnvelopeEvent>,
    /// Configured release time, or the value curve's length when one is set.
    pub release_time: f64,
}

impl ReleaseSchedule {
    pub fn end_time(&self, released_at: f64) -> f64 {
        released_at + self.release_time
    }
}

// ── Builders ────────────────────────────────────────────────

/// Events for delay, attack, hold, decay and sustain, starting at `start`.
pub fn build_attack_decay(config: &EnvelopeConfig, start: f64) -> Vec<EnvelopeEvent> {
    if let Some(samples) = &config.initial_value_curve {
        let duration = config.curve_duration(samples);
        debug!("attack/decay value curve at {start}: {} samples over {duration}s", samples.len());
        return vec![EnvelopeEvent::value_curve(samples.clone(), start, duration)];
    }

    let times = StageTimes::new(config, start);
    let attack = config.ramp_kind_for(Stage::Attack);
    let decay = config.ramp_kind_for(Stage::Decay);
    let floor = attack.rest_level();
    debug!("attack/decay stages {times:?} (attack {attack:?}, decay {decay:?})");

    // Two anchors at the floor keep the value flat through the delay.
    vec![
        EnvelopeEvent::set_value(floor, times.start),
        EnvelopeEvent::set_value(floor, times.attack_start),
        EnvelopeEvent::ramp_to(1.0, times.attack_end, attack),
        EnvelopeEvent::set_value(1.0, times.decay_start),
        EnvelopeEvent::ramp_to(config.sustain_level, times.decay_end, decay),
    ]
}

/// Events for the release stage, starting at `released_at`.
pub fn build_release(config: &EnvelopeConfig, released_at: f64) -> ReleaseSchedule {
    if let Some(samples) = &config.release_value_curve {
        let duration = config.curve_duration(samples);
        debug!("release value curve at {released_at}: {} samples over {duration}s", samples.len());
        return ReleaseSchedule {
            events: vec![EnvelopeEvent::value_curve(samples.clone(), released_at, duration)],
            release_time: duration,
        };
    }

    let curve = config.ramp_kind_for(Stage::Release);
    let release_end = released_at + config.release_time;
    debug!("release from {released_at} to {release_end} ({curve:?})");
    ReleaseSchedule {
        events: vec![
            EnvelopeEvent::set_value(1.0, released_at),
            EnvelopeEvent::ramp_to(curve.rest_level(), release_end, curve),
        ],
        release_time: config.release_time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{Settings, resolve};
    use assert_approx_eq::assert_approx_eq;

    fn scenario(curve: &str) -> EnvelopeConfig {
        resolve(&Settings {
            curve: Some(curve.to_string()),
            delay_time: Some(0.1),
            attack_time: Some(0.2),
            hold_time: Some(0.3),
            decay_time: Some(0.4),
            start_level: Some(0.5),
            sustain_level: Some(0.7),
            release_time: Some(0.8),
            ..Default::default()
        })
    }

    fn level(event: &EnvelopeEvent) -> f64 {
        match &event.kind {
            EventKind::SetValue { level } | EventKind::RampTo { level, .. } => *level,
            EventKind::SetValueCurve { .. } => panic!("unexpected value curve"),
        }
    }

    #[test]
    fn linear_attack_decay_scenario() {
        let events = build_attack_decay(&scenario("linear"), 0.6);
        assert_eq!(events.len(), 5);

        assert_eq!(events[0], EnvelopeEvent::set_value(0.0, 0.6));
        assert_eq!(level(&events[1]), 0.0);
        assert_approx_eq!(events[1].time, 0.7);

        assert_eq!(level(&events[2]), 1.0);
        assert_approx_eq!(events[2].time, 0.9);
        assert!(matches!(
            events[2].kind,
            EventKind::RampTo { curve: CurveKind::Linear, .. }
        ));

        assert!(matches!(events[3].kind, EventKind::SetValue { level } if level == 1.0));
        assert_approx_eq!(events[3].time, 1.2);

        assert_eq!(level(&events[4]), 0.7);
        assert_approx_eq!(events[4].time, 1.6);
        assert!(matches!(
            events[4].kind,
            EventKind::RampTo { curve: CurveKind::Linear, .. }
        ));
    }

    #[test]
    fn exponential_attack_starts_at_floor() {
        let events = build_attack_decay(&scenario("exponential"), 0.6);
        assert_eq!(level(&events[0]), 0.001);
        assert_eq!(level(&events[1]), 0.001);
        assert_approx_eq!(events[1].time, 0.7);
        assert!(matches!(
            events[2].kind,
            EventKind::RampTo { curve: CurveKind::Exponential, .. }
        ));
    }

    #[test]
    fn stage_overrides_pick_ramps() {
        let mut config = scenario("linear");
        config.curves.decay_curve = Some(CurveKind::Exponential);
        let events = build_attack_decay(&config, 0.0);
        assert!(matches!(
            events[2].kind,
            EventKind::RampTo { curve: CurveKind::Linear, .. }
        ));
        assert!(matches!(
            events[4].kind,
            EventKind::RampTo { curve: CurveKind::Exponential, level } if level == 0.7
        ));
    }

    #[test]
    fn event_times_follow_stage_durations() {
        let config = scenario("linear");
        let t0 = 2.0;
        let events = build_attack_decay(&config, t0);
        let expected = [
            t0,
            t0 + 0.1,
            t0 + 0.1 + 0.2,
            t0 + 0.1 + 0.2 + 0.3,
            t0 + 0.1 + 0.2 + 0.3 + 0.4,
        ];
        for (event, time) in events.iter().zip(expected) {
            assert_approx_eq!(event.time, time);
        }
        assert!(events.windows(2).all(|w| w[0].time <= w[1].time));
    }

    #[test]
    fn zero_durations_collapse_but_decay_stays_after_attack() {
        let config = resolve(&Settings::default());
        let events = build_attack_decay(&config, 1.0);
        assert_eq!(events.len(), 5);
        assert!(events[..4].iter().all(|e| e.time == 1.0));
        assert!(events[4].time > events[2].time);
    }

    #[test]
    fn linear_release_scenario() {
        let schedule = build_release(&scenario("linear"), 0.9);
        assert_eq!(schedule.events.len(), 2);
        assert_eq!(schedule.events[0], EnvelopeEvent::set_value(1.0, 0.9));
        assert_eq!(level(&schedule.events[1]), 0.0);
        assert_approx_eq!(schedule.events[1].time, 1.7);
        assert_eq!(schedule.release_time, 0.8);
    }

    #[test]
    fn exponential_release_targets_floor() {
        let schedule = build_release(&scenario("exponential"), 0.9);
        assert!(matches!(
            schedule.events[1].kind,
            EventKind::RampTo { curve: CurveKind::Exponential, level } if level == 0.001
        ));
        assert_approx_eq!(schedule.end_time(0.9), 1.7);
    }

    #[test]
    fn initial_value_curve_bypasses_stages() {
        let config = resolve(&Settings {
            initial_value_curve: Some(vec![0.0, 0.5, 1.0, 0.8]),
            sample_rate: Some(8.0),
            delay_time: Some(3.0),
            ..Default::default()
        });
        let events = build_attack_decay(&config, 0.25);
        assert_eq!(
            events,
            vec![EnvelopeEvent::value_curve(vec![0.0, 0.5, 1.0, 0.8], 0.25, 0.5)]
        );
        assert_approx_eq!(events[0].end_time(), 0.75);
    }

    #[test]
    fn release_value_curve_sets_effective_release_time() {
        let config = resolve(&Settings {
            release_value_curve: Some(vec![1.0, 0.5, 0.25, 0.0]),
            sample_rate: Some(4.0),
            release_time: Some(10.0),
            ..Default::default()
        });
        let schedule = build_release(&config, 2.0);
        assert_eq!(schedule.events.len(), 1);
        assert_eq!(schedule.release_time, 1.0);
        assert_eq!(schedule.end_time(2.0), 3.0);
    }

    #[test]
    fn events_serialize_tagged() {
        let event = EnvelopeEvent::ramp_to(0.5, 1.0, CurveKind::Exponential);
        let json = serde_json::to_value(&event).expect("serialize failed");
        assert_eq!(json["kind"]["type"], "rampTo");
        assert_eq!(json["kind"]["curve"], "exponential");
        assert_eq!(json["time"], 1.0);
    }
}
