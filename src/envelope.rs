//! Envelope controller: one DAHDSR envelope bound to a host's gain stages.

use log::debug;

use crate::automation::{AutomationParam, Connect, SignalSource, apply_events};
use crate::error::{EnvelopeError, InvalidState};
use crate::settings::{EnvelopeConfig, Settings, resolve};
use crate::timeline::{self, ReleaseSchedule};

/// Lifecycle of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeState {
    Idle,
    Started,
    Released,
}

/// The four gain stages an envelope drives.
///
/// The host wires `source → attack_decay → release → amp → output.gain` plus
/// `source → output`, so the output level is
/// `start_level + (max_level - start_level) * attack_decay * release`.
#[derive(Debug, Clone, Default)]
pub struct GainStages<P> {
    pub attack_decay: P,
    pub release: P,
    pub amp: P,
    pub output: P,
}

/// A single envelope instance.
#[derive(Debug)]
pub struct Envelope<S, P> {
    config: EnvelopeConfig,
    source: S,
    stages: GainStages<P>,
    state: EnvelopeState,
    released_at: Option<f64>,
}

impl<S: SignalSource, P: AutomationParam> Envelope<S, P> {
    /// Resolve `settings` and scale the amp and output stages to the
    /// configured level range.
    pub fn new(settings: &Settings, source: S, stages: GainStages<P>) -> Self {
        Self::with_config(resolve(settings), source, stages)
    }

    pub fn with_config(config: EnvelopeConfig, source: S, mut stages: GainStages<P>) -> Self {
        stages.amp.set_value(config.max_level - config.start_level);
        stages.output.set_value(config.start_level);
        Envelope {
            config,
            source,
            stages,
            state: EnvelopeState::Idle,
            released_at: None,
        }
    }

    pub fn config(&self) -> &EnvelopeConfig {
        &self.config
    }

    pub fn state(&self) -> EnvelopeState {
        self.state
    }

    pub fn released_at(&self) -> Option<f64> {
        self.released_at
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn stages(&self) -> &GainStages<P> {
        &self.stages
    }

    /// Schedule delay, attack, hold, decay and sustain from `when`, and start
    /// the source.
    pub fn start(&mut self, when: f64) -> Result<(), EnvelopeError> {
        if self.state != EnvelopeState::Idle {
            return Err(InvalidState::AlreadyStarted.into());
        }
        let events = timeline::build_attack_decay(&self.config, when);
        apply_events(&events, &mut self.stages.attack_decay);
        self.source.start(when);
        self.state = EnvelopeState::Started;
        debug!("envelope started at {when} with {} events", events.len());
        Ok(())
    }

    /// Schedule the release from `when` and stop the source once it ends.
    /// Returns the release schedule that was applied.
    pub fn release(&mut self, when: f64) -> Result<ReleaseSchedule, EnvelopeError> {
        match self.state {
            EnvelopeState::Idle => return Err(InvalidState::NotStarted.into()),
            EnvelopeState::Released => return Err(InvalidState::AlreadyReleased.into()),
            EnvelopeState::Started => {}
        }
        let schedule = timeline::build_release(&self.config, when);
        apply_events(&schedule.events, &mut self.stages.release);
        let stop_at = schedule.end_time(when);
        self.source.stop(stop_at);
        self.released_at = Some(when);
        self.state = EnvelopeState::Released;
        debug!("envelope released at {when}, source stops at {stop_at}");
        Ok(schedule)
    }

    /// Stop the source at `when`, skipping any release shaping.
    pub fn stop(&mut self, when: f64) {
        debug!("envelope stopped at {when}");
        self.source.stop(when);
    }

    /// When the release finishes: release instant plus the configured
    /// release time.
    ///
    /// With a release value curve the source stops after the curve's own
    /// duration, which may differ from this value.
    pub fn release_complete_time(&self) -> Result<f64, EnvelopeError> {
        let released_at = self.released_at.ok_or(InvalidState::ReleaseNotCalled)?;
        Ok(released_at + self.config.release_time)
    }
}

impl<S, P: Connect> Envelope<S, P> {
    /// Route the envelope's output stage to `destination`.
    pub fn connect(&mut self, destination: P::Destination) {
        self.stages.output.connect(destination);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::ParamTimeline;
    use crate::curve::CurveKind;
    use crate::timeline::{EnvelopeEvent, EventKind};
    use assert_approx_eq::assert_approx_eq;

    /// Source that records every call it receives.
    #[derive(Debug, Default)]
    struct SpySource {
        starts: Vec<f64>,
        stops: Vec<f64>,
    }

    impl SignalSource for SpySource {
        fn start(&mut self, when: f64) {
            self.starts.push(when);
        }

        fn stop(&mut self, when: f64) {
            self.stops.push(when);
        }
    }

    fn envelope(settings: Settings) -> Envelope<SpySource, ParamTimeline> {
        Envelope::new(&settings, SpySource::default(), GainStages::default())
    }

    fn scenario(curve: &str) -> Settings {
        Settings {
            curve: Some(curve.to_string()),
            delay_time: Some(0.1),
            attack_time: Some(0.2),
            hold_time: Some(0.3),
            decay_time: Some(0.4),
            start_level: Some(0.5),
            sustain_level: Some(0.7),
            release_time: Some(0.8),
            ..Default::default()
        }
    }

    #[test]
    fn scales_amp_and_output_stages() {
        let env = envelope(Settings {
            start_level: Some(12.0),
            max_level: Some(15.0),
            ..Default::default()
        });
        assert_eq!(env.stages().output.default_value(), 12.0);
        assert_eq!(env.stages().amp.default_value(), 3.0);
        assert_eq!(env.state(), EnvelopeState::Idle);
    }

    #[test]
    fn start_schedules_attack_decay_and_starts_source() {
        let mut env = envelope(scenario("linear"));
        env.start(0.6).expect("start failed");

        assert_eq!(env.source().starts, vec![0.6]);
        assert!(env.source().stops.is_empty());
        let events = env.stages().attack_decay.events();
        assert_eq!(events.len(), 5);
        assert_eq!(events[0], EnvelopeEvent::set_value(0.0, 0.6));
        assert_approx_eq!(events[4].time, 1.6);
        assert!(env.stages().release.events().is_empty());
        assert_eq!(env.state(), EnvelopeState::Started);
    }

    #[test]
    fn double_start_fails() {
        let mut env = envelope(Settings::default());
        env.start(0.0).expect("start failed");
        assert!(matches!(
            env.start(1.0),
            Err(EnvelopeError::InvalidState(InvalidState::AlreadyStarted))
        ));
        assert_eq!(env.source().starts.len(), 1);
        assert_eq!(env.stages().attack_decay.events().len(), 5);
    }

    #[test]
    fn release_before_start_fails_without_side_effects() {
        let mut env = envelope(Settings::default());
        assert!(matches!(
            env.release(1.0),
            Err(EnvelopeError::InvalidState(InvalidState::NotStarted))
        ));
        assert_eq!(env.released_at(), None);
        assert!(env.source().stops.is_empty());
    }

    #[test]
    fn linear_release_ramps_to_zero() {
        let mut env = envelope(scenario("linear"));
        env.start(0.0).expect("start failed");
        let schedule = env.release(0.9).expect("release failed");

        let events = env.stages().release.events();
        assert_eq!(events, schedule.events.as_slice());
        assert_eq!(events[0], EnvelopeEvent::set_value(1.0, 0.9));
        assert!(matches!(
            events[1].kind,
            EventKind::RampTo { level, curve: CurveKind::Linear } if level == 0.0
        ));
        assert_approx_eq!(events[1].time, 1.7);
        assert_eq!(env.source().stops.len(), 1);
        assert_approx_eq!(env.source().stops[0], 1.7);
        assert_eq!(env.state(), EnvelopeState::Released);
    }

    #[test]
    fn exponential_release_ramps_to_floor() {
        let mut env = envelope(scenario("exponential"));
        env.start(0.0).expect("start failed");
        env.release(0.9).expect("release failed");
        let events = env.stages().release.events();
        assert!(matches!(
            events[1].kind,
            EventKind::RampTo { level, curve: CurveKind::Exponential } if level == 0.001
        ));
    }

    #[test]
    fn release_is_recorded_once() {
        let mut env = envelope(scenario("linear"));
        env.start(0.0).expect("start failed");
        env.release(1.0).expect("release failed");
        assert!(matches!(
            env.release(2.0),
            Err(EnvelopeError::InvalidState(InvalidState::AlreadyReleased))
        ));
        assert_eq!(env.released_at(), Some(1.0));
        assert_eq!(env.stages().release.events().len(), 2);
    }

    #[test]
    fn release_complete_time_adds_release_time() {
        let mut env = envelope(Settings {
            release_time: Some(3.0),
            ..Default::default()
        });
        env.start(0.0).expect("start failed");
        env.release(1.0).expect("release failed");
        assert_eq!(env.release_complete_time().expect("not released"), 4.0);
    }

    #[test]
    fn release_complete_time_requires_release() {
        let mut env = envelope(Settings {
            release_time: Some(3.0),
            ..Default::default()
        });
        let err = env.release_complete_time().unwrap_err();
        assert!(err.to_string().contains("Release has not been called"));

        env.start(0.0).expect("start failed");
        assert!(matches!(
            env.release_complete_time(),
            Err(EnvelopeError::InvalidState(InvalidState::ReleaseNotCalled))
        ));
    }

    #[test]
    fn release_complete_time_ignores_value_curve_length() {
        let mut env = envelope(Settings {
            release_time: Some(0.5),
            release_value_curve: Some(vec![1.0, 0.0]),
            sample_rate: Some(1.0),
            ..Default::default()
        });
        env.start(0.0).expect("start failed");
        let schedule = env.release(1.0).expect("release failed");
        assert_eq!(schedule.release_time, 2.0);
        assert_eq!(env.source().stops, vec![3.0]);
        assert_eq!(env.release_complete_time().expect("not released"), 1.5);
    }

    #[test]
    fn stop_goes_straight_to_source() {
        let mut env = envelope(Settings::default());
        env.stop(0.9);
        assert_eq!(env.source().stops, vec![0.9]);
        assert_eq!(env.state(), EnvelopeState::Idle);
    }

    #[test]
    fn connect_routes_output_stage() {
        let mut env = envelope(Settings::default());
        env.connect("filter.frequency".to_string());
        assert_eq!(env.stages().output.destinations(), ["filter.frequency"]);
        assert!(env.stages().release.destinations().is_empty());
        assert!(env.stages().amp.destinations().is_empty());
    }
}
