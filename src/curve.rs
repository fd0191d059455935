//! Ramp curve selection per envelope stage.
//!
//! Every ramping stage follows either a linear or an exponential law. The
//! global `curve` setting picks the law for all stages unless a stage carries
//! its own recognized override.

use serde::{Deserialize, Serialize};

/// Smallest magnitude an exponential ramp may start from or target.
pub const EXPONENTIAL_FLOOR: f64 = 0.001;

/// Interpolation law for a ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CurveKind {
    #[default]
    Linear,
    Exponential,
}

impl CurveKind {
    /// Parse a curve name. Only `"linear"` and `"exponential"` are recognized.
    pub fn from_name(name: &str) -> Option<CurveKind> {
        match name {
            "linear" => Some(CurveKind::Linear),
            "exponential" => Some(CurveKind::Exponential),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CurveKind::Linear => "linear",
            CurveKind::Exponential => "exponential",
        }
    }

    /// The level standing in for silence under this law: 0 for linear ramps,
    /// the exponential floor otherwise.
    pub fn rest_level(self) -> f64 {
        match self {
            CurveKind::Linear => 0.0,
            CurveKind::Exponential => EXPONENTIAL_FLOOR,
        }
    }

    pub fn is_exponential(self) -> bool {
        self == CurveKind::Exponential
    }
}

/// Envelope stages that ramp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Attack,
    Decay,
    Release,
}

/// Global curve plus the per-stage overrides that survived parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurvePolicy {
    pub curve: CurveKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack_curve: Option<CurveKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decay_curve: Option<CurveKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_curve: Option<CurveKind>,
}

impl CurvePolicy {
    /// Build a policy from raw setting strings. A global curve other than
    /// `"exponential"` means linear; unrecognized overrides are dropped.
    pub fn from_names(
        curve: Option<&str>,
        attack: Option<&str>,
        decay: Option<&str>,
        release: Option<&str>,
    ) -> CurvePolicy {
        CurvePolicy {
            curve: match curve {
                Some("exponential") => CurveKind::Exponential,
                _ => CurveKind::Linear,
            },
            attack_curve: attack.and_then(CurveKind::from_name),
            decay_curve: decay.and_then(CurveKind::from_name),
            release_curve: release.and_then(CurveKind::from_name),
        }
    }

    /// Resolve the law for `stage`: the stage override wins, the global
    /// curve covers the rest.
    pub fn ramp_kind_for(&self, stage: Stage) -> CurveKind {
        let stage_override = match stage {
            Stage::Attack => self.attack_curve,
            Stage::Decay => self.decay_curve,
            Stage::Release => self.release_curve,
        };
        stage_override.unwrap_or(self.curve)
    }

    /// True if any ramping stage resolves to exponential.
    pub fn any_exponential(&self) -> bool {
        [Stage::Attack, Stage::Decay, Stage::Release]
            .into_iter()
            .any(|stage| self.ramp_kind_for(stage).is_exponential())
    }
}
