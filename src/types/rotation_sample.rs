use serde::{Deserialize, Serialize};

/// One device-orientation reading, in degrees.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq)]
pub struct RotationSample {
    pub alpha_deg: f64,
    pub beta_deg: f64,
    pub gamma_deg: f64,
    pub timestamp: i64, // 毫秒
}

impl RotationSample {
    pub fn new(alpha_deg: f64, beta_deg: f64, gamma_deg: f64, timestamp: i64) -> Self {
        Self {
            alpha_deg,
            beta_deg,
            gamma_deg,
            timestamp,
        }
    }

    /// Builds a sample from a reading reported in radians.
    pub fn from_radians(alpha: f64, beta: f64, gamma: f64, timestamp: i64) -> Self {
        Self {
            alpha_deg: alpha.to_degrees(),
            beta_deg: beta.to_degrees(),
            gamma_deg: gamma.to_degrees(),
            timestamp,
        }
    }

    pub fn axis_value(&self, axis: RotationAxis) -> f64 {
        match axis {
            RotationAxis::Alpha => self.alpha_deg,
            RotationAxis::Beta => self.beta_deg,
            RotationAxis::Gamma => self.gamma_deg,
        }
    }
}

/// Rotation axis read by the calibration engine.
///
/// beta is front-back tilt, gamma is left-right tilt. With the phone held in
/// landscape across the patient's back, beta follows the rib hump.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationAxis {
    Alpha,
    #[default]
    Beta,
    Gamma,
}

impl std::fmt::Display for RotationAxis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RotationAxis::Alpha => "alpha",
            RotationAxis::Beta => "beta",
            RotationAxis::Gamma => "gamma",
        };
        write!(f, "{}", name)
    }
}
