use serde::{Deserialize, Serialize};

use crate::error::ScolioError;

/// A saved scoliometer reading. Immutable once created.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Measurement {
    pub id: String,
    pub date: String, // ISO-8601
    pub angle: f64,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Measurement {
    pub fn new(
        id: String,
        date: String,
        angle: f64,
        location: SpinalLocation,
        notes: Option<String>,
    ) -> Self {
        // 空备注不保存
        let notes = notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        Self {
            id,
            date,
            angle,
            location: location.label().to_string(),
            notes,
        }
    }

    /// Location parsed back from the stored free-text field, if it is one of the known regions.
    pub fn spinal_location(&self) -> Option<SpinalLocation> {
        self.location.parse().ok()
    }

    pub fn severity(&self) -> Severity {
        Severity::classify(self.angle)
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpinalLocation {
    Thoracic,
    Lumbar,
    Cervical,
}

impl SpinalLocation {
    pub fn label(&self) -> &'static str {
        match self {
            SpinalLocation::Thoracic => "Thoracic",
            SpinalLocation::Lumbar => "Lumbar",
            SpinalLocation::Cervical => "Cervical",
        }
    }

    /// Anatomical region shown with the measuring instructions.
    pub fn region(&self) -> &'static str {
        match self {
            SpinalLocation::Thoracic => "Upper/Mid Back (T1-T12)",
            SpinalLocation::Lumbar => "Lower Back (L1-L5)",
            SpinalLocation::Cervical => "Neck Region (C1-C7)",
        }
    }
}

impl std::fmt::Display for SpinalLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl std::str::FromStr for SpinalLocation {
    type Err = ScolioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "thoracic" => Ok(SpinalLocation::Thoracic),
            "lumbar" => Ok(SpinalLocation::Lumbar),
            "cervical" => Ok(SpinalLocation::Cervical),
            other => Err(ScolioError::InvalidInput(format!(
                "unknown spinal location '{}', expected thoracic, lumbar or cervical",
                other
            ))),
        }
    }
}

/// Clinical reading of an angle of trunk rotation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Normal,
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    /// Normal below 5°, mild below 7°, moderate up to 10°, severe above.
    pub fn classify(angle: f64) -> Self {
        let angle = angle.abs();
        if angle < 5.0 {
            Severity::Normal
        } else if angle < 7.0 {
            Severity::Mild
        } else if angle <= 10.0 {
            Severity::Moderate
        } else {
            Severity::Severe
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Severity::Normal => "normal",
            Severity::Mild => "mild",
            Severity::Moderate => "moderate",
            Severity::Severe => "severe",
        };
        write!(f, "{}", text)
    }
}
