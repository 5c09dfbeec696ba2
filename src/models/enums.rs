use serde::{Deserialize, Serialize};

use super::ModelError;

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::models::ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err($crate::models::ModelError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub(crate) use str_enum;

// ---------------------------------------------------------------------------
// Urgency
// ---------------------------------------------------------------------------

/// Triage verdict for a turn or a whole session.
///
/// Ordering matters: `Routine < Urgent < Emergency`. A session's running level
/// is the maximum of every verdict seen so far.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyLevel {
    #[default]
    Routine,
    Urgent,
    Emergency,
}

impl UrgencyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Routine => "routine",
            Self::Urgent => "urgent",
            Self::Emergency => "emergency",
        }
    }
}

impl std::fmt::Display for UrgencyLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for UrgencyLevel {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "routine" => Ok(Self::Routine),
            "urgent" => Ok(Self::Urgent),
            "emergency" => Ok(Self::Emergency),
            _ => Err(ModelError::InvalidEnum {
                field: "UrgencyLevel".into(),
                value: s.into(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Clinical significance
// ---------------------------------------------------------------------------

/// Significance tag carried by patterns, entities, relationships and syndromes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClinicalSignificance {
    Low,
    Moderate,
    Urgent,
    Emergency,
}

impl ClinicalSignificance {
    /// Numeric weight used in priority scoring and hypothesis ranking.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Low => 0.25,
            Self::Moderate => 0.5,
            Self::Urgent => 0.75,
            Self::Emergency => 1.0,
        }
    }

    /// Urgency implied by a signal carrying this significance.
    pub fn urgency(&self) -> UrgencyLevel {
        match self {
            Self::Emergency => UrgencyLevel::Emergency,
            Self::Urgent => UrgencyLevel::Urgent,
            Self::Moderate | Self::Low => UrgencyLevel::Routine,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::Urgent => "urgent",
            Self::Emergency => "emergency",
        }
    }
}

// ---------------------------------------------------------------------------
// Interview stage
// ---------------------------------------------------------------------------

/// Stage of the structured intake interview.
///
/// Declaration order is the forward order of the interview; the derived `Ord`
/// is what the state machine uses to forbid backward transitions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum InterviewStage {
    #[default]
    Greeting,
    ChiefComplaint,
    HistoryPresentIllness,
    ReviewOfSystems,
    PastMedicalHistory,
    MedicationsAllergies,
    SocialFamilyHistory,
    RiskAssessment,
    DifferentialDiagnosis,
    Completed,
}

impl InterviewStage {
    pub const ALL: [InterviewStage; 10] = [
        Self::Greeting,
        Self::ChiefComplaint,
        Self::HistoryPresentIllness,
        Self::ReviewOfSystems,
        Self::PastMedicalHistory,
        Self::MedicationsAllergies,
        Self::SocialFamilyHistory,
        Self::RiskAssessment,
        Self::DifferentialDiagnosis,
        Self::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::ChiefComplaint => "chief_complaint",
            Self::HistoryPresentIllness => "history_present_illness",
            Self::ReviewOfSystems => "review_of_systems",
            Self::PastMedicalHistory => "past_medical_history",
            Self::MedicationsAllergies => "medications_allergies",
            Self::SocialFamilyHistory => "social_family_history",
            Self::RiskAssessment => "risk_assessment",
            Self::DifferentialDiagnosis => "differential_diagnosis",
            Self::Completed => "completed",
        }
    }

    /// The next stage on the normal path. `Completed` is terminal.
    pub fn next(&self) -> Self {
        match self {
            Self::Greeting => Self::ChiefComplaint,
            Self::ChiefComplaint => Self::HistoryPresentIllness,
            Self::HistoryPresentIllness => Self::ReviewOfSystems,
            Self::ReviewOfSystems => Self::PastMedicalHistory,
            Self::PastMedicalHistory => Self::MedicationsAllergies,
            Self::MedicationsAllergies => Self::SocialFamilyHistory,
            Self::SocialFamilyHistory => Self::RiskAssessment,
            Self::RiskAssessment => Self::DifferentialDiagnosis,
            Self::DifferentialDiagnosis => Self::Completed,
            Self::Completed => Self::Completed,
        }
    }

    /// Stages whose completeness is derived from what the patient volunteers,
    /// as opposed to stages that record the answer to a question asked in them.
    pub fn is_content_driven(&self) -> bool {
        matches!(
            self,
            Self::Greeting | Self::ChiefComplaint | Self::HistoryPresentIllness
        )
    }

    pub fn is_terminal(&self) -> bool {
        *self == Self::Completed
    }
}

impl std::fmt::Display for InterviewStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

str_enum!(
    /// Patient sex as volunteered at session start.
    Sex {
        Female => "female",
        Male => "male",
        Other => "other",
    }
);

str_enum!(
    /// Role of a transcript entry.
    TurnRole {
        Patient => "patient",
        Engine => "engine",
    }
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn urgency_ordering() {
        assert!(UrgencyLevel::Routine < UrgencyLevel::Urgent);
        assert!(UrgencyLevel::Urgent < UrgencyLevel::Emergency);
        assert_eq!(
            UrgencyLevel::Routine.max(UrgencyLevel::Emergency),
            UrgencyLevel::Emergency
        );
    }

    #[test]
    fn stage_order_matches_next() {
        for pair in InterviewStage::ALL.windows(2) {
            assert_eq!(pair[0].next(), pair[1]);
            assert!(pair[0] < pair[1]);
        }
        assert_eq!(InterviewStage::Completed.next(), InterviewStage::Completed);
    }

    #[test]
    fn stage_serializes_snake_case() {
        let json = serde_json::to_string(&InterviewStage::HistoryPresentIllness).unwrap();
        assert_eq!(json, "\"history_present_illness\"");
    }

    #[test]
    fn significance_maps_to_urgency() {
        assert_eq!(ClinicalSignificance::Emergency.urgency(), UrgencyLevel::Emergency);
        assert_eq!(ClinicalSignificance::Urgent.urgency(), UrgencyLevel::Urgent);
        assert_eq!(ClinicalSignificance::Moderate.urgency(), UrgencyLevel::Routine);
    }

    #[test]
    fn str_enum_roundtrip_and_rejects_unknown() {
        assert_eq!(Sex::from_str("female").unwrap(), Sex::Female);
        assert!(Sex::from_str("unknown").is_err());
        assert_eq!(UrgencyLevel::from_str("urgent").unwrap(), UrgencyLevel::Urgent);
    }
}
