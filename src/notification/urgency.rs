//! Urgency classification for notifications
//!
//! The urgency level decides which channels receive a message:
//! - HIGH: the print finished and the plate needs attention
//! - MEDIUM: a job started or the bed has cooled down
//! - LOW: periodic progress and cooldown reports

use crate::watcher::TransitionKind;

/// Urgency level for notifications
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    High,
    Medium,
    #[default]
    Low,
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Urgency::High => "HIGH",
            Urgency::Medium => "MEDIUM",
            Urgency::Low => "LOW",
        }
    }

    /// Classify urgency from the lifecycle transition
    pub fn for_transition(kind: TransitionKind) -> Urgency {
        match kind {
            TransitionKind::JobEnded => Urgency::High,
            TransitionKind::JobStarted | TransitionKind::CooldownEnded => Urgency::Medium,
            TransitionKind::SteadyPrinting | TransitionKind::Cooldown | TransitionKind::NoEvent => {
                Urgency::Low
            }
        }
    }
}
