//! # SecurityConfig Status
//!
//! Status types for tracking reconciliation state and conditions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of the SecurityConfig resource
///
/// Written exclusively by the operator; never read back as resolver input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecurityConfigStatus {
    /// Generation of the spec this status was computed from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
    /// Top-level condition first, then one per owned resource
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Current phase of reconciliation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    /// Human-readable description of the phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub ready: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum Phase {
    Pending,
    Ready,
    Failed,
    Invalid,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Pending => "Pending",
            Phase::Ready => "Ready",
            Phase::Failed => "Failed",
            Phase::Invalid => "Invalid",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// Condition represents a condition of a resource
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Type of condition, unique within the list
    pub r#type: String,
    pub status: ConditionStatus,
    pub reason: String,
    #[serde(default)]
    pub message: String,
    /// Last time `status` changed (RFC3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,
}

impl SecurityConfigStatus {
    /// Status a pass starts from before anything has been converged
    #[must_use]
    pub fn initial(generation: Option<i64>, previous: Option<&SecurityConfigStatus>) -> Self {
        Self {
            observed_generation: generation,
            conditions: previous.map(|s| s.conditions.clone()).unwrap_or_default(),
            phase: Some(Phase::Pending),
            message: None,
            ready: false,
        }
    }

    pub fn set_phase(&mut self, phase: Phase, message: impl Into<String>) {
        self.phase = Some(phase);
        self.ready = phase == Phase::Ready;
        self.message = Some(message.into());
    }

    /// Compare ignoring `lastTransitionTime`
    #[must_use]
    pub fn semantically_equal(&self, other: &SecurityConfigStatus) -> bool {
        let strip = |s: &SecurityConfigStatus| {
            let mut s = s.clone();
            for c in &mut s.conditions {
                c.last_transition_time = None;
            }
            s
        };
        strip(self) == strip(other)
    }

    #[must_use]
    pub fn condition(&self, type_: &str) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.r#type == type_)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn condition(type_: &str, ltt: Option<&str>) -> Condition {
        Condition {
            r#type: type_.to_string(),
            status: ConditionStatus::True,
            reason: "Success".to_string(),
            message: "ok".to_string(),
            last_transition_time: ltt.map(str::to_string),
            observed_generation: Some(1),
        }
    }

    #[test]
    fn test_semantic_equality_ignores_transition_time() {
        let mut a = SecurityConfigStatus::initial(Some(1), None);
        a.set_phase(Phase::Ready, "SecurityConfig ready.");
        let mut b = a.clone();
        a.conditions.push(condition("Jwker-app", Some("2025-01-01T00:00:00Z")));
        b.conditions.push(condition("Jwker-app", Some("2026-01-01T00:00:00Z")));
        assert!(a.semantically_equal(&b));

        b.conditions[0].reason = "Error".to_string();
        assert!(!a.semantically_equal(&b));
    }

    #[test]
    fn test_set_phase_tracks_ready() {
        let mut status = SecurityConfigStatus::initial(Some(3), None);
        assert_eq!(status.phase, Some(Phase::Pending));
        assert!(!status.ready);
        status.set_phase(Phase::Ready, "SecurityConfig ready.");
        assert!(status.ready);
        status.set_phase(Phase::Failed, "SecurityConfig reconciliation failed.");
        assert!(!status.ready);
    }

    #[test]
    fn test_status_serializes_camel_case() {
        let mut status = SecurityConfigStatus::initial(Some(2), None);
        status.conditions.push(condition("SecurityConfig-x", None));
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["observedGeneration"], 2);
        assert_eq!(json["phase"], "Pending");
        assert_eq!(json["conditions"][0]["type"], "SecurityConfig-x");
        assert_eq!(json["conditions"][0]["status"], "True");
    }
}
