//! Cluster-api style conditions carried in object status.

use chrono::Utc;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Summary condition computed from the other conditions of an object.
pub const READY_CONDITION: &str = "Ready";

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// Severity only makes sense for a condition whose status is `False`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, JsonSchema)]
pub enum ConditionSeverity {
    Error,
    Warning,
    Info,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<ConditionSeverity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<Time>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

impl Condition {
    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={:?}", self.type_, self.status)?;
        if !self.reason.is_empty() {
            write!(f, " ({})", self.reason)?;
        }
        Ok(())
    }
}

pub fn get<'a>(conditions: &'a [Condition], type_: &str) -> Option<&'a Condition> {
    conditions.iter().find(|c| c.type_ == type_)
}

pub fn is_true(conditions: &[Condition], type_: &str) -> bool {
    get(conditions, type_).map(Condition::is_true).unwrap_or(false)
}

/// Insert or replace a condition. The transition time is kept when the status
/// did not change.
pub fn set(conditions: &mut Vec<Condition>, mut condition: Condition) {
    match conditions.iter_mut().find(|c| c.type_ == condition.type_) {
        Some(existing) => {
            if existing.status == condition.status {
                condition.last_transition_time = existing.last_transition_time.clone();
            } else {
                condition.last_transition_time = Some(Time(Utc::now()));
            }
            *existing = condition;
        }
        None => {
            condition.last_transition_time = Some(Time(Utc::now()));
            conditions.push(condition);
        }
    }
}

pub fn mark_true(conditions: &mut Vec<Condition>, type_: &str) {
    set(
        conditions,
        Condition {
            type_: type_.to_owned(),
            status: ConditionStatus::True,
            severity: None,
            last_transition_time: None,
            reason: String::new(),
            message: String::new(),
        },
    )
}

pub fn mark_false(
    conditions: &mut Vec<Condition>,
    type_: &str,
    reason: impl Into<String>,
    severity: ConditionSeverity,
    message: impl Into<String>,
) {
    set(
        conditions,
        Condition {
            type_: type_.to_owned(),
            status: ConditionStatus::False,
            severity: Some(severity),
            last_transition_time: None,
            reason: reason.into(),
            message: message.into(),
        },
    )
}

/// Set the `Ready` condition from `types`: true when all of them are true,
/// otherwise a copy of the first one that is not.
pub fn set_summary(conditions: &mut Vec<Condition>, types: &[&str]) {
    let failing = types
        .iter()
        .find(|t| !is_true(conditions, t))
        .map(|t| get(conditions, t).cloned());
    match failing {
        None => mark_true(conditions, READY_CONDITION),
        Some(Some(c)) => mark_false(
            conditions,
            READY_CONDITION,
            c.reason,
            c.severity.unwrap_or(ConditionSeverity::Info),
            c.message,
        ),
        Some(None) => set(
            conditions,
            Condition {
                type_: READY_CONDITION.to_owned(),
                status: ConditionStatus::Unknown,
                severity: None,
                last_transition_time: None,
                reason: String::new(),
                message: String::new(),
            },
        ),
    }
}
