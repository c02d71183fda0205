//! Onboarding data models.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Which applicant the wizard is onboarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingType {
    Client,
    Coach,
}

impl OnboardingType {
    /// Where the frontend lands after a successful submission.
    pub fn dashboard_route(&self) -> &'static str {
        match self {
            Self::Client => "/client/dashboard",
            Self::Coach => "/coach/portal",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Coach => "coach",
        }
    }
}

impl std::fmt::Display for OnboardingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OnboardingType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Self::Client),
            "coach" => Ok(Self::Coach),
            other => Err(format!("unknown onboarding type: {other}")),
        }
    }
}

/// Every field collected across the wizard, keyed by camelCase field name.
///
/// Fields are only ever added or overwritten; navigation never drops them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OnboardingData(Map<String, Value>);

impl OnboardingData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shallow merge, last write wins. Returns the keys whose value changed.
    pub fn merge(&mut self, partial: Map<String, Value>) -> Vec<String> {
        let mut changed = Vec::new();
        for (key, value) in partial {
            if self.0.get(&key) != Some(&value) {
                changed.push(key.clone());
                self.0.insert(key, value);
            }
        }
        changed
    }

    /// Set a single field. Returns whether the stored value changed.
    pub fn set(&mut self, field: &str, value: Value) -> bool {
        let mut partial = Map::new();
        partial.insert(field.to_string(), value);
        !self.merge(partial).is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// String entries of an array field (non-strings are skipped).
    pub fn selections(&self, field: &str) -> Vec<String> {
        self.0
            .get(field)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drop everything (after a successful submission).
    pub fn clear(&mut self) {
        self.0.clear();
    }
}

impl From<Map<String, Value>> for OnboardingData {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// A field write that was not stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IgnoredField {
    pub field: String,
    pub reason: String,
}

/// Result of `update_data`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeOutcome {
    /// Fields whose stored value changed.
    pub changed: Vec<String>,
    /// Writes dropped because they break a hard limit (e.g. selection cap).
    pub ignored: Vec<IgnoredField>,
}

/// Result of toggling one option in a multi-select field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SelectionOutcome {
    Added,
    Removed,
    /// The selection was not stored.
    Rejected { reason: String },
}
