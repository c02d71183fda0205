//! Read-only review summary rendered before submission.

use serde::Serialize;
use serde_json::Value;

use super::catalog::{Choice, label_for};
use super::model::{OnboardingData, OnboardingType};
use super::rules::{FieldRule, is_empty};
use super::steps::Flow;

/// Fields shown only by their last four digits.
const MASKED_FIELDS: &[&str] = &["accountNumber", "routingNumber"];

const NOT_PROVIDED: &str = "Not provided";

/// One line of the summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewEntry {
    pub field: &'static str,
    pub label: &'static str,
    pub display: String,
}

/// Everything one step collected. `index` is the edit-link target.
#[derive(Debug, Clone, Serialize)]
pub struct ReviewSection {
    pub index: usize,
    pub step: &'static str,
    pub title: &'static str,
    pub entries: Vec<ReviewEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewSummary {
    pub onboarding_type: OnboardingType,
    pub sections: Vec<ReviewSection>,
    /// The record exactly as it will be submitted.
    pub data: OnboardingData,
}

impl ReviewSummary {
    pub fn build(flow: &Flow, data: &OnboardingData) -> Self {
        let sections = flow
            .steps
            .iter()
            .enumerate()
            .filter(|(_, step)| !step.is_review())
            .map(|(index, step)| ReviewSection {
                index,
                step: step.id,
                title: step.title,
                entries: step
                    .schema
                    .fields
                    .iter()
                    .filter(|rule| rule.applies(data.as_map()))
                    .map(|rule| ReviewEntry {
                        field: rule.field,
                        label: rule.label,
                        display: display_value(rule, data.get(rule.field)),
                    })
                    .collect(),
            })
            .collect();

        Self {
            onboarding_type: flow.kind,
            sections,
            data: data.clone(),
        }
    }

    pub fn section(&self, step: &str) -> Option<&ReviewSection> {
        self.sections.iter().find(|s| s.step == step)
    }

    pub fn entry(&self, field: &str) -> Option<&ReviewEntry> {
        self.sections
            .iter()
            .flat_map(|s| s.entries.iter())
            .find(|e| e.field == field)
    }
}

fn display_value(rule: &FieldRule, value: Option<&Value>) -> String {
    if is_empty(value) {
        return NOT_PROVIDED.to_string();
    }
    let Some(value) = value else {
        return NOT_PROVIDED.to_string();
    };

    if MASKED_FIELDS.contains(&rule.field) {
        return mask(&scalar(value));
    }

    let choices = rule.choices();
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| option_label(choices, item))
            .collect::<Vec<_>>()
            .join(", "),
        other => option_label(choices, other),
    }
}

fn option_label(choices: Option<&'static [Choice]>, value: &Value) -> String {
    match (choices, value.as_str()) {
        (Some(choices), Some(id)) => label_for(choices, id)
            .map(String::from)
            .unwrap_or_else(|| id.to_string()),
        _ => scalar(value),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::Bool(true) => "Yes".to_string(),
        Value::Bool(false) => "No".to_string(),
        Value::String(s) => s.trim().to_string(),
        Value::Null => NOT_PROVIDED.to_string(),
        other => other.to_string(),
    }
}

/// `000123456789` → `••••••••6789`
fn mask(raw: &str) -> String {
    let digits: Vec<char> = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let keep = digits.len().min(4);
    let hidden = digits.len() - keep;
    let mut out = "•".repeat(hidden);
    out.extend(&digits[hidden..]);
    out
}
