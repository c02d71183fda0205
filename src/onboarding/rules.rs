//! Declarative field validation for wizard steps.
//!
//! Each step owns a `StepSchema`: one `FieldRule` per field it collects. A
//! field rule carries an ordered list of `Rule`s and an optional `Condition`
//! that gates the whole rule (e.g. bank details only matter for direct
//! deposit). The same evaluator runs for every step, both when the step
//! reports its validity and again as the final gate before submission.
//!
//! Empty values (missing, `null`, blank strings, empty arrays) are handled
//! once up front: a field with a presence rule (`Required`, `Checked`,
//! `Count { min > 0 }`, `ContainsAll`) fails, any other field is treated as
//! optional and its format rules are skipped.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::catalog::Choice;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap());

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9\s\-().]{7,20}$").unwrap());

/// A single check applied to a field's value.
#[derive(Debug, Clone)]
pub enum Rule {
    /// Value must be present and non-empty.
    Required,
    /// String in `local@domain.tld` form.
    Email,
    /// Phone number with 10–15 digits.
    Phone,
    /// String of ASCII digits whose length is within `[min, max]`.
    Digits { min: usize, max: usize },
    /// Trimmed string of at least this many characters.
    MinLength(usize),
    /// Single choice from a catalog.
    OneOf(&'static [Choice]),
    /// Array whose every element is a catalog id.
    SubsetOf(&'static [Choice]),
    /// Array whose length is within `[min, max]`.
    Count { min: usize, max: usize },
    /// Number (or numeric string) within `[min, max]`.
    NumberRange { min: f64, max: f64 },
    /// Boolean `true` (checkbox ticked).
    Checked,
    /// Array containing every listed id.
    ContainsAll(&'static [&'static str]),
}

impl Rule {
    fn demands_presence(&self) -> bool {
        match self {
            Rule::Required | Rule::Checked | Rule::ContainsAll(_) => true,
            Rule::Count { min, .. } => *min > 0,
            _ => false,
        }
    }

    /// Message used when the field is empty but this rule demands a value.
    fn missing_message(&self, label: &str) -> String {
        match self {
            Rule::Checked => format!("{label} must be accepted"),
            Rule::Count { min, max } => count_message(label, *min, *max),
            Rule::ContainsAll(_) => format!("{label}: all required items must be acknowledged"),
            _ => format!("{label} is required"),
        }
    }

    /// Check a non-empty value. Returns an error message on failure.
    fn check(&self, label: &str, value: &Value) -> Option<String> {
        match self {
            Rule::Required => None,
            Rule::Email => match value.as_str() {
                Some(s) if EMAIL_RE.is_match(s.trim()) => None,
                _ => Some(format!("{label} must be a valid email address")),
            },
            Rule::Phone => match value.as_str() {
                Some(s) if is_phone(s.trim()) => None,
                _ => Some(format!("{label} must be a valid phone number")),
            },
            Rule::Digits { min, max } => match value.as_str().map(str::trim) {
                Some(s)
                    if s.chars().all(|c| c.is_ascii_digit())
                        && (*min..=*max).contains(&s.len()) =>
                {
                    None
                }
                _ if min == max => Some(format!("{label} must be exactly {min} digits")),
                _ => Some(format!("{label} must be {min}-{max} digits")),
            },
            Rule::MinLength(n) => match value.as_str() {
                Some(s) if s.trim().chars().count() >= *n => None,
                _ => Some(format!("{label} must be at least {n} characters")),
            },
            Rule::OneOf(choices) => match value.as_str() {
                Some(s) if choices.iter().any(|c| c.id == s) => None,
                _ => Some(format!("{label} must be one of the listed options")),
            },
            Rule::SubsetOf(choices) => match value.as_array() {
                Some(items) if has_repeats(items) => {
                    Some(format!("{label} lists an option more than once"))
                }
                Some(items)
                    if items.iter().all(|item| {
                        item.as_str()
                            .is_some_and(|s| choices.iter().any(|c| c.id == s))
                    }) =>
                {
                    None
                }
                _ => Some(format!("{label} contains an unknown option")),
            },
            Rule::Count { min, max } => match value.as_array() {
                Some(items) if (*min..=*max).contains(&items.len()) => None,
                _ => Some(count_message(label, *min, *max)),
            },
            Rule::NumberRange { min, max } => match as_number(value) {
                Some(n) if n >= *min && n <= *max => None,
                _ => Some(format!("{label} must be a number between {min} and {max}")),
            },
            Rule::Checked => match value.as_bool() {
                Some(true) => None,
                _ => Some(format!("{label} must be accepted")),
            },
            Rule::ContainsAll(ids) => {
                let present: Vec<&str> = value
                    .as_array()
                    .map(|items| items.iter().filter_map(Value::as_str).collect())
                    .unwrap_or_default();
                let missing: Vec<&str> = ids
                    .iter()
                    .copied()
                    .filter(|id| !present.contains(id))
                    .collect();
                (!missing.is_empty())
                    .then(|| format!("{label}: still to acknowledge {}", missing.join(", ")))
            }
        }
    }
}

fn count_message(label: &str, min: usize, max: usize) -> String {
    if min == max {
        format!("{label}: select exactly {min}")
    } else if max == usize::MAX {
        format!("{label}: select at least {min}")
    } else {
        format!("{label}: select between {min} and {max}")
    }
}

fn has_repeats(items: &[Value]) -> bool {
    items
        .iter()
        .enumerate()
        .any(|(i, item)| items[..i].contains(item))
}

fn is_phone(s: &str) -> bool {
    let digits = s.chars().filter(|c| c.is_ascii_digit()).count();
    PHONE_RE.is_match(s) && (10..=15).contains(&digits)
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Whether a value counts as "not filled in".
pub fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
        Some(_) => false,
    }
}

/// Gate that decides whether a field rule applies at all.
#[derive(Debug, Clone)]
pub enum Condition {
    /// Another field holds exactly this string.
    Equals(&'static str, &'static str),
}

impl Condition {
    pub fn holds(&self, data: &Map<String, Value>) -> bool {
        match self {
            Condition::Equals(field, expected) => {
                data.get(*field).and_then(Value::as_str) == Some(*expected)
            }
        }
    }
}

/// Validation rules for one field.
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub field: &'static str,
    pub label: &'static str,
    pub rules: Vec<Rule>,
    pub when: Option<Condition>,
}

impl FieldRule {
    pub fn new(field: &'static str, label: &'static str) -> Self {
        Self {
            field,
            label,
            rules: Vec::new(),
            when: None,
        }
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.when = Some(condition);
        self
    }

    /// Upper bound on the number of selections, if the field is a capped
    /// multi-select.
    pub fn max_count(&self) -> Option<usize> {
        self.rules.iter().find_map(|r| match r {
            Rule::Count { max, .. } if *max != usize::MAX => Some(*max),
            _ => None,
        })
    }

    /// Why a bulk write to this field must not be stored: a list longer
    /// than the selection cap, or one that repeats an option.
    pub fn unstorable_selection(&self, value: &Value) -> Option<String> {
        let items = value.as_array()?;
        if let Some(max) = self.max_count().filter(|max| items.len() > *max) {
            return Some(format!("at most {max} selections allowed"));
        }
        if self.is_multi_select() && has_repeats(items) {
            return Some("an option is selected more than once".to_string());
        }
        None
    }

    /// Catalog backing a choice field.
    pub fn choices(&self) -> Option<&'static [Choice]> {
        self.rules.iter().find_map(|r| match r {
            Rule::OneOf(c) | Rule::SubsetOf(c) => Some(*c),
            _ => None,
        })
    }

    /// Whether the field takes a list of selections.
    pub fn is_multi_select(&self) -> bool {
        self.rules
            .iter()
            .any(|r| matches!(r, Rule::SubsetOf(_) | Rule::Count { .. } | Rule::ContainsAll(_)))
    }

    /// Whether the field is in play for `data` (its condition, if any, holds).
    pub fn applies(&self, data: &Map<String, Value>) -> bool {
        self.when.as_ref().is_none_or(|c| c.holds(data))
    }

    /// Evaluate against the full record. Returns the first failure.
    pub fn evaluate(&self, data: &Map<String, Value>) -> Option<FieldError> {
        if let Some(ref cond) = self.when {
            if !cond.holds(data) {
                return None;
            }
        }

        let value = data.get(self.field);
        let message = if is_empty(value) {
            self.rules
                .iter()
                .find(|r| r.demands_presence())
                .map(|r| r.missing_message(self.label))
        } else {
            let value = value?;
            self.rules.iter().find_map(|r| r.check(self.label, value))
        };

        message.map(|message| FieldError {
            field: self.field.to_string(),
            message,
        })
    }
}

/// A failed field check, returned to the caller for inline display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Outcome of evaluating a schema.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<FieldError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error_for(&self, field: &str) -> Option<&FieldError> {
        self.errors.iter().find(|e| e.field == field)
    }
}

/// The complete rule set for one step.
#[derive(Debug, Clone, Default)]
pub struct StepSchema {
    pub fields: Vec<FieldRule>,
}

impl StepSchema {
    pub fn new(fields: Vec<FieldRule>) -> Self {
        Self { fields }
    }

    pub fn evaluate(&self, data: &Map<String, Value>) -> ValidationReport {
        ValidationReport {
            errors: self.fields.iter().filter_map(|f| f.evaluate(data)).collect(),
        }
    }

    /// Whether this step collects `field`, directly or as a condition input.
    pub fn depends_on(&self, field: &str) -> bool {
        self.fields.iter().any(|f| {
            f.field == field || matches!(f.when, Some(Condition::Equals(dep, _)) if dep == field)
        })
    }

    pub fn field(&self, field: &str) -> Option<&FieldRule> {
        self.fields.iter().find(|f| f.field == field)
    }
}
