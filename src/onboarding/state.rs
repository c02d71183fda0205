//! Wizard state machine: tracks the active step, per-step validity, and the
//! submission lifecycle for one onboarding session.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{NavigationError, SessionError, SubmitError};

use super::model::{
    IgnoredField, MergeOutcome, OnboardingData, OnboardingType, SelectionOutcome,
};
use super::rules::{FieldError, ValidationReport};
use super::steps::{Flow, StepInfo};
use super::submission::Application;

/// User-facing message for any failed submission attempt.
pub const SUBMISSION_FAILED: &str = "Submission failed";

/// Lifecycle of a wizard.
///
/// InProgress → Submitting → Submitted, with Submitting → InProgress when
/// the submission collaborator fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStatus {
    InProgress,
    Submitting,
    Submitted,
}

impl WizardStatus {
    pub fn can_transition_to(&self, target: WizardStatus) -> bool {
        use WizardStatus::*;
        matches!(
            (self, target),
            (InProgress, Submitting) | (Submitting, InProgress) | (Submitting, Submitted)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Submitted)
    }
}

impl Default for WizardStatus {
    fn default() -> Self {
        Self::InProgress
    }
}

impl std::fmt::Display for WizardStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InProgress => "in_progress",
            Self::Submitting => "submitting",
            Self::Submitted => "submitted",
        };
        write!(f, "{s}")
    }
}

/// One onboarding session.
#[derive(Debug, Clone)]
pub struct Wizard {
    id: Uuid,
    flow: Arc<Flow>,
    current: usize,
    data: OnboardingData,
    /// Last computed validity, one entry per step.
    validity: Vec<bool>,
    status: WizardStatus,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Wizard {
    pub fn new(flow: Arc<Flow>) -> Self {
        Self::with_id(Uuid::new_v4(), flow)
    }

    pub fn with_id(id: Uuid, flow: Arc<Flow>) -> Self {
        let now = Utc::now();
        let mut wizard = Self {
            id,
            validity: vec![false; flow.len()],
            flow,
            current: 0,
            data: OnboardingData::new(),
            status: WizardStatus::InProgress,
            last_error: None,
            created_at: now,
            updated_at: now,
        };
        wizard.revalidate_all();
        wizard
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> OnboardingType {
        self.flow.kind
    }

    pub fn flow(&self) -> &Flow {
        &self.flow
    }

    pub fn current_step(&self) -> usize {
        self.current
    }

    pub fn status(&self) -> WizardStatus {
        self.status
    }

    pub fn data(&self) -> &OnboardingData {
        &self.data
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Last computed validity of step `index`.
    pub fn is_step_valid(&self, index: usize) -> bool {
        self.validity.get(index).copied().unwrap_or(false)
    }

    /// Whether the Next control is enabled.
    pub fn can_advance(&self) -> bool {
        self.status == WizardStatus::InProgress
            && self.is_step_valid(self.current)
            && self.current < self.flow.last_index()
    }

    pub fn is_on_review(&self) -> bool {
        self.flow
            .step(self.current)
            .is_some_and(|s| s.is_review())
    }

    /// Evaluate step `index` against current data without recording it.
    pub fn report(&self, index: usize) -> ValidationReport {
        self.flow
            .step(index)
            .map(|s| s.schema.evaluate(self.data.as_map()))
            .unwrap_or_default()
    }

    fn revalidate(&mut self, index: usize) -> bool {
        let valid = self.report(index).is_valid();
        if let Some(slot) = self.validity.get_mut(index) {
            *slot = valid;
        }
        valid
    }

    fn revalidate_all(&mut self) {
        for index in 0..self.flow.len() {
            self.revalidate(index);
        }
    }

    /// Re-run the schema of every step that reads one of `fields`.
    fn revalidate_touched(&mut self, fields: &[String]) {
        let touched: Vec<usize> = self
            .flow
            .steps
            .iter()
            .enumerate()
            .filter(|(_, s)| fields.iter().any(|f| s.schema.depends_on(f)))
            .map(|(i, _)| i)
            .collect();
        for index in touched {
            let valid = self.revalidate(index);
            debug!(
                session_id = %self.id,
                step = self.flow.steps[index].id,
                valid,
                "Step validity recomputed"
            );
        }
    }

    fn ensure_editable(&self) -> Result<(), SessionError> {
        match self.status {
            WizardStatus::InProgress => Ok(()),
            other => Err(SessionError::ReadOnly {
                state: other.to_string(),
            }),
        }
    }

    fn ensure_navigable(&self) -> Result<(), NavigationError> {
        match self.status {
            WizardStatus::InProgress => Ok(()),
            other => Err(NavigationError::Closed {
                state: other.to_string(),
            }),
        }
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Shallow-merge `partial` into the collected data.
    ///
    /// Multi-select writes longer than the field's cap, or that repeat an
    /// option, are not stored and come back in `MergeOutcome::ignored`.
    pub fn update_data(
        &mut self,
        partial: Map<String, Value>,
    ) -> Result<MergeOutcome, SessionError> {
        self.ensure_editable()?;

        let mut accepted = Map::new();
        let mut ignored = Vec::new();
        for (field, value) in partial {
            let reason = self
                .flow
                .field_rule(&field)
                .and_then(|rule| rule.unstorable_selection(&value));
            match reason {
                Some(reason) => {
                    warn!(
                        session_id = %self.id,
                        field = %field,
                        reason = %reason,
                        "Ignoring multi-select write"
                    );
                    ignored.push(IgnoredField { field, reason });
                }
                None => {
                    accepted.insert(field, value);
                }
            }
        }

        let changed = self.data.merge(accepted);
        if !changed.is_empty() {
            self.revalidate_touched(&changed);
        }
        self.touch();
        debug!(session_id = %self.id, changed = ?changed, "Onboarding data merged");

        Ok(MergeOutcome { changed, ignored })
    }

    /// Add `option` to a multi-select field, or remove it if already chosen.
    pub fn toggle_selection(
        &mut self,
        field: &str,
        option: &str,
    ) -> Result<SelectionOutcome, SessionError> {
        self.ensure_editable()?;

        let rule = self
            .flow
            .field_rule(field)
            .filter(|r| r.is_multi_select())
            .ok_or_else(|| SessionError::UnknownField {
                field: field.to_string(),
                kind: self.kind().to_string(),
            })?;

        if let Some(choices) = rule.choices() {
            if !choices.iter().any(|c| c.id == option) {
                return Ok(SelectionOutcome::Rejected {
                    reason: format!("unknown option {option}"),
                });
            }
        }
        let cap = rule.max_count();

        let mut selected = self.data.selections(field);
        let outcome = if let Some(pos) = selected.iter().position(|s| s == option) {
            selected.remove(pos);
            SelectionOutcome::Removed
        } else if cap.is_some_and(|max| selected.len() >= max) {
            return Ok(SelectionOutcome::Rejected {
                reason: format!("at most {} selections allowed", cap.unwrap_or_default()),
            });
        } else {
            selected.push(option.to_string());
            SelectionOutcome::Added
        };

        let mut partial = Map::new();
        partial.insert(field.to_string(), Value::from(selected));
        self.update_data(partial)?;
        Ok(outcome)
    }

    /// Advance by one. Blocked while the current step is invalid; clamped
    /// at the last step.
    pub fn next_step(&mut self) -> Result<usize, NavigationError> {
        self.ensure_navigable()?;

        let report = self.report(self.current);
        self.validity[self.current] = report.is_valid();
        if !report.is_valid() {
            let step = self.flow.steps[self.current].id;
            warn!(session_id = %self.id, step, errors = report.errors.len(), "Next blocked");
            return Err(NavigationError::StepInvalid {
                step: step.to_string(),
                index: self.current,
                errors: report.errors,
            });
        }

        if self.current < self.flow.last_index() {
            self.current += 1;
            self.revalidate(self.current);
            info!(
                session_id = %self.id,
                step = self.flow.steps[self.current].id,
                index = self.current,
                "Advanced to step"
            );
        }
        self.touch();
        Ok(self.current)
    }

    /// Go back by one, clamped at the first step. No validity check.
    pub fn previous_step(&mut self) -> Result<usize, NavigationError> {
        self.ensure_navigable()?;
        self.current = self.current.saturating_sub(1);
        self.revalidate(self.current);
        self.touch();
        Ok(self.current)
    }

    /// Jump directly to step `index`.
    ///
    /// Backward jumps are always allowed. Forward jumps require every step
    /// before the target to validate against current data. The target is
    /// re-validated on entry either way.
    pub fn go_to_step(&mut self, index: usize) -> Result<usize, NavigationError> {
        self.ensure_navigable()?;

        if index >= self.flow.len() {
            return Err(NavigationError::OutOfRange {
                index,
                len: self.flow.len(),
            });
        }

        if index > self.current {
            for i in 0..index {
                let report = self.report(i);
                self.validity[i] = report.is_valid();
                if !report.is_valid() {
                    return Err(NavigationError::StepInvalid {
                        step: self.flow.steps[i].id.to_string(),
                        index: i,
                        errors: report.errors,
                    });
                }
            }
        }

        self.current = index;
        self.revalidate(index);
        self.touch();
        info!(
            session_id = %self.id,
            step = self.flow.steps[index].id,
            index,
            "Jumped to step"
        );
        Ok(index)
    }

    /// Enter `Submitting` after re-validating every step.
    ///
    /// Returns the application to hand to the submission collaborator.
    pub fn begin_submission(&mut self) -> Result<Application, SubmitError> {
        match self.status {
            WizardStatus::Submitting => return Err(SubmitError::AlreadySubmitting),
            WizardStatus::Submitted => return Err(SubmitError::AlreadySubmitted),
            WizardStatus::InProgress => {}
        }
        if !self.is_on_review() {
            return Err(SubmitError::NotOnReviewStep {
                current: self.current,
            });
        }

        self.revalidate_all();
        if let Some(index) = self.validity.iter().position(|v| !v) {
            let report = self.report(index);
            let step = self.flow.steps[index].id;
            warn!(session_id = %self.id, step, "Final gate failed");
            return Err(SubmitError::Incomplete {
                step: step.to_string(),
                index,
                errors: report.errors,
            });
        }

        self.set_status(WizardStatus::Submitting);
        self.last_error = None;
        Ok(Application {
            id: self.id,
            onboarding_type: self.kind(),
            data: self.data.clone(),
            submitted_at: Utc::now(),
        })
    }

    /// Submission succeeded: discard the in-memory data and return the
    /// redirect route.
    pub fn complete_submission(&mut self) -> &'static str {
        self.set_status(WizardStatus::Submitted);
        self.data.clear();
        self.touch();
        info!(session_id = %self.id, kind = %self.kind(), "Onboarding submitted");
        self.kind().dashboard_route()
    }

    /// Submission failed: stay on the review step with data intact.
    pub fn fail_submission(&mut self) {
        self.set_status(WizardStatus::InProgress);
        self.last_error = Some(SUBMISSION_FAILED.to_string());
        self.touch();
    }

    fn set_status(&mut self, target: WizardStatus) {
        if !self.status.can_transition_to(target) {
            warn!(
                session_id = %self.id,
                from = %self.status,
                to = %target,
                "Unexpected wizard status transition"
            );
        }
        self.status = target;
    }

    pub fn snapshot(&self) -> WizardSnapshot {
        let report = self.report(self.current);
        WizardSnapshot {
            id: self.id,
            onboarding_type: self.kind(),
            status: self.status,
            current_step: self.current,
            step: self.flow.steps[self.current].info(self.current),
            steps: self
                .flow
                .steps
                .iter()
                .enumerate()
                .map(|(i, s)| StepState {
                    index: i,
                    id: s.id,
                    title: s.title,
                    valid: self.is_step_valid(i),
                })
                .collect(),
            can_go_next: self.can_advance(),
            can_go_back: self.status == WizardStatus::InProgress && self.current > 0,
            errors: report.errors,
            data: self.data.clone(),
            last_error: self.last_error.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Per-step validity as shown in the progress bar.
#[derive(Debug, Clone, Serialize)]
pub struct StepState {
    pub index: usize,
    pub id: &'static str,
    pub title: &'static str,
    pub valid: bool,
}

/// Serializable view of a wizard.
#[derive(Debug, Clone, Serialize)]
pub struct WizardSnapshot {
    pub id: Uuid,
    pub onboarding_type: OnboardingType,
    pub status: WizardStatus,
    pub current_step: usize,
    pub step: StepInfo,
    pub steps: Vec<StepState>,
    pub can_go_next: bool,
    pub can_go_back: bool,
    /// Field errors for the active step.
    pub errors: Vec<FieldError>,
    pub data: OnboardingData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
