//! Error types for the onboarding service.

use uuid::Uuid;

use crate::onboarding::rules::FieldError;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Navigation error: {0}")]
    Navigation(#[from] NavigationError),

    #[error("Submit error: {0}")]
    Submit(#[from] SubmitError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

/// Bad `ONBOARDING_*` settings.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} is invalid: {message}")]
    InvalidValue { key: String, message: String },
}

/// Failures from the applications store.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Cannot open application store: {0}")]
    Open(String),

    #[error("Application query failed: {0}")]
    Query(String),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("Application encoding error: {0}")]
    Serialization(String),
}

/// Wizard step navigation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NavigationError {
    #[error("Step index {index} is out of range (flow has {len} steps)")]
    OutOfRange { index: usize, len: usize },

    #[error("Step {step} is not valid: {} field error(s)", errors.len())]
    StepInvalid {
        step: String,
        index: usize,
        errors: Vec<FieldError>,
    },

    #[error("Onboarding is {state}; navigation is closed")]
    Closed { state: String },
}

/// Errors raised by the wizard before or around a submission attempt.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SubmitError {
    #[error("Submission is only possible from the review step (current step {current})")]
    NotOnReviewStep { current: usize },

    #[error("A submission is already in flight")]
    AlreadySubmitting,

    #[error("Onboarding has already been submitted")]
    AlreadySubmitted,

    #[error("Step {step} no longer validates")]
    Incomplete {
        step: String,
        index: usize,
        errors: Vec<FieldError>,
    },

    #[error("Submission failed")]
    Failed,
}

/// Errors returned by a submission collaborator.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("Submission endpoint unreachable: {0}")]
    Transport(String),

    #[error("Submission endpoint rejected the application with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Failed to store application: {0}")]
    Store(#[from] DatabaseError),
}

/// Session lookup errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    #[error("Onboarding session {0} not found")]
    NotFound(Uuid),

    #[error("Unknown field {field} for {kind} onboarding")]
    UnknownField { field: String, kind: String },

    #[error("Onboarding session is {state}; data is read-only")]
    ReadOnly { state: String },
}
