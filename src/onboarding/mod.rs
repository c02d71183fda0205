//! Onboarding wizard for new clients and coaches.
//!
//! Each applicant type walks a fixed sequence of steps. Every step carries a
//! declarative schema; the wizard only advances past a step whose schema
//! validates, and re-checks every step once more before the collected record
//! is handed to a `Submitter` from the review step.

pub mod catalog;
pub mod manager;
pub mod model;
pub mod review;
pub mod routes;
pub mod rules;
pub mod state;
pub mod steps;
pub mod submission;

pub use manager::{WizardManager, spawn_prune_task};
pub use model::{MergeOutcome, OnboardingData, OnboardingType, SelectionOutcome};
pub use review::ReviewSummary;
pub use routes::{OnboardingRouteState, onboarding_routes};
pub use state::{Wizard, WizardSnapshot, WizardStatus};
pub use steps::Flow;
pub use submission::{Application, HttpSubmitter, StoreSubmitter, Submitter};
