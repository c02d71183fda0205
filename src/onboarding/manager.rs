//! WizardManager: owns every live onboarding session and hands finished
//! applications to the submission collaborator.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Error, SessionError, SubmitError};

use super::model::{MergeOutcome, OnboardingType, SelectionOutcome};
use super::review::ReviewSummary;
use super::state::{Wizard, WizardSnapshot, WizardStatus};
use super::steps::Flow;
use super::submission::Submitter;

/// How often the background task sweeps idle sessions.
const PRUNE_INTERVAL_SECS: u64 = 60;

/// Coordinates wizard sessions: creation, mutation, submission, expiry.
pub struct WizardManager {
    client_flow: Arc<Flow>,
    coach_flow: Arc<Flow>,
    sessions: RwLock<HashMap<Uuid, Wizard>>,
    submitter: Arc<dyn Submitter>,
}

impl WizardManager {
    pub fn new(submitter: Arc<dyn Submitter>) -> Self {
        Self {
            client_flow: Arc::new(Flow::for_type(OnboardingType::Client)),
            coach_flow: Arc::new(Flow::for_type(OnboardingType::Coach)),
            sessions: RwLock::new(HashMap::new()),
            submitter,
        }
    }

    pub fn flow(&self, kind: OnboardingType) -> Arc<Flow> {
        match kind {
            OnboardingType::Client => Arc::clone(&self.client_flow),
            OnboardingType::Coach => Arc::clone(&self.coach_flow),
        }
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Start a fresh wizard on its first step.
    pub async fn start(&self, kind: OnboardingType) -> WizardSnapshot {
        let wizard = Wizard::new(self.flow(kind));
        let snapshot = wizard.snapshot();
        self.sessions.write().await.insert(wizard.id(), wizard);
        info!(session_id = %snapshot.id, kind = %kind, "Onboarding session started");
        snapshot
    }

    pub async fn snapshot(&self, id: Uuid) -> Result<WizardSnapshot, SessionError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(&id)
            .map(Wizard::snapshot)
            .ok_or(SessionError::NotFound(id))
    }

    /// Run `f` against the session under the write lock, then snapshot it.
    async fn mutate<T, E>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Wizard) -> Result<T, E>,
    ) -> Result<(T, WizardSnapshot), Error>
    where
        Error: From<E>,
    {
        let mut sessions = self.sessions.write().await;
        let wizard = sessions.get_mut(&id).ok_or(SessionError::NotFound(id))?;
        let value = f(wizard)?;
        Ok((value, wizard.snapshot()))
    }

    pub async fn update_data(
        &self,
        id: Uuid,
        partial: Map<String, Value>,
    ) -> Result<(MergeOutcome, WizardSnapshot), Error> {
        self.mutate(id, |w| w.update_data(partial)).await
    }

    pub async fn toggle_selection(
        &self,
        id: Uuid,
        field: &str,
        option: &str,
    ) -> Result<(SelectionOutcome, WizardSnapshot), Error> {
        self.mutate(id, |w| w.toggle_selection(field, option)).await
    }

    pub async fn next(&self, id: Uuid) -> Result<WizardSnapshot, Error> {
        self.mutate(id, Wizard::next_step).await.map(|(_, s)| s)
    }

    pub async fn previous(&self, id: Uuid) -> Result<WizardSnapshot, Error> {
        self.mutate(id, Wizard::previous_step).await.map(|(_, s)| s)
    }

    pub async fn go_to(&self, id: Uuid, index: usize) -> Result<WizardSnapshot, Error> {
        self.mutate(id, |w| w.go_to_step(index))
            .await
            .map(|(_, s)| s)
    }

    pub async fn review(&self, id: Uuid) -> Result<ReviewSummary, SessionError> {
        let sessions = self.sessions.read().await;
        let wizard = sessions.get(&id).ok_or(SessionError::NotFound(id))?;
        Ok(ReviewSummary::build(wizard.flow(), wizard.data()))
    }

    /// Submit the application and return the dashboard redirect.
    ///
    /// The session lock is released while the collaborator runs; the wizard
    /// sits in `Submitting` meanwhile so a second submit is rejected.
    pub async fn submit(&self, id: Uuid) -> Result<&'static str, Error> {
        let application = {
            let mut sessions = self.sessions.write().await;
            let wizard = sessions.get_mut(&id).ok_or(SessionError::NotFound(id))?;
            wizard.begin_submission()?
        };

        info!(
            session_id = %id,
            kind = %application.onboarding_type,
            submitter = self.submitter.name(),
            "Submitting onboarding application"
        );
        let result = self.submitter.submit(&application).await;

        let mut sessions = self.sessions.write().await;
        match result {
            Ok(()) => {
                let redirect = match sessions.get_mut(&id) {
                    Some(wizard) => wizard.complete_submission(),
                    None => application.onboarding_type.dashboard_route(),
                };
                sessions.remove(&id);
                Ok(redirect)
            }
            Err(e) => {
                warn!(
                    session_id = %id,
                    submitter = self.submitter.name(),
                    error = %e,
                    "Onboarding submission failed"
                );
                if let Some(wizard) = sessions.get_mut(&id) {
                    wizard.fail_submission();
                }
                Err(SubmitError::Failed.into())
            }
        }
    }

    /// Drop a session and everything it collected.
    pub async fn discard(&self, id: Uuid) -> Result<(), SessionError> {
        match self.sessions.write().await.remove(&id) {
            Some(_) => {
                info!(session_id = %id, "Onboarding session discarded");
                Ok(())
            }
            None => Err(SessionError::NotFound(id)),
        }
    }

    /// Remove sessions untouched for longer than `ttl`. Sessions with a
    /// submission in flight are kept. Returns how many were removed.
    pub async fn prune_idle(&self, ttl: Duration) -> usize {
        // A TTL reaching past the earliest representable time expires nothing
        let Some(cutoff) = Utc::now().checked_sub_signed(ttl) else {
            return 0;
        };
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, w| {
            w.status() == WizardStatus::Submitting || w.updated_at() > cutoff
        });
        let removed = before - sessions.len();
        if removed > 0 {
            info!(removed, remaining = sessions.len(), "Pruned idle onboarding sessions");
        }
        removed
    }
}

/// Spawn a background task that prunes idle sessions every minute.
pub fn spawn_prune_task(manager: Arc<WizardManager>, ttl: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(PRUNE_INTERVAL_SECS));
        loop {
            interval.tick().await;
            manager.prune_idle(ttl).await;
        }
    })
}
