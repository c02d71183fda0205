//! Submission collaborators: where a finished application goes.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::SubmissionError;
use crate::store::Database;

use super::model::{OnboardingData, OnboardingType};

/// A completed onboarding application, as handed to a submitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    #[serde(rename = "applicationId")]
    pub id: Uuid,
    pub onboarding_type: OnboardingType,
    pub data: OnboardingData,
    pub submitted_at: DateTime<Utc>,
}

/// Persists a completed application server-side.
///
/// Called at most once per wizard at a time; the wizard stays in
/// `Submitting` until the call returns.
#[async_trait]
pub trait Submitter: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    async fn submit(&self, application: &Application) -> Result<(), SubmissionError>;
}

/// POSTs the application as JSON to an external backend.
pub struct HttpSubmitter {
    client: reqwest::Client,
    endpoint: String,
    token: Option<SecretString>,
}

impl HttpSubmitter {
    pub fn new(endpoint: impl Into<String>, token: Option<SecretString>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            token,
        }
    }
}

#[async_trait]
impl Submitter for HttpSubmitter {
    fn name(&self) -> &str {
        "http"
    }

    async fn submit(&self, application: &Application) -> Result<(), SubmissionError> {
        let mut request = self.client.post(&self.endpoint).json(application);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request
            .send()
            .await
            .map_err(|e| SubmissionError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SubmissionError::Rejected {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        info!(
            application_id = %application.id,
            endpoint = %self.endpoint,
            status = status.as_u16(),
            "Application posted"
        );
        Ok(())
    }
}

/// Writes the application to the local application store.
pub struct StoreSubmitter {
    db: Arc<dyn Database>,
}

impl StoreSubmitter {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl Submitter for StoreSubmitter {
    fn name(&self) -> &str {
        "store"
    }

    async fn submit(&self, application: &Application) -> Result<(), SubmissionError> {
        self.db.insert_application(application).await?;
        debug!(application_id = %application.id, "Application stored");
        Ok(())
    }
}
