//! `Database` trait: async interface for application persistence.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::onboarding::model::OnboardingType;
use crate::onboarding::submission::Application;

/// Backend-agnostic database trait.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    /// Insert a submitted application. Fails if the id already exists.
    async fn insert_application(&self, application: &Application) -> Result<(), DatabaseError>;

    /// Get an application by id.
    async fn get_application(&self, id: Uuid) -> Result<Option<Application>, DatabaseError>;

    /// Most recent applications first, optionally filtered by type.
    async fn list_applications(
        &self,
        onboarding_type: Option<OnboardingType>,
        limit: usize,
    ) -> Result<Vec<Application>, DatabaseError>;

    /// Applications whose contact email matches (case-insensitive).
    async fn find_applications_by_email(
        &self,
        email: &str,
    ) -> Result<Vec<Application>, DatabaseError>;
}
