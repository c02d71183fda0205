//! libSQL backend: async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::DatabaseError;
use crate::onboarding::model::{OnboardingData, OnboardingType};
use crate::onboarding::submission::Application;
use crate::store::migrations;
use crate::store::traits::Database;

/// Application store on a single libSQL connection.
///
/// The connection is shared by every request; libSQL serialises access
/// internally.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open the database file at `path`, creating parent directories, and
    /// migrate it to the latest schema.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .map_err(|e| DatabaseError::Open(format!("{}: {e}", dir.display())))?;
        }
        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Open(format!("{}: {e}", path.display())))?;
        let backend = Self::from_database(db).await?;
        info!(path = %path.display(), "Application store ready");
        Ok(backend)
    }

    /// Throwaway database that lives as long as the backend.
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| DatabaseError::Open(format!("in-memory: {e}")))?;
        Self::from_database(db).await
    }

    async fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Open(format!("connect: {e}")))?;
        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn query_applications(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
        op: &str,
    ) -> Result<Vec<Application>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::Query(format!("{op}: {e}")))?;

        let mut applications = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            match row_to_application(&row) {
                Ok(app) => applications.push(app),
                Err(e) => {
                    tracing::warn!("Skipping application row: {e}");
                }
            }
        }
        Ok(applications)
    }
}

const APPLICATION_COLUMNS: &str = "id, onboarding_type, data, submitted_at";

/// Accepts RFC 3339 as well as SQLite's `datetime()` output. Unparseable
/// values sort first.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return ndt.and_utc();
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn opt_text_owned(s: Option<String>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s),
        None => libsql::Value::Null,
    }
}

/// Lower-cased contact email from the application data, if any.
fn contact_email(data: &OnboardingData) -> Option<String> {
    data.get("email")
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
}

fn row_to_application(row: &libsql::Row) -> Result<Application, DatabaseError> {
    let id_str: String = row
        .get(0)
        .map_err(|e| DatabaseError::Query(format!("application id: {e}")))?;
    let type_str: String = row
        .get(1)
        .map_err(|e| DatabaseError::Query(format!("application type: {e}")))?;
    let data_str: String = row
        .get(2)
        .map_err(|e| DatabaseError::Query(format!("application data: {e}")))?;
    let submitted_str: String = row
        .get(3)
        .map_err(|e| DatabaseError::Query(format!("application submitted_at: {e}")))?;

    Ok(Application {
        id: Uuid::parse_str(&id_str)
            .map_err(|e| DatabaseError::Serialization(format!("bad application id: {e}")))?,
        onboarding_type: type_str.parse().map_err(DatabaseError::Serialization)?,
        data: serde_json::from_str(&data_str)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?,
        submitted_at: parse_datetime(&submitted_str),
    })
}

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn insert_application(&self, application: &Application) -> Result<(), DatabaseError> {
        let data = serde_json::to_string(&application.data)
            .map_err(|e| DatabaseError::Serialization(e.to_string()))?;

        self.conn()
            .execute(
                "INSERT INTO applications (id, onboarding_type, data, submitted_at, contact_email)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    application.id.to_string(),
                    application.onboarding_type.as_str(),
                    data,
                    application.submitted_at.to_rfc3339(),
                    opt_text_owned(contact_email(&application.data)),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_application: {e}")))?;

        debug!(
            id = %application.id,
            kind = %application.onboarding_type,
            "Application inserted into DB"
        );
        Ok(())
    }

    async fn get_application(&self, id: Uuid) -> Result<Option<Application>, DatabaseError> {
        let mut found = self
            .query_applications(
                &format!("SELECT {APPLICATION_COLUMNS} FROM applications WHERE id = ?1"),
                params![id.to_string()],
                "get_application",
            )
            .await?;
        Ok(found.pop())
    }

    async fn list_applications(
        &self,
        onboarding_type: Option<OnboardingType>,
        limit: usize,
    ) -> Result<Vec<Application>, DatabaseError> {
        match onboarding_type {
            Some(kind) => {
                self.query_applications(
                    &format!(
                        "SELECT {APPLICATION_COLUMNS} FROM applications
                         WHERE onboarding_type = ?1 ORDER BY submitted_at DESC LIMIT ?2"
                    ),
                    params![kind.as_str(), limit as i64],
                    "list_applications",
                )
                .await
            }
            None => {
                self.query_applications(
                    &format!(
                        "SELECT {APPLICATION_COLUMNS} FROM applications
                         ORDER BY submitted_at DESC LIMIT ?1"
                    ),
                    params![limit as i64],
                    "list_applications",
                )
                .await
            }
        }
    }

    async fn find_applications_by_email(
        &self,
        email: &str,
    ) -> Result<Vec<Application>, DatabaseError> {
        self.query_applications(
            &format!(
                "SELECT {APPLICATION_COLUMNS} FROM applications
                 WHERE contact_email = ?1 ORDER BY submitted_at DESC"
            ),
            params![email.trim().to_lowercase()],
            "find_applications_by_email",
        )
        .await
    }
}
