//! Schema migrations for the applications database.
//!
//! Applied versions are recorded in a `_migrations` ledger. On startup every
//! step newer than the ledger's highest version runs once, in order.

use libsql::Connection;

use crate::error::DatabaseError;

struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

const LEDGER_DDL: &str = "CREATE TABLE IF NOT EXISTS _migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
)";

/// Append only. Never edit a step once it has shipped.
const STEPS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        sql: r#"
            CREATE TABLE IF NOT EXISTS applications (
                id TEXT PRIMARY KEY,
                onboarding_type TEXT NOT NULL,
                data TEXT NOT NULL,
                submitted_at TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE INDEX IF NOT EXISTS idx_applications_type ON applications(onboarding_type);
            CREATE INDEX IF NOT EXISTS idx_applications_submitted ON applications(submitted_at);
        "#,
    },
    Migration {
        version: 2,
        name: "application_contact_email",
        sql: r#"
            ALTER TABLE applications ADD COLUMN contact_email TEXT;
            CREATE INDEX IF NOT EXISTS idx_applications_email ON applications(contact_email);
        "#,
    },
];

fn migration_error(context: &str, e: impl std::fmt::Display) -> DatabaseError {
    DatabaseError::Migration(format!("{context}: {e}"))
}

/// Bring the schema up to the latest version.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute(LEDGER_DDL, ())
        .await
        .map_err(|e| migration_error("creating migration ledger", e))?;

    let applied = applied_version(conn).await?;
    let pending: Vec<&Migration> = STEPS.iter().filter(|m| m.version > applied).collect();
    if pending.is_empty() {
        tracing::debug!(version = applied, "Schema up to date");
        return Ok(());
    }

    for step in pending {
        tracing::info!(version = step.version, name = step.name, "Migrating schema");
        conn.execute_batch(step.sql).await.map_err(|e| {
            migration_error(&format!("step {} ({})", step.version, step.name), e)
        })?;
        record(conn, step).await?;
    }

    let to = applied_version(conn).await?;
    tracing::info!(from = applied, to, "Schema migrated");
    Ok(())
}

/// Highest version in the ledger, 0 on a fresh database.
async fn applied_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| migration_error("reading migration ledger", e))?;

    let Some(row) = rows
        .next()
        .await
        .map_err(|e| migration_error("reading migration ledger", e))?
    else {
        return Ok(0);
    };
    row.get::<i64>(0)
        .map_err(|e| migration_error("decoding ledger version", e))
}

async fn record(conn: &Connection, step: &Migration) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![step.version, step.name],
    )
    .await
    .map_err(|e| migration_error(&format!("recording step {}", step.version), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_conn() -> Connection {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .unwrap();
        db.connect().unwrap()
    }

    async fn ledger(conn: &Connection) -> Vec<(i64, String)> {
        let mut rows = conn
            .query("SELECT version, name FROM _migrations ORDER BY version", ())
            .await
            .unwrap();
        let mut out = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            out.push((row.get(0).unwrap(), row.get(1).unwrap()));
        }
        out
    }

    #[tokio::test]
    async fn fresh_database_gets_applications_table() {
        let conn = memory_conn().await;
        run_migrations(&conn).await.unwrap();

        let mut rows = conn
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                (),
            )
            .await
            .unwrap();
        let mut tables = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            tables.push(row.get::<String>(0).unwrap());
        }
        assert!(tables.contains(&"applications".to_string()), "{tables:?}");
        assert!(tables.contains(&"_migrations".to_string()), "{tables:?}");
    }

    #[tokio::test]
    async fn rerun_is_a_no_op() {
        let conn = memory_conn().await;
        run_migrations(&conn).await.unwrap();
        // A second pass would fail on the duplicate ALTER TABLE if it re-ran
        run_migrations(&conn).await.unwrap();

        assert_eq!(applied_version(&conn).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn ledger_lists_every_step() {
        let conn = memory_conn().await;
        run_migrations(&conn).await.unwrap();

        assert_eq!(
            ledger(&conn).await,
            vec![
                (1, "initial_schema".to_string()),
                (2, "application_contact_email".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn upgrade_from_v1_adds_email_column() {
        let conn = memory_conn().await;
        conn.execute(LEDGER_DDL, ()).await.unwrap();
        conn.execute_batch(STEPS[0].sql).await.unwrap();
        record(&conn, &STEPS[0]).await.unwrap();

        run_migrations(&conn).await.unwrap();
        assert_eq!(applied_version(&conn).await.unwrap(), 2);

        conn.execute(
            "INSERT INTO applications (id, onboarding_type, data, submitted_at, contact_email)
             VALUES ('a1', 'coach', '{}', '2026-01-01T00:00:00Z', 'x@example.com')",
            (),
        )
        .await
        .unwrap();
    }
}
