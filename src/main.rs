use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use coach_onboarding::config::ServerConfig;
use coach_onboarding::onboarding::manager::{WizardManager, spawn_prune_task};
use coach_onboarding::onboarding::routes::onboarding_routes;
use coach_onboarding::onboarding::submission::{HttpSubmitter, StoreSubmitter, Submitter};
use coach_onboarding::store::{Database, LibSqlBackend};

/// Install the global subscriber. Returns the file writer guard, which must
/// live as long as the process when file logging is on.
fn init_tracing(log_dir: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, "onboarding.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env().context("Invalid configuration")?;
    let _log_guard = init_tracing(config.log_dir.as_deref())?;

    eprintln!("Coach Onboarding v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://0.0.0.0:{}/api/onboarding", config.port);

    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", config.db_path.display()))?,
    );
    eprintln!("   Database: {}", config.db_path.display());

    let submitter: Arc<dyn Submitter> = match config.submit_url {
        Some(ref url) => {
            eprintln!("   Submissions: POST {url}");
            Arc::new(HttpSubmitter::new(url.clone(), config.submit_token.clone()))
        }
        None => {
            eprintln!("   Submissions: local database");
            Arc::new(StoreSubmitter::new(Arc::clone(&db)))
        }
    };

    let manager = Arc::new(WizardManager::new(submitter));
    let _prune = spawn_prune_task(Arc::clone(&manager), config.session_ttl);
    eprintln!(
        "   Session TTL: {} minutes\n",
        config.session_ttl.num_minutes()
    );

    let app = onboarding_routes(manager);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("Failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, "Onboarding server started");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
