//! rawqueryd - policy-gated raw SQL execution over gRPC.

use std::sync::Arc;

use anyhow::Context;
use db_rawquery::cli::Cli;
use db_rawquery::config::Config;
use db_rawquery::db::{self, MockExecutor, QueryExecutor};
use db_rawquery::logging;
use db_rawquery::policy;
use db_rawquery::query::QueryOrchestrator;
use db_rawquery::rpc::RawQueryService;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();

    // Precedence: CLI arguments, then config file, then PG* environment.
    let config_path = cli.config_path();
    let mut config = Config::load_from_file(&config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    cli.apply_to(&mut config)?;

    match config.logging.log_path() {
        Some(path) => logging::init_file_logging(&path),
        None => logging::init_stderr_logging(),
    }
    info!("Loaded config from: {}", config_path.display());

    let executor: Arc<dyn QueryExecutor> = if cli.mock_db {
        warn!("Using mock database; queries are echoed, not executed");
        Arc::new(MockExecutor::new())
    } else {
        info!("Connecting to {}", config.database.connection.display_string());
        db::connect(&config.database)
            .await
            .context("connecting to database")?
    };

    let policy = policy::from_config(&config.policy);
    info!(policy = ?config.policy.kind, "Authorization policy selected");

    let orchestrator = QueryOrchestrator::new(executor.clone(), policy)
        .with_database_name(config.database.connection.database.clone())
        .with_audit(config.audit.clone());

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {e}");
        }
        info!("Shutting down");
    };

    RawQueryService::new(Arc::new(orchestrator))
        .serve(
            config.server.listen_addr,
            config.server.trust_identity_headers,
            shutdown,
        )
        .await
        .context("serving gRPC")?;

    if let Err(e) = executor.close().await {
        warn!("Failed to close executor: {e}");
    }
    Ok(())
}
