use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use biblio_identify::config::{Config, validate_threshold};
use biblio_identify::domain::{DomainError, ResponseCache};
use biblio_identify::infrastructure::SeaOrmResponseCache;
use biblio_identify::services::{IdentifyService, RunOptions};
use biblio_identify::worldcat::WorldCatClient;
use biblio_identify::{db, export, import};

#[derive(Parser)]
#[command(
    name = "biblio-identify",
    version,
    about = "Match bibliographic records against WorldCat and collect their ISBNs by format"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Identify every input record (default)
    Identify {
        /// Only process the first N records (overrides TEST_MODE_RECORDS)
        #[arg(long)]
        limit: Option<usize>,
        /// Similarity threshold in (0, 1] (overrides MATCH_THRESHOLD)
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Drop and recreate the response cache table
    InitCache,
    /// Delete every cached response
    ResetCache,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "biblio_identify=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), DomainError> {
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Command::Identify {
        limit: None,
        threshold: None,
    }) {
        Command::Identify { limit, threshold } => identify(&config, limit, threshold).await,
        Command::InitCache => {
            let conn = db::init_db(&config.cache_database_url).await?;
            db::recreate_cache_table(&conn).await?;
            tracing::info!("Response cache ready at {}", config.cache_database_url);
            Ok(())
        }
        Command::ResetCache => {
            let conn = db::init_db(&config.cache_database_url).await?;
            SeaOrmResponseCache::new(conn).reset().await
        }
    }
}

async fn identify(
    config: &Config,
    limit: Option<usize>,
    threshold: Option<f64>,
) -> Result<(), DomainError> {
    // Everything that can be misconfigured is checked before the first record
    let threshold = match threshold {
        Some(t) => validate_threshold(t)?,
        None => config.match_threshold,
    };
    let api_key = config.require_api_key()?;
    let column_map = match &config.column_map_path {
        Some(path) => import::load_column_map(path)?,
        None => import::ColumnMap::new(),
    };
    let records = import::read_source_records_from_path(&config.input_csv_path, &column_map)?;

    let conn = db::init_db(&config.cache_database_url).await?;
    let cache: Arc<dyn ResponseCache> = Arc::new(SeaOrmResponseCache::new(conn));
    let client = Arc::new(WorldCatClient::new(&config.catalog, api_key, cache)?);

    let service = IdentifyService::new(
        client,
        RunOptions {
            threshold,
            record_limit: limit.or(config.test_mode_records),
            concurrency: config.catalog.max_concurrent_requests,
        },
    )?;

    // The cache makes a later re-run resume where this one stopped
    let stop = service.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the records in flight");
            stop.store(true, Ordering::SeqCst);
        }
    });

    let (results, report) = service.run(&records).await?;
    export::write_results(&config.output_dir, &results, &records)?;

    tracing::info!("\n\n{}\n", report);
    Ok(())
}
