//! hoardd - concurrent leak index exporter
//!
//! Scrolls an Elasticsearch index pattern and writes the matching
//! credential records to CSV using a pool of concurrent workers.
//!
//! # Usage
//!
//! ```bash
//! hoardd --url http://localhost:9200 -u elastic -p changeme --domain example.com -o out.csv
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{Level, debug, info, warn};

use hoardd::cli::CliInterface;
use hoardd::connection::ElasticClient;
use hoardd::error::{ConnectionError, Result};
use hoardd::export::{ExportCoordinator, ExportOutcome, ExportResult, ExportSink, PipelineOptions};

/// Application entry point
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Main application logic
///
/// 1. Parse command-line arguments and load configuration
/// 2. Initialize logging
/// 3. Handle subcommands or run the export
///
/// # Returns
/// * `Result<()>` - Success or error
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;

    initialize_logging(&cli);

    if cli.handle_subcommand()? {
        return Ok(());
    }

    run_export(&cli).await
}

/// Run one export from the effective configuration
async fn run_export(cli: &CliInterface) -> Result<()> {
    let config = cli.config();
    config.validate()?;

    let lookup = cli.lookup()?;
    let query = lookup.to_query()?;
    debug!("Using {} lookup, query: {}", lookup.name(), query);

    let client = ElasticClient::connect(&config.connection).await?;
    check_health(&client).await?;

    let outfile = cli.outfile();
    let sink = ExportSink::create(
        &outfile,
        config.export.dumpfile.as_deref(),
        config.export.append,
        config.export.flush_every,
    )
    .await?;

    let cancel_token = CancellationToken::new();
    let ctrl_c_handle = spawn_ctrl_c_handler(cancel_token.clone());

    let options = PipelineOptions {
        query,
        page_size: config.export.page_size,
        keep_alive: config.export.keep_alive.clone(),
        workers: config.export.workers,
        limit: config.export.limit,
        show_progress: cli.show_progress(),
    };

    let coordinator = ExportCoordinator::new(Arc::new(client), Arc::new(sink), options)
        .with_cancellation(cancel_token);
    let result = coordinator.execute().await;
    ctrl_c_handle.abort();

    let result = result?;
    print_summary(&result, &outfile.display().to_string());

    match result.outcome {
        ExportOutcome::Failed(e) => Err(e.into()),
        _ => Ok(()),
    }
}

/// Abort before exporting when the cluster reports red
async fn check_health(client: &ElasticClient) -> Result<()> {
    let health = client.health_check().await?;
    info!(
        "Cluster {} is {} ({}ms)",
        health.cluster_name.as_deref().unwrap_or("(unnamed)"),
        health.status,
        health.response_time_ms
    );

    if !health.is_healthy() {
        return Err(ConnectionError::ClusterUnhealthy(health.status).into());
    }
    if health.status != "green" {
        warn!("Cluster status is {}, results may be incomplete", health.status);
    }
    Ok(())
}

/// Cancel the run on the first Ctrl+C
fn spawn_ctrl_c_handler(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                eprintln!("Interrupted, stopping export...");
                token.cancel();
            }
            Err(err) => {
                eprintln!("Failed to listen for Ctrl+C: {}", err);
            }
        }
    })
}

fn print_summary(result: &ExportResult, outfile: &str) {
    let status = match &result.outcome {
        ExportOutcome::Completed => "Export completed".to_string(),
        ExportOutcome::LimitReached => "Export stopped at limit".to_string(),
        ExportOutcome::Cancelled => "Export cancelled".to_string(),
        ExportOutcome::Failed(e) => format!("Export failed ({} error)", e.kind()),
    };

    println!("{}: {}", status, outfile);
    println!(
        "  {} written, {} skipped, {} fetched of ~{} in {} pages",
        result.records_written,
        result.records_skipped,
        result.records_fetched,
        result.total_estimate,
        result.pages_fetched
    );
    println!(
        "  {} bytes in {:.2}s",
        result.file_size_bytes,
        result.elapsed_ms as f64 / 1000.0
    );
}

/// Initialize logging system based on verbosity level
///
/// `--debug` and `--verbose` are already folded into the configured level.
fn initialize_logging(cli: &CliInterface) {
    let level: Level = cli.config().logging.level.to_tracing_level();

    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
