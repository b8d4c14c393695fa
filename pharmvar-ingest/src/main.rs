//! pharmvar-ingest - pharmacogenomic variant enrichment
//!
//! Subcommands:
//! - `serve`: read-only query API
//! - `seed`: insert the default pharmacogene panel
//! - `enrich [GENE...]`: enrich genes, then refresh analysis results
//! - `summary`: print coverage summary JSON
//! - `ping`: check upstream reachability

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pharmvar_common::config::load_config;
use pharmvar_common::db::init_database;
use pharmvar_common::PharmvarConfig;
use pharmvar_ingest::db::analysis::refresh_analysis_results;
use pharmvar_ingest::db::genes::{list_all_genes, seed_genes, DEFAULT_GENE_PANEL};
use pharmvar_ingest::services::summary::summarize;
use pharmvar_ingest::services::{EnrichmentOrchestrator, EnsemblClient};
use pharmvar_ingest::{build_router, AppState};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "pharmvar-ingest")]
#[command(about = "Pharmacogenomic variant enrichment pipeline")]
#[command(version)]
struct Args {
    /// Configuration file (overrides PHARMVAR_CONFIG and the default location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the query API
    Serve,
    /// Seed the default gene panel
    Seed,
    /// Enrich genes (all seeded genes when none are given)
    Enrich {
        genes: Vec<String>,
    },
    /// Print the coverage summary
    Summary,
    /// Check upstream reachability
    Ping,
}

fn init_tracing(config: &PharmvarConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config);

    info!(
        "Starting pharmvar-ingest v{} (database: {})",
        env!("CARGO_PKG_VERSION"),
        config.database_path.display()
    );

    match args.command {
        Command::Serve => serve(config).await,
        Command::Seed => seed(&config).await,
        Command::Enrich { genes } => enrich(&config, genes).await,
        Command::Summary => summary(&config).await,
        Command::Ping => ping(&config).await,
    }
}

async fn serve(config: PharmvarConfig) -> Result<()> {
    let pool = init_database(&config.database_path).await?;
    let bind_address = config.api.bind_address.clone();

    let app = build_router(AppState::new(pool, config));

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    info!("pharmvar-ingest listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;

    Ok(())
}

async fn seed(config: &PharmvarConfig) -> Result<()> {
    let pool = init_database(&config.database_path).await?;
    let inserted = seed_genes(&pool, DEFAULT_GENE_PANEL).await?;
    println!("Seeded {} of {} genes", inserted, DEFAULT_GENE_PANEL.len());
    Ok(())
}

async fn enrich(config: &PharmvarConfig, genes: Vec<String>) -> Result<()> {
    let pool = init_database(&config.database_path).await?;

    let symbols = if genes.is_empty() {
        let all: Vec<String> = list_all_genes(&pool)
            .await?
            .into_iter()
            .map(|g| g.symbol)
            .collect();
        if all.is_empty() {
            warn!("No genes seeded; run `pharmvar-ingest seed` first");
        }
        all
    } else {
        genes
    };

    let orchestrator = EnrichmentOrchestrator::from_config(pool.clone(), config)?;

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after in-flight writes");
            signal_cancel.cancel();
        }
    });

    let results = orchestrator.enrich_genes_with_cancel(&symbols, cancel).await;

    let mut failures = 0;
    for (symbol, result) in &results {
        match result {
            Ok(report) => println!("{}", serde_json::to_string(report)?),
            Err(e) => {
                failures += 1;
                error!(gene = %symbol, error = %e, "Gene enrichment failed");
                println!(
                    "{}",
                    serde_json::json!({ "gene_symbol": symbol, "error": e.to_string() })
                );
            }
        }
    }

    refresh_analysis_results(&pool).await?;

    if failures > 0 {
        anyhow::bail!("{} of {} genes failed", failures, results.len());
    }
    Ok(())
}

async fn summary(config: &PharmvarConfig) -> Result<()> {
    let pool = init_database(&config.database_path).await?;
    let summary = summarize(&pool).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn ping(config: &PharmvarConfig) -> Result<()> {
    let ensembl = EnsemblClient::new(&config.ensembl, &config.retry)?;

    match ensembl.ping().await {
        Ok(true) => println!("ensembl: ok ({})", config.ensembl.base_url),
        Ok(false) => println!("ensembl: unexpected ping response ({})", config.ensembl.base_url),
        Err(e) => println!("ensembl: unreachable: {}", e),
    }

    let clinvar = pharmvar_ingest::services::ClinVarClient::new(&config.clinvar, &config.retry)?;
    match clinvar.search("rs1065852").await {
        Ok(_) => println!("clinvar: ok ({})", config.clinvar.base_url),
        Err(e) => println!("clinvar: unreachable: {}", e),
    }

    Ok(())
}
