//! netlookup - Dedup-aware IP geolocation and MAC vendor lookups
//!
//! This is the composition root that wires together all the components.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

use clap::{Parser, Subcommand};
use netlookup::adapters::inbound::{ApiServer, ApiState, BatchRunner};
use netlookup::adapters::outbound::{CsvCheckedSetStore, IpinfoResolver, OuiVendorResolver};
use netlookup::config::{load_config, Config};
use netlookup::domain::ports::Resolver;
use netlookup::domain::value_objects::Namespace;
use netlookup::infrastructure::{shutdown_signal, ShutdownController};
use netlookup::BatchLookupEngine;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::fmt::format::FmtSpan;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "netlookup", version, about = "Dedup-aware IP and MAC vendor lookups")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the identifiers of every CSV file in a folder
    Batch {
        input_folder: PathBuf,
        output_folder: PathBuf,
        /// Checked-set file for the namespace (overrides the configured path)
        #[arg(long)]
        checked_file: Option<PathBuf>,
        #[arg(short, long, default_value = "ip")]
        namespace: Namespace,
    },
    /// Serve single and batch lookups over HTTP
    Serve {
        #[arg(long, env = "NETLOOKUP_API_LISTEN_ADDR")]
        listen: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration from environment
    let cfg = match load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("invalid configuration: {:#}", e);
            return ExitCode::from(2);
        }
    };

    // Setup logging
    let log_level = if cfg.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    let shutdown = ShutdownController::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let result = match cli.command {
        Command::Batch {
            input_folder,
            output_folder,
            checked_file,
            namespace,
        } => run_batch(&cfg, shutdown.clone(), input_folder, output_folder, checked_file, namespace).await,
        Command::Serve { listen } => run_server(&cfg, shutdown.clone(), listen).await,
    };

    shutdown.wait_for_drain(DRAIN_TIMEOUT).await;

    match result {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}

// ===== COMPOSITION ROOT =====

fn build_engine(cfg: &Config, store: CsvCheckedSetStore, shutdown: ShutdownController) -> Arc<BatchLookupEngine> {
    Arc::new(BatchLookupEngine::new(Arc::new(store), cfg).with_shutdown(shutdown))
}

fn build_ip_resolver(cfg: &Config) -> anyhow::Result<Arc<dyn Resolver>> {
    if cfg.api_token.is_none() {
        tracing::warn!("NETLOOKUP_API_TOKEN not set, ipinfo requests will be rate limited");
    }
    Ok(Arc::new(IpinfoResolver::new(cfg)?))
}

fn build_mac_resolver(cfg: &Config) -> anyhow::Result<Arc<dyn Resolver>> {
    let resolver = OuiVendorResolver::from_file(&cfg.oui_table_path)?;
    tracing::info!(
        "vendor table loaded from {} ({} prefixes)",
        cfg.oui_table_path,
        resolver.table().len()
    );
    Ok(Arc::new(resolver))
}

async fn run_batch(
    cfg: &Config,
    shutdown: ShutdownController,
    input_folder: PathBuf,
    output_folder: PathBuf,
    checked_file: Option<PathBuf>,
    namespace: Namespace,
) -> anyhow::Result<ExitCode> {
    let mut store = CsvCheckedSetStore::from_config(cfg);
    if let Some(path) = checked_file {
        store = store.with_path(namespace, path);
    }

    let resolver = match namespace {
        Namespace::Ip => build_ip_resolver(cfg)?,
        Namespace::Mac => build_mac_resolver(cfg)?,
    };

    tracing::info!(
        "starting {} batch run: {} -> {}",
        namespace,
        input_folder.display(),
        output_folder.display()
    );

    let runner = BatchRunner::new(build_engine(cfg, store, shutdown), resolver);
    let summary = runner.run_folder(&input_folder, &output_folder).await?;

    if summary.cancelled {
        tracing::warn!("batch run cancelled, resolved identifiers were committed");
    }
    Ok(if summary.report.has_new() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

async fn run_server(cfg: &Config, shutdown: ShutdownController, listen: Option<String>) -> anyhow::Result<ExitCode> {
    let engine = build_engine(cfg, CsvCheckedSetStore::from_config(cfg), shutdown.clone());

    let ip_resolver = match build_ip_resolver(cfg) {
        Ok(r) => Some(r),
        Err(e) => {
            tracing::error!("IP resolver unavailable: {:#}", e);
            None
        }
    };
    let mac_resolver = match build_mac_resolver(cfg) {
        Ok(r) => Some(r),
        Err(e) => {
            tracing::error!("MAC resolver unavailable: {:#}", e);
            None
        }
    };

    let listen_addr = listen.unwrap_or_else(|| cfg.api_listen_addr.clone());
    let server = ApiServer::new(listen_addr, ApiState::new(engine, ip_resolver, mac_resolver));
    server.run(shutdown).await?;
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_batch_args() {
        let cli = Cli::try_parse_from([
            "netlookup",
            "batch",
            "in",
            "out",
            "--namespace",
            "mac",
            "--checked-file",
            "macs.csv",
        ])
        .unwrap();

        match cli.command {
            Command::Batch {
                namespace,
                checked_file,
                ..
            } => {
                assert_eq!(namespace, Namespace::Mac);
                assert_eq!(checked_file, Some(PathBuf::from("macs.csv")));
            }
            Command::Serve { .. } => panic!("expected batch"),
        }
    }

    #[test]
    fn test_rejects_unknown_namespace() {
        assert!(Cli::try_parse_from(["netlookup", "batch", "in", "out", "-n", "dns"]).is_err());
    }
}
