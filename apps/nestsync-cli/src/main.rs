//! nestsync CLI - mirror nested Entra ID groups into a flat SCIM target
//!
//! - `nestsync sync <ROOT>` reconciles one root group
//! - `nestsync batch --list <PATH|URL>` reconciles every root named in a list
//!
//! Scheduling is left to cron, systemd timers or the CI runner invoking the binary.

use clap::{Args, Parser, Subcommand};
use nestsync_connector_entra::{EntraConfig, EntraCredentials, EntraDirectory};
use nestsync_engine::{ReconcileReport, Reconciler, RootRun};
use nestsync_scim_client::{ScimAuth, ScimClient, ScimCredentials, ScimTarget};
use std::sync::Arc;
use tracing::{error, info, warn};

mod config;
mod error;
mod logging;
mod roots;

use config::{ScimAuthConfig, SyncConfig};
use error::{CliError, CliResult};

/// nestsync - nested group membership mirroring
#[derive(Parser, Debug)]
#[command(name = "nestsync")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile a single root group
    Sync(SyncArgs),

    /// Reconcile every root group named in a list
    Batch(BatchArgs),
}

#[derive(Args, Debug)]
struct RunFlags {
    /// Compute and log intended changes without mutating the target
    #[arg(long)]
    dry_run: bool,

    /// Print run reports as JSON on stdout
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct SyncArgs {
    /// Display name of the root group in the source directory
    root: String,

    #[command(flatten)]
    flags: RunFlags,
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Root list location, a file path or an http(s) URL (defaults to SYNC_ROOT_LIST)
    #[arg(long, value_name = "PATH|URL")]
    list: Option<String>,

    #[command(flatten)]
    flags: RunFlags,
}

#[tokio::main]
async fn main() {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let config = SyncConfig::from_env()?;
    logging::init_logging(config.log_format);

    info!(
        scim_base_url = %config.scim_base_url,
        tenant_id = %config.entra_tenant_id,
        flatten_concurrency = config.reconcile.flatten_concurrency,
        root_concurrency = config.reconcile.root_concurrency,
        max_depth = config.reconcile.max_depth,
        "nestsync starting"
    );

    let reconciler = build_reconciler(&config)?;

    match cli.command {
        Commands::Sync(args) => {
            let result = reconciler.reconcile(&args.root, args.flags.dry_run).await;
            let runs = vec![RootRun {
                root: args.root,
                result,
            }];
            finish(&runs, args.flags.json, false)
        }
        Commands::Batch(args) => {
            let location = args
                .list
                .or_else(|| config.root_list.clone())
                .ok_or(CliError::NoRootList)?;
            let roots = roots::load_roots(&location, config.scim_timeout).await?;
            if roots.is_empty() {
                warn!(location = %location, "Root list is empty; nothing to do");
            }
            let runs = reconciler.reconcile_many(&roots, args.flags.dry_run).await;
            finish(&runs, args.flags.json, true)
        }
    }
}

fn build_reconciler(config: &SyncConfig) -> CliResult<Reconciler> {
    let entra_config = EntraConfig::builder()
        .tenant_id(config.entra_tenant_id.clone())
        .cloud_environment(config.entra_cloud.clone())
        .build()
        .map_err(|e| setup_error("Entra ID directory", e))?;
    let credentials = EntraCredentials {
        client_id: config.entra_client_id.clone(),
        client_secret: config.entra_client_secret.clone(),
    };
    let source = EntraDirectory::new(entra_config, credentials)
        .map_err(|e| setup_error("Entra ID directory", e))?;

    let credentials = match &config.scim_auth {
        ScimAuthConfig::Bearer { token } => ScimCredentials::Bearer {
            token: token.clone(),
        },
        ScimAuthConfig::OAuth2 {
            client_id,
            client_secret,
            token_endpoint,
        } => ScimCredentials::OAuth2 {
            client_id: client_id.clone(),
            client_secret: client_secret.clone(),
            token_endpoint: token_endpoint.clone(),
            scopes: vec![],
        },
    };
    let token_client = reqwest::Client::builder()
        .timeout(config.scim_timeout)
        .build()
        .map_err(|e| setup_error("SCIM target", e))?;
    let client = ScimClient::new(
        &config.scim_base_url,
        ScimAuth::new(credentials, token_client),
        config.scim_timeout,
    )
    .map_err(|e| setup_error("SCIM target", e))?;
    let target = ScimTarget::new(client);

    Ok(Reconciler::new(
        Arc::new(source),
        Arc::new(target),
        config.reconcile.clone(),
    ))
}

fn setup_error(component: &'static str, e: impl std::fmt::Display) -> CliError {
    CliError::Setup {
        component,
        message: e.to_string(),
    }
}

fn log_summary(report: &ReconcileReport) {
    info!(
        root = %report.root,
        outcome = ?report.outcome,
        dry_run = report.dry_run,
        groups = report.distinct_groups,
        users = report.distinct_users,
        users_created = report.users_created,
        groups_created = report.groups_created,
        groups_deleted = report.groups_deleted,
        groups_patched = report.groups_patched,
        members_added = report.members_added,
        members_removed = report.members_removed,
        failures = report.failures.len(),
        duration_ms = report.duration_ms,
        "Root finished"
    );
}

/// Logs or prints the outcome of each root and turns failures into an exit code.
fn finish(runs: &[RootRun], json: bool, as_array: bool) -> CliResult<()> {
    let mut documents = Vec::with_capacity(runs.len());

    for run in runs {
        match &run.result {
            Ok(report) => {
                log_summary(report);
                if json {
                    documents.push(serde_json::to_value(report)?);
                }
            }
            Err(e) => {
                error!(root = %run.root, error = %e, "Root failed");
                if json {
                    documents.push(serde_json::json!({
                        "root": run.root,
                        "error": e.to_string(),
                    }));
                }
            }
        }
    }

    if json {
        let output = if as_array {
            serde_json::Value::Array(documents)
        } else {
            documents.pop().unwrap_or(serde_json::Value::Null)
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    }

    let failed = runs.iter().filter(|run| run.is_failure()).count();
    if failed > 0 {
        return Err(CliError::RunFailed {
            failed,
            total: runs.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestsync_core::SyncError;

    #[test]
    fn test_parse_sync() {
        let cli = Cli::try_parse_from(["nestsync", "sync", "Engineering", "--dry-run"]).unwrap();
        match cli.command {
            Commands::Sync(args) => {
                assert_eq!(args.root, "Engineering");
                assert!(args.flags.dry_run);
                assert!(!args.flags.json);
            }
            other => panic!("expected sync, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_batch() {
        let cli = Cli::try_parse_from([
            "nestsync",
            "batch",
            "--list",
            "https://lists.example.com/roots.txt",
            "--json",
        ])
        .unwrap();
        match cli.command {
            Commands::Batch(args) => {
                assert_eq!(
                    args.list.as_deref(),
                    Some("https://lists.example.com/roots.txt")
                );
                assert!(args.flags.json);
                assert!(!args.flags.dry_run);
            }
            other => panic!("expected batch, got {other:?}"),
        }
    }

    #[test]
    fn test_sync_requires_root() {
        assert!(Cli::try_parse_from(["nestsync", "sync"]).is_err());
    }

    #[test]
    fn test_finish_reports_failures() {
        let runs = vec![
            RootRun {
                root: "Engineering".into(),
                result: Err(SyncError::Source("timeout".into())),
            },
            RootRun {
                root: "Sales".into(),
                result: Err(SyncError::target("boom")),
            },
        ];
        match finish(&runs, false, true) {
            Err(CliError::RunFailed { failed, total }) => {
                assert_eq!(failed, 2);
                assert_eq!(total, 2);
            }
            other => panic!("expected RunFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_finish_with_no_runs_succeeds() {
        assert!(finish(&[], true, true).is_ok());
    }
}
