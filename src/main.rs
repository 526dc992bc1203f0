//! taskbridge - Cross-Platform Task Synchronization
//!
//! Main entry point for the taskbridge CLI. The CLI is the transport layer
//! over the engine: it resolves credentials, constructs the adapter pair,
//! wraps runs in the retry policy and persists configuration changes.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use taskbridge::config::SyncConfiguration;
use taskbridge::platforms::{build_adapter, PlatformAdapter};
use taskbridge::retry::{with_retry, RetryConfig};
use taskbridge::sync::{SyncEngine, SyncRunLog};
use taskbridge::{Result, TaskBridgeError};

/// taskbridge - sync tasks between ClickUp and Monday.com
#[derive(Parser, Debug)]
#[command(name = "taskbridge")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Retry attempts for a failed run (transient failures only)
    #[arg(long, default_value = "3")]
    retries: u32,

    /// Cancel a run after this many seconds
    #[arg(long)]
    deadline: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run one sync configuration now
    Run {
        /// Path to the configuration YAML file
        config: PathBuf,
    },

    /// Run every due configuration in a directory
    Due {
        /// Directory of configuration YAML files
        /// (default: ~/.config/taskbridge)
        dir: Option<PathBuf>,
    },

    /// Show a configuration's schedule state
    Next {
        /// Path to the configuration YAML file
        config: PathBuf,
    },

    /// Check a configuration file for problems
    Validate {
        /// Path to the configuration YAML file
        config: PathBuf,
    },

    /// Show both accounts and the configured lists' custom fields
    Inspect {
        /// Path to the configuration YAML file
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = taskbridge::logging::init() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let retry_config = RetryConfig {
        max_retries: cli.retries,
        ..Default::default()
    };
    let deadline = cli.deadline.map(Duration::from_secs);

    match cli.command {
        Commands::Run { config } => {
            let log = run_one(&config, &retry_config, deadline).await?;
            print_log(&log)?;
            Ok(())
        }
        Commands::Due { dir } => {
            let dir = dir.unwrap_or_else(SyncConfiguration::default_dir);
            run_due(&dir, &retry_config, deadline).await
        }
        Commands::Next { config } => {
            let config = SyncConfiguration::load(config)?;
            println!("configuration: {}", config.name);
            println!("schedule:      {:?}", config.schedule_type);
            match config.last_sync_at {
                Some(at) => println!("last sync:     {}", at.to_rfc3339()),
                None => println!("last sync:     never"),
            }
            match config.next_sync_at {
                Some(at) => println!("next sync:     {}", at.to_rfc3339()),
                None => println!("next sync:     -"),
            }
            println!("due now:       {}", config.is_due());
            Ok(())
        }
        Commands::Validate { config: path } => {
            let config = SyncConfiguration::load(&path)?;
            config.validate()?;
            for endpoint in [&config.source, &config.target] {
                if std::env::var(&endpoint.token_env).is_err() {
                    eprintln!(
                        "warning: token variable {} for {} is not set",
                        endpoint.token_env, endpoint.platform
                    );
                }
            }
            println!("{}: ok", config.name);
            Ok(())
        }
        Commands::Inspect { config } => {
            let config = SyncConfiguration::load(config)?;
            for (label, endpoint) in [("source", &config.source), ("target", &config.target)] {
                let adapter = adapter_from_env(endpoint)?;
                let user = adapter.get_user().await?;
                println!("{} ({}):", label, endpoint.platform);
                println!("  account: {} <{}>", user.name, user.email.as_deref().unwrap_or("-"));
                for workspace in adapter.list_workspaces().await? {
                    println!("  workspace: {} ({})", workspace.name, workspace.id);
                }
                for field in adapter.list_custom_fields(&endpoint.list_id).await? {
                    println!(
                        "  field: {} ({}, {})",
                        field.name,
                        field.id,
                        field.field_type.as_deref().unwrap_or("unknown")
                    );
                }
            }
            Ok(())
        }
    }
}

/// Resolve the endpoint's token and construct its adapter.
///
/// Credential storage lives outside taskbridge; an invalid token surfaces as
/// an unauthorized platform error on the adapter's first call.
fn adapter_from_env(
    endpoint: &taskbridge::config::PlatformEndpoint,
) -> Result<Box<dyn PlatformAdapter>> {
    let token = std::env::var(&endpoint.token_env).map_err(|_| {
        TaskBridgeError::Config(format!(
            "token variable {} for {} is not set",
            endpoint.token_env, endpoint.platform
        ))
    })?;
    build_adapter(endpoint.platform, token)
}

async fn run_one(
    path: &Path,
    retry_config: &RetryConfig,
    deadline: Option<Duration>,
) -> Result<SyncRunLog> {
    let config = SyncConfiguration::load(path)?;
    config.validate()?;

    let mut engine = SyncEngine::new(
        adapter_from_env(&config.source)?,
        adapter_from_env(&config.target)?,
    );
    if let Some(deadline) = deadline {
        engine = engine.with_deadline(deadline);
    }

    // The engine never retries; transient whole-run failures are retried here.
    // Each attempt works on its own copy so a failed attempt cannot leave a
    // half-updated schedule behind.
    let (log, updated) = with_retry(retry_config, "sync run", || {
        let mut attempt = config.clone();
        let engine = &engine;
        async move {
            let log = engine.run(&mut attempt).await?;
            Ok::<_, TaskBridgeError>((log, attempt))
        }
    })
    .await?;

    // Persist last_sync_at/next_sync_at back to the configuration file
    updated.save(path)?;

    Ok(log)
}

async fn run_due(
    dir: &Path,
    retry_config: &RetryConfig,
    deadline: Option<Duration>,
) -> Result<()> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            matches!(
                path.extension().and_then(|e| e.to_str()),
                Some("yaml") | Some("yml")
            )
        })
        .collect();
    paths.sort();

    let mut failures = 0;
    for path in &paths {
        let config = match SyncConfiguration::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("{}: unreadable configuration: {}", path.display(), e);
                failures += 1;
                continue;
            }
        };
        if !config.is_due() {
            continue;
        }

        println!("running {}", config.name);
        match run_one(path, retry_config, deadline).await {
            Ok(log) => print_log(&log)?,
            Err(e) => {
                eprintln!("{}: {}", config.name, e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        return Err(TaskBridgeError::Other(format!(
            "{} configuration(s) failed",
            failures
        )));
    }
    Ok(())
}

fn print_log(log: &SyncRunLog) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(log)?);
    Ok(())
}
