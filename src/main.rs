//! kbctl CLI entry point

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use kbctl::{
    commands::{
        cmd_health, cmd_index_info, cmd_init, cmd_reconcile, cmd_status, cmd_sync, print_health,
        print_index_info, print_init, print_reconcile, print_status, print_sync, InitOptions,
        ReconcileOptions,
    },
    config::Config,
    error::{ErrorKind, Result},
    ingest::create_job_source,
    progress::{with_spinner, LogWriterFactory},
    search::create_search_admin,
};
use serde::Serialize;
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "kbctl")]
#[command(
    version,
    about = "Vector index provisioning and knowledge-base readiness for RAG services",
    long_about = None
)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Manage the vector index
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Show knowledge base readiness and recent ingestion jobs
    Status {
        /// Data source ID (defaults to ingestion.data_source_id)
        #[arg(long)]
        source: Option<String>,
    },

    /// Start an ingestion job for a data source
    Sync {
        /// Data source ID (defaults to ingestion.data_source_id)
        #[arg(long)]
        source: Option<String>,

        /// Description attached to the job
        #[arg(long)]
        description: Option<String>,
    },

    /// Check the search collection and the ingestion API
    Health,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Create the index, or rebuild it when its version differs from the target
    Reconcile {
        /// Schema version tag (defaults to index.target_version)
        #[arg(long)]
        target_version: Option<String>,

        /// Embedding dimension (defaults to index.embedding_dimension)
        #[arg(long)]
        dimension: Option<usize>,

        /// Rebuild even if the index is at the target version
        #[arg(long)]
        force_recreate: bool,

        /// Do not wait for the collection to become ready
        #[arg(long)]
        no_wait: bool,
    },

    /// Show the index state, version and mapping
    Info,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let kind = e.kind();
        error!(kind = %kind, "{}", e);
        if kind != ErrorKind::Unknown {
            eprintln!("Remedy: {}", kind.remedy());
        }
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let interactive = std::io::stderr().is_terminal();
    let fmt_layer = if cli.log_json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else if interactive {
        fmt::layer().with_writer(LogWriterFactory).boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .init();

    // Handle completions command (doesn't need config)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "kbctl", &mut std::io::stdout());
        return Ok(());
    }

    // Handle init command specially (doesn't need existing config)
    if let Commands::Init { force } = cli.command {
        let config_path = cli.config.unwrap_or_else(Config::default_config_path);
        let path = cmd_init(InitOptions { config_path, force })?;
        if cli.json {
            print_json(&serde_json::json!({ "configPath": path }))?;
        } else {
            print_init(&path);
        }
        return Ok(());
    }

    let config = Config::load_or_default(cli.config.as_deref())?;
    let show_spinner = interactive && !cli.json && !cli.log_json;

    match cli.command {
        Commands::Init { .. } | Commands::Completions { .. } => unreachable!(),

        Commands::Index { action } => {
            let admin = create_search_admin(&config)?;
            match action {
                IndexAction::Reconcile {
                    target_version,
                    dimension,
                    force_recreate,
                    no_wait,
                } => {
                    let options = ReconcileOptions {
                        target_version,
                        dimension,
                        force_recreate,
                        no_wait,
                    };
                    let outcome = with_spinner(
                        show_spinner,
                        &format!("Reconciling index {}", config.index.name),
                        cmd_reconcile(&config, admin.as_ref(), options),
                    )
                    .await?;

                    if cli.json {
                        print_json(&outcome)?;
                    } else {
                        print_reconcile(&outcome);
                    }
                }
                IndexAction::Info => {
                    let info = cmd_index_info(&config, admin.as_ref()).await?;
                    if cli.json {
                        print_json(&info)?;
                    } else {
                        print_index_info(&info);
                    }
                }
            }
        }

        Commands::Status { source } => {
            let jobs = create_job_source(&config)?;
            let report = cmd_status(&config, jobs.as_ref(), source.as_deref()).await?;
            if cli.json {
                print_json(&report)?;
            } else {
                print_status(&report);
            }
        }

        Commands::Sync {
            source,
            description,
        } => {
            let jobs = create_job_source(&config)?;
            let result = cmd_sync(
                &config,
                jobs.as_ref(),
                source.as_deref(),
                description.as_deref(),
            )
            .await?;
            if cli.json {
                print_json(&result)?;
            } else {
                print_sync(&result);
            }
        }

        Commands::Health => {
            let admin = create_search_admin(&config)?;
            let jobs = create_job_source(&config);
            let report = cmd_health(&config, admin.as_ref(), jobs.as_ref().map(|j| &**j)).await;
            if cli.json {
                print_json(&report)?;
            } else {
                print_health(&report);
            }
        }
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
