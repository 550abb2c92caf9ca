use animeshot_cli::config::{self, AppConfig, ConfigManager};
use animeshot_cli::error::{CliError, CliResult, ErrorContext, ExitCode};
use animeshot_cli::orchestrators::rename_orchestrator::{self, build_persistence};
use animeshot_cli::orchestrators::{CatalogOrchestrator, OutputFormat, RenameOrchestrator, RunOptions};
use animeshot_cli::terminal;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use colored::*;
use log::warn;
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "animeshot")]
#[command(author, version, about = "Recognize anime screenshots and rename them after their source scene", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Use this configuration file instead of the default location
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Recognize and rename the screenshots of the configured folder
    Run {
        /// Continue the counters of an interrupted run
        #[arg(long)]
        resume: bool,

        /// Reprocess files whose last attempt failed
        #[arg(long)]
        rescan_failed: bool,

        /// Recognize only; no renames and no records
        #[arg(long)]
        dry_run: bool,

        /// Files requested per listing page
        #[arg(long, value_name = "N")]
        batch_size: Option<usize>,

        /// Files processed at the same time
        #[arg(long, value_name = "N")]
        concurrency: Option<usize>,

        /// Folder id (or directory for the local backend)
        #[arg(long, value_name = "ID")]
        folder: Option<String>,

        /// Include patterns (glob patterns, can be specified multiple times)
        #[arg(short = 'i', long = "include", value_name = "PATTERN")]
        include_patterns: Vec<String>,

        /// Exclude patterns (glob patterns, can be specified multiple times, overrides includes)
        #[arg(short = 'e', long = "exclude", value_name = "PATTERN")]
        exclude_patterns: Vec<String>,

        /// Disable progress display
        #[arg(long)]
        no_progress: bool,
    },

    /// Show record counts per status
    Status {
        #[arg(short, long, value_enum, default_value = "human")]
        format: StatusFormat,
    },

    /// List indexed anime titles
    Titles,

    /// List the records of one anime title
    Find {
        /// Title exactly as recorded
        title: String,

        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// List folders visible to the configured credentials
    Folders {
        /// Maximum number of folders to list
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StatusFormat {
    Human,
    Json,
}

impl From<StatusFormat> for OutputFormat {
    fn from(format: StatusFormat) -> Self {
        match format {
            StatusFormat::Human => OutputFormat::Human,
            StatusFormat::Json => OutputFormat::Json,
        }
    }
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Interactive setup for storage, database and recognition credentials
    Init {
        /// Reconfigure even if already set up
        #[arg(short, long)]
        force: bool,
    },

    /// Get a configuration value
    Get {
        /// Configuration key (e.g., batch.concurrency)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., batch.concurrency)
        key: String,

        /// Value to set
        value: String,
    },

    /// List all configuration values
    List,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.debug {
        env_logger::Builder::from_env(env_logger::Env::default())
            .filter_level(log::LevelFilter::Info)
            .filter_module("animeshot_core", log::LevelFilter::Debug)
            .filter_module("animeshot_cli", log::LevelFilter::Debug)
            .filter_module("animeshot", log::LevelFilter::Debug)
            .format_timestamp_millis()
            .init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    let debug = cli.debug;
    let code = match dispatch(cli).await {
        Ok(()) => ExitCode::Success,
        Err(error) => {
            eprint!("{}", error.format_for_user(debug));
            error.exit_code()
        }
    };

    std::process::exit(code as i32);
}

async fn dispatch(cli: Cli) -> CliResult<()> {
    let mut manager = cli
        .config
        .clone()
        .map(ConfigManager::with_path)
        .unwrap_or_default();

    match cli.command {
        Commands::Run {
            resume,
            rescan_failed,
            dry_run,
            batch_size,
            concurrency,
            folder,
            include_patterns,
            exclude_patterns,
            no_progress,
        } => {
            let mut config = load_config(&manager)?;
            config.apply_cli_overrides(batch_size, concurrency, folder);

            let orchestrator = RenameOrchestrator::from_config(config)?;
            let options = RunOptions {
                resume,
                rescan_failed,
                dry_run,
                include: include_patterns,
                exclude: exclude_patterns,
                show_progress: !no_progress && terminal::should_show_progress_by_default(),
            };
            orchestrator.run(options, shutdown_signal()).await?;
        }

        Commands::Status { format } => {
            let catalog = catalog(&manager)?;
            catalog
                .status(format.into(), &mut std::io::stdout())
                .await?;
        }

        Commands::Titles => {
            let catalog = catalog(&manager)?;
            catalog.titles(&mut std::io::stdout()).await?;
        }

        Commands::Find { title, format } => {
            let catalog = catalog(&manager)?;
            catalog
                .find(&title, format, &mut std::io::stdout())
                .await?;
        }

        Commands::Folders { limit } => {
            let config = load_config(&manager)?;
            rename_orchestrator::list_folders(&config, limit).await?;
        }

        Commands::Config { command } => config_command(&mut manager, command).await?,

        Commands::Completions { shell } => generate_completions(shell),
    }

    Ok(())
}

fn load_config(manager: &ConfigManager) -> CliResult<AppConfig> {
    manager.load().map_err(|e| {
        CliError::configuration(&format!("{e:#}"))
            .with_context("config file", &manager.get_config_path().display().to_string())
    })
}

fn catalog(manager: &ConfigManager) -> CliResult<CatalogOrchestrator> {
    let config = load_config(manager)?;
    Ok(CatalogOrchestrator::new(build_persistence(&config)?))
}

/// Resolves on the first Ctrl-C; never resolves if the handler cannot be installed
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    eprintln!(
        "\n{}",
        "Interrupt received, stopping after committed items...".yellow()
    );
}

async fn config_command(manager: &mut ConfigManager, command: ConfigCommand) -> CliResult<()> {
    match command {
        ConfigCommand::Init { force } => {
            config::interactive_init(manager, force).await?;
        }
        ConfigCommand::Get { key } => {
            let value = manager
                .get(&key)
                .map_err(|e| CliError::configuration(&e.to_string()))?;
            println!("{value}");
        }
        ConfigCommand::Set { key, value } => {
            manager
                .set(&key, &value)
                .map_err(|e| CliError::configuration(&format!("{e:#}")))?;
            eprintln!("{}", format!("Set {key}").green());
            eprintln!(
                "Configuration saved to: {}",
                manager.get_config_path().display()
            );
        }
        ConfigCommand::List => {
            let items = manager
                .list()
                .map_err(|e| CliError::configuration(&format!("{e:#}")))?;

            eprintln!("{}", "Configuration:".bold().blue());
            eprintln!("Config file: {}", manager.get_config_path().display());
            eprintln!();

            let mut sections: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
            for (key, value) in items {
                let (section, rest) = key.split_once('.').unwrap_or(("general", key.as_str()));
                sections
                    .entry(section.to_string())
                    .or_default()
                    .push((rest.to_string(), value));
            }

            for (section, items) in sections {
                println!("[{}]", section.yellow());
                for (key, value) in items {
                    println!("  {} = {}", key.cyan(), value);
                }
                println!();
            }
        }
    }

    Ok(())
}

fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();

    generate(shell, &mut cmd, name, &mut std::io::stdout());
}
