//! Maintenance CLI for the suite's runtime store and configuration.
//!
//! Scenarios share facts through `storage/runtime.json`; this binary lets a
//! developer or CI job inspect, seed, or clear that record between runs, and
//! shows which role sessions the next authentication setup will reuse.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};

use suite::core::types::{FactKey, Role};
use suite::exit_codes;
use suite::io::config::{DEFAULT_CONFIG_PATH, SuiteConfig, load_config, write_config};
use suite::io::env::SuiteEnv;
use suite::io::runtime_store::RuntimeStore;
use suite::io::session_state::{AuthDecision, DEFAULT_AUTH_DIR, SessionStatePaths, auth_decision};

#[derive(Parser)]
#[command(
    name = "suite",
    version,
    about = "Runtime state and configuration for the end-to-end suite"
)]
struct Cli {
    /// Config file (missing file means defaults).
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Override the runtime store path from the config.
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect or edit the runtime fact store.
    Store {
        #[command(subcommand)]
        command: StoreCommand,
    },
    /// Create or validate the config file.
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Inspect saved role sessions.
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },
}

#[derive(Subcommand)]
enum StoreCommand {
    /// Print the whole record as JSON.
    Show,
    /// Print one fact. Exits with NOT_FOUND when it was never written.
    Get { key: FactKey },
    /// Write one fact (`userVerified` takes true/false).
    Set { key: FactKey, value: String },
    /// Remove the store file.
    Reset,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Write the default config.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Load and validate the config.
    Check,
}

#[derive(Subcommand)]
enum AuthCommand {
    /// Show, per role, whether the next setup run logs in or reuses its session.
    Status {
        /// Directory holding `<role>.json` session files.
        #[arg(long, default_value = DEFAULT_AUTH_DIR)]
        dir: PathBuf,
    },
}

fn main() {
    suite::logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Store { command } => {
            let store = open_store(&cli.config, cli.store)?;
            cmd_store(&store, command)
        }
        Command::Config { command } => match command {
            ConfigCommand::Init { force } => cmd_config_init(&cli.config, force),
            ConfigCommand::Check => cmd_config_check(&cli.config),
        },
        Command::Auth {
            command: AuthCommand::Status { dir },
        } => cmd_auth_status(&dir),
    }
}

fn open_store(config_path: &Path, override_path: Option<PathBuf>) -> Result<RuntimeStore> {
    let path = match override_path {
        Some(path) => path,
        None => load_config(config_path)?.store_path,
    };
    Ok(RuntimeStore::new(path))
}

fn cmd_store(store: &RuntimeStore, command: StoreCommand) -> Result<i32> {
    match command {
        StoreCommand::Show => {
            let record = store.snapshot()?;
            let payload = serde_json::to_string_pretty(&record).context("serialize record")?;
            println!("{payload}");
        }
        StoreCommand::Get { key } => match store.read(key)? {
            Some(value) => println!("{value}"),
            None => {
                eprintln!("{key} not found in {}", store.path().display());
                return Ok(exit_codes::NOT_FOUND);
            }
        },
        StoreCommand::Set { key, value } => {
            let value = key.parse_value(&value)?;
            store.write(key, value)?;
        }
        StoreCommand::Reset => {
            if store.reset()? {
                println!("removed {}", store.path().display());
            } else {
                println!("{} already absent", store.path().display());
            }
        }
    }
    Ok(exit_codes::OK)
}

fn cmd_config_init(path: &Path, force: bool) -> Result<i32> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &SuiteConfig::default())?;
    println!("wrote {}", path.display());
    Ok(exit_codes::OK)
}

fn cmd_config_check(path: &Path) -> Result<i32> {
    let cfg = load_config(path)?;
    println!(
        "ok: store {} | scenario timeout {}s | retrieval worst case {:?} | gate worst case {:?}",
        cfg.store_path.display(),
        cfg.scenario_timeout_secs,
        cfg.retrieval.worst_case(),
        cfg.gate.worst_case()
    );
    Ok(exit_codes::OK)
}

fn cmd_auth_status(dir: &Path) -> Result<i32> {
    let env = SuiteEnv::from_process()?;
    let paths = SessionStatePaths::new(dir);
    println!("environment {} ({})", env.environment, env.base_url);
    for role in Role::ALL {
        match auth_decision(&paths, &env, role) {
            AuthDecision::Authenticate { state_path } => {
                println!("{role}: authenticate -> {}", state_path.display());
            }
            AuthDecision::Reuse { state_path, reason } => {
                println!("{role}: reuse {} ({reason})", state_path.display());
            }
        }
    }
    Ok(exit_codes::OK)
}
