//! fwreg - Firmware registry client
//!
//! Uploads firmware binaries to object storage, registers their metadata, and
//! lists or deletes registered versions. Run without a subcommand to upload
//! every binary found in the default directory.

mod commands;
mod supabase;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "fwreg")]
#[command(about = "Manage firmware binaries in a hosted firmware registry")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "fwreg.toml")]
    config: PathBuf,

    /// Directory searched for firmware binaries (overrides config)
    #[arg(long)]
    bin_dir: Option<PathBuf>,

    /// Credentials file consulted when the environment lacks them (overrides config)
    #[arg(long)]
    env_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a binary and register it as a firmware version
    Upload {
        /// Binary file (looked up in the binary directory, `.bin` optional)
        path: String,
        /// Version string
        version: String,
        /// Device type tag
        device_type: String,
        /// "true" marks the version mandatory
        is_mandatory: Option<String>,
        /// Register even if the version already exists
        #[arg(long)]
        force: bool,
        /// Release notes (generated when omitted)
        #[arg(long)]
        notes: Option<String>,
    },

    /// List registered firmware versions
    List {
        /// Only show this device type
        device_type: Option<String>,
        /// Only show this version
        #[arg(long)]
        version: Option<String>,
    },

    /// List binaries in the binary directory
    Binaries,

    /// Delete a firmware version, or every version with --all
    Delete {
        /// Version to delete
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        version: Option<String>,
        /// Device type of the version
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        device_type: Option<String>,
        /// Delete every registered version
        #[arg(long)]
        all: bool,
    },
}

fn init_logging(log_level: &str) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Exit status for a failed argument parse
///
/// `--help` and `--version` surface as errors printed to stdout; those exit 0.
fn parse_error_status(e: &clap::Error) -> u8 {
    if e.use_stderr() {
        1
    } else {
        0
    }
}

/// Only a case-insensitive "true" marks an upload mandatory
fn mandatory_flag(value: Option<&str>) -> bool {
    value.map(|s| s.eq_ignore_ascii_case("true")).unwrap_or(false)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(parse_error_status(&e));
        }
    };

    if let Err(e) = init_logging(&args.log_level) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<bool> {
    let mut config = fwreg_core::load_config(&args.config)?;
    if let Some(bin_dir) = args.bin_dir {
        config.storage.bin_dir = bin_dir;
    }
    if let Some(env_file) = args.env_file {
        config.credentials.env_file = env_file;
    }

    match args.command {
        Some(Command::Binaries) => commands::binaries(&config),
        None => {
            let registry = commands::connect(config)?;
            commands::auto_upload(&registry).await
        }
        Some(Command::Upload {
            path,
            version,
            device_type,
            is_mandatory,
            force,
            notes,
        }) => {
            let registry = commands::connect(config)?;
            let options = commands::UploadOptions {
                is_mandatory: mandatory_flag(is_mandatory.as_deref()),
                force,
                notes,
            };
            commands::upload(&registry, &path, &version, &device_type, options).await
        }
        Some(Command::List {
            device_type,
            version,
        }) => {
            let registry = commands::connect(config)?;
            commands::list(&registry, device_type.as_deref(), version.as_deref()).await
        }
        Some(Command::Delete {
            version,
            device_type,
            all,
        }) => {
            let registry = commands::connect(config)?;
            commands::delete(&registry, version, device_type, all).await
        }
    }
}
