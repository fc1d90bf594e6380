//! EYWA task CLI
//!
//! Runs one client operation as a task under an EYWA host. The host talks
//! to this process over stdin/stdout, so stdout is reserved for the protocol:
//! human-readable output goes to stderr and results are also sent to the host
//! as a task report.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use eywa::{Config, Eywa, FolderRef, LogEvent, ParentFilter, TaskStatus};
use tracing::{debug, error, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;

/// Run EYWA client operations as a task
#[derive(Parser, Debug)]
#[command(name = "eywa")]
#[command(version, about, long_about = None)]
#[command(after_help = "\
Examples:
  eywa graphql '{ searchUser { name } }'
  eywa graphql @query.graphql --variables '{\"limit\": 5}'
  eywa log info \"Import started\"
  eywa upload report.pdf --folder-path /reports
  eywa download 6f1c0b9e-... --output ./report.pdf
  eywa files list --name report --limit 10
  eywa folders create archive --parent-path /reports
  eywa hash report.pdf            Local only, prints to stdout
")]
struct Cli {
    /// Config file (defaults to $EYWA_CONFIG or the platform config dir)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Fail host calls that get no reply within this many milliseconds
    #[arg(long, global = true, value_name = "MS")]
    call_timeout_ms: Option<u64>,

    /// Accept invalid TLS certificates from object storage (development only)
    #[arg(long, global = true)]
    accept_invalid_certs: bool,

    /// Hand the task back to the host instead of closing it with a status
    #[arg(long, global = true)]
    return_task: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a GraphQL query or mutation (prefix with @ to read it from a file)
    Graphql {
        query: String,

        /// Variables as a JSON object
        #[arg(long, value_name = "JSON")]
        variables: Option<String>,
    },

    /// Send a log line to the host
    Log {
        #[arg(value_enum)]
        level: Level,

        message: String,

        /// Extra data as JSON
        #[arg(long, value_name = "JSON")]
        data: Option<String>,
    },

    /// Show the current task record
    Task,

    /// Upload a local file
    Upload {
        path: PathBuf,

        /// Stored name (defaults to the file name)
        #[arg(long)]
        name: Option<String>,

        /// Client-chosen file id (a random one is generated when omitted)
        #[arg(long, value_name = "UUID")]
        euuid: Option<String>,

        /// Content type (guessed from the name when omitted)
        #[arg(long)]
        content_type: Option<String>,

        #[command(flatten)]
        folder: FolderArgs,
    },

    /// Download a file
    Download {
        uuid: String,

        /// Destination (defaults to the stored name in the current directory)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },

    /// File records
    Files {
        #[command(subcommand)]
        command: FilesCommand,
    },

    /// Folder records
    Folders {
        #[command(subcommand)]
        command: FoldersCommand,
    },

    /// Print the SHA-256 of a local file (does not contact the host)
    Hash { path: PathBuf },
}

#[derive(Subcommand, Debug)]
enum FilesCommand {
    /// List files, newest first
    List {
        /// Case-insensitive name fragment
        #[arg(long)]
        name: Option<String>,

        /// Upload status, e.g. UPLOADED
        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        limit: Option<u32>,

        #[command(flatten)]
        folder: FolderArgs,
    },

    /// Show one file
    Info { uuid: String },

    /// Delete a file
    Delete { uuid: String },
}

#[derive(Subcommand, Debug)]
enum FoldersCommand {
    /// List folders by name
    List {
        /// Case-insensitive name fragment
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        limit: Option<u32>,

        #[command(flatten)]
        parent: ParentArgs,
    },

    /// Create a folder (under the root folder unless a parent is given)
    Create {
        name: String,

        /// Client-chosen folder id
        #[arg(long, value_name = "UUID")]
        euuid: Option<String>,

        #[arg(long, value_name = "UUID", conflicts_with = "parent_path")]
        parent_uuid: Option<String>,

        #[arg(long, value_name = "PATH")]
        parent_path: Option<String>,
    },

    /// Show one folder
    Info {
        #[command(flatten)]
        folder: RequiredFolderArgs,
    },

    /// Delete an empty folder
    Delete { uuid: String },
}

/// Optional folder selector
#[derive(Args, Debug, Default)]
#[group(multiple = false)]
struct FolderArgs {
    #[arg(long, value_name = "UUID")]
    folder_uuid: Option<String>,

    #[arg(long, value_name = "PATH")]
    folder_path: Option<String>,
}

impl FolderArgs {
    fn folder_ref(self) -> Option<FolderRef> {
        folder_ref(self.folder_uuid, self.folder_path)
    }
}

/// Exactly one folder selector
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct RequiredFolderArgs {
    #[arg(long, value_name = "UUID")]
    uuid: Option<String>,

    #[arg(long, value_name = "PATH")]
    path: Option<String>,
}

impl RequiredFolderArgs {
    fn folder_ref(self) -> Option<FolderRef> {
        folder_ref(self.uuid, self.path)
    }
}

/// Parent constraint for folder listings
#[derive(Args, Debug, Default)]
#[group(multiple = false)]
struct ParentArgs {
    /// Only folders directly under the root folder
    #[arg(long)]
    root: bool,

    #[arg(long, value_name = "UUID")]
    parent_uuid: Option<String>,

    #[arg(long, value_name = "PATH")]
    parent_path: Option<String>,
}

impl ParentArgs {
    fn parent_filter(self) -> ParentFilter {
        if self.root {
            return ParentFilter::Root;
        }
        folder_ref(self.parent_uuid, self.parent_path)
            .map_or(ParentFilter::Any, ParentFilter::Folder)
    }
}

fn folder_ref(uuid: Option<String>, path: Option<String>) -> Option<FolderRef> {
    uuid.map(FolderRef::Euuid).or(path.map(FolderRef::Path))
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Level {
    Info,
    Warn,
    Error,
    Debug,
    Trace,
    Exception,
}

impl From<Level> for LogEvent {
    fn from(level: Level) -> Self {
        match level {
            Level::Info => LogEvent::Info,
            Level::Warn => LogEvent::Warn,
            Level::Error => LogEvent::Error,
            Level::Debug => LogEvent::Debug,
            Level::Trace => LogEvent::Trace,
            Level::Exception => LogEvent::Exception,
        }
    }
}

/// Set up logging on stderr; stdout carries the host protocol.
/// In debug builds, defaults to debug level and also logs to a timestamped file.
fn setup_logging() {
    let default_level = if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("eywa={default_level}")));

    if cfg!(debug_assertions) {
        let temp_dir = std::env::temp_dir();
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let log_filename = format!("eywa-{timestamp}.log");

        let file_appender = tracing_appender::rolling::never(&temp_dir, &log_filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        std::mem::forget(guard);

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(file_layer)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_line_number(true),
            )
            .with(filter)
            .init();

        debug!("Logging to: {}", temp_dir.join(&log_filename).display());
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_ansi(false),
            )
            .with(filter)
            .init();
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_default().context("Failed to load config")?,
    };

    if let Some(ms) = cli.call_timeout_ms {
        config.rpc.call_timeout_ms = Some(ms);
    }
    if cli.accept_invalid_certs {
        config.storage.accept_invalid_certs = true;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging();

    if let Command::Hash { path } = &cli.command {
        let hash = eywa::calculate_file_hash(path)
            .with_context(|| format!("Failed to hash {}", path.display()))?;
        println!("{hash}");
        return Ok(());
    }

    let config = load_config(&cli)?;
    let return_task = cli.return_task;
    let eywa = Eywa::open_pipe(config).context("Failed to start task connection")?;

    let status = match commands::run(&eywa, cli.command).await {
        Ok(()) => TaskStatus::Success,
        Err(e) => {
            error!("{e:#}");
            if let Err(log_err) = eywa.error(&format!("{e:#}"), None).await {
                warn!("Could not report failure to host: {log_err}");
            }
            TaskStatus::Error
        }
    };

    let finished = if return_task {
        eywa.return_task().await
    } else {
        eywa.close_task(status).await
    };
    if let Err(e) = finished {
        warn!("Could not finish task: {e}");
    }

    std::process::exit(status.exit_code());
}
