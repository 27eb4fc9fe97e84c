use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the todolist binary.
#[derive(Debug, Parser)]
#[command(name = "todolist", version, about = "Personal task tracker with an offline layer")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "TODOLIST_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the REST API and static page server.
    Serve(Box<ServeArgs>),
    /// Run the offline proxy in front of a todolist server.
    Offline(OfflineArgs),
    /// Schema bootstrap and inspection.
    Database(DatabaseArgs),
    /// Replay queued offline mutations once and exit.
    Sync(SyncArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Skip the schema bootstrap normally run at startup.
    #[arg(long = "skip-database-init", action = clap::ArgAction::SetTrue)]
    pub skip_database_init: bool,

    /// Override the uploads directory.
    #[arg(long = "uploads-directory", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub uploads_directory: Option<PathBuf>,

    /// Override the static pages directory.
    #[arg(long = "static-directory", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub static_directory: Option<PathBuf>,

    /// Override the rate limit window size.
    #[arg(long = "rate-limit-window-seconds", value_name = "SECONDS")]
    pub rate_limit_window_seconds: Option<u64>,

    /// Override the rate limit request ceiling.
    #[arg(long = "rate-limit-max-requests", value_name = "COUNT")]
    pub rate_limit_max_requests: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct OfflineOverrides {
    /// Override the proxy listener host.
    #[arg(long = "offline-host", value_name = "HOST")]
    pub host: Option<String>,

    /// Override the proxy listener port.
    #[arg(long = "offline-port", value_name = "PORT")]
    pub port: Option<u16>,

    /// Origin requests are forwarded to.
    #[arg(long = "upstream", value_name = "URL")]
    pub upstream: Option<String>,

    /// Directory holding cache partitions, the sync queue and offline data.
    #[arg(long = "storage-dir", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub storage_dir: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct OfflineArgs {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    #[command(flatten)]
    pub overrides: OfflineOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct SyncArgs {
    #[command(flatten)]
    pub overrides: OfflineOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct DatabaseArgs {
    #[command(subcommand)]
    pub command: DatabaseCommand,
}

#[derive(Debug, Subcommand, Clone)]
pub enum DatabaseCommand {
    /// Create tables, fix missing columns and indexes, optionally seed demo data.
    Init(DatabaseInitArgs),
    /// Print tables with record counts and columns as JSON.
    Status(DatabaseOverride),
    /// Only add missing columns and indexes.
    Fix(DatabaseOverride),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseInitArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Drop existing tables first.
    #[arg(long = "drop-existing", action = clap::ArgAction::SetTrue)]
    pub drop_existing: bool,

    /// Do not insert the demo account.
    #[arg(long = "no-test-data", action = clap::ArgAction::SetTrue)]
    pub no_test_data: bool,
}
