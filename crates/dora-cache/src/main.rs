//! CLI entry point for dora-cache.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use dora_cache_app::{EventCache, ProjectConfig};
use dora_cache_core::EventData;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

mod commands;
mod mcp;

/// Inspect and serve Dora's persistent event result cache.
#[derive(Parser, Debug)]
#[command(
    name = "dora-cache",
    version,
    about = "dora-cache: fingerprinted, TTL-bounded cache of processed event results"
)]
struct Cli {
    /// Directory holding `.dora/config.toml` (defaults to current).
    #[arg(long)]
    workdir: Option<PathBuf>,

    /// Cache database path, overriding config and environment.
    #[arg(long)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show cache statistics.
    Stats {
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Delete cached entries, optionally only those older than N days.
    Clear {
        #[arg(long)]
        older_than_days: Option<u32>,
    },

    /// Delete entries that fell out of the TTL window.
    Sweep,

    /// Delete entries whose event name matches a SQL LIKE pattern.
    Evict {
        /// Pattern such as `Jazz%`.
        pattern: String,
    },

    /// List recently accessed entries.
    List {
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Check whether a fresh result is cached for an event.
    Check {
        #[command(flatten)]
        event: EventArgs,
    },

    /// Print the cached result for an event (counts as a hit).
    Get {
        #[command(flatten)]
        event: EventArgs,
    },

    /// Start MCP server.
    Mcp,
}

/// Output rendering for listing commands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Identifying fields of an event, or a full JSON payload.
#[derive(Args, Debug, Clone, Default)]
struct EventArgs {
    /// Full event JSON; takes precedence over the field flags.
    #[arg(long)]
    json: Option<String>,
    #[arg(long, default_value = "")]
    name: String,
    #[arg(long, default_value = "")]
    start_date: String,
    #[arg(long, default_value = "")]
    location: String,
    #[arg(long)]
    url: Option<String>,
}

impl EventArgs {
    fn into_event(self) -> Result<EventData> {
        if let Some(raw) = self.json {
            return serde_json::from_str(&raw).context("failed to parse --json event payload");
        }
        let event = EventData::new(self.name, self.start_date, self.location);
        Ok(match self.url {
            Some(url) => event.with_url(url),
            None => event,
        })
    }
}

fn main() -> Result<()> {
    let Cli { workdir, db, cmd } = Cli::parse();

    if should_install_tracing(&cmd) {
        install_tracing();
    }

    let workdir = workdir.unwrap_or_else(|| PathBuf::from("."));
    tokio::runtime::Runtime::new()?.block_on(execute_command(&workdir, db, cmd))
}

async fn execute_command(workdir: &Path, db: Option<PathBuf>, command: Command) -> Result<()> {
    let mut config = ProjectConfig::load(workdir)?.cache;
    if let Some(db) = db {
        config.path = db;
    }

    let cache = EventCache::try_open(&config)
        .await
        .with_context(|| format!("failed to open event cache at {}", config.path.display()))?;

    match command {
        Command::Mcp => mcp::serve(cache).await,
        other => commands::run(other, &cache).await,
    }
}

const fn should_install_tracing(cmd: &Command) -> bool {
    !matches!(cmd, Command::Mcp)
}

fn install_tracing() {
    // RUST_LOG is honoured; INFO by default.
    let filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_span_events(FmtSpan::NONE)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}
