//! Push Sync - command-line entry point

use anyhow::Result;
use clap::Parser;
use push_sync::{config::SyncConfig, utils, SyncOrchestrator};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Local directory to synchronize
    #[arg(short, long, value_name = "DIR")]
    source: Option<PathBuf>,

    /// Directory a relative source is resolved against
    #[arg(long, value_name = "DIR")]
    base_dir: Option<PathBuf>,

    /// Host running the sync agent
    #[arg(long)]
    host: Option<String>,

    /// Agent port (scheme default when omitted)
    #[arg(short, long)]
    port: Option<u16>,

    /// Talk to the agent over HTTPS
    #[arg(long)]
    secure: bool,

    /// Web context the agent is mounted under
    #[arg(long)]
    agent: Option<String>,

    /// Remote target directory (defaults to the host name)
    #[arg(short, long)]
    target: Option<String>,

    /// Send every file without comparing digests. Use this if a changed file
    /// could have been missed by an MD5 collision.
    #[arg(long)]
    full: bool,

    /// Delete target files that no longer exist locally
    #[arg(long)]
    prune_stale: bool,

    /// Only synchronize files ending with this suffix
    #[arg(long, value_name = "SUFFIX")]
    includes: Option<String>,

    /// Skip files ending with this suffix
    #[arg(long, value_name = "SUFFIX")]
    excludes: Option<String>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

impl Args {
    /// Flags win over the configuration file.
    fn apply(self, config: &mut SyncConfig) {
        if let Some(source) = self.source {
            config.source = Some(source);
        }
        if let Some(base_dir) = self.base_dir {
            config.base_dir = base_dir;
        }
        if let Some(host) = self.host {
            config.remote.host = Some(host);
        }
        if let Some(port) = self.port {
            config.remote.port = port;
        }
        if let Some(agent) = self.agent {
            config.remote.agent = agent;
        }
        if let Some(timeout) = self.timeout {
            config.remote.timeout_secs = timeout;
        }
        if let Some(target) = self.target {
            config.target = Some(target);
        }
        if let Some(includes) = self.includes {
            config.includes = Some(includes);
        }
        if let Some(excludes) = self.excludes {
            config.excludes = Some(excludes);
        }
        if let Some(level) = self.log_level {
            config.log.level = level;
        }
        config.remote.secure |= self.secure;
        config.full |= self.full;
        config.prune_stale |= self.prune_stale;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => SyncConfig::from_file(path)?,
        None => SyncConfig::default(),
    };
    args.apply(&mut config);

    utils::logger::init(&config.log.level)?;

    tracing::info!("Starting push-sync v{}", env!("CARGO_PKG_VERSION"));

    let orchestrator = SyncOrchestrator::connect(config)?;
    tracing::info!("Agent endpoint: {}", orchestrator.agent().base_url());

    let report = orchestrator.run().await?;

    if let Some(dirty) = report.dirty_files {
        tracing::info!(
            "{} of {} files differed on {}",
            dirty,
            report.manifest_files.unwrap_or_default(),
            report.target_dir
        );
    }

    Ok(())
}
