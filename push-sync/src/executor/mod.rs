//! Synchronization run orchestrator.
//!
//! Sequences validation, manifest build, negotiation and transfer for one
//! run. States:
//!
//! ```text
//! Init -> Validated -> ManifestBuilt -> Negotiated -> Done            (incremental, nothing dirty)
//!                                                  -> TransferPending -> Done
//!                   -> TransferPending -> Done                        (full)
//! any step -> Failed
//! ```
//!
//! Failures abort the remaining steps and are reported once, tagged with the
//! stage that failed. Nothing is retried here.

use crate::config::SyncConfig;
use crate::fs::{DirectoryScanner, PathFilter};
use crate::manifest::{build_manifest, filtered_paths};
use crate::negotiate::negotiate;
use crate::protocol::{HttpAgent, RemoteAgent, SyncRequest};
use crate::transfer::progress::{format_bytes, format_duration};
use crate::transfer::{transfer, TransferSummary};
use crate::utils::{blocking, Result, Stage, SyncError};
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Synchronization strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Negotiate a dirty set and send only those files
    Incremental,
    /// Send the whole filtered tree without negotiating
    Full,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Incremental => f.write_str("incremental"),
            SyncMode::Full => f.write_str("full"),
        }
    }
}

/// Run states, logged as the run advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    Validated,
    ManifestBuilt,
    Negotiated,
    TransferPending,
    Done,
    Failed,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub mode: SyncMode,
    pub target_dir: String,
    /// Files in the manifest (`None` in full mode, where none is built)
    pub manifest_files: Option<usize>,
    /// Files the agent reported dirty (`None` in full mode)
    pub dirty_files: Option<usize>,
    pub transferred_files: usize,
    pub transferred_bytes: u64,
    pub duration: Duration,
}

/// Inputs checked before any remote call is made.
#[derive(Debug, Clone)]
struct ValidatedRun {
    source: PathBuf,
    target_dir: String,
    filter: PathFilter,
    mode: SyncMode,
    prune_stale: bool,
}

/// Drives one synchronization run against a [`RemoteAgent`].
pub struct SyncOrchestrator<A> {
    config: SyncConfig,
    agent: A,
}

impl<A: RemoteAgent> SyncOrchestrator<A> {
    pub fn new(config: SyncConfig, agent: A) -> Self {
        Self { config, agent }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn agent(&self) -> &A {
        &self.agent
    }

    /// Execute a run. Every failure is a [`SyncError::SyncFailed`] naming the stage.
    pub async fn run(&self) -> Result<SyncReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("sync", %run_id);

        async {
            let started = Instant::now();
            enter(RunState::Init);

            let result = match self.validate() {
                Ok(run) => {
                    enter(RunState::Validated);
                    match run.mode {
                        SyncMode::Incremental => self.run_incremental(&run, started).await,
                        SyncMode::Full => self.run_full(&run, started).await,
                    }
                }
                Err(e) => Err(e.at(Stage::Validation)),
            };

            match &result {
                Ok(report) => {
                    enter(RunState::Done);
                    info!(
                        "{} sync of {} finished in {}: {} files, {} sent",
                        report.mode,
                        report.target_dir,
                        format_duration(report.duration),
                        report.transferred_files,
                        format_bytes(report.transferred_bytes)
                    );
                }
                Err(e) => {
                    enter(RunState::Failed);
                    error!("{}", e);
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Check host and source before touching the network.
    fn validate(&self) -> Result<ValidatedRun> {
        let config = &self.config;

        if config.remote.host().is_none() {
            return Err(SyncError::Configuration(
                "Host name is missing. Please set remote.host or --host.".into(),
            ));
        }

        let source = config.resolved_source().ok_or_else(|| {
            SyncError::Configuration(
                "Source directory is mandatory. Please set source or --source.".into(),
            )
        })?;
        DirectoryScanner::new(&source)?;

        let target_dir = config
            .target_dir()
            .ok_or_else(|| SyncError::Configuration("Target directory is missing.".into()))?;

        let mode = if config.full {
            SyncMode::Full
        } else {
            SyncMode::Incremental
        };

        debug!(source = %source.display(), target_dir = %target_dir, %mode, "Run validated");
        Ok(ValidatedRun {
            source,
            target_dir,
            filter: config.filter(),
            mode,
            prune_stale: config.prune_stale,
        })
    }

    async fn run_incremental(&self, run: &ValidatedRun, started: Instant) -> Result<SyncReport> {
        let source = run.source.clone();
        let filter = run.filter.clone();
        let manifest = blocking(&run.source, move || build_manifest(&source, &filter))
            .await
            .map_err(|e| e.at(Stage::Scan))?;
        enter(RunState::ManifestBuilt);

        let manifest_files = manifest.len();
        info!("Manifest built: {} files under {}", manifest_files, run.source.display());

        let request = SyncRequest {
            target_dir: run.target_dir.clone(),
            manifest,
            prune_stale: run.prune_stale,
        };
        let dirty = negotiate(&self.agent, request)
            .await
            .map_err(|e| e.at(Stage::Negotiation))?;
        enter(RunState::Negotiated);

        let dirty_files = dirty.len();
        if dirty.is_empty() {
            info!("Target {} is up to date, nothing to send", run.target_dir);
            return Ok(SyncReport {
                mode: SyncMode::Incremental,
                target_dir: run.target_dir.clone(),
                manifest_files: Some(manifest_files),
                dirty_files: Some(0),
                transferred_files: 0,
                transferred_bytes: 0,
                duration: started.elapsed(),
            });
        }

        enter(RunState::TransferPending);
        let summary = self.send(run, dirty.into_paths()).await?;

        Ok(SyncReport {
            mode: SyncMode::Incremental,
            target_dir: run.target_dir.clone(),
            manifest_files: Some(manifest_files),
            dirty_files: Some(dirty_files),
            transferred_files: summary.files,
            transferred_bytes: summary.bytes,
            duration: started.elapsed(),
        })
    }

    async fn run_full(&self, run: &ValidatedRun, started: Instant) -> Result<SyncReport> {
        if run.prune_stale {
            warn!("Stale file removal only happens during negotiation and is skipped in full mode");
        }

        let source = run.source.clone();
        let filter = run.filter.clone();
        let paths = blocking(&run.source, move || filtered_paths(&source, &filter))
            .await
            .map_err(|e| e.at(Stage::Scan))?;
        enter(RunState::TransferPending);

        let summary = self.send(run, paths).await?;

        Ok(SyncReport {
            mode: SyncMode::Full,
            target_dir: run.target_dir.clone(),
            manifest_files: None,
            dirty_files: None,
            transferred_files: summary.files,
            transferred_bytes: summary.bytes,
            duration: started.elapsed(),
        })
    }

    async fn send(&self, run: &ValidatedRun, paths: Vec<String>) -> Result<TransferSummary> {
        transfer(&self.agent, &run.target_dir, &run.source, paths)
            .await
            .map_err(|e| e.at(Stage::Transfer))
    }
}

impl SyncOrchestrator<HttpAgent> {
    /// Orchestrator talking HTTP to the configured agent. Configuration
    /// problems surface as validation failures, like those found by [`run`](Self::run).
    pub fn connect(config: SyncConfig) -> Result<Self> {
        let agent = HttpAgent::new(&config.remote).map_err(|e| {
            let e = e.at(Stage::Validation);
            error!("{}", e);
            e
        })?;
        Ok(Self::new(config, agent))
    }
}

fn enter(state: RunState) {
    debug!(?state, "Sync state");
}
