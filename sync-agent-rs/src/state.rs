use crate::config::AppConfig;
use crate::error::AppError;
use crate::services::target;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub struct AppState {
    pub config: AppConfig,
    pub started: Instant,
    /// One lock per resolved target, so pushes to the same tree never interleave.
    /// Entries live only while a call holds or waits on them.
    target_locks: Arc<DashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            started: Instant::now(),
            target_locks: Arc::new(DashMap::new()),
        }
    }

    /// Resolve a client target directory under the document root.
    pub fn resolve_target(&self, target_dir: &str) -> Result<PathBuf, AppError> {
        if !self.config.doc_root.is_dir() {
            return Err(AppError::ServiceUnavailable(format!(
                "Document root {} is not available",
                self.config.doc_root.display()
            )));
        }
        target::resolve(&self.config.doc_root, target_dir)
    }

    pub async fn lock_target(&self, target: &Path) -> TargetLock {
        let lock = self
            .target_locks
            .entry(target.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        // Built before waiting so a cancelled call still cleans up its entry
        let mut held = TargetLock {
            key: target.to_path_buf(),
            locks: self.target_locks.clone(),
            lock: Some(lock.clone()),
            guard: None,
        };
        held.guard = Some(lock.lock_owned().await);
        held
    }

    #[cfg(test)]
    pub(crate) fn locked_targets(&self) -> usize {
        self.target_locks.len()
    }
}

/// Exclusive access to one target directory. The map entry is removed once
/// the last holder or waiter lets go.
pub struct TargetLock {
    key: PathBuf,
    locks: Arc<DashMap<PathBuf, Arc<Mutex<()>>>>,
    lock: Option<Arc<Mutex<()>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for TargetLock {
    fn drop(&mut self) {
        self.guard.take();
        self.lock.take();
        self.locks
            .remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}
