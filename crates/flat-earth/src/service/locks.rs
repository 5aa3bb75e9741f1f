use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;

/// One async lock per configuration file
///
/// Paths are canonicalized so different spellings of the same file share a lock. Entries are never removed.
#[derive(Debug, Default, Clone)]
pub struct FileLocks {
    locks: Arc<Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>>,
}

impl FileLocks {
    pub async fn lock(&self, path: &Path) -> OwnedMutexGuard<()> {
        let key = canonical(path);
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(key.clone()).or_default().clone()
        };

        tracing::trace!(path=%key.display(), "waiting for file lock");
        lock.lock_owned().await
    }
}

/// Canonical form of `path`, also for files that don't exist yet
fn canonical(path: &Path) -> PathBuf {
    if let Ok(path) = std::fs::canonicalize(path) {
        return path;
    }

    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => std::fs::canonicalize(parent)
            .map(|parent| parent.join(name))
            .unwrap_or_else(|_| path.to_owned()),
        _ => path.to_owned(),
    }
}
