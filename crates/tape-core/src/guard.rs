//! Single-instance enforcement through a marker resource.
//!
//! The existence of the marker is the exclusivity signal. [`InstanceGuard`]
//! creates it on acquire (create-new, so two racing processes cannot both
//! win) and removes it when the guard is dropped or released.
//!
//! This is advisory only. A process that dies without unwinding (SIGKILL,
//! power loss) leaves the marker behind and an operator has to delete it.

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::RecorderError;

/// Storage for marker resources.
pub trait MarkerStore: Send + Sync {
    /// Create the marker. `Ok(false)` if it already exists.
    fn try_create(&self, path: &Path) -> io::Result<bool>;

    /// Remove the marker if present.
    fn remove(&self, path: &Path) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool;
}

/// Markers as empty files.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsMarkerStore;

impl MarkerStore for FsMarkerStore {
    fn try_create(&self, path: &Path) -> io::Result<bool> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Markers held in process memory.
#[derive(Debug, Default)]
pub struct MemoryMarkerStore {
    markers: Mutex<HashSet<PathBuf>>,
}

impl MarkerStore for MemoryMarkerStore {
    fn try_create(&self, path: &Path) -> io::Result<bool> {
        Ok(self.markers.lock().insert(path.to_path_buf()))
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.markers.lock().remove(path);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.markers.lock().contains(path)
    }
}

/// Held marker. Dropping it releases the marker.
pub struct InstanceGuard {
    store: Arc<dyn MarkerStore>,
    path: PathBuf,
    released: bool,
}

impl InstanceGuard {
    /// Claim `path`, failing with [`RecorderError::SingletonViolation`] if
    /// another holder already created it.
    pub fn acquire(store: Arc<dyn MarkerStore>, path: &Path) -> Result<Self, RecorderError> {
        let created = store.try_create(path).map_err(|e| {
            RecorderError::Persistence(format!("create marker {}: {e}", path.display()))
        })?;
        if !created {
            return Err(RecorderError::SingletonViolation { path: path.to_path_buf() });
        }
        info!("[guard] acquired {}", path.display());
        Ok(Self {
            store,
            path: path.to_path_buf(),
            released: false,
        })
    }

    /// Remove the marker now instead of at drop.
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        match self.store.remove(&self.path) {
            Ok(()) => info!("[guard] released {}", self.path.display()),
            Err(e) => warn!("[guard] failed to remove {}: {e}", self.path.display()),
        }
    }
}

impl Drop for InstanceGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl std::fmt::Debug for InstanceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceGuard")
            .field("path", &self.path)
            .field("released", &self.released)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_release() {
        let store: Arc<dyn MarkerStore> = Arc::new(MemoryMarkerStore::default());
        let path = Path::new(".tape-ticker.lock");

        let first = InstanceGuard::acquire(store.clone(), path).unwrap();
        let err = InstanceGuard::acquire(store.clone(), path).unwrap_err();
        assert!(matches!(err, RecorderError::SingletonViolation { .. }));
        assert!(store.exists(path));

        first.release();
        assert!(!store.exists(path));
        let again = InstanceGuard::acquire(store.clone(), path).unwrap();
        drop(again);
        assert!(!store.exists(path));
    }

    #[test]
    fn distinct_markers_do_not_conflict() {
        let store: Arc<dyn MarkerStore> = Arc::new(MemoryMarkerStore::default());
        let _a = InstanceGuard::acquire(store.clone(), Path::new("a.lock")).unwrap();
        let _b = InstanceGuard::acquire(store.clone(), Path::new("b.lock")).unwrap();
    }

    #[test]
    fn filesystem_marker_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run/.tape.lock");
        let store: Arc<dyn MarkerStore> = Arc::new(FsMarkerStore);

        let guard = InstanceGuard::acquire(store.clone(), &path).unwrap();
        assert!(path.exists());
        assert!(matches!(
            InstanceGuard::acquire(store.clone(), &path),
            Err(RecorderError::SingletonViolation { .. })
        ));

        drop(guard);
        assert!(!path.exists());
    }

    #[test]
    fn stale_marker_blocks_acquire() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".tape.lock");
        fs::write(&path, b"").unwrap();

        let err = InstanceGuard::acquire(Arc::new(FsMarkerStore), &path).unwrap_err();
        assert!(err.to_string().contains(".tape.lock"));
        assert!(path.exists());
    }
}
