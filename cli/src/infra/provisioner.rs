//! Infrastructure implementation of the `BinaryProvider` port.
//!
//! `BinaryProvisioner` resolves a validated agent executable in this order:
//! the path cached in memory from an earlier start, the file left in the cache
//! directory by a previous run, and finally the configured [`BinarySource`].
//! A freshly written file that fails validation is deleted and reported; a
//! broken binary is never returned.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::application::ports::{BinaryProvider, BinarySource};
use crate::domain::{BinaryDefect, Platform, ProvisionError, RetentionPolicy};

/// Smallest file accepted as a real agent binary.
pub const MIN_BINARY_SIZE: u64 = 10 * 1024 * 1024;

/// Validate `path` as an agent binary and return its size.
///
/// On POSIX a file missing its execute bits is repaired to `0755` in place.
///
/// # Errors
///
/// Returns the [`BinaryDefect`] that disqualifies the file.
pub fn check_binary(path: &Path) -> Result<u64, BinaryDefect> {
    let meta = std::fs::metadata(path).map_err(|_| BinaryDefect::Missing)?;
    if !meta.is_file() {
        return Err(BinaryDefect::Missing);
    }
    if meta.len() < MIN_BINARY_SIZE {
        return Err(BinaryDefect::TooSmall {
            size: meta.len(),
            minimum: MIN_BINARY_SIZE,
        });
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if meta.permissions().mode() & 0o111 == 0 {
            debug!(path = %path.display(), "repairing execute permission");
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
                .map_err(|e| BinaryDefect::NotExecutable(e.to_string()))?;
        }
    }
    Ok(meta.len())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<(), ProvisionError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .map_err(|e| ProvisionError::io(format!("chmod {}", path.display()), e))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<(), ProvisionError> {
    Ok(())
}

/// Provisions and caches the agent binary for one platform.
pub struct BinaryProvisioner<S> {
    source: Arc<S>,
    cache_dir: PathBuf,
    platform: Platform,
    retention: RetentionPolicy,
    cached: RwLock<Option<PathBuf>>,
}

impl<S: BinarySource> BinaryProvisioner<S> {
    pub fn new(source: S, cache_dir: PathBuf, platform: Platform, retention: RetentionPolicy) -> Self {
        Self {
            source: Arc::new(source),
            cache_dir,
            platform,
            retention,
            cached: RwLock::new(None),
        }
    }

    /// Where the binary for this platform lives in the cache directory.
    #[must_use]
    pub fn binary_path(&self) -> PathBuf {
        self.cache_dir.join(self.platform.binary_file_name())
    }

    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    #[must_use]
    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    /// Path remembered from the last successful `obtain`, if any.
    #[must_use]
    pub fn cached_path(&self) -> Option<PathBuf> {
        self.cached.read().clone()
    }

    fn remember(&self, path: &Path) {
        *self.cached.write() = Some(path.to_path_buf());
    }

    fn remove_cached(&self) -> Result<(), ProvisionError> {
        let Some(path) = self.cached.write().take() else {
            return Ok(());
        };
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!(path = %path.display(), "removed agent binary");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ProvisionError::io(format!("removing {}", path.display()), e)),
        }
    }
}

impl<S: BinarySource> BinaryProvider for BinaryProvisioner<S> {
    async fn obtain(&self) -> Result<PathBuf, ProvisionError> {
        if let Some(path) = self.cached_path() {
            match check_binary(&path) {
                Ok(size) => {
                    debug!(path = %path.display(), size, "using cached agent binary");
                    return Ok(path);
                }
                Err(defect) => {
                    warn!(path = %path.display(), %defect, "cached agent binary is no longer valid");
                    *self.cached.write() = None;
                }
            }
        }

        let path = self.binary_path();
        if let Ok(size) = check_binary(&path) {
            info!(path = %path.display(), size, "reusing agent binary from cache directory");
            self.remember(&path);
            return Ok(path);
        }

        std::fs::create_dir_all(&self.cache_dir).map_err(|e| {
            ProvisionError::io(format!("creating {}", self.cache_dir.display()), e)
        })?;
        info!(
            source = %self.source.describe(),
            platform = %self.platform,
            "provisioning tunnel agent"
        );

        let source = Arc::clone(&self.source);
        let platform = self.platform;
        let dest = path.clone();
        tokio::task::spawn_blocking(move || source.fetch(platform, &dest))
            .await
            .map_err(|e| ProvisionError::Task(e.to_string()))??;

        let validated = make_executable(&path)
            .map_err(|e| BinaryDefect::NotExecutable(e.to_string()))
            .and_then(|()| check_binary(&path));
        match validated {
            Ok(size) => {
                info!(path = %path.display(), size, "tunnel agent ready");
                self.remember(&path);
                Ok(path)
            }
            Err(defect) => {
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %e, "failed to remove invalid agent binary");
                }
                Err(ProvisionError::InvalidBinary { path, defect })
            }
        }
    }

    fn release(&self) {
        if self.retention != RetentionPolicy::Ephemeral {
            return;
        }
        if let Err(e) = self.remove_cached() {
            warn!(error = %e, "failed to remove agent binary after run");
        }
    }

    fn purge(&self) -> Result<(), ProvisionError> {
        self.remove_cached()
    }
}
