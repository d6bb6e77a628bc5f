//! Filesystem infrastructure: application directories, the ingress file
//! writer and file hashing.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use crate::application::ports::IngressWriter;
use crate::domain::{IngressDocument, ProvisionError, SupervisorError};

/// Application-scoped subdirectory under the OS cache and config roots.
pub const APP_DIR: &str = "burrow";

/// File name of the generated ingress configuration.
pub const INGRESS_FILE: &str = "ingress.yml";

/// `<os cache dir>/burrow`, where the agent binary is cached.
///
/// # Errors
///
/// Returns [`ProvisionError::NoCacheDir`] if the platform has no cache root.
pub fn cache_dir() -> Result<PathBuf, ProvisionError> {
    dirs::cache_dir()
        .map(|d| d.join(APP_DIR))
        .ok_or(ProvisionError::NoCacheDir)
}

/// `<os config dir>/burrow`, where config and the ingress file live.
///
/// # Errors
///
/// Returns an error if the platform has no config root.
pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|d| d.join(APP_DIR))
        .ok_or_else(|| anyhow::anyhow!("cannot determine config directory"))
}

/// Writes the ingress document as YAML into a fixed directory.
pub struct IngressFileWriter {
    dir: PathBuf,
}

impl IngressFileWriter {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.dir.join(INGRESS_FILE)
    }

    fn write_file(&self, doc: &IngressDocument) -> Result<PathBuf> {
        let yaml = doc.to_yaml().context("cannot serialize ingress config")?;
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("cannot create {}", self.dir.display()))?;

        // Atomic write via temp file in the same directory, then rename.
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)
            .with_context(|| format!("cannot create temp file in {}", self.dir.display()))?;
        tmp.write_all(yaml.as_bytes())
            .context("cannot write ingress config")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file()
                .set_permissions(std::fs::Permissions::from_mode(0o600))
                .context("cannot set ingress config permissions")?;
        }
        let path = self.path();
        tmp.persist(&path)
            .with_context(|| format!("cannot replace {}", path.display()))?;
        Ok(path)
    }
}

impl IngressWriter for IngressFileWriter {
    fn write(&self, doc: &IngressDocument) -> Result<PathBuf, SupervisorError> {
        self.write_file(doc).map_err(|e| SupervisorError::Ingress {
            path: self.path(),
            reason: format!("{e:#}"),
        })
    }
}

/// Compute the SHA256 hex digest of a file.
///
/// Reads the file in 64 KB chunks to avoid loading large files into memory.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file =
        std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 65536];
    loop {
        let n = file.read(&mut buf).context("reading file")?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher
        .finalize()
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect())
}
