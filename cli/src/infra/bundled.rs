//! Bundled-extraction strategy: agent binaries compiled into the CLI.
//!
//! With the `bundled-agent` feature, every file under `.build/agent/` is
//! embedded. Files are named by release asset name
//! (`cloudflared-linux-amd64`, `cloudflared-darwin-arm64.tgz`, ...), so the
//! same naming rules select the variant as for remote downloads.

use std::io::Write;
use std::path::Path;

use include_dir::Dir;
use tracing::info;

use crate::application::ports::BinarySource;
use crate::domain::platform::ARCHIVE_MEMBER;
use crate::domain::{Platform, ProvisionError};
use crate::infra::archive::{extract_member, write_atomically};

#[cfg(feature = "bundled-agent")]
static AGENT_DIR: Dir<'static> = include_dir::include_dir!("$CARGO_MANIFEST_DIR/../.build/agent");

/// Writes the embedded binary matching the current platform.
pub struct BundledBinarySource {
    dir: &'static Dir<'static>,
}

impl BundledBinarySource {
    #[must_use]
    pub fn new(dir: &'static Dir<'static>) -> Self {
        Self { dir }
    }

    /// Source backed by the binaries embedded at build time.
    #[cfg(feature = "bundled-agent")]
    #[must_use]
    pub fn embedded() -> Self {
        Self::new(&AGENT_DIR)
    }
}

impl BinarySource for BundledBinarySource {
    fn fetch(&self, platform: Platform, dest: &Path) -> Result<(), ProvisionError> {
        let asset = platform.asset_name();
        let file = self
            .dir
            .get_file(&asset)
            .ok_or_else(|| ProvisionError::MemberNotFound {
                member: asset.clone(),
                archive: "bundled agent binaries".to_string(),
            })?;
        info!(%asset, bytes = file.contents().len(), "extracting bundled tunnel agent");

        write_atomically(dest, |out| {
            if platform.is_archive() {
                extract_member(file.contents(), ARCHIVE_MEMBER, &asset, out)
            } else {
                out.write_all(file.contents())
                    .map_err(|e| ProvisionError::io("writing agent binary", e))
            }
        })
    }

    fn describe(&self) -> String {
        "bundled extraction".to_string()
    }
}
