//! Target platform of the agent binary and its release asset naming.

use std::fmt;

use crate::domain::error::ProvisionError;

/// Name of the executable member inside macOS release archives.
pub const ARCHIVE_MEMBER: &str = "cloudflared";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    Linux,
    MacOs,
    Windows,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    Amd64,
    Arm64,
}

/// An OS/architecture pair the agent ships a binary for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
}

impl Platform {
    /// Map Rust's `std::env::consts` names onto a supported platform.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::UnsupportedPlatform`] for any pair the agent
    /// does not publish a binary for.
    pub fn from_parts(os: &str, arch: &str) -> Result<Self, ProvisionError> {
        let unsupported = || ProvisionError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        };
        let os_kind = match os {
            "linux" => Os::Linux,
            "macos" => Os::MacOs,
            "windows" => Os::Windows,
            _ => return Err(unsupported()),
        };
        let arch_kind = match arch {
            "x86_64" => Arch::Amd64,
            "aarch64" => Arch::Arm64,
            _ => return Err(unsupported()),
        };
        if os_kind == Os::Windows && arch_kind == Arch::Arm64 {
            return Err(unsupported());
        }
        Ok(Self {
            os: os_kind,
            arch: arch_kind,
        })
    }

    /// The platform this process runs on.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is not a supported platform.
    pub fn current() -> Result<Self, ProvisionError> {
        Self::from_parts(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Release asset name, e.g. `cloudflared-darwin-arm64.tgz`.
    #[must_use]
    pub fn asset_name(self) -> String {
        match self.os {
            Os::Linux => format!("cloudflared-linux-{}", self.arch),
            Os::MacOs => format!("cloudflared-darwin-{}.tgz", self.arch),
            Os::Windows => format!("cloudflared-windows-{}.exe", self.arch),
        }
    }

    /// `true` when the asset is a gzip tarball rather than a raw executable.
    #[must_use]
    pub fn is_archive(self) -> bool {
        self.os == Os::MacOs
    }

    /// File name of the executable in the cache directory.
    #[must_use]
    pub fn binary_file_name(self) -> String {
        match self.os {
            Os::Windows => format!("{ARCHIVE_MEMBER}.exe"),
            Os::Linux | Os::MacOs => format!("{ARCHIVE_MEMBER}-{self}"),
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Arch::Amd64 => "amd64",
            Arch::Arm64 => "arm64",
        })
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let os = match self.os {
            Os::Linux => "linux",
            Os::MacOs => "darwin",
            Os::Windows => "windows",
        };
        write!(f, "{os}-{}", self.arch)
    }
}
