//! Helpers shared by the binary sources: archive member extraction and
//! atomic placement of the finished file.

use std::ffi::OsStr;
use std::io::{Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use tempfile::NamedTempFile;

use crate::domain::ProvisionError;

/// Copy the file named `member` out of a gzip-compressed tarball.
///
/// Matches on the entry's file name so archives that nest the executable in
/// a directory are accepted too.
///
/// # Errors
///
/// Returns [`ProvisionError::MemberNotFound`] if no regular file named
/// `member` exists, or an I/O error if the archive is corrupt.
pub fn extract_member<R: Read>(
    archive: R,
    member: &str,
    archive_name: &str,
    out: &mut impl Write,
) -> Result<(), ProvisionError> {
    let reading = || format!("reading {archive_name}");
    let mut tar = tar::Archive::new(GzDecoder::new(archive));
    for entry in tar.entries().map_err(|e| ProvisionError::io(reading(), e))? {
        let mut entry = entry.map_err(|e| ProvisionError::io(reading(), e))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let is_member = entry
            .path()
            .map_err(|e| ProvisionError::io(reading(), e))?
            .file_name()
            == Some(OsStr::new(member));
        if is_member {
            std::io::copy(&mut entry, out)
                .map_err(|e| ProvisionError::io(format!("extracting {member}"), e))?;
            return Ok(());
        }
    }
    Err(ProvisionError::MemberNotFound {
        member: member.to_string(),
        archive: archive_name.to_string(),
    })
}

/// Write `dest` through a temp file in the same directory so a crash never
/// leaves a truncated binary behind.
///
/// # Errors
///
/// Returns an error if `fill` fails or the temp file cannot be created or
/// renamed into place.
pub fn write_atomically(
    dest: &Path,
    fill: impl FnOnce(&mut NamedTempFile) -> Result<(), ProvisionError>,
) -> Result<(), ProvisionError> {
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)
        .map_err(|e| ProvisionError::io(format!("creating temp file in {}", dir.display()), e))?;
    fill(&mut tmp)?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| ProvisionError::io("flushing agent binary", e))?;
    tmp.persist(dest)
        .map_err(|e| ProvisionError::io(format!("writing {}", dest.display()), e.error))?;
    Ok(())
}
