use std::fs;
use std::io::{Read, Seek};
use std::path::{Component, Path, PathBuf};

use tracing::warn;
use zip::ZipArchive;

use crate::core::FiscalError;

/// Resolve an archive entry name to a path provably inside `dest`.
///
/// Backslashes are treated as separators (Windows-built archives), `.`
/// components are dropped, and any entry containing a `..` component, an
/// absolute path or a drive prefix yields `None`. Extraction callers skip
/// `None` entries silently; the zip-slip guard is a hard invariant, not a
/// reportable per-entry error.
pub fn safe_entry_path(dest: &Path, raw_name: &str) -> Option<PathBuf> {
    let normalized = raw_name.replace('\\', "/");
    let mut relative = PathBuf::new();
    for component in Path::new(&normalized).components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if relative.as_os_str().is_empty() {
        return None;
    }
    Some(dest.join(relative))
}

/// Extract a zip archive from disk into `dest`.
///
/// Directory entries are created, file entries overwrite on conflict and
/// escaping entries are skipped. Failure to open the container is fatal to
/// the caller; per-entry read failures abort the archive as corrupt.
pub fn extract_zip(archive: &Path, dest: &Path) -> Result<(), FiscalError> {
    let file = fs::File::open(archive)?;
    extract_zip_reader(file, dest)
}

/// Extract a zip archive from any seekable reader (in-memory uploads use a
/// `Cursor`) into `dest`.
pub fn extract_zip_reader<R: Read + Seek>(reader: R, dest: &Path) -> Result<(), FiscalError> {
    let mut archive = ZipArchive::new(reader)
        .map_err(|e| FiscalError::Archive(format!("failed to open zip archive: {e}")))?;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| FiscalError::Archive(format!("failed to read zip entry {index}: {e}")))?;

        let Some(target) = safe_entry_path(dest, entry.name()) else {
            warn!(entry = entry.name(), "skipping zip entry escaping destination");
            continue;
        };

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = fs::File::create(&target)?;
            std::io::copy(&mut entry, &mut out)?;
        }
    }
    Ok(())
}

/// Extract a 7z archive into `dest` under the same safety contract as
/// [`extract_zip`].
#[cfg(feature = "sevenz")]
pub fn extract_7z(archive: &Path, dest: &Path) -> Result<(), FiscalError> {
    let mut reader = sevenz_rust2::SevenZReader::open(archive, sevenz_rust2::Password::empty())
        .map_err(|e| FiscalError::Archive(format!("failed to open 7z archive: {e}")))?;

    let dest = dest.to_path_buf();
    reader
        .for_each_entries(|entry: &sevenz_rust2::SevenZArchiveEntry, stream: &mut dyn Read| {
            let Some(target) = safe_entry_path(&dest, entry.name()) else {
                warn!(entry = entry.name(), "skipping 7z entry escaping destination");
                return Ok(true);
            };
            if entry.is_directory() {
                fs::create_dir_all(&target)?;
            } else {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut out = fs::File::create(&target)?;
                std::io::copy(stream, &mut out)?;
            }
            Ok(true)
        })
        .map_err(|e| FiscalError::Archive(format!("failed to extract 7z archive: {e}")))?;
    Ok(())
}

/// Extract a RAR archive into `dest` under the same safety contract as
/// [`extract_zip`].
#[cfg(feature = "rar")]
pub fn extract_rar(archive: &Path, dest: &Path) -> Result<(), FiscalError> {
    let rar_err = |e: unrar::error::UnrarError| FiscalError::Archive(format!("rar error: {e}"));

    let mut open = unrar::Archive::new(archive)
        .open_for_processing()
        .map_err(rar_err)?;

    while let Some(header) = open.read_header().map_err(rar_err)? {
        let name = header.entry().filename.to_string_lossy().into_owned();
        open = if safe_entry_path(dest, &name).is_some() {
            header.extract_with_base(dest).map_err(rar_err)?
        } else {
            warn!(entry = %name, "skipping rar entry escaping destination");
            header.skip().map_err(rar_err)?
        };
    }
    Ok(())
}
