use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::core::FiscalError;

/// Build a zip archive in memory from named byte buffers.
pub fn zip_files(files: &[(String, Vec<u8>)]) -> Result<Vec<u8>, FiscalError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, content) in files {
        writer
            .start_file(name, options)
            .map_err(|e| FiscalError::Archive(format!("failed to add '{name}' to zip: {e}")))?;
        writer.write_all(content)?;
    }
    let cursor = writer
        .finish()
        .map_err(|e| FiscalError::Archive(format!("failed to finish zip: {e}")))?;
    Ok(cursor.into_inner())
}

/// Zip a directory tree in memory, storing entry names relative to `dir`.
///
/// Used to hand classify/join results back to the caller as a single byte
/// stream.
pub fn zip_directory(dir: &Path) -> Result<Vec<u8>, FiscalError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    add_dir_entries(&mut writer, dir, Path::new(""), options)?;
    let cursor = writer
        .finish()
        .map_err(|e| FiscalError::Archive(format!("failed to finish zip: {e}")))?;
    Ok(cursor.into_inner())
}

fn add_dir_entries(
    writer: &mut ZipWriter<Cursor<Vec<u8>>>,
    dir: &Path,
    prefix: &Path,
    options: SimpleFileOptions,
) -> Result<(), FiscalError> {
    let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<Result<_, _>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let relative = prefix.join(entry.file_name());
        // zip entry names always use forward slashes
        let name = relative.to_string_lossy().replace('\\', "/");

        if path.is_dir() {
            writer
                .add_directory(format!("{name}/"), options)
                .map_err(|e| FiscalError::Archive(format!("failed to add directory: {e}")))?;
            add_dir_entries(writer, &path, &relative, options)?;
        } else {
            writer
                .start_file(&name, options)
                .map_err(|e| FiscalError::Archive(format!("failed to add '{name}': {e}")))?;
            let mut file = fs::File::open(&path)?;
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)?;
            writer.write_all(&buf)?;
        }
    }
    Ok(())
}
