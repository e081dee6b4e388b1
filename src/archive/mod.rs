//! Archive handling: safe extraction, format dispatch and re-packing.
//!
//! Extraction never trusts entry names. Every entry path is normalized and
//! checked against the destination directory before any byte is written;
//! entries that would escape (absolute paths, `..` components) are skipped
//! without failing the archive; see [`safe_entry_path`].
//!
//! Format support is environment-dependent: `.zip` is always available,
//! `.7z` and `.rar` only when the corresponding decoder is compiled in.
//! [`ArchiveCapabilities::detect`] probes this once per run and the result
//! is passed explicitly into the walker, so unsupported extensions fall
//! through to "unrecognized file" handling instead of crashing a run.

mod pack;
mod unpack;

pub use pack::{zip_directory, zip_files};
#[cfg(feature = "rar")]
pub use unpack::extract_rar;
#[cfg(feature = "sevenz")]
pub use unpack::extract_7z;
pub use unpack::{extract_zip, extract_zip_reader, safe_entry_path};

use std::path::Path;

use crate::core::FiscalError;

/// Extraction function compatible with the safe unpacker contract:
/// extract `archive` into `destination`, skipping escaping entries.
pub type ExtractFn = fn(&Path, &Path) -> Result<(), FiscalError>;

/// Immutable descriptor of the archive formats this build can extract.
///
/// Resolved once per run and passed explicitly wherever extraction is
/// dispatched; never stored in process-global state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveCapabilities {
    extensions: Vec<&'static str>,
}

impl ArchiveCapabilities {
    /// Probe the formats supported by this build.
    pub fn detect() -> Self {
        #[allow(unused_mut)]
        let mut extensions = vec![".zip"];
        #[cfg(feature = "sevenz")]
        extensions.push(".7z");
        #[cfg(feature = "rar")]
        extensions.push(".rar");
        Self { extensions }
    }

    /// The guaranteed baseline: zip only. Useful for callers that want
    /// deterministic behavior regardless of build features.
    pub fn zip_only() -> Self {
        Self {
            extensions: vec![".zip"],
        }
    }

    /// Supported extensions, lowercase with leading dot.
    pub fn extensions(&self) -> &[&'static str] {
        &self.extensions
    }

    /// Whether `ext` (lowercase, with leading dot) is a supported archive
    /// extension.
    pub fn supports(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| *e == ext)
    }

    /// Resolve an extension to its extraction function.
    pub fn extractor_for(&self, ext: &str) -> Option<ExtractFn> {
        if !self.supports(ext) {
            return None;
        }
        match ext {
            ".zip" => Some(extract_zip as ExtractFn),
            #[cfg(feature = "sevenz")]
            ".7z" => Some(extract_7z as ExtractFn),
            #[cfg(feature = "rar")]
            ".rar" => Some(extract_rar as ExtractFn),
            _ => None,
        }
    }
}
