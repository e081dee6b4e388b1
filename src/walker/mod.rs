//! Recursive extraction/classification walker.
//!
//! Descends a directory tree, extracting nested archives into throwaway
//! scratch directories and routing every discovered XML to a destination:
//! a single one in join mode, or one of own/third-party/unclassified in
//! classify mode based on the caller's identity set.
//!
//! Failure semantics: a nested archive that fails to extract is a branch
//! failure: logged, skipped, siblings unaffected. Only an unreadable
//! top-level input or a classify-mode misconfiguration aborts the run.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::archive::{ArchiveCapabilities, extract_zip_reader};
use crate::core::{FiscalError, IdentitySet, OperationLog};
use crate::extract::parse_fields;

/// Default bound on nested-archive extraction depth. Exceeding it is a
/// branch failure, not a crash.
pub const DEFAULT_MAX_ARCHIVE_DEPTH: usize = 3;

/// Destination directories for classify mode.
#[derive(Debug, Clone)]
pub struct Destinations {
    /// Documents issued by one of the caller's identities.
    pub own: PathBuf,
    /// Documents received by one of the caller's identities.
    pub third_party: PathBuf,
    /// Everything else, including unparsable files.
    pub unclassified: PathBuf,
}

/// Operating mode: destination topology is the only difference.
#[derive(Debug, Clone)]
pub enum WalkMode {
    /// Funnel every discovered XML into one destination.
    Join { destination: PathBuf },
    /// Route by role attribution against the identity set.
    Classify {
        destinations: Destinations,
        identities: IdentitySet,
    },
}

/// The walker itself: capabilities plus the archive-nesting bound.
#[derive(Debug, Clone)]
pub struct Walker {
    capabilities: ArchiveCapabilities,
    max_archive_depth: usize,
}

impl Walker {
    pub fn new(capabilities: ArchiveCapabilities) -> Self {
        Self {
            capabilities,
            max_archive_depth: DEFAULT_MAX_ARCHIVE_DEPTH,
        }
    }

    pub fn with_max_archive_depth(mut self, depth: usize) -> Self {
        self.max_archive_depth = depth;
        self
    }

    /// Walk `root`, returning the number of files routed to destinations.
    ///
    /// Classify mode fails fast with a precondition error when the
    /// identity set is empty; an unreadable `root` is fatal. Everything
    /// below that is absorbed per branch.
    pub fn run(
        &self,
        root: &Path,
        mode: &WalkMode,
        log: &mut OperationLog,
    ) -> Result<u64, FiscalError> {
        match mode {
            WalkMode::Classify {
                destinations,
                identities,
            } => {
                if identities.is_empty() {
                    return Err(FiscalError::Precondition(
                        "classify mode requires at least one own identity".to_string(),
                    ));
                }
                fs::create_dir_all(&destinations.own)?;
                fs::create_dir_all(&destinations.third_party)?;
                fs::create_dir_all(&destinations.unclassified)?;
            }
            WalkMode::Join { destination } => fs::create_dir_all(destination)?,
        }
        log.push(format!(
            "supported archive extensions: {}",
            self.capabilities.extensions().join(", ")
        ));
        self.visit(root, mode, log, 0, true)
    }

    /// Unpack a top-level zip byte stream into a scratch directory and walk
    /// it. The scratch tree is removed on every exit path.
    pub fn run_on_archive(
        &self,
        archive: &[u8],
        mode: &WalkMode,
        log: &mut OperationLog,
    ) -> Result<u64, FiscalError> {
        let scratch = tempfile::Builder::new().prefix("fiscal_upload_").tempdir()?;
        extract_zip_reader(Cursor::new(archive), scratch.path())?;
        self.run(scratch.path(), mode, log)
    }

    fn visit(
        &self,
        dir: &Path,
        mode: &WalkMode,
        log: &mut OperationLog,
        archive_depth: usize,
        top_level: bool,
    ) -> Result<u64, FiscalError> {
        let read = match fs::read_dir(dir) {
            Ok(read) => read,
            Err(e) if top_level => {
                log.push(format!("error: failed to read folder {}: {e}", dir.display()));
                return Err(e.into());
            }
            Err(e) => {
                log.push(format!(
                    "warning: failed to read folder {}: {e}; skipping branch",
                    dir.display()
                ));
                return Ok(0);
            }
        };

        let mut entries: Vec<_> = read.filter_map(Result::ok).collect();
        entries.sort_by_key(|e| e.file_name());

        let mut routed = 0u64;
        for entry in entries {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();

            if path.is_dir() {
                routed += self.visit(&path, mode, log, archive_depth, false)?;
                continue;
            }
            if !path.is_file() {
                continue;
            }

            let ext = extension_of(&name);
            if self.capabilities.supports(&ext) {
                routed += self.descend_into_archive(&path, &name, &ext, mode, log, archive_depth)?;
            } else if ext == ".xml" {
                routed += self.route_xml(&path, &name, mode, log);
            } else {
                // unrecognized leaf, including archive types this build
                // cannot extract
                match mode {
                    WalkMode::Classify { destinations, .. } => {
                        log.push(format!("unrecognized file '{name}' moved to unclassified"));
                        if copy_with_suffix(&path, &name, &destinations.unclassified, log).is_some()
                        {
                            routed += 1;
                        }
                    }
                    WalkMode::Join { .. } => {}
                }
            }
        }
        Ok(routed)
    }

    fn descend_into_archive(
        &self,
        path: &Path,
        name: &str,
        ext: &str,
        mode: &WalkMode,
        log: &mut OperationLog,
        archive_depth: usize,
    ) -> Result<u64, FiscalError> {
        if archive_depth >= self.max_archive_depth {
            warn!(archive = name, "archive nesting bound exceeded");
            log.push(format!(
                "warning: '{name}' exceeds the archive nesting bound ({}); skipping",
                self.max_archive_depth
            ));
            return Ok(0);
        }
        let Some(extract) = self.capabilities.extractor_for(ext) else {
            return Ok(0);
        };

        log.push(format!("extracting archive: {name}..."));
        // Scratch tree is exclusively owned by this frame; TempDir removes
        // it recursively on drop, on success and failure alike.
        let scratch = tempfile::Builder::new().prefix("fiscal_nested_").tempdir()?;

        match extract(path, scratch.path()) {
            Ok(()) => self.visit(scratch.path(), mode, log, archive_depth + 1, false),
            Err(e) => {
                warn!(archive = name, error = %e, "nested archive extraction failed");
                log.push(format!("warning: failed to extract '{name}': {e}; skipping"));
                Ok(0)
            }
        }
    }

    fn route_xml(&self, path: &Path, name: &str, mode: &WalkMode, log: &mut OperationLog) -> u64 {
        let target = match mode {
            WalkMode::Join { destination } => destination,
            WalkMode::Classify {
                destinations,
                identities,
            } => {
                let fields = match fs::read(path) {
                    Ok(bytes) => parse_fields(&bytes),
                    Err(e) => {
                        log.push(format!("warning: failed to read '{name}': {e}"));
                        Default::default()
                    }
                };
                // issuer match takes priority over recipient match
                if fields
                    .issuer
                    .as_deref()
                    .is_some_and(|id| identities.contains(id))
                {
                    &destinations.own
                } else if fields
                    .recipient
                    .as_deref()
                    .is_some_and(|id| identities.contains(id))
                {
                    &destinations.third_party
                } else {
                    &destinations.unclassified
                }
            }
        };
        if copy_with_suffix(path, name, target, log).is_some() {
            1
        } else {
            0
        }
    }
}

fn extension_of(name: &str) -> String {
    match name.rfind('.') {
        Some(pos) => name[pos..].trim().to_ascii_lowercase(),
        None => String::new(),
    }
}

/// Copy `src` into `dest_dir`, appending `_N` before the extension until a
/// free name is found, so files with identical names extracted from
/// different nested archives never overwrite each other.
fn copy_with_suffix(
    src: &Path,
    file_name: &str,
    dest_dir: &Path,
    log: &mut OperationLog,
) -> Option<PathBuf> {
    let (stem, ext) = match file_name.rfind('.') {
        Some(pos) => (&file_name[..pos], &file_name[pos..]),
        None => (file_name, ""),
    };

    let mut target = dest_dir.join(file_name);
    let mut counter = 1u32;
    while target.exists() {
        target = dest_dir.join(format!("{stem}_{counter}{ext}"));
        counter += 1;
    }

    match fs::copy(src, &target) {
        Ok(_) => Some(target),
        Err(e) => {
            log.push(format!("warning: failed to copy '{file_name}': {e}"));
            None
        }
    }
}
