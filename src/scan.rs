//! Filesystem scanning and ingestion into the library.
//!
//! Walks every root recursively, decodes each eligible file through a
//! [`MetadataExtractor`], and upserts the photo and its owning set:
//!
//! ```text
//! ~/Pictures/                      # root
//! ├── 2014-greece/                 # set "2014-greece"
//! │   ├── IMG_0001.JPG             # photo
//! │   └── IMG_0002.jpg
//! └── archive/
//!     └── vacation/                # set "vacation"
//!         └── beach.jpeg
//! ```
//!
//! ## Rules
//!
//! - A set is keyed by the name of the photo's parent directory, so two
//!   directories with the same name in different places share one set.
//! - A photo is keyed by its absolute path. A path already in the library is
//!   left untouched and not decoded again (first write wins).
//! - Files whose extension is not in the configured list are ignored.
//! - A file that cannot be decoded is logged and skipped; the scan goes on.
//! - Chain links and set aggregates are not touched here; the linker owns them.
//!
//! A root that cannot be resolved, or any store failure, ends the scan.

use crate::metadata::MetadataExtractor;
use crate::store::{Library, StoreError};
use crate::types::NewPhoto;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Cannot read scan root {0}: {1}")]
    BadRoot(PathBuf, std::io::Error),
    #[error("Scan root is not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Counters for one scan run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Roots after resolution to absolute paths.
    pub roots: Vec<PathBuf>,
    /// Eligible files visited.
    pub files: usize,
    pub sets_created: usize,
    pub photos_created: usize,
    /// Eligible files whose path was already in the library.
    pub photos_known: usize,
    /// Eligible files that could not be ingested.
    pub skipped: usize,
}

/// Scan `roots` into `library`.
///
/// Every root is resolved before any file is read, so a bad root fails the
/// run without partial ingestion.
pub fn scan(
    library: &Library,
    extractor: &impl MetadataExtractor,
    roots: &[PathBuf],
    extensions: &[String],
) -> Result<ScanReport, ScanError> {
    let mut report = ScanReport {
        roots: resolve_roots(roots)?,
        ..Default::default()
    };

    for root in report.roots.clone() {
        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_eligible(entry.path(), extensions) {
                continue;
            }
            report.files += 1;
            ingest(library, extractor, entry.path(), &mut report)?;
        }
    }

    info!(
        files = report.files,
        sets_created = report.sets_created,
        photos_created = report.photos_created,
        skipped = report.skipped,
        "scan complete"
    );
    Ok(report)
}

fn resolve_roots(roots: &[PathBuf]) -> Result<Vec<PathBuf>, ScanError> {
    roots
        .iter()
        .map(|root| {
            let resolved = root
                .canonicalize()
                .map_err(|e| ScanError::BadRoot(root.clone(), e))?;
            if !resolved.is_dir() {
                return Err(ScanError::NotADirectory(root.clone()));
            }
            Ok(resolved)
        })
        .collect()
}

/// Case-insensitive extension match.
pub fn is_eligible(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)))
}

/// Name of the set a file belongs to.
pub fn set_name(path: &Path) -> Option<&str> {
    path.parent()?.file_name()?.to_str()
}

fn ingest(
    library: &Library,
    extractor: &impl MetadataExtractor,
    path: &Path,
    report: &mut ScanReport,
) -> Result<(), ScanError> {
    let Some(key) = path.to_str() else {
        warn!(path = %path.display(), "skipping non UTF-8 path");
        report.skipped += 1;
        return Ok(());
    };
    let Some(name) = set_name(path) else {
        warn!(path = key, "skipping file without a parent directory name");
        report.skipped += 1;
        return Ok(());
    };

    if library.find_photo(key)?.is_some() {
        debug!(path = key, "already in library");
        report.photos_known += 1;
        return Ok(());
    }

    let size = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) => {
            warn!(path = key, error = %e, "skipping unreadable file");
            report.skipped += 1;
            return Ok(());
        }
    };
    let decoded = match extractor.decode(path) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!(path = key, error = %e, "skipping undecodable file");
            report.skipped += 1;
            return Ok(());
        }
    };

    let set_id = match library.find_set(name)? {
        Some(id) => id,
        None => {
            let id = library.insert_set(name)?;
            info!(set_id = %id, set = name, "created set");
            report.sets_created += 1;
            id
        }
    };

    let photo_id = library.insert_photo(
        set_id,
        &NewPhoto {
            path: key.to_string(),
            size,
            width: decoded.width,
            height: decoded.height,
            capture: decoded.capture,
        },
    )?;
    info!(photo_id = %photo_id, path = key, "created photo");
    report.photos_created += 1;
    Ok(())
}
