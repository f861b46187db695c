//! Thumbnail cache: derived JPEGs keyed by source path and size class.
//!
//! ## Artifact names
//!
//! An artifact lives at `<dir>/<sha256(photo path)>_<big|small>.jpg`. The key
//! is the *path*, not the content, so anything holding a photo's stored path
//! can locate its thumbnails by recomputing the hash (see
//! [`views`](crate::views)).
//!
//! ## Cache contract
//!
//! Presence on disk is the only state. [`ThumbCache::ensure`] returns an
//! existing artifact without deriving, so each (path, size class) is derived
//! at most once per artifact lifetime, across restarts. Editing a source
//! photo does not refresh its thumbnails; delete the artifacts to force that.
//!
//! Derivation writes to a temporary file in the artifacts directory which is
//! renamed into place once complete. The expected path therefore only ever
//! holds a finished artifact, and two concurrent derivations of the same
//! artifact both publish a complete file (the later rename wins).
//!
//! ## Size classes
//!
//! | Class | Shape |
//! |---|---|
//! | big | long edge `big_size`, aspect ratio preserved |
//! | small | `small_size` square, center-cropped |
//!
//! [`ThumbCache::ensure_pair`] derives the small artifact from the big one
//! when the big one is available, falling back to the source otherwise.

pub mod builtin;
pub mod calculations;
pub mod deriver;
pub mod pool;
pub mod vips;

use crate::config::ThumbsConfig;
use deriver::{DeriveError, DeriveParams, Deriver, Quality};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub use builtin::BuiltinDeriver;
pub use pool::{PoolError, ThumbEvent, ThumbReport, run_pool};
pub use vips::VipsDeriver;

#[derive(Error, Debug)]
pub enum ThumbError {
    #[error("Cannot create artifacts directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),
    #[error("Cannot derive {class} thumb of {path}: {source}")]
    Derive {
        path: PathBuf,
        class: SizeClass,
        source: DeriveError,
    },
    #[error("Derivation of {class} thumb of {path} produced no output")]
    MissingOutput { path: PathBuf, class: SizeClass },
    #[error("Cannot publish {0}: {1}")]
    Publish(PathBuf, std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeClass {
    Big,
    Small,
}

impl SizeClass {
    pub const ALL: [SizeClass; 2] = [SizeClass::Big, SizeClass::Small];

    pub fn suffix(self) -> &'static str {
        match self {
            SizeClass::Big => "big",
            SizeClass::Small => "small",
        }
    }
}

impl fmt::Display for SizeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// SHA-256 of a photo path, as lowercase hex.
pub fn path_hash(photo_path: &Path) -> String {
    format!(
        "{:x}",
        Sha256::digest(photo_path.as_os_str().as_encoded_bytes())
    )
}

/// File name of a photo's artifact, e.g. `3f2a…9c_big.jpg`.
pub fn artifact_name(photo_path: &Path, class: SizeClass) -> String {
    format!("{}_{}.jpg", path_hash(photo_path), class.suffix())
}

/// Whether an artifact was found or made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactStatus {
    Cached,
    Derived,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub status: ArtifactStatus,
}

/// Outcome of deriving both size classes for one photo.
#[derive(Debug)]
pub struct PairOutcome {
    pub big: Result<Artifact, ThumbError>,
    pub small: Result<Artifact, ThumbError>,
}

/// File-system backed cache of thumbnail artifacts.
#[derive(Debug, Clone)]
pub struct ThumbCache {
    dir: PathBuf,
    big_size: u32,
    small_size: u32,
    quality: Quality,
}

impl ThumbCache {
    /// Open the cache, creating its directory if needed.
    pub fn new(config: &ThumbsConfig) -> Result<Self, ThumbError> {
        std::fs::create_dir_all(&config.dir)
            .map_err(|e| ThumbError::CreateDir(config.dir.clone(), e))?;
        Ok(Self {
            dir: config.dir.clone(),
            big_size: config.big_size,
            small_size: config.small_size,
            quality: Quality::new(config.quality),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn artifact_path(&self, photo_path: &Path, class: SizeClass) -> PathBuf {
        self.dir.join(artifact_name(photo_path, class))
    }

    fn params(&self, source: &Path, output: &Path, class: SizeClass) -> DeriveParams {
        let (size, crop) = match class {
            SizeClass::Big => (self.big_size, false),
            SizeClass::Small => (self.small_size, true),
        };
        DeriveParams {
            source: source.to_path_buf(),
            output: output.to_path_buf(),
            size,
            crop,
            rotate: true,
            quality: self.quality,
        }
    }

    /// Return the artifact for `(photo_path, class)`, deriving it from the
    /// photo itself if absent.
    pub fn ensure<D: Deriver + ?Sized>(
        &self,
        deriver: &D,
        photo_path: &Path,
        class: SizeClass,
    ) -> Result<Artifact, ThumbError> {
        self.ensure_from(deriver, photo_path, photo_path, class)
    }

    /// Like [`ensure`](Self::ensure), but derive from `source`. The artifact
    /// is still keyed by `photo_path`.
    pub fn ensure_from<D: Deriver + ?Sized>(
        &self,
        deriver: &D,
        photo_path: &Path,
        source: &Path,
        class: SizeClass,
    ) -> Result<Artifact, ThumbError> {
        let target = self.artifact_path(photo_path, class);
        if target.exists() {
            debug!(path = %photo_path.display(), %class, "thumb cached");
            return Ok(Artifact {
                path: target,
                status: ArtifactStatus::Cached,
            });
        }

        let publish_err = |e| ThumbError::Publish(target.clone(), e);
        let temp = tempfile::Builder::new()
            .prefix(".")
            .suffix(".jpg")
            .tempfile_in(&self.dir)
            .map_err(publish_err)?;

        deriver
            .derive(&self.params(source, temp.path(), class))
            .map_err(|source| ThumbError::Derive {
                path: photo_path.to_path_buf(),
                class,
                source,
            })?;

        let written = std::fs::metadata(temp.path()).is_ok_and(|m| m.len() > 0);
        if !written {
            return Err(ThumbError::MissingOutput {
                path: photo_path.to_path_buf(),
                class,
            });
        }
        temp.persist(&target).map_err(|e| publish_err(e.error))?;

        Ok(Artifact {
            path: target,
            status: ArtifactStatus::Derived,
        })
    }

    /// Ensure both size classes, big first. The small artifact is derived
    /// from the big artifact when that is available, else from the source.
    pub fn ensure_pair<D: Deriver + ?Sized>(&self, deriver: &D, photo_path: &Path) -> PairOutcome {
        let big = self.ensure(deriver, photo_path, SizeClass::Big);
        let small_source = match &big {
            Ok(artifact) => artifact.path.clone(),
            Err(_) => photo_path.to_path_buf(),
        };
        let small = self.ensure_from(deriver, photo_path, &small_source, SizeClass::Small);
        PairOutcome { big, small }
    }
}
