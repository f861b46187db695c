//! The derivation capability and its parameters.
//!
//! A [`Deriver`] turns one source image into one resized JPEG. It is
//! stateless and shared by all pool workers, hence the `Sync` bound.
//!
//! | Implementation | Module |
//! |---|---|
//! | `vipsthumbnail` child process (default) | [`vips`](super::vips) |
//! | `image` crate, in process | [`builtin`](super::builtin) |

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DeriveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// JPEG quality (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(97)
    }
}

/// One derivation.
#[derive(Debug, Clone, PartialEq)]
pub struct DeriveParams {
    pub source: PathBuf,
    pub output: PathBuf,
    /// Long edge in pixels, or the side of the square when cropping.
    pub size: u32,
    /// Center-crop to a `size` x `size` square.
    pub crop: bool,
    /// Honor the source's orientation tag.
    pub rotate: bool,
    pub quality: Quality,
}

/// Produce `params.output` from `params.source`.
///
/// Implementations write the output file and nothing else; publishing it
/// under its final name is the cache's job.
pub trait Deriver: Sync {
    fn derive(&self, params: &DeriveParams) -> Result<(), DeriveError>;
}
