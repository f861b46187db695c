//! # Thyme
//!
//! Keeps an index of a personal photo library in SQLite and a cache of
//! thumbnails for it. Directories become sets, photos are chained in
//! capture order within their set, and every photo gets two JPEG thumbs.
//!
//! # Architecture: Two Pipelines
//!
//! ```text
//! 1. Sync     roots/   →  scan  →  library.db  →  link  →  library.db
//! 2. Derive   library.db (most recent sets first)  →  worker pool  →  thumbs/
//! ```
//!
//! The sync pipeline is single-threaded and strictly ordered: the scanner
//! only inserts rows, the linker then rebuilds every chain link and set
//! aggregate from scratch inside transactions. The derive pipeline is the
//! only concurrent part: a fixed pool of workers fills the thumbnail cache,
//! which uses presence on disk as its only state.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `thyme.toml` loading, stock defaults, merging, validation |
//! | [`types`] | Shared records: sets, photos, capture metadata, identities |
//! | [`store`] | SQLite library: schema, upserts, transactional link/aggregate writes |
//! | [`metadata`] | Dimension and EXIF extraction behind the [`metadata::MetadataExtractor`] trait |
//! | [`scan`] | Walks roots and ingests new photos (first write wins) |
//! | [`link`] | Rebuilds sibling chains and set aggregates |
//! | [`thumbs`] | Thumbnail cache, derivers, and the worker pool |
//! | [`views`] | JSON shapes for sets and photos with presentation fields |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Recompute, Don't Patch
//!
//! The linker does not maintain chains incrementally. Every run reads all
//! photos in order and rewrites every link, clearing the old ones first in
//! the same transaction. This costs a full pass per scan but leaves no
//! state that can drift.
//!
//! ## Path-Keyed Thumbnails
//!
//! Artifacts are named after a hash of the photo's stored path, so any
//! consumer holding a photo row can find its thumbs without a lookup table.
//! A changed source file keeps its old thumbs until they are deleted.
//!
//! ## Pluggable Derivation
//!
//! Thumbs are made by `vipsthumbnail` by default, or in-process with the
//! `image` crate when no external tool is available. Both sit behind
//! [`thumbs::deriver::Deriver`], which is also where tests plug in a mock.

pub mod config;
pub mod link;
pub mod metadata;
pub mod output;
pub mod scan;
pub mod store;
pub mod thumbs;
pub mod types;
pub mod views;

#[cfg(test)]
pub(crate) mod test_helpers;
