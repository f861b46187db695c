//! Whole-library recomputation of sibling chains and set aggregates.
//!
//! Runs after every scan, in two phases, each committed as one transaction:
//!
//! 1. **Chains**: every photo gets `prev`/`next` links to its neighbours in
//!    its set, ordered by capture time. Photos without a capture time sort
//!    after all timed photos of their set; equal times fall back to identity.
//! 2. **Aggregates**: every set gets its photo count, earliest capture time,
//!    and cover photo (the head of its chain).
//!
//! The computation is pure ([`sibling_links`], [`set_summaries`]); only
//! [`link`] touches the store. A failure in either phase leaves that phase's
//! previous state intact and is returned to the caller.

use crate::store::{Library, StoreError};
use crate::types::{ChainEntry, SetId, SetSummary, SiblingLink};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Cannot read library: {0}")]
    Read(#[from] StoreError),
    #[error("Relinking sibling chains failed: {0}")]
    Chains(StoreError),
    #[error("Updating set aggregates failed: {0}")]
    Aggregates(StoreError),
}

/// Counters for one linker run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkReport {
    pub sets: usize,
    pub photos: usize,
    pub links: usize,
}

/// Chain order: set, then capture time with missing times last, then id.
pub fn sort_chain(entries: &mut [ChainEntry]) {
    entries.sort_by_key(|e| (e.set_id, e.taken_at.is_none(), e.taken_at, e.id));
}

/// Links between consecutive photos of the same set.
///
/// `order` must already be in chain order.
pub fn sibling_links(order: &[ChainEntry]) -> Vec<SiblingLink> {
    order
        .windows(2)
        .filter(|pair| pair[0].set_id == pair[1].set_id)
        .map(|pair| SiblingLink {
            prev: pair[0].id,
            next: pair[1].id,
        })
        .collect()
}

/// Aggregates for every set in `set_ids`.
///
/// `order` must already be in chain order, which makes the first photo of
/// each set both its earliest capture and its cover. A set with no photos
/// gets a zero count and no cover.
pub fn set_summaries(set_ids: &[SetId], order: &[ChainEntry]) -> Vec<SetSummary> {
    let mut by_set: HashMap<SetId, SetSummary> = HashMap::new();
    for entry in order {
        by_set
            .entry(entry.set_id)
            .and_modify(|s| s.photos_count += 1)
            .or_insert(SetSummary {
                set_id: entry.set_id,
                photos_count: 1,
                taken_at: entry.taken_at,
                cover: Some(entry.id),
            });
    }
    set_ids
        .iter()
        .map(|&set_id| {
            by_set.remove(&set_id).unwrap_or(SetSummary {
                set_id,
                photos_count: 0,
                taken_at: None,
                cover: None,
            })
        })
        .collect()
}

/// Recompute chains and aggregates for the whole library.
pub fn link(library: &mut Library) -> Result<LinkReport, LinkError> {
    let mut order = library.chain_order()?;
    sort_chain(&mut order);

    let links = sibling_links(&order);
    for l in &links {
        debug!(prev = %l.prev, next = %l.next, "link");
    }
    library
        .replace_links(&links)
        .map_err(LinkError::Chains)?;
    info!(photos = order.len(), links = links.len(), "sibling chains rebuilt");

    let set_ids = library.set_ids()?;
    let summaries = set_summaries(&set_ids, &order);
    for s in &summaries {
        debug!(
            set_id = %s.set_id,
            photos_count = s.photos_count,
            cover = ?s.cover,
            "set summary"
        );
    }
    library
        .replace_set_summaries(&summaries)
        .map_err(LinkError::Aggregates)?;
    info!(sets = summaries.len(), "set aggregates updated");

    Ok(LinkReport {
        sets: summaries.len(),
        photos: order.len(),
        links: links.len(),
    })
}
