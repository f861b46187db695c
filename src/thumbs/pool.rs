//! Derivation worker pool.
//!
//! The calling thread streams photo paths out of the library (most recent
//! sets first, see [`Library::for_each_thumb_source`]) into a bounded
//! channel. `workers` threads of a dedicated rayon pool pull from it and run
//! [`ThumbCache::ensure_pair`] for each photo. The channel holds at most one
//! pending path per worker, so a slow deriver throttles the database read.
//!
//! Each photo counts as one unit of progress once both size classes have
//! been attempted, whatever the outcome. A failure is logged with the photo
//! path, size class, and error, and the worker moves on. The run returns only
//! after the stream is exhausted and every worker has finished.

use super::deriver::Deriver;
use super::{Artifact, ArtifactStatus, SizeClass, ThumbCache, ThumbError};
use crate::store::{Library, StoreError};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, Sender, sync_channel};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Cannot start worker pool: {0}")]
    Threads(#[from] rayon::ThreadPoolBuildError),
}

/// Progress events sent while the pool runs.
#[derive(Debug, Clone, PartialEq)]
pub enum ThumbEvent {
    Started {
        total: usize,
        workers: usize,
    },
    /// Both size classes of one photo were attempted. `None` marks a failure.
    PhotoDone {
        completed: usize,
        total: usize,
        path: PathBuf,
        big: Option<ArtifactStatus>,
        small: Option<ArtifactStatus>,
    },
}

/// Totals for one pool run. Artifact counts cover both size classes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThumbReport {
    pub photos: usize,
    pub derived: usize,
    pub cached: usize,
    pub failed: usize,
    /// Photos with at least one failed artifact.
    pub failed_photos: usize,
}

impl fmt::Display for ThumbReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} photos: {} derived, {} cached",
            self.photos, self.derived, self.cached
        )?;
        if self.failed > 0 {
            write!(
                f,
                ", {} failed ({} photos)",
                self.failed, self.failed_photos
            )?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct Counters {
    completed: AtomicUsize,
    derived: AtomicUsize,
    cached: AtomicUsize,
    failed: AtomicUsize,
    failed_photos: AtomicUsize,
}

impl Counters {
    fn record(
        &self,
        path: &Path,
        class: SizeClass,
        result: &Result<Artifact, ThumbError>,
    ) -> Option<ArtifactStatus> {
        match result {
            Ok(artifact) => {
                let counter = match artifact.status {
                    ArtifactStatus::Derived => &self.derived,
                    ArtifactStatus::Cached => &self.cached,
                };
                counter.fetch_add(1, Ordering::Relaxed);
                Some(artifact.status)
            }
            Err(e) => {
                warn!(path = %path.display(), %class, error = %e, "thumb derivation failed");
                self.failed.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn report(&self) -> ThumbReport {
        ThumbReport {
            photos: self.completed.load(Ordering::Relaxed),
            derived: self.derived.load(Ordering::Relaxed),
            cached: self.cached.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            failed_photos: self.failed_photos.load(Ordering::Relaxed),
        }
    }
}

/// Derive both thumbs for every photo in the library.
pub fn run_pool<D: Deriver + ?Sized>(
    library: &Library,
    cache: &ThumbCache,
    deriver: &D,
    workers: usize,
    events: Option<Sender<ThumbEvent>>,
) -> Result<ThumbReport, PoolError> {
    let workers = workers.max(1);
    let total = library.photo_count()? as usize;
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("thumbs-{i}"))
        .build()?;

    if let Some(tx) = &events {
        tx.send(ThumbEvent::Started { total, workers }).ok();
    }
    info!(total, workers, "deriving thumbs");

    let (tx, rx) = sync_channel::<PathBuf>(workers);
    let rx = Arc::new(Mutex::new(rx));
    let counters = Counters::default();

    let produced = pool.in_place_scope(|scope| {
        for _ in 0..workers {
            let rx = Arc::clone(&rx);
            let events = events.clone();
            let counters = &counters;
            scope.spawn(move |_| worker(&rx, cache, deriver, counters, total, events));
        }
        // Only workers hold the receiver, so sends fail once they are all gone.
        drop(rx);
        let produced = library.for_each_thumb_source(|path| {
            // Fails only if every worker is gone, which ends the run anyway.
            tx.send(path).ok();
        });
        drop(tx);
        produced
    });
    produced?;

    let report = counters.report();
    info!(%report, "thumbs done");
    Ok(report)
}

fn worker<D: Deriver + ?Sized>(
    rx: &Mutex<Receiver<PathBuf>>,
    cache: &ThumbCache,
    deriver: &D,
    counters: &Counters,
    total: usize,
    events: Option<Sender<ThumbEvent>>,
) {
    loop {
        let next = match rx.lock() {
            Ok(guard) => guard.recv(),
            Err(_) => break,
        };
        let Ok(path) = next else { break };

        let outcome = cache.ensure_pair(deriver, &path);
        let big = counters.record(&path, SizeClass::Big, &outcome.big);
        let small = counters.record(&path, SizeClass::Small, &outcome.small);
        if big.is_none() || small.is_none() {
            counters.failed_photos.fetch_add(1, Ordering::Relaxed);
        }
        let completed = counters.completed.fetch_add(1, Ordering::Relaxed) + 1;

        if let Some(tx) = &events {
            tx.send(ThumbEvent::PhotoDone {
                completed,
                total,
                path,
                big,
                small,
            })
            .ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThumbsConfig;
    use crate::test_helpers::{new_photo, ts};
    use crate::thumbs::deriver::tests::MockDeriver;
    use crate::thumbs::deriver::{DeriveError, DeriveParams};
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn cache(tmp: &TempDir) -> ThumbCache {
        ThumbCache::new(&ThumbsConfig {
            dir: tmp.path().join("thumbs"),
            ..ThumbsConfig::default()
        })
        .unwrap()
    }

    fn library_with(paths: &[&str]) -> Library {
        let library = Library::open_in_memory().unwrap();
        let set = library.insert_set("s").unwrap();
        for (i, path) in paths.iter().enumerate() {
            let when = ts(&format!("2016-01-01 00:00:{i:02}"));
            library.insert_photo(set, &new_photo(path, Some(when))).unwrap();
        }
        library
    }

    #[test]
    fn every_photo_gets_both_artifacts() {
        let tmp = TempDir::new().unwrap();
        let cache = cache(&tmp);
        let paths: Vec<String> = (0..25).map(|i| format!("/photos/s/{i}.jpg")).collect();
        let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
        let library = library_with(&refs);
        let deriver = MockDeriver::new();

        let report = run_pool(&library, &cache, &deriver, 4, None).unwrap();

        assert_eq!(
            report,
            ThumbReport {
                photos: 25,
                derived: 50,
                cached: 0,
                failed: 0,
                failed_photos: 0,
            }
        );
        for path in &paths {
            for class in SizeClass::ALL {
                assert!(cache.artifact_path(Path::new(path), class).exists());
            }
        }
    }

    #[test]
    fn second_run_is_all_cache_hits() {
        let tmp = TempDir::new().unwrap();
        let cache = cache(&tmp);
        let library = library_with(&["/p/a.jpg", "/p/b.jpg"]);
        let deriver = MockDeriver::new();

        run_pool(&library, &cache, &deriver, 2, None).unwrap();
        let second = run_pool(&library, &cache, &deriver, 2, None).unwrap();

        assert_eq!(second.cached, 4);
        assert_eq!(second.derived, 0);
        assert_eq!(deriver.get_operations().len(), 4);
    }

    #[test]
    fn big_failure_is_isolated_to_its_photo() {
        let tmp = TempDir::new().unwrap();
        let cache = cache(&tmp);
        let library = library_with(&["/p/good-1.jpg", "/p/bad.jpg", "/p/good-2.jpg"]);
        let deriver = MockDeriver::new().failing_at("bad", 1000);

        let report = run_pool(&library, &cache, &deriver, 3, None).unwrap();

        assert_eq!(report.photos, 3);
        assert_eq!(report.failed, 1);
        assert_eq!(report.failed_photos, 1);
        assert_eq!(report.derived, 5);
        let bad = Path::new("/p/bad.jpg");
        assert!(!cache.artifact_path(bad, SizeClass::Big).exists());
        assert!(cache.artifact_path(bad, SizeClass::Small).exists());
        for good in ["/p/good-1.jpg", "/p/good-2.jpg"] {
            for class in SizeClass::ALL {
                assert!(cache.artifact_path(Path::new(good), class).exists());
            }
        }
        // The small thumb of the failed photo came straight from the source.
        let small_sources: Vec<PathBuf> = deriver
            .get_operations()
            .into_iter()
            .filter(|op| op.crop && op.source.ends_with("bad.jpg"))
            .map(|op| op.source)
            .collect();
        assert_eq!(small_sources, vec![PathBuf::from("/p/bad.jpg")]);
    }

    #[test]
    fn progress_counts_every_photo_once() {
        let tmp = TempDir::new().unwrap();
        let cache = cache(&tmp);
        let library = library_with(&["/p/a.jpg", "/p/b.jpg", "/p/c.jpg"]);
        let deriver = MockDeriver::new().failing("b.jpg");
        let (tx, rx) = std::sync::mpsc::channel();

        run_pool(&library, &cache, &deriver, 2, Some(tx)).unwrap();
        let events: Vec<ThumbEvent> = rx.into_iter().collect();

        assert_eq!(events[0], ThumbEvent::Started { total: 3, workers: 2 });
        let done: Vec<&ThumbEvent> = events[1..].iter().collect();
        assert_eq!(done.len(), 3);
        let mut completed: Vec<usize> = done
            .iter()
            .map(|e| match e {
                ThumbEvent::PhotoDone { completed, .. } => *completed,
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        completed.sort();
        assert_eq!(completed, vec![1, 2, 3]);
        let failed: HashSet<PathBuf> = done
            .iter()
            .filter_map(|e| match e {
                ThumbEvent::PhotoDone {
                    path, big: None, ..
                } => Some(path.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(failed, HashSet::from([PathBuf::from("/p/b.jpg")]));
    }

    #[test]
    fn single_worker_follows_library_order() {
        let tmp = TempDir::new().unwrap();
        let cache = cache(&tmp);
        let library = library_with(&["/p/first.jpg", "/p/second.jpg", "/p/third.jpg"]);
        let deriver = MockDeriver::new();

        run_pool(&library, &cache, &deriver, 1, None).unwrap();

        let bigs: Vec<PathBuf> = deriver
            .get_operations()
            .into_iter()
            .filter(|op| !op.crop)
            .map(|op| op.source)
            .collect();
        assert_eq!(
            bigs,
            vec![
                PathBuf::from("/p/first.jpg"),
                PathBuf::from("/p/second.jpg"),
                PathBuf::from("/p/third.jpg"),
            ]
        );
    }

    struct PanickingDeriver;

    impl Deriver for PanickingDeriver {
        fn derive(&self, _params: &DeriveParams) -> Result<(), DeriveError> {
            panic!("deriver blew up");
        }
    }

    #[test]
    #[should_panic(expected = "deriver blew up")]
    fn worker_panic_reaches_the_caller_instead_of_stalling_the_producer() {
        let tmp = TempDir::new().unwrap();
        let cache = cache(&tmp);
        // More photos than the queue holds, so the producer would block on a dead pool.
        let paths: Vec<String> = (0..8).map(|i| format!("/p/{i}.jpg")).collect();
        let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
        let library = library_with(&refs);

        let _ = run_pool(&library, &cache, &PanickingDeriver, 1, None);
    }

    #[test]
    fn empty_library_finishes_immediately() {
        let tmp = TempDir::new().unwrap();
        let cache = cache(&tmp);
        let library = Library::open_in_memory().unwrap();
        let report = run_pool(&library, &cache, &MockDeriver::new(), 4, None).unwrap();
        assert_eq!(report, ThumbReport::default());
    }

    #[test]
    fn report_display() {
        let clean = ThumbReport {
            photos: 3,
            derived: 4,
            cached: 2,
            ..Default::default()
        };
        assert_eq!(clean.to_string(), "3 photos: 4 derived, 2 cached");
        let failing = ThumbReport {
            failed: 1,
            failed_photos: 1,
            ..clean
        };
        assert_eq!(
            failing.to_string(),
            "3 photos: 4 derived, 2 cached, 1 failed (1 photos)"
        );
    }
}
