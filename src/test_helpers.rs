//! Shared test utilities for the thyme test suite.
//!
//! Fixture builders for image files on disk, in-memory photo records, and
//! lookups over a [`Library`] that panic with a clear message on miss.

use crate::store::Library;
use crate::types::{CaptureMetadata, NewPhoto, Photo, Set};
use chrono::NaiveDateTime;
use image::{ImageEncoder, RgbImage};
use std::path::Path;

// =========================================================================
// Fixture setup
// =========================================================================

/// Write a small valid JPEG with the given dimensions, creating parent
/// directories as needed.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Parse a `YYYY-MM-DD HH:MM:SS` literal.
pub fn ts(s: &str) -> NaiveDateTime {
    crate::types::parse_timestamp(s).unwrap_or_else(|| panic!("bad timestamp literal {s:?}"))
}

/// A 300x200 photo record with only a capture time.
pub fn new_photo(path: &str, taken_at: Option<NaiveDateTime>) -> NewPhoto {
    NewPhoto {
        path: path.to_string(),
        size: 1024,
        width: 300,
        height: 200,
        capture: CaptureMetadata {
            taken_at,
            ..Default::default()
        },
    }
}

// =========================================================================
// Library lookups
// =========================================================================

/// Find a set by name. Panics if not found.
pub fn find_set(library: &Library, name: &str) -> Set {
    library.set_by_name(name).unwrap().unwrap_or_else(|| {
        let names: Vec<String> = library
            .sets()
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        panic!("set '{name}' not found. Available: {names:?}")
    })
}

/// Find a photo by path. Panics if not found.
pub fn find_photo(library: &Library, path: &Path) -> Photo {
    let key = path.to_str().unwrap();
    library
        .photo_by_path(key)
        .unwrap()
        .unwrap_or_else(|| panic!("photo '{key}' not found"))
}

/// File names of a set's photos, walking the `next` chain from its head.
pub fn chain_file_names(library: &Library, set: &Set) -> Vec<String> {
    let photos = library.photos_in_set(set.id).unwrap();
    let Some(mut current) = photos.iter().find(|p| p.prev_photo_id.is_none()).cloned() else {
        return Vec::new();
    };
    let mut names = Vec::new();
    loop {
        names.push(
            Path::new(&current.path)
                .file_name()
                .unwrap()
                .to_string_lossy()
                .to_string(),
        );
        assert!(names.len() <= photos.len(), "cycle in chain of '{}'", set.name);
        match current.next_photo_id {
            Some(next) => current = library.photo(next).unwrap().unwrap(),
            None => break,
        }
    }
    names
}
