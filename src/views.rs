//! Fixed JSON shapes for sets and photos.
//!
//! Each view carries the stored attributes plus the presentation fields a
//! gallery front end needs: thumb URLs, aspect ratio, orientation, and the
//! on-screen size of the big thumb.
//!
//! ```json
//! {
//!   "id": 12,
//!   "set_id": 3,
//!   "filename": "IMG_0042.jpg",
//!   "width": 6000,
//!   "height": 4000,
//!   "aspect_ratio": "3:2",
//!   "orientation": "landscape",
//!   "big_thumb_width": 1000,
//!   "big_thumb_height": 667,
//!   "big_thumb_url": "/thumbs/5e1c…_big.jpg",
//!   "small_thumb_url": "/thumbs/5e1c…_small.jpg",
//!   ...
//! }
//! ```

use crate::thumbs::calculations::{fit_within, reduced_aspect};
use crate::thumbs::{SizeClass, artifact_name};
use crate::types::{Photo, PhotoId, Set, SetId, format_timestamp};
use serde::Serialize;
use std::path::Path;

/// URL prefix under which the artifacts directory is served.
pub const THUMBS_URL_PREFIX: &str = "/thumbs";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetView {
    pub id: SetId,
    pub name: String,
    pub photos_count: u64,
    pub taken_at: Option<String>,
    pub thumb_photo_id: Option<PhotoId>,
    /// Small thumb of the cover photo.
    pub thumb_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoView {
    pub id: PhotoId,
    pub set_id: SetId,
    pub prev_photo_id: Option<PhotoId>,
    pub next_photo_id: Option<PhotoId>,
    pub path: String,
    pub filename: String,
    pub size: u64,
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: String,
    pub orientation: Orientation,
    pub big_thumb_width: u32,
    pub big_thumb_height: u32,
    pub big_thumb_url: String,
    pub small_thumb_url: String,
    pub taken_at: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub camera: Option<String>,
    pub lens: Option<String>,
    pub aperture: Option<f64>,
    pub exposure_time: Option<f64>,
    pub iso: Option<i64>,
    pub exposure_comp: Option<f64>,
    pub focal_length: Option<f64>,
    pub focal_length_35: Option<i64>,
    pub flash: Option<String>,
}

/// URL of a photo's artifact.
pub fn thumb_url(photo_path: &str, class: SizeClass) -> String {
    format!(
        "{THUMBS_URL_PREFIX}/{}",
        artifact_name(Path::new(photo_path), class)
    )
}

/// Square photos count as landscape.
pub fn orientation(width: u32, height: u32) -> Orientation {
    if height > width {
        Orientation::Portrait
    } else {
        Orientation::Landscape
    }
}

pub fn set_view(set: &Set) -> SetView {
    SetView {
        id: set.id,
        name: set.name.clone(),
        photos_count: set.photos_count,
        taken_at: set.taken_at.as_ref().map(format_timestamp),
        thumb_photo_id: set.thumb_photo_id,
        thumb_url: set
            .thumb_photo_path
            .as_deref()
            .map(|p| thumb_url(p, SizeClass::Small)),
    }
}

/// `big_size` is the configured long edge of big thumbs.
pub fn photo_view(photo: &Photo, big_size: u32) -> PhotoView {
    let (aspect_w, aspect_h) = reduced_aspect(photo.width, photo.height);
    let (big_w, big_h) = fit_within((photo.width, photo.height), big_size);
    let c = &photo.capture;
    PhotoView {
        id: photo.id,
        set_id: photo.set_id,
        prev_photo_id: photo.prev_photo_id,
        next_photo_id: photo.next_photo_id,
        path: photo.path.clone(),
        filename: Path::new(&photo.path)
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| photo.path.clone()),
        size: photo.size,
        width: photo.width,
        height: photo.height,
        aspect_ratio: format!("{aspect_w}:{aspect_h}"),
        orientation: orientation(photo.width, photo.height),
        big_thumb_width: big_w,
        big_thumb_height: big_h,
        big_thumb_url: thumb_url(&photo.path, SizeClass::Big),
        small_thumb_url: thumb_url(&photo.path, SizeClass::Small),
        taken_at: c.taken_at.as_ref().map(format_timestamp),
        lat: c.lat,
        lng: c.lng,
        camera: c.camera.clone(),
        lens: c.lens.clone(),
        aperture: c.aperture,
        exposure_time: c.exposure_time,
        iso: c.iso,
        exposure_comp: c.exposure_comp,
        focal_length: c.focal_length,
        focal_length_35: c.focal_length_35,
        flash: c.flash.clone(),
    }
}
