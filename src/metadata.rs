//! Photo metadata extraction: displayed dimensions plus EXIF capture data.
//!
//! The [`MetadataExtractor`] trait is the seam between the scanner and the
//! decoding libraries. The production implementation is [`ExifExtractor`]:
//!
//! | Field | Source |
//! |---|---|
//! | width / height | `image::image_dimensions`, swapped for orientations 5-8 |
//! | taken_at | `DateTimeOriginal`, falling back to `DateTime` |
//! | lat / lng | `GPSLatitude`/`GPSLongitude` + their `Ref` tags, signed decimal degrees |
//! | camera | `Make` + `Model` |
//! | lens | `LensMake` + `LensModel` |
//! | aperture | `FNumber` |
//! | exposure_time | `ExposureTime` (seconds) |
//! | iso | `PhotographicSensitivity` |
//! | exposure_comp | `ExposureBiasValue` |
//! | focal_length / focal_length_35 | `FocalLength` / `FocalLengthIn35mmFilm` |
//! | flash | `Flash`, as its human-readable description |
//!
//! Dimensions are mandatory: a file whose header cannot be decoded is an
//! error. EXIF is best-effort: a missing or malformed block yields empty
//! capture metadata, never an error.

use crate::types::CaptureMetadata;
use chrono::NaiveDate;
use exif::{Exif, In, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cannot decode image: {0}")]
    Decode(#[from] image::ImageError),
}

/// What the extractor learns about one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedPhoto {
    /// Displayed width (after orientation correction).
    pub width: u32,
    /// Displayed height (after orientation correction).
    pub height: u32,
    pub capture: CaptureMetadata,
}

/// Decode a file into dimensions and capture metadata.
pub trait MetadataExtractor {
    fn decode(&self, path: &Path) -> Result<DecodedPhoto, ExtractError>;
}

/// Extractor backed by the `image` crate (dimensions) and `kamadak-exif`.
#[derive(Debug, Default)]
pub struct ExifExtractor;

impl ExifExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl MetadataExtractor for ExifExtractor {
    fn decode(&self, path: &Path) -> Result<DecodedPhoto, ExtractError> {
        let (width, height) = image::image_dimensions(path)?;
        let exif = read_exif(path);

        let orientation = exif
            .as_ref()
            .and_then(|e| e.get_field(Tag::Orientation, In::PRIMARY))
            .and_then(|f| f.value.get_uint(0));
        let (width, height) = displayed_dimensions(width, height, orientation);

        Ok(DecodedPhoto {
            width,
            height,
            capture: exif.as_ref().map(capture_metadata).unwrap_or_default(),
        })
    }
}

fn read_exif(path: &Path) -> Option<Exif> {
    let file = File::open(path).ok()?;
    exif::Reader::new()
        .read_from_container(&mut BufReader::new(file))
        .ok()
}

/// Orientations 5-8 are transposed: the stored raster is rotated a quarter
/// turn from how it is displayed.
pub fn displayed_dimensions(width: u32, height: u32, orientation: Option<u32>) -> (u32, u32) {
    match orientation {
        Some(5..=8) => (height, width),
        _ => (width, height),
    }
}

fn capture_metadata(exif: &Exif) -> CaptureMetadata {
    CaptureMetadata {
        taken_at: datetime(exif, Tag::DateTimeOriginal).or_else(|| datetime(exif, Tag::DateTime)),
        lat: gps_coordinate(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef, b'S'),
        lng: gps_coordinate(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef, b'W'),
        camera: join_names(ascii(exif, Tag::Make), ascii(exif, Tag::Model)),
        lens: join_names(ascii(exif, Tag::LensMake), ascii(exif, Tag::LensModel)),
        aperture: number(exif, Tag::FNumber),
        exposure_time: number(exif, Tag::ExposureTime),
        iso: uint(exif, Tag::PhotographicSensitivity),
        exposure_comp: number(exif, Tag::ExposureBiasValue),
        focal_length: number(exif, Tag::FocalLength),
        focal_length_35: uint(exif, Tag::FocalLengthIn35mmFilm),
        flash: exif
            .get_field(Tag::Flash, In::PRIMARY)
            .map(|f| f.display_value().to_string()),
    }
}

fn ascii(exif: &Exif, tag: Tag) -> Option<String> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Ascii(parts) => {
            let raw = parts.first()?;
            let s = String::from_utf8_lossy(raw);
            let s = s.trim_matches(|c: char| c == '\0' || c.is_whitespace());
            (!s.is_empty()).then(|| s.to_string())
        }
        _ => None,
    }
}

fn number(exif: &Exif, tag: Tag) -> Option<f64> {
    let value = &exif.get_field(tag, In::PRIMARY)?.value;
    let n = match value {
        Value::Rational(v) => v.first()?.to_f64(),
        Value::SRational(v) => v.first()?.to_f64(),
        Value::Float(v) => f64::from(*v.first()?),
        Value::Double(v) => *v.first()?,
        other => f64::from(other.get_uint(0)?),
    };
    n.is_finite().then_some(n)
}

fn uint(exif: &Exif, tag: Tag) -> Option<i64> {
    exif.get_field(tag, In::PRIMARY)?
        .value
        .get_uint(0)
        .map(i64::from)
}

fn datetime(exif: &Exif, tag: Tag) -> Option<chrono::NaiveDateTime> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    let Value::Ascii(parts) = &field.value else {
        return None;
    };
    let dt = exif::DateTime::from_ascii(parts.first()?).ok()?;
    NaiveDate::from_ymd_opt(i32::from(dt.year), u32::from(dt.month), u32::from(dt.day))?
        .and_hms_opt(
            u32::from(dt.hour),
            u32::from(dt.minute),
            u32::from(dt.second),
        )
}

fn gps_coordinate(exif: &Exif, tag: Tag, ref_tag: Tag, negative_ref: u8) -> Option<f64> {
    let Value::Rational(dms) = &exif.get_field(tag, In::PRIMARY)?.value else {
        return None;
    };
    let parts: Vec<f64> = dms.iter().map(|r| r.to_f64()).collect();
    let degrees = dms_to_degrees(&parts)?;
    let negative = ascii(exif, ref_tag)
        .and_then(|r| r.bytes().next())
        .is_some_and(|b| b.eq_ignore_ascii_case(&negative_ref));
    Some(if negative { -degrees } else { degrees })
}

/// Degrees, minutes, seconds to decimal degrees. Missing trailing
/// components count as zero.
pub fn dms_to_degrees(parts: &[f64]) -> Option<f64> {
    let (&degrees, rest) = parts.split_first()?;
    let minutes = rest.first().copied().unwrap_or(0.0);
    let seconds = rest.get(1).copied().unwrap_or(0.0);
    let value = degrees + minutes / 60.0 + seconds / 3600.0;
    value.is_finite().then_some(value)
}

/// `"Make Model"`, or whichever half is present.
pub fn join_names(first: Option<String>, second: Option<String>) -> Option<String> {
    match (first, second) {
        (Some(a), Some(b)) => Some(format!("{a} {b}")),
        (a, b) => a.or(b),
    }
}
