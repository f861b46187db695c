//! Shared types used across the library pipeline.
//!
//! The scanner produces [`NewPhoto`] records, the store persists them as
//! [`Photo`] and [`Set`] rows, and the linker works on the lighter
//! [`ChainEntry`] projection. Identities are newtypes over SQLite rowids so a
//! set id can never be passed where a photo id is expected.

use chrono::NaiveDateTime;
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage format of capture timestamps (`taken_at` columns).
///
/// Fixed width, so lexical order in SQL equals chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

macro_rules! row_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.0))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                i64::column_result(value).map($name)
            }
        }
    };
}

row_id!(SetId);
row_id!(PhotoId);

/// Optional capture attributes read from a photo's EXIF block.
///
/// Every field is independent: a camera that writes no GPS still yields a
/// timestamp, a scanned print may yield nothing at all.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureMetadata {
    pub taken_at: Option<NaiveDateTime>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub camera: Option<String>,
    pub lens: Option<String>,
    pub aperture: Option<f64>,
    /// Seconds.
    pub exposure_time: Option<f64>,
    pub iso: Option<i64>,
    /// EV.
    pub exposure_comp: Option<f64>,
    /// Millimetres.
    pub focal_length: Option<f64>,
    pub focal_length_35: Option<i64>,
    pub flash: Option<String>,
}

/// A photo as discovered by the scanner, before it has an identity.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPhoto {
    pub path: String,
    pub size: u64,
    /// Displayed width (after orientation correction).
    pub width: u32,
    /// Displayed height (after orientation correction).
    pub height: u32,
    pub capture: CaptureMetadata,
}

/// A stored photo row.
#[derive(Debug, Clone, PartialEq)]
pub struct Photo {
    pub id: PhotoId,
    pub set_id: SetId,
    pub prev_photo_id: Option<PhotoId>,
    pub next_photo_id: Option<PhotoId>,
    pub path: String,
    pub size: u64,
    pub width: u32,
    pub height: u32,
    pub capture: CaptureMetadata,
}

/// A stored set row, joined with the path of its cover photo.
#[derive(Debug, Clone, PartialEq)]
pub struct Set {
    pub id: SetId,
    pub name: String,
    pub photos_count: u64,
    pub taken_at: Option<NaiveDateTime>,
    pub thumb_photo_id: Option<PhotoId>,
    pub thumb_photo_path: Option<String>,
}

/// The projection of a photo the linker needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainEntry {
    pub id: PhotoId,
    pub set_id: SetId,
    pub taken_at: Option<NaiveDateTime>,
}

/// `prev.next = next` and `next.prev = prev`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiblingLink {
    pub prev: PhotoId,
    pub next: PhotoId,
}

/// Recomputed aggregates for one set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetSummary {
    pub set_id: SetId,
    pub photos_count: u64,
    pub taken_at: Option<NaiveDateTime>,
    pub cover: Option<PhotoId>,
}

/// Format a capture timestamp the way it is stored.
pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a stored capture timestamp.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).ok()
}
