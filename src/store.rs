//! Library store: sets and photos in SQLite.
//!
//! A [`Library`] owns one connection and is handed to whichever stage needs
//! it. Statements go through rusqlite's statement cache, so a prepared query
//! is released back to the cache when it drops, on every exit path.
//!
//! The store owns identity assignment (SQLite rowids) and the uniqueness
//! rules the rest of the pipeline leans on:
//!
//! - `sets.name` is unique: one set per parent directory name.
//! - `photos.path` is unique: one photo per file.
//! - `photos.prev_photo_id` / `photos.next_photo_id` are each unique, so the
//!   sibling links can only form disjoint chains.
//!
//! Chain links and set aggregates are written only through
//! [`Library::replace_links`] and [`Library::replace_set_summaries`], each of
//! which runs in a single transaction.

use crate::types::{
    CaptureMetadata, ChainEntry, NewPhoto, Photo, PhotoId, Set, SetId, SetSummary, SiblingLink,
    format_timestamp, parse_timestamp,
};
use chrono::NaiveDateTime;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Cannot create database directory {0}: {1}")]
    CreateDir(PathBuf, std::io::Error),
}

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS sets (
    id integer NOT NULL PRIMARY KEY,
    thumb_photo_id integer UNIQUE REFERENCES photos,
    name varchar(4096) NOT NULL UNIQUE,
    photos_count integer,
    taken_at char(19)
);

CREATE UNIQUE INDEX IF NOT EXISTS sets_thumb_photo_id_index ON sets (thumb_photo_id);

CREATE TABLE IF NOT EXISTS photos (
    id integer NOT NULL PRIMARY KEY,
    set_id integer NOT NULL REFERENCES sets,
    prev_photo_id integer UNIQUE REFERENCES photos,
    next_photo_id integer UNIQUE REFERENCES photos,
    path varchar(4096) NOT NULL UNIQUE,
    size integer NOT NULL,
    width integer NOT NULL,
    height integer NOT NULL,
    aperture real,
    camera varchar(1000),
    exposure_comp real,
    exposure_time real,
    flash varchar(100),
    focal_length real,
    focal_length_35 integer,
    iso integer,
    lat real,
    lens varchar(1000),
    lng real,
    taken_at char(19)
);

CREATE INDEX IF NOT EXISTS photos_set_id_index ON photos (set_id);
CREATE UNIQUE INDEX IF NOT EXISTS photos_prev_photo_id_index ON photos (prev_photo_id);
CREATE UNIQUE INDEX IF NOT EXISTS photos_next_photo_id_index ON photos (next_photo_id);
CREATE UNIQUE INDEX IF NOT EXISTS photos_path_index ON photos (path);
";

const PHOTO_COLUMNS: &str = "id, set_id, prev_photo_id, next_photo_id, path, size, width, height, \
     taken_at, lat, lng, camera, lens, aperture, exposure_time, iso, exposure_comp, \
     focal_length, focal_length_35, flash";

const SET_COLUMNS: &str = "sets.id, sets.name, sets.photos_count, sets.taken_at, \
     sets.thumb_photo_id, photos.path";

/// The relational library of sets and photos.
pub struct Library {
    conn: Connection,
}

impl Library {
    /// Open (or create) the database at `path` and bootstrap the schema.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::CreateDir(parent.to_path_buf(), e))?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    /// A throwaway library, used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self { conn })
    }

    // =========================================================================
    // Scanner upserts
    // =========================================================================

    pub fn find_set(&self, name: &str) -> Result<Option<SetId>, StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT id FROM sets WHERE name = ?1")?;
        Ok(stmt.query_row([name], |row| row.get(0)).optional()?)
    }

    /// Insert a set with only its name; aggregates are filled in by the linker.
    pub fn insert_set(&self, name: &str) -> Result<SetId, StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached("INSERT INTO sets (name) VALUES (?1)")?;
        stmt.execute([name])?;
        Ok(SetId(self.conn.last_insert_rowid()))
    }

    pub fn find_photo(&self, path: &str) -> Result<Option<PhotoId>, StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT id FROM photos WHERE path = ?1")?;
        Ok(stmt.query_row([path], |row| row.get(0)).optional()?)
    }

    pub fn insert_photo(&self, set_id: SetId, photo: &NewPhoto) -> Result<PhotoId, StoreError> {
        let c = &photo.capture;
        let mut stmt = self.conn.prepare_cached(
            "INSERT INTO photos (
                set_id, path, size, width, height, taken_at, lat, lng, camera, lens,
                aperture, exposure_time, iso, exposure_comp, focal_length, focal_length_35, flash
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        )?;
        stmt.execute(params![
            set_id,
            photo.path,
            photo.size as i64,
            photo.width,
            photo.height,
            c.taken_at.as_ref().map(format_timestamp),
            c.lat,
            c.lng,
            c.camera,
            c.lens,
            c.aperture,
            c.exposure_time,
            c.iso,
            c.exposure_comp,
            c.focal_length,
            c.focal_length_35,
            c.flash,
        ])?;
        Ok(PhotoId(self.conn.last_insert_rowid()))
    }

    // =========================================================================
    // Linker reads and transactional writes
    // =========================================================================

    /// Every photo ordered by set, then capture time (missing times last),
    /// then identity.
    pub fn chain_order(&self) -> Result<Vec<ChainEntry>, StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, set_id, taken_at FROM photos
             ORDER BY set_id, taken_at IS NULL, taken_at, id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ChainEntry {
                id: row.get(0)?,
                set_id: row.get(1)?,
                taken_at: read_timestamp(row, 2)?,
            })
        })?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn set_ids(&self) -> Result<Vec<SetId>, StoreError> {
        let mut stmt = self.conn.prepare_cached("SELECT id FROM sets ORDER BY id")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Replace every sibling link in the library with `links`.
    ///
    /// All existing links are cleared first, inside the same transaction, so
    /// the unique constraints never see a half-moved link and links from a
    /// previous run cannot survive. Any failure rolls the whole thing back.
    pub fn replace_links(&mut self, links: &[SiblingLink]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "UPDATE photos SET prev_photo_id = NULL, next_photo_id = NULL
             WHERE prev_photo_id IS NOT NULL OR next_photo_id IS NOT NULL",
            [],
        )?;
        {
            let mut set_next = tx.prepare("UPDATE photos SET next_photo_id = ?1 WHERE id = ?2")?;
            let mut set_prev = tx.prepare("UPDATE photos SET prev_photo_id = ?1 WHERE id = ?2")?;
            for link in links {
                set_next.execute(params![link.next, link.prev])?;
                set_prev.execute(params![link.prev, link.next])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Write recomputed aggregates for every set in one transaction.
    pub fn replace_set_summaries(&mut self, summaries: &[SetSummary]) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        {
            let mut update = tx.prepare(
                "UPDATE sets SET photos_count = ?1, taken_at = ?2, thumb_photo_id = ?3
                 WHERE id = ?4",
            )?;
            for summary in summaries {
                update.execute(params![
                    summary.photos_count as i64,
                    summary.taken_at.as_ref().map(format_timestamp),
                    summary.cover,
                    summary.set_id,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    // =========================================================================
    // Thumbnail pipeline input
    // =========================================================================

    pub fn photo_count(&self) -> Result<u64, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM photos", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Stream every photo path, most recent sets first and oldest photo
    /// first within a set, the order a visitor is likely to browse in.
    ///
    /// Rows are handed to `f` one at a time while the query is open, so a
    /// blocking `f` throttles the read.
    pub fn for_each_thumb_source(&self, mut f: impl FnMut(PathBuf)) -> Result<(), StoreError> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT photos.path FROM photos
             JOIN sets ON photos.set_id = sets.id
             ORDER BY sets.taken_at DESC, photos.taken_at IS NULL, photos.taken_at, photos.id",
        )?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let path: String = row.get(0)?;
            f(PathBuf::from(path));
        }
        Ok(())
    }

    // =========================================================================
    // Read-only queries
    // =========================================================================

    /// All sets, most recently captured first.
    pub fn sets(&self) -> Result<Vec<Set>, StoreError> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {SET_COLUMNS} FROM sets
             LEFT JOIN photos ON sets.thumb_photo_id = photos.id
             ORDER BY sets.taken_at DESC, sets.id"
        ))?;
        let rows = stmt.query_map([], set_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn set(&self, id: SetId) -> Result<Option<Set>, StoreError> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {SET_COLUMNS} FROM sets
             LEFT JOIN photos ON sets.thumb_photo_id = photos.id
             WHERE sets.id = ?1"
        ))?;
        Ok(stmt.query_row([id], set_from_row).optional()?)
    }

    pub fn set_by_name(&self, name: &str) -> Result<Option<Set>, StoreError> {
        match self.find_set(name)? {
            Some(id) => self.set(id),
            None => Ok(None),
        }
    }

    pub fn photo(&self, id: PhotoId) -> Result<Option<Photo>, StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE id = ?1"))?;
        Ok(stmt.query_row([id], photo_from_row).optional()?)
    }

    pub fn photo_by_path(&self, path: &str) -> Result<Option<Photo>, StoreError> {
        let mut stmt = self
            .conn
            .prepare_cached(&format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE path = ?1"))?;
        Ok(stmt.query_row([path], photo_from_row).optional()?)
    }

    /// Photos of one set in chain order.
    pub fn photos_in_set(&self, set_id: SetId) -> Result<Vec<Photo>, StoreError> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {PHOTO_COLUMNS} FROM photos WHERE set_id = ?1
             ORDER BY taken_at IS NULL, taken_at, id"
        ))?;
        let rows = stmt.query_map([set_id], photo_from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    pub fn set_count(&self) -> Result<u64, StoreError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sets", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("path", &self.conn.path())
            .finish()
    }
}

/// Read a `taken_at` column, rejecting values not in the storage format.
fn read_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDateTime>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        None => Ok(None),
        Some(s) => parse_timestamp(&s).map(Some).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                Type::Text,
                format!("invalid timestamp {s:?}").into(),
            )
        }),
    }
}

fn set_from_row(row: &Row<'_>) -> rusqlite::Result<Set> {
    let count: Option<i64> = row.get(2)?;
    Ok(Set {
        id: row.get(0)?,
        name: row.get(1)?,
        photos_count: count.unwrap_or(0) as u64,
        taken_at: read_timestamp(row, 3)?,
        thumb_photo_id: row.get(4)?,
        thumb_photo_path: row.get(5)?,
    })
}

fn photo_from_row(row: &Row<'_>) -> rusqlite::Result<Photo> {
    let size: i64 = row.get(5)?;
    Ok(Photo {
        id: row.get(0)?,
        set_id: row.get(1)?,
        prev_photo_id: row.get(2)?,
        next_photo_id: row.get(3)?,
        path: row.get(4)?,
        size: size as u64,
        width: row.get(6)?,
        height: row.get(7)?,
        capture: CaptureMetadata {
            taken_at: read_timestamp(row, 8)?,
            lat: row.get(9)?,
            lng: row.get(10)?,
            camera: row.get(11)?,
            lens: row.get(12)?,
            aperture: row.get(13)?,
            exposure_time: row.get(14)?,
            iso: row.get(15)?,
            exposure_comp: row.get(16)?,
            focal_length: row.get(17)?,
            focal_length_35: row.get(18)?,
            flash: row.get(19)?,
        },
    })
}
