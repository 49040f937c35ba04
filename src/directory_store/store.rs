//! SQLite-backed directory store.
//!
//! One write connection guarded by a mutex plus a small round-robin pool of
//! read-only connections, all in WAL mode. Every write runs inside an
//! explicit BEGIN IMMEDIATE transaction and rolls back on failure. Derived
//! views (grouped venues, past/upcoming splits, upcoming-show counts) are
//! recomputed from fresh queries on every call.

use super::error::{StoreError, StoreResult};
use super::models::*;
use super::schema::DIRECTORY_VERSIONED_SCHEMAS;
use super::validation::{
    parse_start_time, validate_artist_update, validate_new_artist, validate_new_venue,
    validate_venue_update,
};
use crate::sqlite_persistence::BASE_DB_VERSION;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

const DEFAULT_WEBSITE: &str = "https://pydata.co";
const DEFAULT_FACEBOOK_LINK: &str = "https://facebook.com";

#[derive(Clone)]
pub struct SqliteDirectoryStore {
    read_pool: Vec<Arc<Mutex<Connection>>>,
    write_conn: Arc<Mutex<Connection>>,
    read_index: Arc<AtomicUsize>,
}

fn migrate_if_needed(conn: &mut Connection) -> Result<()> {
    let db_version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;

    let latest_version = DIRECTORY_VERSIONED_SCHEMAS.len() - 1;
    let latest_schema = &DIRECTORY_VERSIONED_SCHEMAS[latest_version];

    let table_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
            [],
            |r| r.get(0),
        )
        .unwrap_or(0);

    if table_count == 0 {
        info!("Creating directory db schema at version {}", latest_version);
        latest_schema.create(conn)?;
        return Ok(());
    }

    let mut current_version = (db_version - BASE_DB_VERSION as i64).max(0) as usize;
    if current_version >= latest_version {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for schema in DIRECTORY_VERSIONED_SCHEMAS.iter().skip(current_version + 1) {
        if let Some(migration_fn) = schema.migration {
            info!(
                "Migrating directory db from version {} to {}",
                current_version, schema.version
            );
            migration_fn(&tx)?;
            current_version = schema.version;
        }
    }
    tx.pragma_update(None, "user_version", BASE_DB_VERSION + current_version)?;
    tx.commit()?;
    Ok(())
}

impl SqliteDirectoryStore {
    /// Open (or create) the directory database.
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file
    /// * `read_pool_size` - Number of connections for concurrent reads
    pub fn new<P: AsRef<Path>>(db_path: P, read_pool_size: usize) -> Result<Self> {
        let db_path_ref = db_path.as_ref();

        let mut write_conn = Connection::open_with_flags(
            db_path_ref,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open directory database")?;

        migrate_if_needed(&mut write_conn)?;

        write_conn.pragma_update(None, "journal_mode", "WAL")?;
        write_conn.pragma_update(None, "foreign_keys", true)?;

        let venue_count: i64 = write_conn
            .query_row("SELECT COUNT(*) FROM venues", [], |r| r.get(0))
            .unwrap_or(0);
        let artist_count: i64 = write_conn
            .query_row("SELECT COUNT(*) FROM artists", [], |r| r.get(0))
            .unwrap_or(0);
        let show_count: i64 = write_conn
            .query_row("SELECT COUNT(*) FROM shows", [], |r| r.get(0))
            .unwrap_or(0);

        info!(
            "Opened directory: {} venues, {} artists, {} shows",
            venue_count, artist_count, show_count
        );

        let mut read_pool = Vec::with_capacity(read_pool_size);
        for _ in 0..read_pool_size {
            let read_conn = Connection::open_with_flags(
                db_path_ref,
                rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY
                    | rusqlite::OpenFlags::SQLITE_OPEN_URI
                    | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?;
            read_conn.pragma_update(None, "journal_mode", "WAL")?;
            read_pool.push(Arc::new(Mutex::new(read_conn)));
        }

        Ok(SqliteDirectoryStore {
            write_conn: Arc::new(Mutex::new(write_conn)),
            read_pool,
            read_index: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn get_read_conn(&self) -> Arc<Mutex<Connection>> {
        let index = self.read_index.fetch_add(1, Ordering::SeqCst) % self.read_pool.len();
        self.read_pool[index].clone()
    }

    /// Run `f` inside a BEGIN IMMEDIATE transaction on the write connection,
    /// committing on success and rolling back on any error.
    fn in_write_tx<T>(&self, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let conn = self.write_conn.lock().unwrap();
        conn.execute("BEGIN IMMEDIATE", [])?;
        match f(&conn) {
            Ok(value) => {
                conn.execute("COMMIT", [])?;
                Ok(value)
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    fn get_genres(
        conn: &Connection,
        table: &'static str,
        owner_column: &'static str,
        owner_id: i64,
    ) -> rusqlite::Result<Vec<String>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT genre FROM {} WHERE {} = ?1",
            table, owner_column
        ))?;
        let genres = stmt
            .query_map(params![owner_id], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(genres)
    }

    fn parse_venue_row(row: &rusqlite::Row, genres: Vec<String>) -> rusqlite::Result<Venue> {
        Ok(Venue {
            id: row.get(0)?,
            name: row.get(1)?,
            city: row.get(2)?,
            state: row.get(3)?,
            address: row.get(4)?,
            phone: row.get(5)?,
            image_link: row.get(6)?,
            website: row.get(7)?,
            facebook_link: row.get(8)?,
            seeking_talent: row.get::<_, i32>(9)? != 0,
            seeking_description: row.get(10)?,
            genres,
        })
    }

    fn parse_artist_row(row: &rusqlite::Row, genres: Vec<String>) -> rusqlite::Result<Artist> {
        Ok(Artist {
            id: row.get(0)?,
            name: row.get(1)?,
            city: row.get(2)?,
            state: row.get(3)?,
            phone: row.get(4)?,
            image_link: row.get(5)?,
            website: row.get(6)?,
            facebook_link: row.get(7)?,
            seeking_venue: row.get::<_, i32>(8)? != 0,
            seeking_description: row.get(9)?,
            genres,
        })
    }

    fn millis_to_datetime(ms: i64) -> rusqlite::Result<DateTime<Utc>> {
        DateTime::from_timestamp_millis(ms)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(0, ms))
    }

    fn get_venue_inner(conn: &Connection, id: i64) -> StoreResult<Option<Venue>> {
        let mut stmt = conn.prepare_cached(
            "SELECT id, name, city, state, address, phone, image_link, website,
                    facebook_link, seeking_talent, seeking_description
             FROM venues WHERE id = ?1",
        )?;
        let genres = Self::get_genres(conn, "venue_genres", "venue_id", id)?;
        match stmt.query_row(params![id], |row| Self::parse_venue_row(row, genres.clone())) {
            Ok(venue) => Ok(Some(venue)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn get_artist_inner(conn: &Connection, id: i64) -> StoreResult<Option<Artist>> {
        let mut stmt = conn.prepare_cached(
            "SELECT id, name, city, state, phone, image_link, website,
                    facebook_link, seeking_venue, seeking_description
             FROM artists WHERE id = ?1",
        )?;
        let genres = Self::get_genres(conn, "artist_genres", "artist_id", id)?;
        match stmt.query_row(params![id], |row| Self::parse_artist_row(row, genres.clone())) {
            Ok(artist) => Ok(Some(artist)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn count_upcoming_shows(
        conn: &Connection,
        venue_id: i64,
        now_ms: i64,
    ) -> rusqlite::Result<usize> {
        let mut stmt = conn.prepare_cached(
            "SELECT COUNT(*) FROM shows WHERE venue_id = ?1 AND start_time > ?2",
        )?;
        stmt.query_row(params![venue_id, now_ms], |r| r.get::<_, i64>(0))
            .map(|n| n as usize)
    }

    /// Resolve a record reference by exact name. Zero matches and multiple
    /// matches are both deterministic errors, never a crash.
    fn resolve_by_name(
        conn: &Connection,
        table: &'static str,
        entity: &'static str,
        name: &str,
    ) -> StoreResult<i64> {
        let mut stmt =
            conn.prepare_cached(&format!("SELECT id FROM {} WHERE name = ?1", table))?;
        let ids = stmt
            .query_map(params![name], |r| r.get::<_, i64>(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        match ids.as_slice() {
            [] => Err(StoreError::UnknownName {
                entity,
                name: name.to_string(),
            }),
            [id] => Ok(*id),
            _ => Err(StoreError::AmbiguousName {
                entity,
                name: name.to_string(),
            }),
        }
    }

    fn record_exists(conn: &Connection, table: &'static str, id: i64) -> rusqlite::Result<bool> {
        conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1)", table),
            params![id],
            |r| r.get(0),
        )
    }

    // =========================================================================
    // Venue reads
    // =========================================================================

    pub fn get_venue(&self, id: i64) -> StoreResult<Option<Venue>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        Self::get_venue_inner(&conn, id)
    }

    /// Venue detail page: the full record plus its shows split against the
    /// clock at call time. A show at exactly "now" counts as past.
    pub fn get_venue_page(&self, id: i64) -> StoreResult<VenuePage> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();

        let venue = Self::get_venue_inner(&conn, id)?.ok_or(StoreError::NotFound {
            entity: "venue",
            id,
        })?;

        let now_ms = Utc::now().timestamp_millis();
        let past_shows = Self::venue_shows(&conn, id, "<=", now_ms)?;
        let upcoming_shows = Self::venue_shows(&conn, id, ">", now_ms)?;

        Ok(VenuePage {
            past_shows_count: past_shows.len(),
            upcoming_shows_count: upcoming_shows.len(),
            past_shows,
            upcoming_shows,
            venue,
        })
    }

    fn venue_shows(
        conn: &Connection,
        venue_id: i64,
        cmp: &str,
        now_ms: i64,
    ) -> StoreResult<Vec<ShowWithArtist>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT s.artist_id, a.name, a.image_link, s.start_time
             FROM shows s JOIN artists a ON a.id = s.artist_id
             WHERE s.venue_id = ?1 AND s.start_time {} ?2
             ORDER BY s.start_time",
            cmp
        ))?;
        let shows = stmt
            .query_map(params![venue_id, now_ms], |row| {
                Ok(ShowWithArtist {
                    artist_id: row.get(0)?,
                    artist_name: row.get(1)?,
                    artist_image_link: row.get(2)?,
                    start_time: Self::millis_to_datetime(row.get(3)?)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(shows)
    }

    /// All venues grouped by exact (city, state). Buckets are ordered by
    /// (state, city) and venues within a bucket by id, so a single ordered
    /// scan yields a correct full group-by.
    pub fn list_venues(&self) -> StoreResult<Vec<CityGroup>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let now_ms = Utc::now().timestamp_millis();

        let mut stmt = conn.prepare_cached(
            "SELECT id, name, city, state FROM venues ORDER BY state, city, id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut groups: Vec<CityGroup> = Vec::new();
        for (id, name, city, state) in rows {
            let summary = VenueSummary {
                id,
                name,
                num_upcoming_shows: Self::count_upcoming_shows(&conn, id, now_ms)?,
            };
            match groups.last_mut() {
                Some(group) if group.city == city && group.state == state => {
                    group.venues.push(summary);
                }
                _ => groups.push(CityGroup {
                    city,
                    state,
                    venues: vec![summary],
                }),
            }
        }
        Ok(groups)
    }

    /// Case-insensitive substring search on venue name. An empty term
    /// matches every venue.
    pub fn search_venues(&self, term: &str) -> StoreResult<SearchResults<VenueSummary>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let now_ms = Utc::now().timestamp_millis();

        let mut stmt = conn.prepare_cached(
            "SELECT id, name FROM venues
             WHERE instr(lower(name), lower(?1)) > 0 ORDER BY id",
        )?;
        let data = stmt
            .query_map(params![term], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|(id, name)| {
                Ok(VenueSummary {
                    id,
                    name,
                    num_upcoming_shows: Self::count_upcoming_shows(&conn, id, now_ms)?,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(SearchResults {
            count: data.len(),
            data,
        })
    }

    // =========================================================================
    // Artist reads
    // =========================================================================

    pub fn get_artist(&self, id: i64) -> StoreResult<Option<Artist>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        Self::get_artist_inner(&conn, id)
    }

    pub fn get_artist_page(&self, id: i64) -> StoreResult<ArtistPage> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();

        let artist = Self::get_artist_inner(&conn, id)?.ok_or(StoreError::NotFound {
            entity: "artist",
            id,
        })?;

        let now_ms = Utc::now().timestamp_millis();
        let past_shows = Self::artist_shows(&conn, id, "<=", now_ms)?;
        let upcoming_shows = Self::artist_shows(&conn, id, ">", now_ms)?;

        Ok(ArtistPage {
            past_shows_count: past_shows.len(),
            upcoming_shows_count: upcoming_shows.len(),
            past_shows,
            upcoming_shows,
            artist,
        })
    }

    fn artist_shows(
        conn: &Connection,
        artist_id: i64,
        cmp: &str,
        now_ms: i64,
    ) -> StoreResult<Vec<ShowWithVenue>> {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT s.venue_id, v.name, v.image_link, s.start_time
             FROM shows s JOIN venues v ON v.id = s.venue_id
             WHERE s.artist_id = ?1 AND s.start_time {} ?2
             ORDER BY s.start_time",
            cmp
        ))?;
        let shows = stmt
            .query_map(params![artist_id, now_ms], |row| {
                Ok(ShowWithVenue {
                    venue_id: row.get(0)?,
                    venue_name: row.get(1)?,
                    venue_image_link: row.get(2)?,
                    start_time: Self::millis_to_datetime(row.get(3)?)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(shows)
    }

    pub fn list_artists(&self) -> StoreResult<Vec<ArtistSummary>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached("SELECT id, name FROM artists ORDER BY id")?;
        let artists = stmt
            .query_map([], |row| {
                Ok(ArtistSummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(artists)
    }

    pub fn search_artists(&self, term: &str) -> StoreResult<SearchResults<ArtistSummary>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT id, name FROM artists
             WHERE instr(lower(name), lower(?1)) > 0 ORDER BY id",
        )?;
        let data = stmt
            .query_map(params![term], |row| {
                Ok(ArtistSummary {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SearchResults {
            count: data.len(),
            data,
        })
    }

    // =========================================================================
    // Show reads
    // =========================================================================

    pub fn list_shows(&self) -> StoreResult<Vec<ShowListing>> {
        let read_conn = self.get_read_conn();
        let conn = read_conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(
            "SELECT s.id, s.venue_id, v.name, s.artist_id, a.name, a.image_link, s.start_time
             FROM shows s
             JOIN venues v ON v.id = s.venue_id
             JOIN artists a ON a.id = s.artist_id
             ORDER BY s.id",
        )?;
        let shows = stmt
            .query_map([], |row| {
                Ok(ShowListing {
                    id: row.get(0)?,
                    venue_id: row.get(1)?,
                    venue_name: row.get(2)?,
                    artist_id: row.get(3)?,
                    artist_name: row.get(4)?,
                    artist_image_link: row.get(5)?,
                    start_time: Self::millis_to_datetime(row.get(6)?)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(shows)
    }

    // =========================================================================
    // Venue writes
    // =========================================================================

    pub fn create_venue(&self, new_venue: &NewVenue) -> StoreResult<Venue> {
        validate_new_venue(new_venue)?;

        self.in_write_tx(|conn| {
            let website = new_venue
                .website
                .clone()
                .unwrap_or_else(|| DEFAULT_WEBSITE.to_string());
            let facebook_link = new_venue
                .facebook_link
                .clone()
                .unwrap_or_else(|| DEFAULT_FACEBOOK_LINK.to_string());

            conn.execute(
                "INSERT INTO venues (name, city, state, address, phone, image_link,
                                     website, facebook_link, seeking_talent, seeking_description)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    &new_venue.name,
                    &new_venue.city,
                    &new_venue.state,
                    &new_venue.address,
                    &new_venue.phone,
                    &new_venue.image_link,
                    &website,
                    &facebook_link,
                    new_venue.seeking_talent as i32,
                    &new_venue.seeking_description,
                ],
            )?;
            let id = conn.last_insert_rowid();

            for genre in &new_venue.genres {
                conn.execute(
                    "INSERT INTO venue_genres (venue_id, genre) VALUES (?1, ?2)",
                    params![id, genre],
                )?;
            }

            Ok(Venue {
                id,
                name: new_venue.name.clone(),
                city: new_venue.city.clone(),
                state: new_venue.state.clone(),
                address: new_venue.address.clone(),
                phone: new_venue.phone.clone(),
                genres: new_venue.genres.clone(),
                image_link: new_venue.image_link.clone(),
                website: Some(website),
                facebook_link: Some(facebook_link),
                seeking_talent: new_venue.seeking_talent,
                seeking_description: new_venue.seeking_description.clone(),
            })
        })
    }

    /// Partial update: only present, non-blank fields overwrite; an absent
    /// or empty genre list keeps the stored genres.
    pub fn update_venue(&self, id: i64, update: &VenueUpdate) -> StoreResult<Venue> {
        validate_venue_update(update)?;

        self.in_write_tx(|conn| {
            let mut venue = Self::get_venue_inner(conn, id)?.ok_or(StoreError::NotFound {
                entity: "venue",
                id,
            })?;

            apply_field(&mut venue.name, &update.name);
            apply_field(&mut venue.city, &update.city);
            apply_field(&mut venue.state, &update.state);
            apply_optional_field(&mut venue.address, &update.address);
            apply_optional_field(&mut venue.phone, &update.phone);
            apply_optional_field(&mut venue.image_link, &update.image_link);
            apply_optional_field(&mut venue.website, &update.website);
            apply_optional_field(&mut venue.facebook_link, &update.facebook_link);
            if let Some(seeking_talent) = update.seeking_talent {
                venue.seeking_talent = seeking_talent;
            }
            apply_optional_field(&mut venue.seeking_description, &update.seeking_description);
            if let Some(genres) = update.genres.as_ref().filter(|g| !g.is_empty()) {
                venue.genres = genres.clone();
            }

            conn.execute(
                "UPDATE venues SET name = ?1, city = ?2, state = ?3, address = ?4, phone = ?5,
                                   image_link = ?6, website = ?7, facebook_link = ?8,
                                   seeking_talent = ?9, seeking_description = ?10
                 WHERE id = ?11",
                params![
                    &venue.name,
                    &venue.city,
                    &venue.state,
                    &venue.address,
                    &venue.phone,
                    &venue.image_link,
                    &venue.website,
                    &venue.facebook_link,
                    venue.seeking_talent as i32,
                    &venue.seeking_description,
                    id,
                ],
            )?;

            conn.execute("DELETE FROM venue_genres WHERE venue_id = ?1", params![id])?;
            for genre in &venue.genres {
                conn.execute(
                    "INSERT INTO venue_genres (venue_id, genre) VALUES (?1, ?2)",
                    params![id, genre],
                )?;
            }

            Ok(venue)
        })
    }

    /// Delete a venue. Rejected while dependent shows exist.
    pub fn delete_venue(&self, id: i64) -> StoreResult<()> {
        self.in_write_tx(|conn| {
            if !Self::record_exists(conn, "venues", id)? {
                return Err(StoreError::NotFound {
                    entity: "venue",
                    id,
                });
            }
            let show_count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM shows WHERE venue_id = ?1",
                params![id],
                |r| r.get(0),
            )?;
            if show_count > 0 {
                return Err(StoreError::HasDependentShows {
                    entity: "venue",
                    id,
                });
            }
            conn.execute("DELETE FROM venue_genres WHERE venue_id = ?1", params![id])?;
            conn.execute("DELETE FROM venues WHERE id = ?1", params![id])?;
            Ok(())
        })
    }

    // =========================================================================
    // Artist writes
    // =========================================================================

    pub fn create_artist(&self, new_artist: &NewArtist) -> StoreResult<Artist> {
        validate_new_artist(new_artist)?;

        self.in_write_tx(|conn| {
            let website = new_artist
                .website
                .clone()
                .unwrap_or_else(|| DEFAULT_WEBSITE.to_string());
            let facebook_link = new_artist
                .facebook_link
                .clone()
                .unwrap_or_else(|| DEFAULT_FACEBOOK_LINK.to_string());

            conn.execute(
                "INSERT INTO artists (name, city, state, phone, image_link, website,
                                      facebook_link, seeking_venue, seeking_description)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    &new_artist.name,
                    &new_artist.city,
                    &new_artist.state,
                    &new_artist.phone,
                    &new_artist.image_link,
                    &website,
                    &facebook_link,
                    new_artist.seeking_venue as i32,
                    &new_artist.seeking_description,
                ],
            )?;
            let id = conn.last_insert_rowid();

            for genre in &new_artist.genres {
                conn.execute(
                    "INSERT INTO artist_genres (artist_id, genre) VALUES (?1, ?2)",
                    params![id, genre],
                )?;
            }

            Ok(Artist {
                id,
                name: new_artist.name.clone(),
                city: new_artist.city.clone(),
                state: new_artist.state.clone(),
                phone: new_artist.phone.clone(),
                genres: new_artist.genres.clone(),
                image_link: new_artist.image_link.clone(),
                website: Some(website),
                facebook_link: Some(facebook_link),
                seeking_venue: new_artist.seeking_venue,
                seeking_description: new_artist.seeking_description.clone(),
            })
        })
    }

    pub fn update_artist(&self, id: i64, update: &ArtistUpdate) -> StoreResult<Artist> {
        validate_artist_update(update)?;

        self.in_write_tx(|conn| {
            let mut artist = Self::get_artist_inner(conn, id)?.ok_or(StoreError::NotFound {
                entity: "artist",
                id,
            })?;

            apply_field(&mut artist.name, &update.name);
            apply_field(&mut artist.city, &update.city);
            apply_field(&mut artist.state, &update.state);
            apply_optional_field(&mut artist.phone, &update.phone);
            apply_optional_field(&mut artist.image_link, &update.image_link);
            apply_optional_field(&mut artist.website, &update.website);
            apply_optional_field(&mut artist.facebook_link, &update.facebook_link);
            if let Some(seeking_venue) = update.seeking_venue {
                artist.seeking_venue = seeking_venue;
            }
            apply_optional_field(&mut artist.seeking_description, &update.seeking_description);
            if let Some(genres) = update.genres.as_ref().filter(|g| !g.is_empty()) {
                artist.genres = genres.clone();
            }

            conn.execute(
                "UPDATE artists SET name = ?1, city = ?2, state = ?3, phone = ?4,
                                    image_link = ?5, website = ?6, facebook_link = ?7,
                                    seeking_venue = ?8, seeking_description = ?9
                 WHERE id = ?10",
                params![
                    &artist.name,
                    &artist.city,
                    &artist.state,
                    &artist.phone,
                    &artist.image_link,
                    &artist.website,
                    &artist.facebook_link,
                    artist.seeking_venue as i32,
                    &artist.seeking_description,
                    id,
                ],
            )?;

            conn.execute("DELETE FROM artist_genres WHERE artist_id = ?1", params![id])?;
            for genre in &artist.genres {
                conn.execute(
                    "INSERT INTO artist_genres (artist_id, genre) VALUES (?1, ?2)",
                    params![id, genre],
                )?;
            }

            Ok(artist)
        })
    }

    pub fn delete_artist(&self, id: i64) -> StoreResult<()> {
        self.in_write_tx(|conn| {
            if !Self::record_exists(conn, "artists", id)? {
                return Err(StoreError::NotFound {
                    entity: "artist",
                    id,
                });
            }
            let show_count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM shows WHERE artist_id = ?1",
                params![id],
                |r| r.get(0),
            )?;
            if show_count > 0 {
                return Err(StoreError::HasDependentShows {
                    entity: "artist",
                    id,
                });
            }
            conn.execute("DELETE FROM artist_genres WHERE artist_id = ?1", params![id])?;
            conn.execute("DELETE FROM artists WHERE id = ?1", params![id])?;
            Ok(())
        })
    }

    // =========================================================================
    // Show writes
    // =========================================================================

    /// Create a show. The endpoints may be referenced by id (preferred) or
    /// by exact name; ids win when both are present.
    pub fn create_show(&self, new_show: &NewShow) -> StoreResult<Show> {
        let start_time = parse_start_time(&new_show.start_time)?;

        self.in_write_tx(|conn| {
            let artist_id = match (new_show.artist_id, new_show.artist_name.as_deref()) {
                (Some(id), _) => {
                    if !Self::record_exists(conn, "artists", id)? {
                        return Err(StoreError::NotFound {
                            entity: "artist",
                            id,
                        });
                    }
                    id
                }
                (None, Some(name)) => Self::resolve_by_name(conn, "artists", "artist", name)?,
                (None, None) => return Err(StoreError::MissingReference),
            };

            let venue_id = match (new_show.venue_id, new_show.venue_name.as_deref()) {
                (Some(id), _) => {
                    if !Self::record_exists(conn, "venues", id)? {
                        return Err(StoreError::NotFound {
                            entity: "venue",
                            id,
                        });
                    }
                    id
                }
                (None, Some(name)) => Self::resolve_by_name(conn, "venues", "venue", name)?,
                (None, None) => return Err(StoreError::MissingReference),
            };

            conn.execute(
                "INSERT INTO shows (artist_id, venue_id, start_time) VALUES (?1, ?2, ?3)",
                params![artist_id, venue_id, start_time.timestamp_millis()],
            )?;

            Ok(Show {
                id: conn.last_insert_rowid(),
                artist_id,
                venue_id,
                start_time,
            })
        })
    }
}

fn apply_field(target: &mut String, submitted: &Option<String>) {
    if let Some(value) = submitted.as_deref().filter(|v| !v.is_empty()) {
        *target = value.to_string();
    }
}

fn apply_optional_field(target: &mut Option<String>, submitted: &Option<String>) {
    if let Some(value) = submitted.as_deref().filter(|v| !v.is_empty()) {
        *target = Some(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn make_store() -> (TempDir, SqliteDirectoryStore) {
        let dir = TempDir::new().unwrap();
        let store = SqliteDirectoryStore::new(dir.path().join("directory.db"), 2).unwrap();
        (dir, store)
    }

    fn hop_venue() -> NewVenue {
        NewVenue {
            name: "The Musical Hop".to_string(),
            city: "San Francisco".to_string(),
            state: "CA".to_string(),
            address: Some("1015 Folsom Street".to_string()),
            phone: Some("123-123-1234".to_string()),
            genres: vec!["Jazz".to_string(), "Folk".to_string()],
            image_link: None,
            website: Some("https://themusicalhop.com".to_string()),
            facebook_link: Some("https://www.facebook.com/TheMusicalHop".to_string()),
            seeking_talent: true,
            seeking_description: Some("Looking for local artists".to_string()),
        }
    }

    fn park_square_venue() -> NewVenue {
        NewVenue {
            name: "Park Square Live Music & Coffee".to_string(),
            city: "San Francisco".to_string(),
            state: "CA".to_string(),
            genres: vec!["Jazz".to_string()],
            ..Default::default()
        }
    }

    fn petals_artist() -> NewArtist {
        NewArtist {
            name: "Guns N Petals".to_string(),
            city: "San Francisco".to_string(),
            state: "CA".to_string(),
            genres: vec!["Rock n Roll".to_string()],
            seeking_venue: true,
            ..Default::default()
        }
    }

    fn show_at(
        artist_id: i64,
        venue_id: i64,
        start_time: chrono::DateTime<Utc>,
    ) -> NewShow {
        NewShow {
            artist_id: Some(artist_id),
            venue_id: Some(venue_id),
            start_time: start_time.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn create_venue_round_trips_with_defaults() {
        let (_dir, store) = make_store();
        let created = store.create_venue(&hop_venue()).unwrap();
        assert!(created.id > 0);

        let fetched = store.get_venue(created.id).unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.website.as_deref(), Some("https://themusicalhop.com"));

        // Omitted links receive the documented placeholders
        let bare = store.create_venue(&park_square_venue()).unwrap();
        assert_eq!(bare.website.as_deref(), Some("https://pydata.co"));
        assert_eq!(bare.facebook_link.as_deref(), Some("https://facebook.com"));
        assert!(!bare.seeking_talent);
    }

    #[test]
    fn create_venue_missing_required_fields_rejected() {
        let (_dir, store) = make_store();
        let mut venue = hop_venue();
        venue.state = String::new();
        assert!(matches!(
            store.create_venue(&venue).unwrap_err(),
            StoreError::Validation(_)
        ));
        assert!(store.list_venues().unwrap().is_empty());
    }

    #[test]
    fn list_venues_groups_by_city_state_even_when_ids_interleave() {
        let (_dir, store) = make_store();
        // Interleave insert order across cities so ids alternate between
        // (city, state) pairs.
        store.create_venue(&hop_venue()).unwrap();
        store
            .create_venue(&NewVenue {
                name: "The Dueling Pianos Bar".to_string(),
                city: "New York".to_string(),
                state: "NY".to_string(),
                ..Default::default()
            })
            .unwrap();
        store.create_venue(&park_square_venue()).unwrap();

        let groups = store.list_venues().unwrap();
        assert_eq!(groups.len(), 2);
        // Ordered by (state, city): CA before NY
        assert_eq!(groups[0].state, "CA");
        assert_eq!(groups[0].venues.len(), 2);
        assert_eq!(groups[1].state, "NY");
        assert_eq!(groups[1].venues.len(), 1);
    }

    #[test]
    fn search_venues_is_case_insensitive_substring() {
        let (_dir, store) = make_store();
        store.create_venue(&hop_venue()).unwrap();
        store.create_venue(&park_square_venue()).unwrap();

        let results = store.search_venues("Hop").unwrap();
        assert_eq!(results.count, 1);
        assert_eq!(results.data[0].name, "The Musical Hop");

        let results = store.search_venues("Music").unwrap();
        assert_eq!(results.count, 2);

        let results = store.search_venues("music").unwrap();
        assert_eq!(results.count, 2);

        let results = store.search_venues("").unwrap();
        assert_eq!(results.count, 2);

        let results = store.search_venues("zzz").unwrap();
        assert_eq!(results.count, 0);
    }

    #[test]
    fn venue_page_splits_shows_into_past_and_upcoming() {
        let (_dir, store) = make_store();
        let venue = store.create_venue(&hop_venue()).unwrap();
        let artist = store.create_artist(&petals_artist()).unwrap();

        let now = Utc::now();
        store
            .create_show(&show_at(artist.id, venue.id, now - Duration::days(30)))
            .unwrap();
        store
            .create_show(&show_at(artist.id, venue.id, now + Duration::days(30)))
            .unwrap();

        let page = store.get_venue_page(venue.id).unwrap();
        assert_eq!(page.past_shows_count, 1);
        assert_eq!(page.upcoming_shows_count, 1);
        assert_eq!(page.past_shows[0].artist_name, "Guns N Petals");
        assert_eq!(page.upcoming_shows[0].artist_id, artist.id);

        // Every show lands in exactly one bucket
        assert_eq!(page.past_shows_count + page.upcoming_shows_count, 2);

        let artist_page = store.get_artist_page(artist.id).unwrap();
        assert_eq!(artist_page.past_shows_count, 1);
        assert_eq!(artist_page.upcoming_shows[0].venue_name, "The Musical Hop");
    }

    #[test]
    fn venue_page_unknown_id_is_not_found() {
        let (_dir, store) = make_store();
        assert!(matches!(
            store.get_venue_page(42).unwrap_err(),
            StoreError::NotFound { entity: "venue", .. }
        ));
    }

    #[test]
    fn update_venue_blank_fields_retain_prior_values() {
        let (_dir, store) = make_store();
        let venue = store.create_venue(&hop_venue()).unwrap();

        let update = VenueUpdate {
            name: Some("The Musical Hop Annex".to_string()),
            phone: Some(String::new()),
            genres: Some(vec![]),
            ..Default::default()
        };
        let updated = store.update_venue(venue.id, &update).unwrap();

        assert_eq!(updated.name, "The Musical Hop Annex");
        assert_eq!(updated.phone.as_deref(), Some("123-123-1234"));
        assert_eq!(updated.genres, venue.genres);
        assert_eq!(updated.city, venue.city);

        let fetched = store.get_venue(venue.id).unwrap().unwrap();
        assert_eq!(fetched, updated);
    }

    #[test]
    fn update_venue_overwrites_non_blank_fields() {
        let (_dir, store) = make_store();
        let venue = store.create_venue(&hop_venue()).unwrap();

        let update = VenueUpdate {
            phone: Some("999-999-9999".to_string()),
            genres: Some(vec!["Blues".to_string()]),
            seeking_talent: Some(false),
            ..Default::default()
        };
        let updated = store.update_venue(venue.id, &update).unwrap();
        assert_eq!(updated.phone.as_deref(), Some("999-999-9999"));
        assert_eq!(updated.genres, vec!["Blues".to_string()]);
        assert!(!updated.seeking_talent);
    }

    #[test]
    fn update_unknown_venue_is_not_found() {
        let (_dir, store) = make_store();
        assert!(matches!(
            store.update_venue(7, &VenueUpdate::default()).unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }

    #[test]
    fn delete_venue_policy() {
        let (_dir, store) = make_store();
        let venue = store.create_venue(&hop_venue()).unwrap();
        let artist = store.create_artist(&petals_artist()).unwrap();
        store
            .create_show(&show_at(artist.id, venue.id, Utc::now() + Duration::days(1)))
            .unwrap();

        // With dependent shows the delete is rejected...
        assert!(matches!(
            store.delete_venue(venue.id).unwrap_err(),
            StoreError::HasDependentShows { entity: "venue", .. }
        ));
        assert!(store.get_venue(venue.id).unwrap().is_some());

        // ...and without them it succeeds.
        let empty = store.create_venue(&park_square_venue()).unwrap();
        store.delete_venue(empty.id).unwrap();
        assert!(store.get_venue(empty.id).unwrap().is_none());

        assert!(matches!(
            store.delete_venue(9999).unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }

    #[test]
    fn create_show_resolves_names_deterministically() {
        let (_dir, store) = make_store();
        let venue = store.create_venue(&hop_venue()).unwrap();
        store.create_artist(&petals_artist()).unwrap();

        // Unique name resolves
        let show = store
            .create_show(&NewShow {
                artist_name: Some("Guns N Petals".to_string()),
                venue_name: Some("The Musical Hop".to_string()),
                start_time: "2026-05-21T21:30:00.000Z".to_string(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(show.venue_id, venue.id);

        // Zero matches
        assert!(matches!(
            store
                .create_show(&NewShow {
                    artist_name: Some("Nobody".to_string()),
                    venue_name: Some("The Musical Hop".to_string()),
                    start_time: "2026-05-21T21:30:00.000Z".to_string(),
                    ..Default::default()
                })
                .unwrap_err(),
            StoreError::UnknownName { entity: "artist", .. }
        ));

        // Duplicate names are ambiguous
        store.create_artist(&petals_artist()).unwrap();
        assert!(matches!(
            store
                .create_show(&NewShow {
                    artist_name: Some("Guns N Petals".to_string()),
                    venue_name: Some("The Musical Hop".to_string()),
                    start_time: "2026-05-21T21:30:00.000Z".to_string(),
                    ..Default::default()
                })
                .unwrap_err(),
            StoreError::AmbiguousName { entity: "artist", .. }
        ));

        // Missing both id and name
        assert!(matches!(
            store
                .create_show(&NewShow {
                    venue_name: Some("The Musical Hop".to_string()),
                    start_time: "2026-05-21T21:30:00.000Z".to_string(),
                    ..Default::default()
                })
                .unwrap_err(),
            StoreError::MissingReference
        ));
    }

    #[test]
    fn create_show_unknown_id_is_not_found() {
        let (_dir, store) = make_store();
        let venue = store.create_venue(&hop_venue()).unwrap();
        assert!(matches!(
            store
                .create_show(&NewShow {
                    artist_id: Some(123),
                    venue_id: Some(venue.id),
                    start_time: "2026-05-21T21:30:00.000Z".to_string(),
                    ..Default::default()
                })
                .unwrap_err(),
            StoreError::NotFound { entity: "artist", .. }
        ));
        assert!(store.list_shows().unwrap().is_empty());
    }

    #[test]
    fn list_shows_resolves_both_endpoints() {
        let (_dir, store) = make_store();
        let venue = store.create_venue(&hop_venue()).unwrap();
        let artist = store.create_artist(&petals_artist()).unwrap();
        store
            .create_show(&show_at(artist.id, venue.id, Utc::now() + Duration::days(3)))
            .unwrap();

        let shows = store.list_shows().unwrap();
        assert_eq!(shows.len(), 1);
        assert_eq!(shows[0].venue_name, "The Musical Hop");
        assert_eq!(shows[0].artist_name, "Guns N Petals");
    }

    #[test]
    fn artist_crud_round_trip() {
        let (_dir, store) = make_store();
        let artist = store.create_artist(&petals_artist()).unwrap();
        let fetched = store.get_artist(artist.id).unwrap().unwrap();
        assert_eq!(fetched, artist);

        let updated = store
            .update_artist(
                artist.id,
                &ArtistUpdate {
                    city: Some("Oakland".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.city, "Oakland");
        assert_eq!(updated.name, artist.name);

        store.delete_artist(artist.id).unwrap();
        assert!(store.get_artist(artist.id).unwrap().is_none());
    }

    #[test]
    fn search_artists_substring() {
        let (_dir, store) = make_store();
        store.create_artist(&petals_artist()).unwrap();
        store
            .create_artist(&NewArtist {
                name: "The Wild Sax Band".to_string(),
                city: "San Francisco".to_string(),
                state: "CA".to_string(),
                ..Default::default()
            })
            .unwrap();

        let results = store.search_artists("band").unwrap();
        assert_eq!(results.count, 1);
        assert_eq!(results.data[0].name, "The Wild Sax Band");

        let results = store.search_artists("a").unwrap();
        assert_eq!(results.count, 2);
    }

    #[test]
    fn reopening_preserves_data() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("directory.db");
        let venue_id = {
            let store = SqliteDirectoryStore::new(&db_path, 1).unwrap();
            store.create_venue(&hop_venue()).unwrap().id
        };
        let store = SqliteDirectoryStore::new(&db_path, 1).unwrap();
        let venue = store.get_venue(venue_id).unwrap().unwrap();
        assert_eq!(venue.name, "The Musical Hop");
        assert_eq!(venue.genres.len(), 2);
    }
}
