//! SQLite schema for the booking directory database.
//!
//! Three record tables plus two genre junction tables (SQLite has no array
//! column type, so genre lists live in their own tables keyed by owner id).
//! Shows reference venues and artists with ON DELETE RESTRICT: a venue or
//! artist with booked shows cannot be deleted.

use crate::sqlite_column;
use crate::sqlite_persistence::{
    Column, ForeignKey, ForeignKeyOnDelete, SqlType, Table, VersionedSchema,
};

const VENUES_TABLE: Table = Table {
    name: "venues",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("city", &SqlType::Text, non_null = true),
        sqlite_column!("state", &SqlType::Text, non_null = true),
        sqlite_column!("address", &SqlType::Text),
        sqlite_column!("phone", &SqlType::Text),
        sqlite_column!("image_link", &SqlType::Text),
        sqlite_column!("website", &SqlType::Text),
        sqlite_column!("facebook_link", &SqlType::Text),
        sqlite_column!(
            "seeking_talent",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("seeking_description", &SqlType::Text),
    ],
    indices: &[
        ("idx_venues_name", "name"),
        ("idx_venues_city", "city"),
        ("idx_venues_state", "state"),
    ],
};

const ARTISTS_TABLE: Table = Table {
    name: "artists",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("city", &SqlType::Text, non_null = true),
        sqlite_column!("state", &SqlType::Text, non_null = true),
        sqlite_column!("phone", &SqlType::Text),
        sqlite_column!("image_link", &SqlType::Text),
        sqlite_column!("website", &SqlType::Text),
        sqlite_column!("facebook_link", &SqlType::Text),
        sqlite_column!(
            "seeking_venue",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("seeking_description", &SqlType::Text),
    ],
    indices: &[("idx_artists_name", "name")],
};

const VENUE_FK: ForeignKey = ForeignKey {
    foreign_table: "venues",
    foreign_column: "id",
    on_delete: ForeignKeyOnDelete::Restrict,
};

const ARTIST_FK: ForeignKey = ForeignKey {
    foreign_table: "artists",
    foreign_column: "id",
    on_delete: ForeignKeyOnDelete::Restrict,
};

/// Shows join one artist to one venue at a start time.
/// start_time is unix milliseconds UTC; past/upcoming classification is
/// computed against the clock at query time, never stored.
const SHOWS_TABLE: Table = Table {
    name: "shows",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "artist_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ARTIST_FK)
        ),
        sqlite_column!(
            "venue_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&VENUE_FK)
        ),
        sqlite_column!("start_time", &SqlType::Integer, non_null = true),
    ],
    indices: &[
        ("idx_shows_artist", "artist_id"),
        ("idx_shows_venue", "venue_id"),
        ("idx_shows_start_time", "start_time"),
    ],
};

const GENRE_VENUE_FK: ForeignKey = ForeignKey {
    foreign_table: "venues",
    foreign_column: "id",
    on_delete: ForeignKeyOnDelete::Cascade,
};

const GENRE_ARTIST_FK: ForeignKey = ForeignKey {
    foreign_table: "artists",
    foreign_column: "id",
    on_delete: ForeignKeyOnDelete::Cascade,
};

const VENUE_GENRES_TABLE: Table = Table {
    name: "venue_genres",
    columns: &[
        sqlite_column!(
            "venue_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&GENRE_VENUE_FK)
        ),
        sqlite_column!("genre", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_venue_genres_venue", "venue_id")],
};

const ARTIST_GENRES_TABLE: Table = Table {
    name: "artist_genres",
    columns: &[
        sqlite_column!(
            "artist_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&GENRE_ARTIST_FK)
        ),
        sqlite_column!("genre", &SqlType::Text, non_null = true),
    ],
    indices: &[("idx_artist_genres_artist", "artist_id")],
};

pub const DIRECTORY_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        VENUES_TABLE,
        ARTISTS_TABLE,
        SHOWS_TABLE,
        VENUE_GENRES_TABLE,
        ARTIST_GENRES_TABLE,
    ],
    migration: None,
}];
