//! Directory records and their display projections.
//!
//! Projections are shaped for the HTTP layer: a minimal summary for
//! listings/search and an expanded page with the record's shows split into
//! past and upcoming. Show lists are recomputed from the store on every
//! read, never cached.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Records
// =============================================================================

/// A location that can host shows.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Venue {
    pub id: i64,
    pub name: String,
    pub city: String,
    pub state: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub genres: Vec<String>,
    pub image_link: Option<String>,
    pub website: Option<String>,
    pub facebook_link: Option<String>,
    pub seeking_talent: bool,
    pub seeking_description: Option<String>,
}

/// A performer that can be booked into shows.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Artist {
    pub id: i64,
    pub name: String,
    pub city: String,
    pub state: String,
    pub phone: Option<String>,
    pub genres: Vec<String>,
    pub image_link: Option<String>,
    pub website: Option<String>,
    pub facebook_link: Option<String>,
    pub seeking_venue: bool,
    pub seeking_description: Option<String>,
}

/// A booking linking one artist to one venue at a start time.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Show {
    pub id: i64,
    pub artist_id: i64,
    pub venue_id: i64,
    pub start_time: DateTime<Utc>,
}

// =============================================================================
// Creation payloads
// =============================================================================

/// Payload for creating a venue. Omitted links fall back to placeholder
/// defaults at insert time.
#[derive(Clone, Debug, Deserialize, Default)]
#[serde(default)]
pub struct NewVenue {
    pub name: String,
    pub city: String,
    pub state: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub genres: Vec<String>,
    pub image_link: Option<String>,
    pub website: Option<String>,
    pub facebook_link: Option<String>,
    pub seeking_talent: bool,
    pub seeking_description: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
#[serde(default)]
pub struct NewArtist {
    pub name: String,
    pub city: String,
    pub state: String,
    pub phone: Option<String>,
    pub genres: Vec<String>,
    pub image_link: Option<String>,
    pub website: Option<String>,
    pub facebook_link: Option<String>,
    pub seeking_venue: bool,
    pub seeking_description: Option<String>,
}

/// Payload for creating a show. The artist and venue may be referenced by id
/// or, as a convenience, by exact name; ids win when both are given.
#[derive(Clone, Debug, Deserialize, Default)]
#[serde(default)]
pub struct NewShow {
    pub artist_id: Option<i64>,
    pub venue_id: Option<i64>,
    pub artist_name: Option<String>,
    pub venue_name: Option<String>,
    pub start_time: String,
}

// =============================================================================
// Edit payloads (partial update)
// =============================================================================

/// Partial venue update: only present, non-blank fields overwrite the stored
/// record; everything else retains its prior value.
#[derive(Clone, Debug, Deserialize, Default)]
#[serde(default)]
pub struct VenueUpdate {
    pub name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub genres: Option<Vec<String>>,
    pub image_link: Option<String>,
    pub website: Option<String>,
    pub facebook_link: Option<String>,
    pub seeking_talent: Option<bool>,
    pub seeking_description: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
#[serde(default)]
pub struct ArtistUpdate {
    pub name: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub phone: Option<String>,
    pub genres: Option<Vec<String>>,
    pub image_link: Option<String>,
    pub website: Option<String>,
    pub facebook_link: Option<String>,
    pub seeking_venue: Option<bool>,
    pub seeking_description: Option<String>,
}

// =============================================================================
// Projections
// =============================================================================

/// Minimal venue projection for listings and search results.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct VenueSummary {
    pub id: i64,
    pub name: String,
    pub num_upcoming_shows: usize,
}

/// Minimal artist projection for listings and search results.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ArtistSummary {
    pub id: i64,
    pub name: String,
}

/// Venues sharing an exact (city, state) pair.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CityGroup {
    pub city: String,
    pub state: String,
    pub venues: Vec<VenueSummary>,
}

/// A show as seen from its venue: who plays, when.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ShowWithArtist {
    pub artist_id: i64,
    pub artist_name: String,
    pub artist_image_link: Option<String>,
    pub start_time: DateTime<Utc>,
}

/// A show as seen from its artist: where it plays, when.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ShowWithVenue {
    pub venue_id: i64,
    pub venue_name: String,
    pub venue_image_link: Option<String>,
    pub start_time: DateTime<Utc>,
}

/// Venue detail page: full record plus its shows split by start time
/// against "now" at query time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VenuePage {
    #[serde(flatten)]
    pub venue: Venue,
    pub past_shows: Vec<ShowWithArtist>,
    pub upcoming_shows: Vec<ShowWithArtist>,
    pub past_shows_count: usize,
    pub upcoming_shows_count: usize,
}

/// Artist detail page, symmetric to [`VenuePage`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArtistPage {
    #[serde(flatten)]
    pub artist: Artist,
    pub past_shows: Vec<ShowWithVenue>,
    pub upcoming_shows: Vec<ShowWithVenue>,
    pub past_shows_count: usize,
    pub upcoming_shows_count: usize,
}

/// A show resolved with both endpoints, for the flat shows listing.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ShowListing {
    pub id: i64,
    pub venue_id: i64,
    pub venue_name: String,
    pub artist_id: i64,
    pub artist_name: String,
    pub artist_image_link: Option<String>,
    pub start_time: DateTime<Utc>,
}

/// Search response: match count plus summary projections.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchResults<T> {
    pub count: usize,
    pub data: Vec<T>,
}
