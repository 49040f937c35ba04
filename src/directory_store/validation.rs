//! Field-level input rules applied before anything reaches the store.
//!
//! These mirror the listing form: required name/city/state, USPS state
//! codes, a fixed genre list, NNN-NNN-NNNN phone numbers, and http(s) links.

use super::models::{ArtistUpdate, NewArtist, NewVenue, VenueUpdate};
use chrono::{DateTime, NaiveDateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::fmt;

pub const STATES: &[&str] = &[
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "DC", "FL", "GA", "HI", "ID", "IL", "IN",
    "IA", "KS", "KY", "LA", "ME", "MT", "NE", "NV", "NH", "NJ", "NM", "NY", "NC", "ND", "OH",
    "OK", "OR", "MD", "MA", "MI", "MN", "MS", "MO", "PA", "RI", "SC", "SD", "TN", "TX", "UT",
    "VT", "VA", "WA", "WV", "WI", "WY",
];

pub const GENRES: &[&str] = &[
    "Alternative",
    "Blues",
    "Classical",
    "Country",
    "Electronic",
    "Folk",
    "Funk",
    "Hip-Hop",
    "Heavy Metal",
    "Instrumental",
    "Jazz",
    "Musical Theatre",
    "Pop",
    "Punk",
    "R&B",
    "Reggae",
    "Rock n Roll",
    "Soul",
    "Other",
];

lazy_static! {
    static ref PHONE_RE: Regex = Regex::new(r"^[0-9]{3}-[0-9]{3}-[0-9]{4}$").unwrap();
}

/// Choice lists served on the form-option endpoints.
#[derive(Debug, Serialize)]
pub struct FormOptions {
    pub states: &'static [&'static str],
    pub genres: &'static [&'static str],
}

impl FormOptions {
    pub fn current() -> Self {
        FormOptions {
            states: STATES,
            genres: GENRES,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ValidationError {
    EmptyField { field: &'static str },
    InvalidPhone { value: String },
    InvalidLink { field: &'static str, value: String },
    UnknownState { value: String },
    UnknownGenre { value: String },
    InvalidStartTime { value: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyField { field } => {
                write!(f, "Field '{}' is required but was empty", field)
            }
            ValidationError::InvalidPhone { value } => {
                write!(f, "Invalid phone number '{}', expected NNN-NNN-NNNN", value)
            }
            ValidationError::InvalidLink { field, value } => {
                write!(f, "Field '{}' is not an http(s) URL: '{}'", field, value)
            }
            ValidationError::UnknownState { value } => {
                write!(f, "Unknown state code '{}'", value)
            }
            ValidationError::UnknownGenre { value } => {
                write!(f, "Unknown genre '{}'", value)
            }
            ValidationError::InvalidStartTime { value } => {
                write!(f, "Could not parse start_time '{}'", value)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult<T> = Result<T, ValidationError>;

fn require(field: &'static str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField { field });
    }
    Ok(())
}

fn check_state(value: &str) -> ValidationResult<()> {
    if !STATES.contains(&value) {
        return Err(ValidationError::UnknownState {
            value: value.to_string(),
        });
    }
    Ok(())
}

fn check_genres(genres: &[String]) -> ValidationResult<()> {
    for genre in genres {
        if !GENRES.contains(&genre.as_str()) {
            return Err(ValidationError::UnknownGenre {
                value: genre.clone(),
            });
        }
    }
    Ok(())
}

fn check_phone(value: &Option<String>) -> ValidationResult<()> {
    match value {
        Some(phone) if !phone.is_empty() && !PHONE_RE.is_match(phone) => {
            Err(ValidationError::InvalidPhone {
                value: phone.clone(),
            })
        }
        _ => Ok(()),
    }
}

fn check_link(field: &'static str, value: &Option<String>) -> ValidationResult<()> {
    match value {
        Some(link)
            if !link.is_empty()
                && !(link.starts_with("http://") || link.starts_with("https://")) =>
        {
            Err(ValidationError::InvalidLink {
                field,
                value: link.clone(),
            })
        }
        _ => Ok(()),
    }
}

pub fn validate_new_venue(venue: &NewVenue) -> ValidationResult<()> {
    require("name", &venue.name)?;
    require("city", &venue.city)?;
    require("state", &venue.state)?;
    check_state(&venue.state)?;
    check_genres(&venue.genres)?;
    check_phone(&venue.phone)?;
    check_link("image_link", &venue.image_link)?;
    check_link("website", &venue.website)?;
    check_link("facebook_link", &venue.facebook_link)?;
    Ok(())
}

pub fn validate_new_artist(artist: &NewArtist) -> ValidationResult<()> {
    require("name", &artist.name)?;
    require("city", &artist.city)?;
    require("state", &artist.state)?;
    check_state(&artist.state)?;
    check_genres(&artist.genres)?;
    check_phone(&artist.phone)?;
    check_link("image_link", &artist.image_link)?;
    check_link("website", &artist.website)?;
    check_link("facebook_link", &artist.facebook_link)?;
    Ok(())
}

/// Edit payloads only validate the fields they actually carry; blank strings
/// mean "keep the stored value" and are not checked.
pub fn validate_venue_update(update: &VenueUpdate) -> ValidationResult<()> {
    if let Some(state) = update.state.as_deref().filter(|s| !s.is_empty()) {
        check_state(state)?;
    }
    if let Some(genres) = &update.genres {
        check_genres(genres)?;
    }
    check_phone(&update.phone)?;
    check_link("image_link", &update.image_link)?;
    check_link("website", &update.website)?;
    check_link("facebook_link", &update.facebook_link)?;
    Ok(())
}

pub fn validate_artist_update(update: &ArtistUpdate) -> ValidationResult<()> {
    if let Some(state) = update.state.as_deref().filter(|s| !s.is_empty()) {
        check_state(state)?;
    }
    if let Some(genres) = &update.genres {
        check_genres(genres)?;
    }
    check_phone(&update.phone)?;
    check_link("image_link", &update.image_link)?;
    check_link("website", &update.website)?;
    check_link("facebook_link", &update.facebook_link)?;
    Ok(())
}

/// Parse a show start time. The wire format is ISO-8601 with milliseconds in
/// UTC (`2026-05-21T21:30:00.000Z`); plain RFC 3339 is accepted too.
pub fn parse_start_time(value: &str) -> ValidationResult<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.fZ")
        .map(|naive| naive.and_utc())
        .map_err(|_| ValidationError::InvalidStartTime {
            value: value.to_string(),
        })
}
