mod error;
mod models;
mod schema;
mod store;
mod validation;

pub use error::{StoreError, StoreResult};
pub use models::{
    Artist, ArtistPage, ArtistSummary, ArtistUpdate, CityGroup, NewArtist, NewShow, NewVenue,
    SearchResults, Show, ShowListing, ShowWithArtist, ShowWithVenue, Venue, VenuePage,
    VenueSummary, VenueUpdate,
};
pub use store::SqliteDirectoryStore;
pub use validation::{FormOptions, ValidationError, GENRES, STATES};
