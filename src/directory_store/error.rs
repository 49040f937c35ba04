//! Store error taxonomy.
//!
//! Every handler maps these onto status codes: validation failures are 422,
//! missing records 404, conflicting references 409, anything the database
//! rejects after rollback 500.

use super::validation::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("no {entity} named '{name}'")]
    UnknownName { entity: &'static str, name: String },

    #[error("more than one {entity} named '{name}', reference it by id")]
    AmbiguousName { entity: &'static str, name: String },

    #[error("{entity} with id {id} still has booked shows")]
    HasDependentShows { entity: &'static str, id: i64 },

    #[error("show payload must reference an artist and a venue")]
    MissingReference,

    #[error(transparent)]
    Database(#[from] rusqlite::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;
