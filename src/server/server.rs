use anyhow::Result;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use tracing::error;

use crate::directory_store::{
    Artist, ArtistSummary, ArtistUpdate, FormOptions, NewArtist, NewShow, NewVenue,
    SqliteDirectoryStore, StoreError, Venue, VenueSummary, VenueUpdate,
};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{log_requests, state::*, RequestsLoggingLevel, ServerConfig};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub version: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug)]
struct SearchBody {
    #[serde(default)]
    pub search_term: String,
}

#[derive(Serialize)]
struct VenueEditPage {
    venue: Venue,
    form: FormOptions,
}

#[derive(Serialize)]
struct ArtistEditPage {
    artist: Artist,
    form: FormOptions,
}

#[derive(Serialize)]
struct ShowFormOptions {
    artists: Vec<ArtistSummary>,
    venues: Vec<VenueSummary>,
}

fn error_response(err: StoreError) -> Response {
    let status = match &err {
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        StoreError::Validation(_) | StoreError::UnknownName { .. } | StoreError::MissingReference => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        StoreError::AmbiguousName { .. } | StoreError::HasDependentShows { .. } => {
            StatusCode::CONFLICT
        }
        StoreError::Database(db_err) => {
            error!("Database error: {}", db_err);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "internal server error"})),
            )
                .into_response();
        }
    };
    (status, Json(json!({"error": err.to_string()}))).into_response()
}

async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({"error": "not found"}))).into_response()
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let stats = ServerStats {
        uptime: format_uptime(state.start_time.elapsed()),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };
    Json(stats)
}

// =============================================================================
// Venues
// =============================================================================

async fn list_venues(State(directory): State<GuardedDirectoryStore>) -> Response {
    match directory.list_venues() {
        Ok(groups) => Json(groups).into_response(),
        Err(err) => error_response(err),
    }
}

async fn create_venue(
    State(directory): State<GuardedDirectoryStore>,
    Json(body): Json<NewVenue>,
) -> Response {
    match directory.create_venue(&body) {
        Ok(venue) => (StatusCode::CREATED, Json(venue)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn search_venues(
    State(directory): State<GuardedDirectoryStore>,
    Form(body): Form<SearchBody>,
) -> Response {
    match directory.search_venues(&body.search_term) {
        Ok(results) => Json(results).into_response(),
        Err(err) => error_response(err),
    }
}

async fn get_venue(
    State(directory): State<GuardedDirectoryStore>,
    Path(id): Path<i64>,
) -> Response {
    match directory.get_venue_page(id) {
        Ok(page) => Json(page).into_response(),
        Err(err) => error_response(err),
    }
}

async fn delete_venue(
    State(directory): State<GuardedDirectoryStore>,
    Path(id): Path<i64>,
) -> Response {
    match directory.delete_venue(id) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

async fn form_options() -> impl IntoResponse {
    Json(FormOptions::current())
}

async fn get_venue_edit(
    State(directory): State<GuardedDirectoryStore>,
    Path(id): Path<i64>,
) -> Response {
    match directory.get_venue(id) {
        Ok(Some(venue)) => Json(VenueEditPage {
            venue,
            form: FormOptions::current(),
        })
        .into_response(),
        Ok(None) => error_response(StoreError::NotFound {
            entity: "venue",
            id,
        }),
        Err(err) => error_response(err),
    }
}

async fn post_venue_edit(
    State(directory): State<GuardedDirectoryStore>,
    Path(id): Path<i64>,
    Json(body): Json<VenueUpdate>,
) -> Response {
    match directory.update_venue(id, &body) {
        Ok(venue) => Json(venue).into_response(),
        Err(err) => error_response(err),
    }
}

// =============================================================================
// Artists
// =============================================================================

async fn list_artists(State(directory): State<GuardedDirectoryStore>) -> Response {
    match directory.list_artists() {
        Ok(artists) => Json(artists).into_response(),
        Err(err) => error_response(err),
    }
}

async fn create_artist(
    State(directory): State<GuardedDirectoryStore>,
    Json(body): Json<NewArtist>,
) -> Response {
    match directory.create_artist(&body) {
        Ok(artist) => (StatusCode::CREATED, Json(artist)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn search_artists(
    State(directory): State<GuardedDirectoryStore>,
    Form(body): Form<SearchBody>,
) -> Response {
    match directory.search_artists(&body.search_term) {
        Ok(results) => Json(results).into_response(),
        Err(err) => error_response(err),
    }
}

async fn get_artist(
    State(directory): State<GuardedDirectoryStore>,
    Path(id): Path<i64>,
) -> Response {
    match directory.get_artist_page(id) {
        Ok(page) => Json(page).into_response(),
        Err(err) => error_response(err),
    }
}

async fn delete_artist(
    State(directory): State<GuardedDirectoryStore>,
    Path(id): Path<i64>,
) -> Response {
    match directory.delete_artist(id) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => error_response(err),
    }
}

async fn get_artist_edit(
    State(directory): State<GuardedDirectoryStore>,
    Path(id): Path<i64>,
) -> Response {
    match directory.get_artist(id) {
        Ok(Some(artist)) => Json(ArtistEditPage {
            artist,
            form: FormOptions::current(),
        })
        .into_response(),
        Ok(None) => error_response(StoreError::NotFound {
            entity: "artist",
            id,
        }),
        Err(err) => error_response(err),
    }
}

async fn post_artist_edit(
    State(directory): State<GuardedDirectoryStore>,
    Path(id): Path<i64>,
    Json(body): Json<ArtistUpdate>,
) -> Response {
    match directory.update_artist(id, &body) {
        Ok(artist) => Json(artist).into_response(),
        Err(err) => error_response(err),
    }
}

// =============================================================================
// Shows
// =============================================================================

async fn list_shows(State(directory): State<GuardedDirectoryStore>) -> Response {
    match directory.list_shows() {
        Ok(shows) => Json(shows).into_response(),
        Err(err) => error_response(err),
    }
}

async fn create_show(
    State(directory): State<GuardedDirectoryStore>,
    Json(body): Json<NewShow>,
) -> Response {
    match directory.create_show(&body) {
        Ok(show) => (StatusCode::CREATED, Json(show)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn show_form_options(State(directory): State<GuardedDirectoryStore>) -> Response {
    let artists = match directory.list_artists() {
        Ok(artists) => artists,
        Err(err) => return error_response(err),
    };
    let venues = match directory.list_venues() {
        Ok(groups) => groups.into_iter().flat_map(|g| g.venues).collect(),
        Err(err) => return error_response(err),
    };
    Json(ShowFormOptions { artists, venues }).into_response()
}

fn make_app(config: ServerConfig, directory: SqliteDirectoryStore) -> Router {
    let state = ServerState {
        config,
        start_time: Instant::now(),
        directory: Arc::new(directory),
    };

    let venue_routes: Router = Router::new()
        .route("/", get(list_venues))
        .route("/", post(create_venue))
        .route("/search", post(search_venues))
        .route("/create", get(form_options))
        .route("/create", post(create_venue))
        .route("/{id}", get(get_venue))
        .route("/{id}", delete(delete_venue))
        .route("/{id}/edit", get(get_venue_edit))
        .route("/{id}/edit", post(post_venue_edit))
        .with_state(state.clone());

    let artist_routes: Router = Router::new()
        .route("/", get(list_artists))
        .route("/", post(create_artist))
        .route("/search", post(search_artists))
        .route("/create", get(form_options))
        .route("/create", post(create_artist))
        .route("/{id}", get(get_artist))
        .route("/{id}", delete(delete_artist))
        .route("/{id}/edit", get(get_artist_edit))
        .route("/{id}/edit", post(post_artist_edit))
        .with_state(state.clone());

    let show_routes: Router = Router::new()
        .route("/", get(list_shows))
        .route("/", post(create_show))
        .route("/create", get(show_form_options))
        .route("/create", post(create_show))
        .with_state(state.clone());

    let app: Router = Router::new()
        .route("/", get(home))
        .fallback(not_found)
        .with_state(state.clone())
        .nest("/venues", venue_routes)
        .nest("/artists", artist_routes)
        .nest("/shows", show_routes);

    app.layer(middleware::from_fn_with_state(state, log_requests))
}

pub async fn run_server(
    directory: SqliteDirectoryStore,
    requests_logging_level: RequestsLoggingLevel,
    port: u16,
) -> Result<()> {
    let config = ServerConfig {
        port,
        requests_logging_level,
    };
    let app = make_app(config, directory);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    Ok(axum::serve(listener, app).await?)
}
