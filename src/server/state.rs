use axum::extract::FromRef;

use crate::directory_store::SqliteDirectoryStore;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedDirectoryStore = Arc<SqliteDirectoryStore>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub directory: GuardedDirectoryStore,
}

impl FromRef<ServerState> for GuardedDirectoryStore {
    fn from_ref(input: &ServerState) -> Self {
        input.directory.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
