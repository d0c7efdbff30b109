use axum::extract::FromRef;

use crate::library_store::LibraryStore;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedLibraryStore = Arc<dyn LibraryStore>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub store: GuardedLibraryStore,
    pub hash: String,
}

impl ServerState {
    pub fn new(config: ServerConfig, store: GuardedLibraryStore) -> ServerState {
        ServerState {
            config,
            start_time: Instant::now(),
            store,
            hash: env!("GIT_HASH").to_owned(),
        }
    }
}

impl FromRef<ServerState> for GuardedLibraryStore {
    fn from_ref(input: &ServerState) -> Self {
        input.store.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
