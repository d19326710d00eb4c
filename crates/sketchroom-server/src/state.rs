use std::sync::Arc;

use sketchroom_core::{BroadcastRouter, DocumentStore, FileStore, MemoryStore, RoomRegistry, StorageError};

use crate::config::ServerConfig;

/// Shared application state available to all handlers via `State<AppState>`.
///
/// Cheap to clone; everything lives behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Room registry, presence, chat and canvas fan-out.
    pub router: Arc<BroadcastRouter>,
}

impl AppState {
    /// Build state over the store selected by `config.storage_dir`.
    pub fn from_config(config: ServerConfig) -> Result<Self, StorageError> {
        let store: Arc<dyn DocumentStore> = match &config.storage_dir {
            Some(dir) => {
                tracing::info!(dir = %dir.display(), "Using file store");
                Arc::new(FileStore::new(dir.clone())?)
            }
            None => {
                tracing::info!("Using in-memory store");
                Arc::new(MemoryStore::new())
            }
        };
        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: ServerConfig, store: Arc<dyn DocumentStore>) -> Self {
        let registry = RoomRegistry::new(store, config.engine_config());
        Self {
            config: Arc::new(config),
            router: Arc::new(BroadcastRouter::new(Arc::new(registry))),
        }
    }
}
