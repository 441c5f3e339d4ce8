pub mod handlers;
pub mod routes;

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::Config;
use crate::store::DocumentStore;
use crate::timing::{Clock, SystemClock};

/// Shared application state injected into all handlers via axum's State extractor.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<Config>,
    /// Held for the duration of a comparison when
    /// `server.serialize_comparisons` is set.
    pub comparison_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, config: Config) -> Self {
        Self::with_clock(store, Arc::new(SystemClock::new()), config)
    }

    pub fn with_clock(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>, config: Config) -> Self {
        Self {
            store,
            clock,
            config: Arc::new(config),
            comparison_lock: Arc::new(Mutex::new(())),
        }
    }
}
