use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::db::ProgressStore;
use crate::gamification::Engine;
use crate::response::AppError;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    store: Option<Arc<ProgressStore>>,
    engine: Arc<Engine>,
}

impl AppState {
    pub fn new(store: Option<Arc<ProgressStore>>, engine: Arc<Engine>) -> Self {
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            store,
            engine,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn store(&self) -> Option<Arc<ProgressStore>> {
        self.store.clone()
    }

    /// The store, or 503 when the service started without one.
    pub fn require_store(&self) -> Result<Arc<ProgressStore>, AppError> {
        self.store
            .clone()
            .ok_or_else(|| AppError::service_unavailable("Base de données indisponible"))
    }

    pub fn engine(&self) -> Arc<Engine> {
        Arc::clone(&self.engine)
    }
}
