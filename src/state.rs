use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::SqlitePool;

use crate::ai::TextGenerator;
use crate::config::Config;

/// The text-generation backend shared by all AI handlers. Held as a trait
/// object so tests can swap the real Gemini client for a stub.
pub type SharedGenerator = Arc<dyn TextGenerator + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub config: Config,
    pub generator: SharedGenerator,
}

impl FromRef<AppState> for SqlitePool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for SharedGenerator {
    fn from_ref(state: &AppState) -> Self {
        state.generator.clone()
    }
}
