use std::sync::Arc;

use crate::{config::AppConfig, engine::ReviewEngine};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub engine: Arc<ReviewEngine>,
}

impl AppState {
    pub fn new(config: AppConfig, engine: ReviewEngine) -> Self {
        Self {
            config: Arc::new(config),
            engine: Arc::new(engine),
        }
    }
}
