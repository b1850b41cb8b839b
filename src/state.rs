use std::sync::Arc;

use crate::config::Config;
use crate::daily::DailyChallengeService;
use axum::extract::FromRef;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub daily: Arc<DailyChallengeService>,
}

impl FromRef<AppState> for PgPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for Arc<DailyChallengeService> {
    fn from_ref(state: &AppState) -> Self {
        state.daily.clone()
    }
}
