pub mod fills;
pub mod health;
pub mod trades;

use crate::db::Repository;
use crate::domain::Address;
use crate::error::AppError;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>) -> Self {
        Self { repo }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route("/v1/trades", get(trades::get_trades))
        .route("/v1/fills/watermark", get(fills::get_watermark))
        .layer(cors)
        .with_state(state)
}

fn parse_user_address(user: &str) -> Result<Address, AppError> {
    Address::parse(user).map_err(|_| AppError::BadRequest("Invalid user address".into()))
}
