pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod services;
pub mod verify;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::verify::{PaystackClient, SolanaRpcClient};

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub paystack: PaystackClient,
    pub solana: SolanaRpcClient,
    pub config: Config,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/orders/:id", get(handlers::orders::get_order))
        .route(
            "/payments/paystack/verify",
            post(handlers::payments::verify_paystack),
        )
        .route(
            "/payments/solana/verify",
            post(handlers::payments::verify_solana),
        )
        .route("/webhooks/paystack", post(handlers::webhook::paystack_webhook))
        .route("/jobs/sweep", post(handlers::jobs::run_sweep))
        // The storefront calls the verification endpoints straight from the
        // browser, so CORS stays open like the original edge functions.
        .layer(CorsLayer::permissive())
        .with_state(state)
}
