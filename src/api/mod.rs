//! HTTP surface
//!
//! Axum router and shared application state. All collaborators are built
//! once at startup and handed to handlers through `State`, so tests can
//! substitute them.

pub mod handlers;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::error;

use crate::config::MiningConfig;
use crate::error::Error;
use crate::ledger::LedgerStore;
use crate::oracle::BalanceSource;
use crate::price::PriceFeed;
use crate::treasury::RewardSender;

/// Shared application state
///
/// Collaborators are held behind their traits so tests can substitute a
/// fake network.
pub struct AppState {
    pub policy: MiningConfig,
    pub oracle: Box<dyn BalanceSource>,
    pub executor: Box<dyn RewardSender>,
    pub ledger: LedgerStore,
    pub price: PriceFeed,

    /// Per-wallet locks serializing the mine action's
    /// check -> transfer -> record sequence
    mine_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl AppState {
    pub fn new(
        policy: MiningConfig,
        oracle: impl BalanceSource + 'static,
        executor: impl RewardSender + 'static,
        ledger: LedgerStore,
        price: PriceFeed,
    ) -> Self {
        Self {
            policy,
            oracle: Box::new(oracle),
            executor: Box::new(executor),
            ledger,
            price,
            mine_locks: DashMap::new(),
        }
    }

    /// Lock guarding mine actions for a wallet address
    pub fn mine_lock(&self, wallet: &str) -> Arc<Mutex<()>> {
        self.mine_locks
            .entry(wallet.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Build the application router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/user_info", get(handlers::user_info))
        .route("/mine", post(handlers::mine))
        .route("/health", get(handlers::health))
        .with_state(state)
}

/// JSON body for error responses
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::InvalidWallet(_) => StatusCode::BAD_REQUEST,
            Error::BelowQuotaThreshold { .. } => StatusCode::FORBIDDEN,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        let body = ErrorBody {
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_wallet_maps_to_400() {
        let response = Error::InvalidWallet("xyz".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_eligibility_maps_to_403() {
        let response = Error::BelowQuotaThreshold {
            required: 100000.0,
            balance: 50.0,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_transfer_failure_maps_to_500() {
        let response = Error::TransactionSend("node unavailable".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = Error::Rpc("connection refused".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
