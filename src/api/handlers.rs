//! Request handlers
//!
//! Orchestrates Balance Oracle -> Ledger Store -> Quota Engine ->
//! Disbursement Executor -> Ledger Store for the status query and the mine
//! action.

use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use tracing::{error, info};

use crate::error::{Error, Result};
use crate::quota;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct UserInfoParams {
    pub wallet: String,
}

#[derive(Debug, Serialize)]
pub struct UserInfoResponse {
    pub wallet: String,
    pub balance: f64,
    pub can_mine: bool,
    pub has_quota: bool,
    pub current_reward: f64,
    pub mining_left: f64,
    pub mined_today: f64,
    pub price_eur: f64,
}

#[derive(Debug, Deserialize)]
pub struct MineRequest {
    pub wallet: String,
}

#[derive(Debug, Serialize)]
pub struct MineResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reward: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl MineResponse {
    fn disbursed(reward: f64, tx: String) -> Self {
        Self {
            success: true,
            reward: Some(reward),
            tx: Some(tx),
            message: None,
        }
    }

    fn quota_exhausted() -> Self {
        Self {
            success: false,
            reward: None,
            tx: None,
            message: Some("Daily quota already reached.".to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub status: &'static str,
}

/// GET /user_info?wallet=<address>
pub async fn user_info(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UserInfoParams>,
) -> Result<Json<UserInfoResponse>> {
    let owner = parse_wallet(&params.wallet)?;

    let balance = state.oracle.get_balance(&owner).await?;
    let mined_today = state.ledger.mined_today(&params.wallet).await?;
    let snapshot = quota::evaluate(&state.policy, balance, mined_today);
    let price_eur = state.price.eur_price().await;

    Ok(Json(UserInfoResponse {
        wallet: params.wallet,
        balance,
        can_mine: snapshot.can_participate,
        has_quota: snapshot.has_quota,
        current_reward: snapshot.entitlement,
        mining_left: snapshot.remaining,
        mined_today,
        price_eur,
    }))
}

/// POST /mine body {"wallet": "<address>"}
pub async fn mine(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MineRequest>,
) -> Result<Json<MineResponse>> {
    let destination = parse_wallet(&req.wallet)?;

    // Serialize check -> transfer -> record per wallet, so two
    // near-simultaneous requests cannot both see the full remaining quota.
    let lock = state.mine_lock(&req.wallet);
    let _guard = lock.lock().await;

    let balance = state.oracle.get_balance(&destination).await?;
    if balance < state.policy.min_hold_for_quota {
        return Err(Error::BelowQuotaThreshold {
            required: state.policy.min_hold_for_quota,
            balance,
        });
    }

    let mined_today = state.ledger.mined_today(&req.wallet).await?;
    let snapshot = quota::evaluate(&state.policy, balance, mined_today);
    if snapshot.remaining <= 0.0 {
        return Ok(Json(MineResponse::quota_exhausted()));
    }

    // The reward is whatever quota remains today, not a fixed increment
    let reward = snapshot.remaining;
    let signature = state.executor.transfer(&destination, reward).await?;

    // No compensating action exists if this write fails after a confirmed
    // transfer; log the signature so the disbursement can be reconciled.
    if let Err(e) = state
        .ledger
        .record(&req.wallet, reward, Some(&signature.to_string()))
        .await
    {
        error!(
            "Ledger write failed after confirmed transfer {} of {} to {}: {}",
            signature, reward, req.wallet, e
        );
        return Err(e);
    }

    info!("Mined {} for {} (tx: {})", reward, req.wallet, signature);

    Ok(Json(MineResponse::disbursed(reward, signature.to_string())))
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        status: "UP",
    })
}

/// Validate a caller-supplied wallet address
fn parse_wallet(wallet: &str) -> Result<Pubkey> {
    Pubkey::from_str(wallet).map_err(|_| Error::InvalidWallet(wallet.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MiningConfig, PriceConfig};
    use crate::error::Result;
    use crate::ledger::LedgerStore;
    use crate::oracle::BalanceSource;
    use crate::price::PriceFeed;
    use crate::treasury::RewardSender;
    use async_trait::async_trait;
    use solana_sdk::signature::Signature;

    const WALLET: &str = "DZoHMBRyTzShZC9dwQ2HgFwhSjUE2xWLEDypKoa2Mcp3";

    struct FixedBalance(f64);

    #[async_trait]
    impl BalanceSource for FixedBalance {
        async fn get_balance(&self, _owner: &Pubkey) -> Result<f64> {
            Ok(self.0)
        }
    }

    struct FakeSender;

    #[async_trait]
    impl RewardSender for FakeSender {
        async fn transfer(&self, _destination: &Pubkey, _ui_amount: f64) -> Result<Signature> {
            Ok(Signature::new_unique())
        }
    }

    struct FailingSender;

    #[async_trait]
    impl RewardSender for FailingSender {
        async fn transfer(&self, _destination: &Pubkey, _ui_amount: f64) -> Result<Signature> {
            Err(Error::TransactionSend("node unavailable".into()))
        }
    }

    async fn state_with(
        balance: f64,
        sender: impl RewardSender + 'static,
    ) -> (Arc<AppState>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("test.db").display());
        let ledger = LedgerStore::connect(&url).await.unwrap();

        let policy = MiningConfig {
            daily_quota: 50.0,
            min_hold_to_participate: 1.0,
            min_hold_for_quota: 100000.0,
        };
        let price = PriceFeed::new(PriceConfig::default(), "mint".into());

        let state = AppState::new(policy, FixedBalance(balance), sender, ledger, price);
        (Arc::new(state), dir)
    }

    #[tokio::test]
    async fn test_mine_disburses_full_quota_then_noops() {
        let (state, _dir) = state_with(200000.0, FakeSender).await;

        let req = MineRequest {
            wallet: WALLET.into(),
        };
        let Json(response) = mine(State(state.clone()), Json(req)).await.unwrap();
        assert!(response.success);
        assert_eq!(response.reward, Some(50.0));
        assert!(response.tx.is_some());
        assert_eq!(state.ledger.mined_today(WALLET).await.unwrap(), 50.0);

        // Second call the same day is a benign no-op
        let req = MineRequest {
            wallet: WALLET.into(),
        };
        let Json(response) = mine(State(state.clone()), Json(req)).await.unwrap();
        assert!(!response.success);
        assert!(response.message.is_some());
        assert_eq!(state.ledger.mined_today(WALLET).await.unwrap(), 50.0);
    }

    #[tokio::test]
    async fn test_mine_sends_only_remaining_quota() {
        let (state, _dir) = state_with(200000.0, FakeSender).await;
        state.ledger.record(WALLET, 30.0, Some("earlier")).await.unwrap();

        let req = MineRequest {
            wallet: WALLET.into(),
        };
        let Json(response) = mine(State(state.clone()), Json(req)).await.unwrap();
        assert!(response.success);
        assert_eq!(response.reward, Some(20.0));
        assert_eq!(state.ledger.mined_today(WALLET).await.unwrap(), 50.0);
    }

    #[tokio::test]
    async fn test_mine_rejects_below_quota_threshold() {
        let (state, _dir) = state_with(50.0, FakeSender).await;

        let req = MineRequest {
            wallet: WALLET.into(),
        };
        let err = mine(State(state.clone()), Json(req)).await.unwrap_err();
        assert!(matches!(err, Error::BelowQuotaThreshold { .. }));
        assert_eq!(state.ledger.mined_today(WALLET).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_failed_transfer_writes_no_record() {
        let (state, _dir) = state_with(200000.0, FailingSender).await;

        let req = MineRequest {
            wallet: WALLET.into(),
        };
        let err = mine(State(state.clone()), Json(req)).await.unwrap_err();
        assert!(matches!(err, Error::TransactionSend(_)));
        assert_eq!(state.ledger.mined_today(WALLET).await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_mine_rejects_malformed_wallet() {
        let (state, _dir) = state_with(200000.0, FakeSender).await;

        let req = MineRequest {
            wallet: "not-a-wallet".into(),
        };
        let err = mine(State(state), Json(req)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidWallet(_)));
    }

    #[tokio::test]
    async fn test_user_info_reports_snapshot() {
        let (state, _dir) = state_with(200000.0, FakeSender).await;
        state.ledger.record(WALLET, 30.0, Some("earlier")).await.unwrap();

        let params = UserInfoParams {
            wallet: WALLET.into(),
        };
        let Json(info) = user_info(State(state), Query(params)).await.unwrap();

        assert_eq!(info.balance, 200000.0);
        assert!(info.can_mine);
        assert!(info.has_quota);
        assert_eq!(info.current_reward, 50.0);
        assert_eq!(info.mined_today, 30.0);
        assert_eq!(info.mining_left, 20.0);
        assert_eq!(info.price_eur, 0.01);
    }

    #[tokio::test]
    async fn test_user_info_participant_without_quota() {
        let (state, _dir) = state_with(500.0, FakeSender).await;

        let params = UserInfoParams {
            wallet: WALLET.into(),
        };
        let Json(info) = user_info(State(state), Query(params)).await.unwrap();

        assert!(info.can_mine);
        assert!(!info.has_quota);
        assert_eq!(info.current_reward, 0.0);
        assert_eq!(info.mining_left, 0.0);
    }

    #[tokio::test]
    async fn test_user_info_rejects_malformed_wallet() {
        let (state, _dir) = state_with(200000.0, FakeSender).await;

        let params = UserInfoParams {
            wallet: "xyz".into(),
        };
        let err = user_info(State(state), Query(params)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidWallet(_)));
    }

    #[test]
    fn test_parse_wallet_accepts_valid_pubkey() {
        let wallet = "DZoHMBRyTzShZC9dwQ2HgFwhSjUE2xWLEDypKoa2Mcp3";
        assert!(parse_wallet(wallet).is_ok());
    }

    #[test]
    fn test_parse_wallet_rejects_garbage() {
        assert!(matches!(
            parse_wallet("not-a-wallet"),
            Err(Error::InvalidWallet(_))
        ));
        assert!(matches!(parse_wallet(""), Err(Error::InvalidWallet(_))));
    }

    #[test]
    fn test_mine_response_success_shape() {
        let response = MineResponse::disbursed(50.0, "5sig".to_string());
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["reward"], 50.0);
        assert_eq!(json["tx"], "5sig");
        assert!(json.get("message").is_none());
    }

    #[test]
    fn test_mine_response_exhausted_shape() {
        let response = MineResponse::quota_exhausted();
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["success"], false);
        assert!(json.get("reward").is_none());
        assert!(json.get("tx").is_none());
        assert!(json["message"].as_str().unwrap().contains("quota"));
    }

    #[test]
    fn test_user_info_response_field_names() {
        let response = UserInfoResponse {
            wallet: "w".into(),
            balance: 200000.0,
            can_mine: true,
            has_quota: true,
            current_reward: 50.0,
            mining_left: 20.0,
            mined_today: 30.0,
            price_eur: 0.01,
        };
        let json = serde_json::to_value(&response).unwrap();

        for key in [
            "wallet",
            "balance",
            "can_mine",
            "has_quota",
            "current_reward",
            "mining_left",
            "mined_today",
            "price_eur",
        ] {
            assert!(json.get(key).is_some(), "missing field {}", key);
        }
    }
}
