//! Balance oracle
//!
//! Fetches a wallet's holdings of the tracked token from a Solana RPC node,
//! summing across all token accounts the wallet owns for the mint.

use std::sync::Arc;

use async_trait::async_trait;
use solana_account_decoder::UiAccountData;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_request::TokenAccountsFilter;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::error::{Error, Result};

/// Source of tracked-token balances
#[async_trait]
pub trait BalanceSource: Send + Sync {
    /// Total tracked-token balance for `owner`, in UI units.
    ///
    /// Returns 0.0 when the wallet holds no token accounts for the mint.
    async fn get_balance(&self, owner: &Pubkey) -> Result<f64>;
}

/// Read-only view of tracked-token holdings on a Solana RPC node
pub struct BalanceOracle {
    rpc_client: Arc<RpcClient>,
    mint: Pubkey,
}

impl BalanceOracle {
    pub fn new(rpc_client: Arc<RpcClient>, mint: Pubkey) -> Self {
        Self { rpc_client, mint }
    }
}

#[async_trait]
impl BalanceSource for BalanceOracle {
    async fn get_balance(&self, owner: &Pubkey) -> Result<f64> {
        let accounts = self
            .rpc_client
            .get_token_accounts_by_owner(owner, TokenAccountsFilter::Mint(self.mint))
            .await
            .map_err(|e| Error::Rpc(format!("Failed to fetch token accounts: {}", e)))?;

        let mut total = 0.0;
        for keyed in &accounts {
            if let UiAccountData::Json(parsed) = &keyed.account.data {
                total += token_ui_amount(&parsed.parsed);
            }
        }

        debug!(
            "Balance for {}: {} across {} account(s)",
            owner,
            total,
            accounts.len()
        );
        Ok(total)
    }
}

/// Extract the UI amount from a jsonParsed token account.
///
/// Falls back to raw amount / 10^decimals when uiAmount is null (large
/// balances lose float precision in the RPC response).
fn token_ui_amount(parsed: &serde_json::Value) -> f64 {
    let token_amount = &parsed["info"]["tokenAmount"];

    if let Some(ui_amount) = token_amount["uiAmount"].as_f64() {
        return ui_amount;
    }

    let raw: f64 = token_amount["amount"]
        .as_str()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.0);
    let decimals = token_amount["decimals"].as_u64().unwrap_or(0);

    if decimals > 0 {
        raw / 10f64.powi(decimals as i32)
    } else {
        raw
    }
}
