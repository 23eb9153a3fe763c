//! Reward disbursement execution
//!
//! Handles the actual on-chain transfer of the tracked token from the
//! treasury to a recipient wallet.

use std::sync::Arc;

use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    instruction::Instruction,
    pubkey::Pubkey,
    signature::{Keypair, Signature},
    signer::Signer,
    transaction::Transaction,
};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Sends reward transfers out of the treasury
#[async_trait]
pub trait RewardSender: Send + Sync {
    /// Transfer `ui_amount` of the tracked token to `destination`,
    /// returning the transaction signature on confirmed success.
    async fn transfer(&self, destination: &Pubkey, ui_amount: f64) -> Result<Signature>;
}

/// Executes tracked-token transfers out of the treasury on-chain
pub struct DisbursementExecutor {
    rpc_client: Arc<RpcClient>,
    mint: Pubkey,
    treasury: Keypair,
}

impl DisbursementExecutor {
    /// Create a new disbursement executor
    pub fn new(rpc_client: Arc<RpcClient>, mint: Pubkey, treasury: Keypair) -> Self {
        Self {
            rpc_client,
            mint,
            treasury,
        }
    }

    /// Treasury signing address
    pub fn treasury_pubkey(&self) -> Pubkey {
        self.treasury.pubkey()
    }
}

#[async_trait]
impl RewardSender for DisbursementExecutor {
    /// Creates the destination's associated token account if it does not
    /// exist yet (the treasury pays the rent).
    async fn transfer(&self, destination: &Pubkey, ui_amount: f64) -> Result<Signature> {
        let decimals = self
            .rpc_client
            .get_token_supply(&self.mint)
            .await
            .map_err(|e| Error::TransactionBuild(format!("Failed to fetch token supply: {}", e)))?
            .decimals;

        let raw_amount = spl_token::ui_amount_to_amount(ui_amount, decimals);
        if raw_amount == 0 {
            return Err(Error::TransactionBuild(format!(
                "Amount {} rounds to zero at {} decimals",
                ui_amount, decimals
            )));
        }

        debug!(
            "Disbursing {} ({} raw) of {} to {}",
            ui_amount, raw_amount, self.mint, destination
        );

        let instructions = build_transfer_instructions(
            &self.treasury.pubkey(),
            destination,
            &self.mint,
            raw_amount,
            decimals,
        )?;

        let blockhash = self
            .rpc_client
            .get_latest_blockhash()
            .await
            .map_err(|e| Error::TransactionBuild(format!("Failed to get blockhash: {}", e)))?;

        let transaction = Transaction::new_signed_with_payer(
            &instructions,
            Some(&self.treasury.pubkey()),
            &[&self.treasury],
            blockhash,
        );

        let signature = self
            .rpc_client
            .send_and_confirm_transaction(&transaction)
            .await
            .map_err(|e| Error::TransactionSend(format!("Disbursement failed: {}", e)))?;

        info!(
            "Disbursement complete: {} to {} (sig: {})",
            ui_amount, destination, signature
        );

        Ok(signature)
    }
}

/// Build the instruction pair for a treasury-to-recipient token transfer.
///
/// The recipient ATA creation is idempotent and included on every transfer.
fn build_transfer_instructions(
    treasury: &Pubkey,
    destination: &Pubkey,
    mint: &Pubkey,
    raw_amount: u64,
    decimals: u8,
) -> Result<Vec<Instruction>> {
    let source_ata = derive_ata(treasury, mint);
    let destination_ata = derive_ata(destination, mint);

    let create_ata =
        spl_associated_token_account::instruction::create_associated_token_account_idempotent(
            treasury,
            destination,
            mint,
            &spl_token::ID,
        );

    let transfer = spl_token::instruction::transfer_checked(
        &spl_token::ID,
        &source_ata,
        mint,
        &destination_ata,
        treasury,
        &[],
        raw_amount,
        decimals,
    )
    .map_err(|e| Error::TransactionBuild(format!("Transfer instruction: {}", e)))?;

    Ok(vec![create_ata, transfer])
}

/// Derive associated token account address
pub fn derive_ata(wallet: &Pubkey, mint: &Pubkey) -> Pubkey {
    spl_associated_token_account::get_associated_token_address(wallet, mint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_ata() {
        let wallet = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let ata = derive_ata(&wallet, &mint);

        // ATA should be deterministic
        assert_eq!(ata, derive_ata(&wallet, &mint));
        assert_ne!(ata, wallet);
    }

    #[test]
    fn test_build_transfer_instructions() {
        let treasury = Pubkey::new_unique();
        let destination = Pubkey::new_unique();
        let mint = Pubkey::new_unique();

        let instructions =
            build_transfer_instructions(&treasury, &destination, &mint, 50_000_000, 6).unwrap();

        assert_eq!(instructions.len(), 2);
        assert_eq!(instructions[0].program_id, spl_associated_token_account::ID);
        assert_eq!(instructions[1].program_id, spl_token::ID);

        // Treasury signs the transfer as authority
        assert!(instructions[1]
            .accounts
            .iter()
            .any(|meta| meta.pubkey == treasury && meta.is_signer));
    }

    #[test]
    fn test_ui_amount_conversion() {
        assert_eq!(spl_token::ui_amount_to_amount(50.0, 6), 50_000_000);
        assert_eq!(spl_token::ui_amount_to_amount(0.5, 6), 500_000);
        assert_eq!(spl_token::ui_amount_to_amount(50.0, 0), 50);
    }
}
