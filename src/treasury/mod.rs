//! Custodial treasury
//!
//! Loads the treasury signing keypair and executes reward disbursements
//! from the treasury's token account to recipients.

pub mod credentials;
pub mod disburse;

pub use credentials::load_treasury_keypair;
pub use disburse::{DisbursementExecutor, RewardSender};
