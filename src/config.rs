//! Configuration loading and validation

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

use solana_sdk::pubkey::Pubkey;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub token: TokenConfig,
    #[serde(default)]
    pub treasury: TreasuryConfig,
    #[serde(default)]
    pub mining: MiningConfig,
    #[serde(default)]
    pub price: PriceConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcConfig {
    #[serde(default = "default_rpc_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: default_rpc_endpoint(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    /// Mint address of the tracked SPL token
    #[serde(default = "default_token_mint")]
    pub mint: String,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            mint: default_token_mint(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TreasuryConfig {
    /// Path to a Solana CLI keypair file (JSON array of bytes)
    #[serde(default)]
    pub keypair_path: Option<String>,

    /// Inline secret key: JSON array of bytes, or base58 string.
    /// Usually injected via MINING__TREASURY__SECRET.
    #[serde(default)]
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MiningConfig {
    /// Daily reward ceiling per wallet, in UI token units
    #[serde(default = "default_daily_quota")]
    pub daily_quota: f64,

    /// Minimum holdings to interact with the system at all
    #[serde(default = "default_min_hold_to_participate")]
    pub min_hold_to_participate: f64,

    /// Minimum holdings to qualify for the daily quota
    #[serde(default = "default_min_hold_for_quota")]
    pub min_hold_for_quota: f64,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            daily_quota: default_daily_quota(),
            min_hold_to_participate: default_min_hold_to_participate(),
            min_hold_for_quota: default_min_hold_for_quota(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceConfig {
    /// Displayed EUR price when no live feed is available
    #[serde(default = "default_fallback_eur")]
    pub fallback_eur: f64,

    /// Birdeye public price endpoint
    #[serde(default = "default_price_endpoint")]
    pub endpoint: String,

    /// Birdeye API key; live feed is disabled when empty
    #[serde(default)]
    pub api_key: String,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            fallback_eur: default_fallback_eur(),
            endpoint: default_price_endpoint(),
            api_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_rpc_endpoint() -> String {
    std::env::var("RPC_ENDPOINT").unwrap_or_else(|_| "https://api.mainnet-beta.solana.com".into())
}

fn default_timeout_ms() -> u64 {
    30000
}

fn default_token_mint() -> String {
    "F5e7wgt9yfQbEaA4aCcnSW3HaahcEipywusW7piZFakz".to_string()
}

fn default_daily_quota() -> f64 {
    50.0
}

fn default_min_hold_to_participate() -> f64 {
    1.0
}

fn default_min_hold_for_quota() -> f64 {
    100000.0
}

fn default_fallback_eur() -> f64 {
    0.01
}

fn default_price_endpoint() -> String {
    "https://public-api.birdeye.so/public/price".to_string()
}

fn default_database_url() -> String {
    "sqlite://mining.db".to_string()
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            // Load from file if exists
            .add_source(config::File::from(path).required(false))
            // Override with environment variables (prefix MINING__)
            .add_source(
                config::Environment::with_prefix("MINING")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        Pubkey::from_str(&self.token.mint)
            .with_context(|| format!("Invalid token mint address: {}", self.token.mint))?;

        if self.mining.daily_quota <= 0.0 {
            anyhow::bail!("daily_quota must be positive");
        }

        if self.mining.min_hold_to_participate < 0.0 {
            anyhow::bail!("min_hold_to_participate cannot be negative");
        }

        if self.mining.min_hold_for_quota < self.mining.min_hold_to_participate {
            anyhow::bail!(
                "min_hold_for_quota ({}) cannot be below min_hold_to_participate ({})",
                self.mining.min_hold_for_quota,
                self.mining.min_hold_to_participate
            );
        }

        if self.price.fallback_eur < 0.0 {
            anyhow::bail!("fallback_eur cannot be negative");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("database url cannot be empty");
        }

        Ok(())
    }

    /// Parsed mint address of the tracked token
    pub fn token_mint(&self) -> Result<Pubkey> {
        Pubkey::from_str(&self.token.mint)
            .with_context(|| format!("Invalid token mint address: {}", self.token.mint))
    }

    /// Get masked configuration for display (hide secrets)
    pub fn masked_display(&self) -> String {
        format!(
            r#"Configuration:
  Server:
    bind: {}:{}
  RPC:
    endpoint: {}
    timeout: {}ms
  Token:
    mint: {}
  Treasury:
    keypair_path: {}
    secret: {}
  Mining:
    daily_quota: {}
    min_hold_to_participate: {}
    min_hold_for_quota: {}
  Price:
    fallback_eur: {}
    api_key: {}
  Database:
    url: {}
"#,
            self.server.host,
            self.server.port,
            mask_url(&self.rpc.endpoint),
            self.rpc.timeout_ms,
            self.token.mint,
            self.treasury.keypair_path.as_deref().unwrap_or("(not set)"),
            if self.treasury.secret.is_some() {
                "***"
            } else {
                "(not set)"
            },
            self.mining.daily_quota,
            self.mining.min_hold_to_participate,
            self.mining.min_hold_for_quota,
            self.price.fallback_eur,
            if self.price.api_key.is_empty() {
                "(not set)"
            } else {
                "***"
            },
            self.database.url,
        )
    }
}

/// Mask URL for display (hide API keys in query params)
fn mask_url(url: &str) -> String {
    if let Some(idx) = url.find('?') {
        format!("{}?***", &url[..idx])
    } else {
        url.to_string()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            rpc: RpcConfig::default(),
            token: TokenConfig::default(),
            treasury: TreasuryConfig::default(),
            mining: MiningConfig::default(),
            price: PriceConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}
