//! CLI command implementations

use anyhow::{Context, Result};
use solana_sdk::signer::Signer;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use crate::api::{self, AppState};
use crate::config::Config;
use crate::ledger::LedgerStore;
use crate::oracle::BalanceOracle;
use crate::price::PriceFeed;
use crate::treasury::{self, DisbursementExecutor};

/// Start the mining API server
pub async fn serve(config: &Config) -> Result<()> {
    let mint = config.token_mint()?;

    info!("Initializing RPC client...");
    let rpc_client = Arc::new(
        solana_client::nonblocking::rpc_client::RpcClient::new_with_timeout(
            config.rpc.endpoint.clone(),
            Duration::from_millis(config.rpc.timeout_ms),
        ),
    );

    let treasury = treasury::load_treasury_keypair(&config.treasury)?;
    info!("Treasury: {}", treasury.pubkey());

    let oracle = BalanceOracle::new(rpc_client.clone(), mint);
    let executor = DisbursementExecutor::new(rpc_client, mint, treasury);
    let ledger = LedgerStore::connect(&config.database.url).await?;
    let price = PriceFeed::new(config.price.clone(), config.token.mint.clone());

    let state = Arc::new(AppState::new(
        config.mining.clone(),
        oracle,
        executor,
        ledger,
        price,
    ));
    let app = api::build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("mining-api listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .await
        .context("Server terminated")?;

    Ok(())
}

/// Show current configuration (secrets masked)
pub fn show_config(config: &Config) -> Result<()> {
    println!("{}", config.masked_display());
    Ok(())
}

/// Check system health (RPC, database, treasury)
pub async fn health(config: &Config) -> Result<()> {
    println!("\n=== SYSTEM HEALTH CHECK ===\n");

    let mut all_healthy = true;

    let rpc_client = solana_client::nonblocking::rpc_client::RpcClient::new_with_timeout(
        config.rpc.endpoint.clone(),
        Duration::from_millis(config.rpc.timeout_ms),
    );

    // Check RPC
    print!("RPC endpoint... ");
    let start = Instant::now();
    match rpc_client.get_latest_blockhash().await {
        Ok(_) => println!("OK ({}ms)", start.elapsed().as_millis()),
        Err(e) => {
            println!("FAILED: {}", e);
            all_healthy = false;
        }
    }

    // Check tracked mint
    print!("Token mint... ");
    match config.token_mint() {
        Ok(mint) => match rpc_client.get_token_supply(&mint).await {
            Ok(supply) => println!("OK ({} decimals)", supply.decimals),
            Err(e) => {
                println!("FAILED: {}", e);
                all_healthy = false;
            }
        },
        Err(e) => {
            println!("FAILED: {}", e);
            all_healthy = false;
        }
    }

    // Check database
    print!("Database... ");
    match LedgerStore::connect(&config.database.url).await {
        Ok(_) => println!("OK"),
        Err(e) => {
            println!("FAILED: {}", e);
            all_healthy = false;
        }
    }

    // Check treasury keypair
    print!("Treasury keypair... ");
    match treasury::load_treasury_keypair(&config.treasury) {
        Ok(keypair) => println!("OK ({})", keypair.pubkey()),
        Err(e) => {
            println!("FAILED: {}", e);
            all_healthy = false;
        }
    }

    println!();
    if all_healthy {
        println!("All systems healthy");
        Ok(())
    } else {
        anyhow::bail!("One or more health checks failed")
    }
}

/// Create the ledger database and schema
pub async fn init_db(config: &Config) -> Result<()> {
    LedgerStore::connect(&config.database.url).await?;
    println!("Ledger database initialized at {}", config.database.url);
    Ok(())
}
