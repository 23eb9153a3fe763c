//! Display price feed
//!
//! Fetches the tracked token's EUR price from the Birdeye public API when an
//! API key is configured, falling back to the configured constant otherwise.
//! Price is display-only and never gates a disbursement, so failures degrade
//! to the fallback instead of erroring the request.

use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::PriceConfig;

#[derive(Debug, Deserialize)]
struct BirdeyeResponse {
    data: Option<BirdeyePrice>,
}

#[derive(Debug, Deserialize)]
struct BirdeyePrice {
    value: Option<f64>,
}

/// EUR price source for the tracked token
pub struct PriceFeed {
    client: reqwest::Client,
    config: PriceConfig,
    mint: String,
}

impl PriceFeed {
    pub fn new(config: PriceConfig, mint: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            client,
            config,
            mint,
        }
    }

    /// Current EUR price, or the configured fallback on any failure
    pub async fn eur_price(&self) -> f64 {
        if self.config.api_key.is_empty() {
            return self.config.fallback_eur;
        }

        match self.fetch_live_price().await {
            Ok(Some(price)) => {
                debug!("Live price for {}: {} EUR", self.mint, price);
                price
            }
            Ok(None) => {
                warn!("Price feed returned no value, using fallback");
                self.config.fallback_eur
            }
            Err(e) => {
                warn!("Price feed unavailable ({}), using fallback", e);
                self.config.fallback_eur
            }
        }
    }

    async fn fetch_live_price(&self) -> reqwest::Result<Option<f64>> {
        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&[("address", self.mint.as_str())])
            .header("x-api-key", &self.config.api_key)
            .send()
            .await?
            .error_for_status()?
            .json::<BirdeyeResponse>()
            .await?;

        Ok(response.data.and_then(|d| d.value))
    }
}
