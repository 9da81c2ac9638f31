use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Unexpected(String),
}

/// Reference price feed. Every call is a fresh observation; there is no
/// caching guarantee. Failures are transient and callers retry on their
/// next pass, never fail a position over them.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    async fn get_price(&self, symbol: &str) -> Result<Decimal, OracleError>;
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    #[allow(dead_code)]
    symbol: String,
    price: Decimal,
}

/// HTTP price oracle: `GET {base}/price/{symbol}` returning
/// `{"symbol": ..., "price": ...}`.
#[derive(Debug, Clone)]
pub struct HttpPriceOracle {
    http: Client,
    base_url: String,
}

impl HttpPriceOracle {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl PriceOracle for HttpPriceOracle {
    async fn get_price(&self, symbol: &str) -> Result<Decimal, OracleError> {
        let url = format!("{}/price/{}", self.base_url, symbol);
        let resp = self.http.get(&url).send().await?.error_for_status()?;

        let body: PriceResponse = resp.json().await?;
        if body.price <= Decimal::ZERO {
            return Err(OracleError::Unexpected(format!(
                "non-positive price {} for {}",
                body.price, symbol
            )));
        }

        Ok(body.price)
    }
}
