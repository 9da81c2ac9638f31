use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,

    /// Base URL of the price oracle, e.g. `http://oracle:8090`.
    pub oracle_base_url: String,

    /// Server sweep period. The sweep is the authoritative settlement
    /// backstop, so keep this in the one-to-two-minute range.
    pub sweep_interval_secs: u64,

    /// Schedulers only treat a position as eligible once now is this many
    /// seconds past its expiry, to stay clear of clock skew.
    pub expiry_grace_secs: i64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,
            oracle_base_url: env::var("ORACLE_BASE_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8090".into()),
            sweep_interval_secs: env::var("SWEEP_INTERVAL_SECS")
                .unwrap_or_else(|_| "60".into())
                .parse()
                .unwrap_or(60),
            expiry_grace_secs: env::var("EXPIRY_GRACE_SECS")
                .unwrap_or_else(|_| "3".into())
                .parse()
                .unwrap_or(3),
        })
    }
}
