use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Database row for payout_configs table. One row per symbol.
///
/// `payout_pct` is the slice of the stake moved on settlement, e.g. 10.0
/// means a winner gets stake + 10% and a loser recovers stake - 10%.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PayoutConfig {
    pub symbol: String,
    pub payout_pct: Option<Decimal>,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

impl PayoutConfig {
    /// A config is usable only when it is active and carries a percentage
    /// in (0, 100]. A slice over 100 would make a losing credit negative,
    /// so an out-of-range row is treated like a missing one: a hard stop
    /// for both opening and settling until an operator fixes it.
    pub fn usable_pct(&self) -> Option<Decimal> {
        if !self.active {
            return None;
        }
        self.payout_pct
            .filter(|pct| *pct > Decimal::ZERO && *pct <= Decimal::from(100))
    }
}
