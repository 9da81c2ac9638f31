use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "direction", rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "UP"),
            Direction::Down => write!(f, "DOWN"),
        }
    }
}

// ---------------------------------------------------------------------------
// PositionStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "position_status", rename_all = "lowercase")]
pub enum PositionStatus {
    Pending,
    Running,
    Settled,
}

impl PositionStatus {
    /// Both `Pending` and `Running` mean "not yet settled"; the engine
    /// treats them identically.
    pub fn is_unsettled(&self) -> bool {
        matches!(self, PositionStatus::Pending | PositionStatus::Running)
    }
}

impl fmt::Display for PositionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionStatus::Pending => write!(f, "pending"),
            PositionStatus::Running => write!(f, "running"),
            PositionStatus::Settled => write!(f, "settled"),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "wager_outcome", rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Lose,
}

impl Outcome {
    /// Decide WIN/LOSE from direction and prices. A close equal to the
    /// entry price loses for both directions; there is no push/refund.
    pub fn decide(direction: Direction, entry_price: Decimal, close_price: Decimal) -> Self {
        let won = match direction {
            Direction::Up => close_price > entry_price,
            Direction::Down => close_price < entry_price,
        };
        if won {
            Outcome::Win
        } else {
            Outcome::Lose
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Win => write!(f, "WIN"),
            Outcome::Lose => write!(f, "LOSE"),
        }
    }
}

// ---------------------------------------------------------------------------
// Position — database row for positions table
// ---------------------------------------------------------------------------

/// A single timed directional wager. Everything except `status` and the
/// four result fields is immutable after the open-side insert; the result
/// fields are all-or-nothing with `status == Settled`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Position {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub symbol: String,
    pub direction: Direction,
    pub stake: Decimal,
    pub entry_price: Decimal,
    pub opened_at: DateTime<Utc>,
    pub duration_secs: i64,
    pub expires_at: DateTime<Utc>,
    pub status: PositionStatus,
    pub close_price: Option<Decimal>,
    pub outcome: Option<Outcome>,
    pub profit_loss: Option<Decimal>,
    pub settled_at: Option<DateTime<Utc>>,
}

impl Position {
    pub fn is_expired(&self, as_of: DateTime<Utc>) -> bool {
        self.expires_at <= as_of
    }
}

/// Fields the open-side workflow supplies; `expires_at` is derived once here
/// so no later code recomputes it.
#[derive(Debug, Clone)]
pub struct NewPosition {
    pub owner_id: Uuid,
    pub symbol: String,
    pub direction: Direction,
    pub stake: Decimal,
    pub entry_price: Decimal,
    pub opened_at: DateTime<Utc>,
    pub duration_secs: i64,
}

impl NewPosition {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.opened_at + Duration::seconds(self.duration_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn up_wins_only_above_entry() {
        let entry = Decimal::from(100);
        assert_eq!(
            Outcome::decide(Direction::Up, entry, Decimal::from(101)),
            Outcome::Win
        );
        assert_eq!(
            Outcome::decide(Direction::Up, entry, Decimal::from(99)),
            Outcome::Lose
        );
    }

    #[test]
    fn down_wins_only_below_entry() {
        let entry = Decimal::from(100);
        assert_eq!(
            Outcome::decide(Direction::Down, entry, Decimal::from(99)),
            Outcome::Win
        );
        assert_eq!(
            Outcome::decide(Direction::Down, entry, Decimal::from(101)),
            Outcome::Lose
        );
    }

    #[test]
    fn equal_close_loses_for_both_directions() {
        let price = Decimal::from(100);
        assert_eq!(Outcome::decide(Direction::Up, price, price), Outcome::Lose);
        assert_eq!(Outcome::decide(Direction::Down, price, price), Outcome::Lose);
    }

    #[test]
    fn expires_at_is_opened_plus_duration() {
        let opened = Utc::now();
        let new_pos = NewPosition {
            owner_id: Uuid::new_v4(),
            symbol: "BTCUSDT".into(),
            direction: Direction::Up,
            stake: Decimal::from(50),
            entry_price: Decimal::from(100),
            opened_at: opened,
            duration_secs: 30,
        };
        assert_eq!(new_pos.expires_at(), opened + Duration::seconds(30));
    }
}
