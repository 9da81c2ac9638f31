pub mod balance;
pub mod payout;
pub mod position;

pub use balance::Balance;
pub use payout::PayoutConfig;
pub use position::{Direction, NewPosition, Outcome, Position, PositionStatus};
