use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Position size bands as fractions of portfolio equity.
///
/// Always ordered `conservative <= recommended <= aggressive`, and all three
/// grow monotonically with signal confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSize {
    pub conservative: Decimal,
    pub recommended: Decimal,
    pub aggressive: Decimal,
}

/// Reward-to-risk ratio of a proposed entry.
///
/// `Undefined` is the explicit sentinel for a non-positive risk leg; it must
/// never be silently turned into an infinity by downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RiskReward {
    Ratio(Decimal),
    Undefined,
}

/// Risk parameters derived from a signal and the current price.
///
/// Invariant: for BUY, `stop_loss < entry_price < take_profit`; for SELL the
/// ordering is inverted; for HOLD a narrow symmetric band applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskProfile {
    pub entry_price: Decimal,
    pub stop_loss: Decimal,
    pub take_profit: Decimal,
    pub position_size: PositionSize,
    pub risk_reward: RiskReward,
}
