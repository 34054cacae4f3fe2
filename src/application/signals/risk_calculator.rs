use crate::domain::trading::risk::{PositionSize, RiskProfile, RiskReward};
use crate::domain::trading::signal::Direction;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// Risk band multipliers relative to the entry price.
const BUY_TAKE_PROFIT: Decimal = dec!(1.06);
const BUY_STOP_LOSS: Decimal = dec!(0.97);
const SELL_TAKE_PROFIT: Decimal = dec!(0.94);
const SELL_STOP_LOSS: Decimal = dec!(1.03);
// HOLD keeps a narrow conservative band either side of the entry.
const HOLD_TAKE_PROFIT: Decimal = dec!(1.03);
const HOLD_STOP_LOSS: Decimal = dec!(0.985);

// Position sizing: fractions of portfolio equity scaling with confidence.
const SIZE_FLOOR: Decimal = dec!(0.02);
const SIZE_CONFIDENCE_SPAN: Decimal = dec!(0.08);
const AGGRESSIVE_CAP: Decimal = dec!(0.15);

/// Derives stop-loss, take-profit and position-size bands from a signal and
/// the current price.
#[derive(Debug, Default)]
pub struct RiskCalculator;

impl RiskCalculator {
    pub fn new() -> Self {
        Self
    }

    pub fn calculate(
        &self,
        direction: Direction,
        confidence: f64,
        entry_price: Decimal,
    ) -> RiskProfile {
        let (stop_loss, take_profit) = match direction {
            Direction::Buy => (entry_price * BUY_STOP_LOSS, entry_price * BUY_TAKE_PROFIT),
            Direction::Sell => (entry_price * SELL_STOP_LOSS, entry_price * SELL_TAKE_PROFIT),
            Direction::Hold => (entry_price * HOLD_STOP_LOSS, entry_price * HOLD_TAKE_PROFIT),
        };

        let reward = (take_profit - entry_price).abs();
        let risk = (entry_price - stop_loss).abs();
        let risk_reward = if entry_price <= Decimal::ZERO || risk <= Decimal::ZERO {
            RiskReward::Undefined
        } else {
            RiskReward::Ratio(reward / risk)
        };

        RiskProfile {
            entry_price,
            stop_loss,
            take_profit,
            position_size: Self::position_size(confidence),
            risk_reward,
        }
    }

    /// Equity fractions, monotonically increasing with confidence:
    /// recommended scales from 2% at confidence 0 to 10% at confidence 100.
    fn position_size(confidence: f64) -> PositionSize {
        let confidence_frac = Decimal::from_f64_retain(confidence.clamp(0.0, 100.0))
            .unwrap_or(Decimal::ZERO)
            / dec!(100);

        let recommended = SIZE_FLOOR + confidence_frac * SIZE_CONFIDENCE_SPAN;
        let conservative = recommended * dec!(0.5);
        let aggressive = (recommended * dec!(1.5)).min(AGGRESSIVE_CAP);

        PositionSize {
            conservative,
            recommended,
            aggressive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buy_bands_at_entry_100() {
        let calc = RiskCalculator::new();
        let profile = calc.calculate(Direction::Buy, 80.0, dec!(100));
        assert_eq!(profile.stop_loss, dec!(97.00));
        assert_eq!(profile.take_profit, dec!(106.00));
        assert!(profile.stop_loss < profile.entry_price);
        assert!(profile.entry_price < profile.take_profit);
        assert_eq!(profile.risk_reward, RiskReward::Ratio(dec!(2)));
    }

    #[test]
    fn test_sell_bands_at_entry_100() {
        let calc = RiskCalculator::new();
        let profile = calc.calculate(Direction::Sell, 80.0, dec!(100));
        assert_eq!(profile.stop_loss, dec!(103.00));
        assert_eq!(profile.take_profit, dec!(94.00));
        assert!(profile.take_profit < profile.entry_price);
        assert!(profile.entry_price < profile.stop_loss);
        assert_eq!(profile.risk_reward, RiskReward::Ratio(dec!(2)));
    }

    #[test]
    fn test_hold_band_is_narrow_and_ordered() {
        let calc = RiskCalculator::new();
        let profile = calc.calculate(Direction::Hold, 50.0, dec!(100));
        assert_eq!(profile.stop_loss, dec!(98.500));
        assert_eq!(profile.take_profit, dec!(103.00));
        assert!(profile.stop_loss < profile.entry_price);
        assert!(profile.entry_price < profile.take_profit);
    }

    #[test]
    fn test_zero_entry_reports_undefined_not_infinity() {
        let calc = RiskCalculator::new();
        let profile = calc.calculate(Direction::Buy, 80.0, Decimal::ZERO);
        assert_eq!(profile.risk_reward, RiskReward::Undefined);
    }

    #[test]
    fn test_position_size_bands_are_ordered() {
        let calc = RiskCalculator::new();
        let profile = calc.calculate(Direction::Buy, 65.0, dec!(100));
        let size = profile.position_size;
        assert!(size.conservative <= size.recommended);
        assert!(size.recommended <= size.aggressive);
    }

    #[test]
    fn test_position_size_grows_with_confidence() {
        let calc = RiskCalculator::new();
        let weak = calc.calculate(Direction::Buy, 40.0, dec!(100)).position_size;
        let strong = calc.calculate(Direction::Buy, 90.0, dec!(100)).position_size;
        assert!(weak.recommended < strong.recommended);
        assert!(weak.conservative < strong.conservative);
        assert!(weak.aggressive < strong.aggressive);

        // Bounds: 2% floor, 10% ceiling on the recommended band
        let min = calc.calculate(Direction::Hold, 0.0, dec!(100)).position_size;
        let max = calc.calculate(Direction::Buy, 100.0, dec!(100)).position_size;
        assert_eq!(min.recommended, dec!(0.02));
        assert_eq!(max.recommended, dec!(0.10));
    }
}
