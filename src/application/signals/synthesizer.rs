use crate::domain::trading::signal::{
    BandPosition, Direction, IndicatorSnapshot, Signal, SignalStrength,
};
use tracing::info;

const RSI_OVERBOUGHT: f64 = 70.0;
const RSI_OVERSOLD: f64 = 30.0;
const STOCH_OVERBOUGHT: f64 = 80.0;
const STOCH_OVERSOLD: f64 = 20.0;
const MAX_CONFIDENCE: f64 = 95.0;
/// Largest confidence adjustment an external sentiment score may apply.
const SENTIMENT_NUDGE_CAP: f64 = 5.0;

/// Deterministic rule-based signal scoring over an indicator snapshot.
///
/// Every cycle produces a brand-new `Signal`; prior signals are never
/// mutated or merged.
#[derive(Debug, Default)]
pub struct SignalSynthesizer;

impl SignalSynthesizer {
    pub fn new() -> Self {
        Self
    }

    pub fn synthesize(
        &self,
        symbol: &str,
        snapshot: &IndicatorSnapshot,
        sentiment: Option<f64>,
        generated_at: i64,
    ) -> Signal {
        let mut bullish = Vec::new();
        let mut bearish = Vec::new();
        let mut neutral = Vec::new();

        let rsi = snapshot.rsi;
        let histogram = snapshot.macd.histogram;

        // Primary rule: RSI extremes, sharpened by MACD histogram agreement
        let mut macd_noted = false;
        let (direction, mut confidence) = if rsi > RSI_OVERBOUGHT && histogram < 0.0 {
            bearish.push(format!("RSI overbought at {:.1}", rsi));
            bearish.push("MACD histogram negative, momentum rolling over".to_string());
            macd_noted = true;
            (
                Direction::Sell,
                (60.0 + (rsi - RSI_OVERBOUGHT)).min(MAX_CONFIDENCE),
            )
        } else if rsi < RSI_OVERSOLD && histogram > 0.0 {
            bullish.push(format!("RSI oversold at {:.1}", rsi));
            bullish.push("MACD histogram positive, momentum turning up".to_string());
            macd_noted = true;
            (
                Direction::Buy,
                (60.0 + (RSI_OVERSOLD - rsi)).min(MAX_CONFIDENCE),
            )
        } else if rsi > RSI_OVERBOUGHT {
            bearish.push(format!("RSI overbought at {:.1}", rsi));
            (Direction::Sell, 70.0)
        } else if rsi < RSI_OVERSOLD {
            bullish.push(format!("RSI oversold at {:.1}", rsi));
            (Direction::Buy, 70.0)
        } else {
            neutral.push(format!("RSI neutral at {:.1}", rsi));
            (Direction::Hold, 50.0)
        };

        // Supporting context; recorded but never overrides the primary rule
        if !macd_noted {
            if histogram > 0.0 {
                bullish.push("MACD histogram positive".to_string());
            } else if histogram < 0.0 {
                bearish.push("MACD histogram negative".to_string());
            }
        }

        match snapshot.bollinger.position {
            BandPosition::Upper => {
                bearish.push("close above upper Bollinger band".to_string());
            }
            BandPosition::Lower => {
                bullish.push("close below lower Bollinger band".to_string());
            }
            BandPosition::Middle => {}
        }
        if snapshot.bollinger.squeeze {
            neutral.push("Bollinger bands squeezed, volatility compressed".to_string());
        }

        let stoch_k = snapshot.stochastic.k;
        if stoch_k > STOCH_OVERBOUGHT {
            bearish.push(format!("stochastic %K overbought at {:.1}", stoch_k));
        } else if stoch_k < STOCH_OVERSOLD {
            bullish.push(format!("stochastic %K oversold at {:.1}", stoch_k));
        }

        // Optional external sentiment: nudges confidence, never direction
        if let Some(score) = sentiment {
            let score = score.clamp(-1.0, 1.0);
            let nudge = (score.abs() * SENTIMENT_NUDGE_CAP).min(SENTIMENT_NUDGE_CAP);
            match direction {
                Direction::Buy | Direction::Sell => {
                    let aligned = (direction == Direction::Buy) == (score > 0.0);
                    if score != 0.0 && aligned {
                        confidence = (confidence + nudge).min(MAX_CONFIDENCE);
                        let bucket = if score > 0.0 { &mut bullish } else { &mut bearish };
                        bucket.push(format!("external sentiment {:+.2} supports the signal", score));
                    } else if score != 0.0 {
                        confidence = (confidence - nudge).max(0.0);
                        let bucket = if score > 0.0 { &mut bullish } else { &mut bearish };
                        bucket.push(format!("external sentiment {:+.2} cuts against the signal", score));
                    }
                }
                Direction::Hold => {
                    neutral.push(format!("external sentiment {:+.2}", score));
                }
            }
        }

        let confidence = confidence.clamp(0.0, 100.0);
        let strength = SignalStrength::from_confidence(confidence);

        info!(
            "SignalSynthesizer: {} → {} (confidence {:.0}, {:?})",
            symbol, direction, confidence, strength
        );

        Signal {
            symbol: symbol.to_string(),
            direction,
            confidence,
            strength,
            bullish_factors: bullish,
            bearish_factors: bearish,
            neutral_factors: neutral,
            generated_at,
        }
    }
}
