pub mod risk_calculator;
pub mod synthesizer;

pub use risk_calculator::RiskCalculator;
pub use synthesizer::SignalSynthesizer;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Externally supplied sentiment scores per symbol, in [-1, 1].
///
/// Optional input to the synthesizer; written by whatever upstream component
/// the consumer wires in (news scoring, social feeds), read at signal time.
pub type SentimentScores = Arc<RwLock<HashMap<String, f64>>>;
