pub mod candle_store;
pub mod price_cache;
pub mod types;

pub use candle_store::CandleStore;
pub use price_cache::PriceCache;
pub use types::{Candle, ConnectionState, MarketEvent, Tick};
