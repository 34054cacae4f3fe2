pub mod candle_aggregator;
pub mod indicator_engine;
pub mod price_poller;
pub mod tick_normalizer;
