pub mod analytics;
pub mod client;

pub use analytics::{AnalyticsClient, CachedEndpoint, RemoteSignal};
pub use client::RestMarketClient;
