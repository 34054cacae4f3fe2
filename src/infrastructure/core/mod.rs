pub mod circuit_breaker;
pub mod http_client_factory;

pub use circuit_breaker::CircuitBreaker;
pub use http_client_factory::{retrying_client, url_with_query};
