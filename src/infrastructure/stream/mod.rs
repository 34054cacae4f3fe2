pub mod manager;
pub mod supervisor;

pub use manager::StreamConnectionManager;
pub use supervisor::{BackoffPolicy, ConnectionSupervisor, StreamEvent, SupervisorAction};
