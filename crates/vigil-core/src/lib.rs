//! vigil-core: pure data model and algorithms for the distributed polling
//! lease coordinator. No tokio, no IO — everything here is deterministic
//! and unit-testable without a store or a clock mock.

pub mod config;
pub mod error;
pub mod ids;
pub mod rendezvous;
pub mod types;

pub use config::LeaseConfig;
pub use error::{ConfigError, LeaseParseError};
pub use ids::{InstanceId, SessionId};
pub use rendezvous::preferred_owner;
pub use types::{Event, Heartbeat, LeaseInfo, LeaseRecord, LeaseState, NodeReadiness, NodeStatus};
