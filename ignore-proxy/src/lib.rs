//! TLS failure collector and event listener for an intercepting proxy
//!
//! Failures reported by the proxy engine are recorded in the ignore registry
//! and merged with the operator's own ignore patterns into the set of hosts
//! the proxy passes through untouched.

pub mod collector;
pub mod config;
pub mod context;
pub mod error;
pub mod filter;
pub mod merge;
pub mod server;

// Re-export commonly used types
pub use collector::{
    CollectOutcome, FailureCollector, FailureObserver, HandshakeFailure, NegotiationContext,
    TransportFailure,
};
pub use config::{Config, ConfigLoader, ConfigValidator};
pub use context::IgnoreContext;
pub use error::{ProxyError, Result, ValidationError};
pub use filter::{IgnoreMatcher, IgnoreSetCache};
pub use merge::EffectiveIgnoreSet;
pub use server::EventServer;
