//! Persistent registry of hosts a TLS-intercepting proxy should pass through
//!
//! Hosts land here when interception fails for them. Each host is one row with
//! its first-seen origin, timestamps, an observation counter and an active flag.

pub mod error;
pub mod record;
pub mod store;
pub mod transfer;

pub use error::{RegistryError, Result};
pub use record::{normalize_domain, DomainRecord, Origin, RegisterOutcome, RegistryStats};
pub use store::RegistryStore;
pub use transfer::SENTINEL;
