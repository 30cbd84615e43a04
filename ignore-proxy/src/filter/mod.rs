//! Ignore-set membership: the collector's cache and the proxy-facing matcher

pub mod cache;
pub mod matcher;

pub use cache::IgnoreSetCache;
pub use matcher::IgnoreMatcher;
