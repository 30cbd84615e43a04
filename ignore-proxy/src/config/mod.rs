//! Configuration management for the collector

pub mod loader;
pub mod schema;
pub mod validator;

pub use loader::ConfigLoader;
pub use schema::{Config, ProxyConfig, RegistryConfig};
pub use validator::ConfigValidator;
