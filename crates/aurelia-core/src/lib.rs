//! Configuration loading and construction of the retrieval pipeline from it.

pub mod bootstrap;
pub mod config;
pub mod secret;

pub use config::Config;
pub use secret::Secret;
