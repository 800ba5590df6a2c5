//! Infrastructure layer: configuration, ledger client, HTTP transport.

pub mod config;
pub mod http;
pub mod ledger;

pub use config::{ConfigError, ConfigLoader};
pub use ledger::LedgerClient;
