//! Session harness for integration tests against a bootstrapped ledger node.

pub mod address_book;
pub mod announce;
pub mod client;
pub mod config;
pub mod context;
pub mod currency;
pub mod error;
pub mod identity;
pub mod listener;
pub mod roster;
pub mod rpc;
pub mod service;
pub mod session;
pub mod telemetry;
pub mod transaction;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use client::{EventSource, NodeClient, NodeConnection, RepositoryFactory};
pub use config::{BootstrapMode, HarnessConfig};
pub use error::{HarnessError, HarnessResult};
pub use session::IntegrationHarness;
