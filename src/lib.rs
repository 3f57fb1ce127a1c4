//! statharvest: multilingual statistical metadata harvester
//!
//! Turns a multilingual dataset feed into catalog-ready records:
//! - Canonical-locale selection per package
//! - Resource availability probing (HEAD, exactly 200)
//! - Closed taxonomy classification and notes enrichment
//! - Cross-locale term translation tables
//! - Idempotent import with get-or-create groups and organizations

pub mod catalog;
pub mod config;
pub mod feed;
pub mod gather;
pub mod harvest;
pub mod types;
pub mod util;

#[cfg(test)]
mod test_server;

pub use config::Config;
pub use types::*;
