//! Metadata feed access
//!
//! ```text
//! FeedSource (HttpFeed | FileFeed)  ──bytes──▶  PackageReader  ──▶  Package*
//! ```
//!
//! The transport only hands over the raw document. Parsing is strict: a
//! malformed document fails the whole read so a broken feed never produces a
//! partial harvest.

pub mod parser;
pub mod source;

pub use parser::{parse_feed, PackageReader};
pub use source::{open_feed, FeedError, FeedSource, FileFeed, HttpFeed};
