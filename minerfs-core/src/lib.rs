//! Filesystem indexing engine.
//!
//! Discovers files and directories under configured [`Root`]s, watches them
//! for live changes, and feeds a deduplicated, well-ordered stream of
//! create/update/delete/move notifications to an external [`store::Store`]
//! through a bounded [`pool::ProcessingPool`].
//!
//! The store itself, the extractor that turns a file into metadata, and the
//! host process's lifecycle (CLI parsing, locking, signal handling) are all
//! external collaborators — this crate only owns the mining subsystem:
//! [`crawler`], [`monitor`], [`queues`], [`pool`] and the [`controller`]
//! that ties them together.

pub mod config;
pub mod controller;
pub mod crawler;
pub mod data_provider;
pub mod error;
pub mod extractor;
pub mod monitor;
pub mod policy;
pub mod pool;
pub mod queues;
pub mod retry;
pub mod rules;
pub mod store;
pub mod uri;

pub use config::Config;
pub use controller::Controller;
pub use error::{Error, Result};
pub use uri::Uri;
