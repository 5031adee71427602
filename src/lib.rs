//! # Kudos
//!
//! A GitHub contribution rewards service, usable both as a standalone
//! binary and as a library.
//!
//! Kudos ingests raw activity events for tracked users, classifies them
//! into scored contributions, credits a per-user coin ledger exactly once
//! per source event, and awards monthly badges when a user's active goal
//! targets are met.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kudos::config::Config;
//! use kudos::github::CodeHostClient;
//! use kudos::ingest::Pipeline;
//! use kudos::source::WarehouseClient;
//! use kudos::store::{SqliteStore, Store};
//!
//! let config = Config::load("kudos.toml").unwrap();
//! let store = Arc::new(SqliteStore::new(&config.database_path).unwrap());
//! store.initialize().unwrap();
//!
//! let pipeline = Pipeline::new(
//!     store,
//!     Arc::new(WarehouseClient::new(&config.warehouse).unwrap()),
//!     Arc::new(CodeHostClient::new(&config.github).unwrap()),
//! );
//! let summary = pipeline.run().unwrap();
//! println!("{} contributions credited", summary.processed);
//! ```

pub mod config;
pub mod error;
pub mod github;
pub mod ingest;
pub mod server;
pub mod source;
pub mod store;
pub mod types;
