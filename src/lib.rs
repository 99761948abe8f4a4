//! BeamStore - an in-memory keyed byte store with a TCP interface
//!
//! This library provides:
//! - A line-oriented text protocol with configurable delimiters
//! - A single store actor that applies every command in arrival order
//! - Per-connection read/write loops joined by bounded channels
//! - An async client

pub mod actor;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod protocol;
pub mod server;
pub mod store;

pub use actor::StoreActor;
pub use client::Client;
pub use config::{Delimiters, ServerConfig};
pub use error::{BeamStoreError, FrameError, Result};
pub use protocol::{Action, Command, Request};
pub use server::BeamStoreServer;
pub use store::{MemoryStore, Store};

/// Current version of BeamStore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
