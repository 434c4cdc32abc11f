//! Chapter pagination and a typing session engine for practising on prose.
//!
//! The binary in `main.rs` wires these into a terminal UI; everything here is
//! usable headless.
pub mod app_dirs;
pub mod config;
pub mod error;
pub mod pagination;
pub mod progress;
pub mod reader;
pub mod runtime;
pub mod samples;
pub mod session;
pub mod text_metrics;
pub mod typing;

pub use error::{Error, Result};
