//! Request snapshot debugger.
//!
//! Captures an HTTP request together with its environment, the recent error
//! log and caller-supplied memory into a JSON file, then lets you list,
//! tag, replay, export and turn those snapshots into regression tests.

pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod store;
pub mod cache;
pub mod logs;
pub mod builder;
pub mod replay;
pub mod testgen;
pub mod http;
pub mod state;
pub mod handlers;
pub mod web;

pub use config::Config;
pub use error::DebuggerError;
pub use model::Snapshot;
pub use state::AppState;
