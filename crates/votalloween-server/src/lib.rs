//! # votalloween-server
//!
//! HTTP backend for the costume contest: contest phase, costume uploads,
//! one-shot device ballots, live results and a ZIP export of every photo.

pub mod api;
pub mod archive;
pub mod config;
pub mod error;
pub mod image_store;

pub use api::{build_router, serve, AppState};
pub use config::ServerConfig;
pub use error::ServerError;
