//! # votalloween-client
//!
//! Client library for the costume contest API, used by front ends running on
//! guests' phones and the admin laptop.
//!
//! - [`ApiClient`]: typed REST calls with retry for idempotent requests
//! - [`Session`]: API access bound to a persistent device identity and a
//!   local cache of the device's uploads and vote state

pub mod api;
pub mod config;
pub mod device;
pub mod error;
pub mod local_cache;
pub mod retry;
pub mod session;

pub use api::{ApiClient, CostumeEdit, CostumeUpload, ImageFile};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use retry::RetryPolicy;
pub use session::Session;
