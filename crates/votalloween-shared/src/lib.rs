//! # votalloween-shared
//!
//! Types shared by the contest server, its storage layer and the client
//! library: the contest phase, the four voting categories, the persisted
//! entities and every JSON payload exchanged over the REST API.

pub mod constants;
pub mod error;
pub mod media;
pub mod protocol;
pub mod types;

pub use error::ParseError;
pub use types::{Category, Phase};
