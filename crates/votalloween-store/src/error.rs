use thiserror::Error;
use uuid::Uuid;

use votalloween_shared::{Category, ParseError};

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A query expected exactly one row but found none.
    #[error("Record not found")]
    NotFound,

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// A required input field was absent or blank.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A vote batch did not cover every category.
    #[error("Missing vote for category: {0}")]
    MissingCategory(Category),

    #[error("Invalid costume id for category {category}: {value}")]
    InvalidCostumeId { category: Category, value: String },

    #[error("Costume {costume_id} voted for in category {category} does not exist")]
    UnknownCostume { category: Category, costume_id: Uuid },

    /// The device already has at least one recorded vote.
    #[error("This device has already voted")]
    AlreadyVoted,

    /// A stored enum value could not be decoded.
    #[error("Corrupt enum value: {0}")]
    Parse(#[from] ParseError),
}

impl StoreError {
    /// Whether the error was caused by the caller's input rather than by the
    /// storage engine.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MissingField(_)
                | Self::MissingCategory(_)
                | Self::InvalidCostumeId { .. }
                | Self::UnknownCostume { .. }
        )
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
