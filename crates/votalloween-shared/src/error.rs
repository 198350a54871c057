use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Unknown phase: {0}")]
    UnknownPhase(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),
}
