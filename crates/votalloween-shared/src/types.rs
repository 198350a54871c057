use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// Contest-wide mode controlling which client workflow is active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Upload,
    Voting,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "upload",
            Self::Voting => "voting",
        }
    }
}

impl FromStr for Phase {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload" => Ok(Self::Upload),
            "voting" => Ok(Self::Voting),
            other => Err(ParseError::UnknownPhase(other.to_string())),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the four fixed voting dimensions.
///
/// The declaration order is the order in which a batch is validated and
/// inserted, and the order of keys in every serialized map.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Best,
    Funniest,
    MostElaborate,
    BestGroup,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Best,
        Category::Funniest,
        Category::MostElaborate,
        Category::BestGroup,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Best => "best",
            Self::Funniest => "funniest",
            Self::MostElaborate => "most_elaborate",
            Self::BestGroup => "best_group",
        }
    }
}

impl FromStr for Category {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ParseError::UnknownCategory(s.to_string()))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
