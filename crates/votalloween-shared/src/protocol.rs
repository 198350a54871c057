use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::types::{Category, Phase};

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// The singleton contest configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContestConfig {
    pub phase: Phase,
    pub voting_start_time: Option<DateTime<Utc>>,
    /// Drives the client countdown only; the server never cuts voting off.
    pub voting_end_time: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// A costume entry uploaded by a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Costume {
    pub id: Uuid,
    pub participant_name: String,
    pub costume_name: Option<String>,
    /// Public path of the stored image, e.g. `/uploads/<uuid>.jpg`
    pub image_url: String,
    pub device_id: String,
    pub uploaded_at: DateTime<Utc>,
}

/// One recorded vote in one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub id: Uuid,
    pub device_id: String,
    pub costume_id: Uuid,
    pub category: Category,
    pub created_at: DateTime<Utc>,
}

/// A vote joined with the costume it points at.
///
/// `costume` is `None` when the costume was deleted after the vote was cast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CastVote {
    #[serde(flatten)]
    pub vote: Vote,
    pub costume: Option<Costume>,
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Partial update of the contest configuration.
///
/// For the time fields: absent leaves the value unchanged, `null` (or an
/// empty string) clears it, a timestamp sets it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,

    #[serde(
        default,
        deserialize_with = "nullable_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub voting_start_time: Option<Option<DateTime<Utc>>>,

    #[serde(
        default,
        deserialize_with = "nullable_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub voting_end_time: Option<Option<DateTime<Utc>>>,
}

fn nullable_timestamp<'de, D>(deserializer: D) -> Result<Option<Option<DateTime<Utc>>>, D::Error>
where
    D: Deserializer<'de>,
{
    // Only called when the field is present, so the outer `Some` is always set.
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(Some(None)),
        Some(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Some(Some(dt.with_timezone(&Utc))))
            .map_err(serde::de::Error::custom),
    }
}

/// A device's single batch of votes, keyed by category name.
///
/// Both fields default so that a missing value is reported as a validation
/// error naming the field rather than as a JSON shape error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteBatch {
    #[serde(default)]
    pub device_id: String,
    #[serde(default)]
    pub votes: BTreeMap<String, String>,
}

impl VoteBatch {
    pub fn new(device_id: impl Into<String>, choices: &BTreeMap<Category, Uuid>) -> Self {
        Self {
            device_id: device_id.into(),
            votes: choices
                .iter()
                .map(|(category, id)| (category.as_str().to_string(), id.to_string()))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteStatus {
    pub has_voted: bool,
    pub votes: BTreeMap<Category, CastVote>,
    pub voted_categories: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VotesSubmitted {
    pub message: String,
    pub votes: Vec<CastVote>,
}

/// One row of a category leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    pub costume_id: Uuid,
    pub costume: Option<Costume>,
    pub vote_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsReport {
    pub results: BTreeMap<Category, Vec<Standing>>,
    pub total_voters: u64,
    pub total_votes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Liveness probe payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub message: String,
    pub version: String,
}

/// Where the server keeps its data and how much of it there is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageReport {
    pub database_path: Option<String>,
    pub uploads_path: String,
    pub image_files: u64,
    pub image_bytes: u64,
    pub max_upload_size: usize,
    pub costumes: u64,
    pub votes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
