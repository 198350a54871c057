//! Domain records handled by the store.
//!
//! The persisted entities are the wire types from `votalloween-shared`, so
//! they can be handed straight to the HTTP layer. The input structs below are
//! store-specific.

pub use votalloween_shared::protocol::{CastVote, ContestConfig, Costume, Vote};

/// Input for [`Database::create_costume`](crate::Database::create_costume).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCostume {
    pub participant_name: String,
    pub costume_name: Option<String>,
    pub image_url: String,
    pub device_id: String,
}

/// Input for [`Database::update_costume`](crate::Database::update_costume).
///
/// `None` leaves a field unchanged. For `costume_name`, `Some(None)` clears
/// the label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CostumeChanges {
    pub participant_name: Option<String>,
    pub costume_name: Option<Option<String>>,
    pub image_url: Option<String>,
}

impl CostumeChanges {
    pub fn is_empty(&self) -> bool {
        self.participant_name.is_none() && self.costume_name.is_none() && self.image_url.is_none()
    }
}

/// Trim a free-text label, mapping blank input to `None`.
pub fn normalize_label(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
