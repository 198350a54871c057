//! On-disk cache of what this device has done.
//!
//! The cache is a UI hint only: the server stays authoritative for both the
//! device's uploads and whether it has voted.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use votalloween_shared::protocol::Costume;

use crate::error::Result;

const CACHE_FILE: &str = "local_cache.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheState {
    #[serde(default)]
    pub my_uploads: Vec<Costume>,
    #[serde(default)]
    pub has_voted: bool,
    #[serde(default)]
    pub voted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct LocalCache {
    path: PathBuf,
    state: CacheState,
}

impl LocalCache {
    /// Load the cache from `dir`. A missing or unreadable file yields an
    /// empty cache.
    pub fn load(dir: &Path) -> Self {
        let path = dir.join(CACHE_FILE);
        let state = match std::fs::read(&path) {
            Ok(raw) => serde_json::from_slice(&raw).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Corrupt local cache, starting fresh");
                CacheState::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CacheState::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Unreadable local cache, starting fresh");
                CacheState::default()
            }
        };
        Self { path, state }
    }

    pub fn state(&self) -> &CacheState {
        &self.state
    }

    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(&self.state)?)?;
        Ok(())
    }

    /// Insert or replace an upload, newest first.
    pub fn remember_upload(&mut self, costume: Costume) -> Result<()> {
        self.state.my_uploads.retain(|c| c.id != costume.id);
        self.state.my_uploads.insert(0, costume);
        self.save()
    }

    pub fn forget_upload(&mut self, id: Uuid) -> Result<()> {
        self.state.my_uploads.retain(|c| c.id != id);
        self.save()
    }

    /// Replace the cached uploads with the server's list.
    pub fn replace_uploads(&mut self, costumes: Vec<Costume>) -> Result<()> {
        self.state.my_uploads = costumes;
        self.save()
    }

    pub fn set_voted(&mut self, voted_at: Option<DateTime<Utc>>) -> Result<()> {
        self.state.has_voted = voted_at.is_some();
        self.state.voted_at = voted_at;
        self.save()
    }

    /// Drop everything, e.g. after a device identity reset.
    pub fn clear(&mut self) -> Result<()> {
        self.state = CacheState::default();
        self.save()
    }
}
