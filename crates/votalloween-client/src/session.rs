//! A device's view of the contest: API access plus its identity and cache.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use votalloween_shared::protocol::{Costume, VoteBatch, VoteStatus, VotesSubmitted};
use votalloween_shared::Category;

use crate::api::{ApiClient, CostumeEdit, CostumeUpload, ImageFile};
use crate::config::ClientConfig;
use crate::device::{default_data_dir, DeviceIdentity};
use crate::error::Result;
use crate::local_cache::LocalCache;

pub struct Session {
    api: ApiClient,
    device: DeviceIdentity,
    cache: LocalCache,
}

impl Session {
    /// Open a session whose identity and cache live in `data_dir`.
    pub fn open(config: ClientConfig, data_dir: &Path) -> Result<Self> {
        let api = ApiClient::new(config)?;
        let device = DeviceIdentity::load_or_create(data_dir)?;
        let cache = LocalCache::load(data_dir);
        info!(device = %device.id(), server = %api.base_url(), "Session opened");
        Ok(Self { api, device, cache })
    }

    /// Open a session in the platform data directory.
    pub fn open_default(config: ClientConfig) -> Result<Self> {
        Self::open(config, &default_data_dir()?)
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn device_id(&self) -> &str {
        self.device.id()
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    pub async fn upload(
        &mut self,
        participant_name: &str,
        costume_name: Option<&str>,
        image: ImageFile,
    ) -> Result<Costume> {
        let costume = self
            .api
            .upload_costume(&CostumeUpload {
                participant_name: participant_name.to_string(),
                costume_name: costume_name.map(str::to_string),
                device_id: self.device.id().to_string(),
                image,
            })
            .await?;
        self.cache.remember_upload(costume.clone())?;
        Ok(costume)
    }

    pub async fn edit_upload(&mut self, id: Uuid, edit: &CostumeEdit) -> Result<Costume> {
        let costume = self.api.update_costume(id, edit).await?;
        self.cache.remember_upload(costume.clone())?;
        Ok(costume)
    }

    pub async fn delete_upload(&mut self, id: Uuid) -> Result<()> {
        self.api.delete_costume(id).await?;
        self.cache.forget_upload(id)
    }

    /// Reload this device's uploads from the server into the cache.
    pub async fn refresh_uploads(&mut self) -> Result<Vec<Costume>> {
        let costumes = self.api.device_costumes(self.device.id()).await?;
        self.cache.replace_uploads(costumes.clone())?;
        Ok(costumes)
    }

    /// Ask the server whether this device has voted and sync the cache hint.
    pub async fn refresh_vote_status(&mut self) -> Result<VoteStatus> {
        let status = self.api.vote_status(self.device.id()).await?;
        let voted_at = status
            .has_voted
            .then(|| status.votes.values().map(|v| v.vote.created_at).min())
            .flatten();
        self.cache.set_voted(voted_at)?;
        Ok(status)
    }

    /// Cast this device's ballot, one costume per category.
    pub async fn vote(&mut self, choices: &BTreeMap<Category, Uuid>) -> Result<VotesSubmitted> {
        let batch = VoteBatch::new(self.device.id(), choices);
        let submitted = self.api.submit_votes(&batch).await?;
        let voted_at = submitted
            .votes
            .iter()
            .map(|v| v.vote.created_at)
            .min()
            .unwrap_or_else(Utc::now);
        self.cache.set_voted(Some(voted_at))?;
        Ok(submitted)
    }

    /// Start over as a new device. The old id's uploads and votes remain on
    /// the server.
    pub fn reset_device(&mut self) -> Result<()> {
        self.device.reset()?;
        self.cache.clear()
    }
}
