//! Per-device identity.
//!
//! A device is identified by an opaque token generated on first use and kept
//! in a small file. Anyone can forge or reset it; the server trusts it as-is.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rand::Rng;
use tracing::{info, warn};

use crate::error::{ClientError, Result};

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const SUFFIX_LEN: usize = 9;
const DEVICE_FILE: &str = "device_id";

/// Platform data directory for client state.
pub fn default_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("com", "votalloween", "votalloween")
        .ok_or(ClientError::NoDataDir)?;
    Ok(dirs.data_dir().to_path_buf())
}

/// `device_<unix millis>_<9 base36 chars>`
pub fn generate_device_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();
    format!("device_{}_{}", Utc::now().timestamp_millis(), suffix)
}

#[derive(Debug, Clone)]
pub struct DeviceIdentity {
    path: PathBuf,
    id: String,
}

impl DeviceIdentity {
    /// Load the identity stored in `dir`, creating one if none exists.
    pub fn load_or_create(dir: &Path) -> Result<Self> {
        let path = dir.join(DEVICE_FILE);
        match std::fs::read_to_string(&path) {
            Ok(raw) if !raw.trim().is_empty() => {
                return Ok(Self {
                    path,
                    id: raw.trim().to_string(),
                })
            }
            Ok(_) => warn!(path = %path.display(), "Empty device id file, regenerating"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let identity = Self {
            path,
            id: generate_device_id(),
        };
        identity.persist()?;
        info!(device = %identity.id, "Created device identity");
        Ok(identity)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Replace the identity with a fresh one. Past uploads and votes stay
    /// attached to the old id on the server.
    pub fn reset(&mut self) -> Result<&str> {
        let previous = std::mem::replace(&mut self.id, generate_device_id());
        self.persist()?;
        info!(previous = %previous, device = %self.id, "Device identity reset");
        Ok(&self.id)
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, &self.id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_have_expected_shape() {
        let id = generate_device_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "device");
        assert!(parts[1].parse::<i64>().is_ok());
        assert_eq!(parts[2].len(), SUFFIX_LEN);
        assert!(parts[2]
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
        assert_ne!(id, generate_device_id());
    }

    #[test]
    fn identity_is_stable_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("state");
        let first = DeviceIdentity::load_or_create(&nested).unwrap();
        let second = DeviceIdentity::load_or_create(&nested).unwrap();
        assert_eq!(first.id(), second.id());
    }

    #[test]
    fn reset_persists_a_new_id() {
        let dir = tempfile::tempdir().unwrap();
        let mut identity = DeviceIdentity::load_or_create(dir.path()).unwrap();
        let old = identity.id().to_string();
        let new = identity.reset().unwrap().to_string();
        assert_ne!(old, new);
        assert_eq!(DeviceIdentity::load_or_create(dir.path()).unwrap().id(), new);
    }
}
