//! The singleton contest configuration.
//!
//! The row is created by [`Database::ensure_config`] at startup; every other
//! operation treats a missing row as [`StoreError::NotFound`].

use rusqlite::{params, OptionalExtension};

use votalloween_shared::protocol::ConfigPatch;
use votalloween_shared::Phase;

use crate::database::{conversion_error, decode_timestamp, encode_timestamp, now, Database};
use crate::error::{Result, StoreError};
use crate::models::ContestConfig;

const CONFIG_ID: i64 = 1;

impl Database {
    /// Fetch the configuration row.
    pub fn get_config(&self) -> Result<ContestConfig> {
        self.find_config()?.ok_or(StoreError::NotFound)
    }

    /// Return the configuration, inserting the default (`upload` phase, no
    /// voting window) if it has never been initialized.
    pub fn ensure_config(&self) -> Result<ContestConfig> {
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO config (id, phase, updated_at) VALUES (?1, ?2, ?3)",
            params![
                CONFIG_ID,
                Phase::default().as_str(),
                encode_timestamp(&now())
            ],
        )?;
        if inserted > 0 {
            tracing::info!("config initialized");
        }
        self.get_config()
    }

    /// Apply a partial update. Fields absent from `patch` keep their value.
    ///
    /// No ordering rule is enforced: the phase may go back to `upload` and the
    /// end time may precede the start time.
    pub fn update_config(&self, patch: &ConfigPatch) -> Result<ContestConfig> {
        let mut config = self.get_config()?;

        if let Some(phase) = patch.phase {
            config.phase = phase;
        }
        if let Some(start) = patch.voting_start_time {
            config.voting_start_time = start;
        }
        if let Some(end) = patch.voting_end_time {
            config.voting_end_time = end;
        }
        config.updated_at = now();

        self.conn().execute(
            "UPDATE config
             SET phase = ?1, voting_start_time = ?2, voting_end_time = ?3, updated_at = ?4
             WHERE id = ?5",
            params![
                config.phase.as_str(),
                config.voting_start_time.as_ref().map(encode_timestamp),
                config.voting_end_time.as_ref().map(encode_timestamp),
                encode_timestamp(&config.updated_at),
                CONFIG_ID,
            ],
        )?;

        let config = self.get_config()?;
        tracing::info!(
            phase = %config.phase,
            voting_end_time = ?config.voting_end_time,
            "config updated"
        );

        Ok(config)
    }

    fn find_config(&self) -> Result<Option<ContestConfig>> {
        Ok(self
            .conn()
            .query_row(
                "SELECT phase, voting_start_time, voting_end_time, updated_at
                 FROM config WHERE id = ?1",
                params![CONFIG_ID],
                row_to_config,
            )
            .optional()?)
    }
}

fn row_to_config(row: &rusqlite::Row<'_>) -> rusqlite::Result<ContestConfig> {
    let phase_str: String = row.get(0)?;
    let start_str: Option<String> = row.get(1)?;
    let end_str: Option<String> = row.get(2)?;
    let updated_str: String = row.get(3)?;

    let phase: Phase = phase_str.parse().map_err(|e| conversion_error(0, e))?;
    let voting_start_time = start_str
        .map(|s| decode_timestamp(1, &s))
        .transpose()?;
    let voting_end_time = end_str.map(|s| decode_timestamp(2, &s)).transpose()?;
    let updated_at = decode_timestamp(3, &updated_str)?;

    Ok(ContestConfig {
        phase,
        voting_start_time,
        voting_end_time,
        updated_at,
    })
}
