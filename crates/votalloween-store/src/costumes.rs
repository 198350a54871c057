//! CRUD operations for [`Costume`] records.

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::database::{decode_timestamp, decode_uuid, encode_timestamp, now, Database};
use crate::error::{Result, StoreError};
use crate::models::{normalize_label, Costume, CostumeChanges, NewCostume};

const COSTUME_COLUMNS: &str =
    "id, participant_name, costume_name, image_url, device_id, uploaded_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new costume. Blank names are rejected; a blank costume label
    /// is stored as `NULL`.
    pub fn create_costume(&self, new: &NewCostume) -> Result<Costume> {
        let participant_name = normalize_label(Some(&new.participant_name))
            .ok_or(StoreError::MissingField("participantName"))?;
        let device_id = normalize_label(Some(&new.device_id))
            .ok_or(StoreError::MissingField("deviceId"))?;
        if new.image_url.trim().is_empty() {
            return Err(StoreError::MissingField("image"));
        }

        let costume = Costume {
            id: Uuid::new_v4(),
            participant_name,
            costume_name: normalize_label(new.costume_name.as_deref()),
            image_url: new.image_url.clone(),
            device_id,
            uploaded_at: now(),
        };

        self.conn().execute(
            "INSERT INTO costumes (id, participant_name, costume_name, image_url, device_id, uploaded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                costume.id.to_string(),
                costume.participant_name,
                costume.costume_name,
                costume.image_url,
                costume.device_id,
                encode_timestamp(&costume.uploaded_at),
            ],
        )?;

        tracing::debug!(id = %costume.id, device = %costume.device_id, "costume inserted");
        Ok(costume)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single costume by UUID.
    pub fn get_costume(&self, id: Uuid) -> Result<Costume> {
        find_costume(self.conn(), id)?.ok_or(StoreError::NotFound)
    }

    /// List all costumes, newest first.
    pub fn list_costumes(&self) -> Result<Vec<Costume>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {COSTUME_COLUMNS} FROM costumes
             ORDER BY uploaded_at DESC, rowid DESC"
        ))?;

        let rows = stmt.query_map([], row_to_costume)?;

        let mut costumes = Vec::new();
        for row in rows {
            costumes.push(row?);
        }
        Ok(costumes)
    }

    /// List the costumes uploaded by one device, newest first.
    pub fn list_costumes_by_device(&self, device_id: &str) -> Result<Vec<Costume>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {COSTUME_COLUMNS} FROM costumes
             WHERE device_id = ?1
             ORDER BY uploaded_at DESC, rowid DESC"
        ))?;

        let rows = stmt.query_map(params![device_id], row_to_costume)?;

        let mut costumes = Vec::new();
        for row in rows {
            costumes.push(row?);
        }
        Ok(costumes)
    }

    pub fn count_costumes(&self) -> Result<u64> {
        let n: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM costumes", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Apply `changes` to an existing costume and return the stored result.
    ///
    /// Ownership is not checked here; the owning device is whatever the
    /// client claims.
    pub fn update_costume(&self, id: Uuid, changes: &CostumeChanges) -> Result<Costume> {
        let mut costume = self.get_costume(id)?;

        if let Some(name) = &changes.participant_name {
            costume.participant_name = normalize_label(Some(name))
                .ok_or(StoreError::MissingField("participantName"))?;
        }
        if let Some(label) = &changes.costume_name {
            costume.costume_name = normalize_label(label.as_deref());
        }
        if let Some(url) = &changes.image_url {
            costume.image_url = url.clone();
        }

        if changes.is_empty() {
            return Ok(costume);
        }

        self.conn().execute(
            "UPDATE costumes
             SET participant_name = ?1, costume_name = ?2, image_url = ?3
             WHERE id = ?4",
            params![
                costume.participant_name,
                costume.costume_name,
                costume.image_url,
                id.to_string(),
            ],
        )?;

        Ok(costume)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Delete a costume by UUID. Returns `true` if a row was deleted.
    ///
    /// Votes that reference the costume are left in place.
    pub fn delete_costume(&self, id: Uuid) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM costumes WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Look up a costume on any connection, including an open transaction.
pub(crate) fn find_costume(conn: &Connection, id: Uuid) -> Result<Option<Costume>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COSTUME_COLUMNS} FROM costumes WHERE id = ?1"),
            params![id.to_string()],
            row_to_costume,
        )
        .optional()?)
}

/// Map a `rusqlite::Row` to a [`Costume`].
fn row_to_costume(row: &rusqlite::Row<'_>) -> rusqlite::Result<Costume> {
    let id_str: String = row.get(0)?;
    let participant_name: String = row.get(1)?;
    let costume_name: Option<String> = row.get(2)?;
    let image_url: String = row.get(3)?;
    let device_id: String = row.get(4)?;
    let uploaded_str: String = row.get(5)?;

    Ok(Costume {
        id: decode_uuid(0, &id_str)?,
        participant_name,
        costume_name,
        image_url,
        device_id,
        uploaded_at: decode_timestamp(5, &uploaded_str)?,
    })
}
