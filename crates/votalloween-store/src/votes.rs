//! The vote ledger.
//!
//! Each device moves from "not voted" to "voted" exactly once, by submitting
//! one costume per category in a single batch. The batch is written inside an
//! `IMMEDIATE` transaction so the "has this device voted" check and the
//! inserts happen under SQLite's write lock, and the `UNIQUE (device_id,
//! category)` constraint backs the check at the storage layer.

use std::collections::BTreeMap;

use rusqlite::{params, ErrorCode, TransactionBehavior};
use uuid::Uuid;

use votalloween_shared::constants::CATEGORY_COUNT;
use votalloween_shared::protocol::{VoteBatch, VoteStatus};
use votalloween_shared::Category;

use crate::costumes::find_costume;
use crate::database::{
    conversion_error, decode_timestamp, decode_uuid, encode_timestamp, now, Database,
};
use crate::error::{Result, StoreError};
use crate::models::{CastVote, Vote};

const VOTE_COLUMNS: &str = "id, device_id, costume_id, category, created_at";

impl Database {
    /// Report what a device has voted so far.
    ///
    /// `has_voted` is only true when every category has a row; a partial set
    /// (which a correct batch never leaves behind) is reported as not voted.
    pub fn vote_status(&self, device_id: &str) -> Result<VoteStatus> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {VOTE_COLUMNS} FROM votes WHERE device_id = ?1 ORDER BY rowid"
        ))?;
        let rows = stmt.query_map(params![device_id], row_to_vote)?;

        let mut votes = BTreeMap::new();
        for row in rows {
            let vote = row?;
            let costume = find_costume(self.conn(), vote.costume_id)?;
            votes.insert(vote.category, CastVote { vote, costume });
        }

        let voted_categories = votes.len();
        Ok(VoteStatus {
            has_voted: voted_categories == CATEGORY_COUNT,
            votes,
            voted_categories,
        })
    }

    /// Validate and record a device's batch of votes.
    ///
    /// Fails with [`StoreError::MissingCategory`] naming the first absent
    /// category, [`StoreError::AlreadyVoted`] if the device has any vote at
    /// all, or [`StoreError::UnknownCostume`] if a choice does not exist.
    /// Either all four rows are committed or none are.
    pub fn submit_votes(&mut self, batch: &VoteBatch) -> Result<Vec<CastVote>> {
        let device_id = batch.device_id.trim();
        if device_id.is_empty() {
            return Err(StoreError::MissingField("deviceId"));
        }

        let mut choices = Vec::with_capacity(CATEGORY_COUNT);
        for category in Category::ALL {
            let raw = batch
                .votes
                .get(category.as_str())
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .ok_or(StoreError::MissingCategory(category))?;
            let costume_id = Uuid::parse_str(raw).map_err(|_| StoreError::InvalidCostumeId {
                category,
                value: raw.to_string(),
            })?;
            choices.push((category, costume_id));
        }

        self.record_votes(device_id, &choices)
    }

    /// Insert one row per `(category, costume)` choice for `device_id` in a
    /// single transaction.
    pub(crate) fn record_votes(
        &mut self,
        device_id: &str,
        choices: &[(Category, Uuid)],
    ) -> Result<Vec<CastVote>> {
        let tx = self
            .conn_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing: i64 = tx.query_row(
            "SELECT COUNT(*) FROM votes WHERE device_id = ?1",
            params![device_id],
            |row| row.get(0),
        )?;
        if existing > 0 {
            return Err(StoreError::AlreadyVoted);
        }

        let created_at = now();
        let mut cast = Vec::with_capacity(choices.len());

        for &(category, costume_id) in choices {
            let costume = find_costume(&tx, costume_id)?
                .ok_or(StoreError::UnknownCostume { category, costume_id })?;

            let vote = Vote {
                id: Uuid::new_v4(),
                device_id: device_id.to_string(),
                costume_id,
                category,
                created_at,
            };

            tx.execute(
                "INSERT INTO votes (id, device_id, costume_id, category, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    vote.id.to_string(),
                    vote.device_id,
                    vote.costume_id.to_string(),
                    vote.category.as_str(),
                    encode_timestamp(&vote.created_at),
                ],
            )
            .map_err(map_duplicate_vote)?;

            cast.push(CastVote {
                vote,
                costume: Some(costume),
            });
        }

        // Dropping `tx` on any early return above rolls the batch back.
        tx.commit()?;

        tracing::info!(device = %device_id, count = cast.len(), "votes recorded");
        Ok(cast)
    }

    /// Every vote row in insertion order.
    pub fn list_votes(&self) -> Result<Vec<Vote>> {
        let mut stmt = self
            .conn()
            .prepare(&format!("SELECT {VOTE_COLUMNS} FROM votes ORDER BY rowid"))?;
        let rows = stmt.query_map([], row_to_vote)?;

        let mut votes = Vec::new();
        for row in rows {
            votes.push(row?);
        }
        Ok(votes)
    }

    pub fn count_votes(&self) -> Result<u64> {
        let n: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM votes", [], |row| row.get(0))?;
        Ok(n as u64)
    }
}

/// A unique-constraint hit means another submission for the same device got
/// in first.
fn map_duplicate_vote(err: rusqlite::Error) -> StoreError {
    match err {
        rusqlite::Error::SqliteFailure(ref e, _) if e.code == ErrorCode::ConstraintViolation => {
            StoreError::AlreadyVoted
        }
        other => StoreError::Sqlite(other),
    }
}

fn row_to_vote(row: &rusqlite::Row<'_>) -> rusqlite::Result<Vote> {
    let id_str: String = row.get(0)?;
    let device_id: String = row.get(1)?;
    let costume_str: String = row.get(2)?;
    let category_str: String = row.get(3)?;
    let created_str: String = row.get(4)?;

    let category: Category = category_str
        .parse()
        .map_err(|e| conversion_error(3, e))?;

    Ok(Vote {
        id: decode_uuid(0, &id_str)?,
        device_id,
        costume_id: decode_uuid(2, &costume_str)?,
        category,
        created_at: decode_timestamp(4, &created_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewCostume;

    fn seed_costume(db: &Database, name: &str) -> Uuid {
        db.create_costume(&NewCostume {
            participant_name: name.to_string(),
            costume_name: None,
            image_url: format!("/uploads/{name}.jpg"),
            device_id: "uploader".to_string(),
        })
        .unwrap()
        .id
    }

    fn batch_for(device: &str, id: Uuid) -> VoteBatch {
        let choices = Category::ALL.into_iter().map(|c| (c, id)).collect();
        VoteBatch::new(device, &choices)
    }

    fn rows_for(db: &Database, device: &str) -> i64 {
        db.conn()
            .query_row(
                "SELECT COUNT(*) FROM votes WHERE device_id = ?1",
                params![device],
                |row| row.get(0),
            )
            .unwrap()
    }

    #[test]
    fn fresh_device_has_not_voted() {
        let db = Database::open_in_memory().unwrap();
        let status = db.vote_status("device_a").unwrap();
        assert!(!status.has_voted);
        assert_eq!(status.voted_categories, 0);
        assert!(status.votes.is_empty());
    }

    #[test]
    fn full_batch_marks_device_as_voted() {
        let mut db = Database::open_in_memory().unwrap();
        let c1 = seed_costume(&db, "c1");

        let cast = db.submit_votes(&batch_for("device_a", c1)).unwrap();
        assert_eq!(cast.len(), CATEGORY_COUNT);
        assert!(cast.iter().all(|v| v.costume.as_ref().map(|c| c.id) == Some(c1)));

        let status = db.vote_status("device_a").unwrap();
        assert!(status.has_voted);
        assert_eq!(status.voted_categories, 4);
        assert_eq!(status.votes[&Category::BestGroup].vote.costume_id, c1);
    }

    #[test]
    fn missing_category_named_in_order() {
        let mut db = Database::open_in_memory().unwrap();
        let c1 = seed_costume(&db, "c1");

        let mut batch = batch_for("device_a", c1);
        batch.votes.remove("funniest");
        batch.votes.remove("best_group");

        let err = db.submit_votes(&batch).unwrap_err();
        assert!(matches!(err, StoreError::MissingCategory(Category::Funniest)));
        assert_eq!(rows_for(&db, "device_a"), 0);
    }

    #[test]
    fn extra_keys_are_ignored() {
        let mut db = Database::open_in_memory().unwrap();
        let c1 = seed_costume(&db, "c1");

        let mut batch = batch_for("device_a", c1);
        batch.votes.insert("scariest".into(), c1.to_string());
        assert_eq!(db.submit_votes(&batch).unwrap().len(), 4);
    }

    #[test]
    fn malformed_costume_id_rejected() {
        let mut db = Database::open_in_memory().unwrap();
        let c1 = seed_costume(&db, "c1");

        let mut batch = batch_for("device_a", c1);
        batch.votes.insert("best".into(), "not-a-uuid".into());
        assert!(matches!(
            db.submit_votes(&batch),
            Err(StoreError::InvalidCostumeId {
                category: Category::Best,
                ..
            })
        ));
    }

    #[test]
    fn second_batch_conflicts() {
        let mut db = Database::open_in_memory().unwrap();
        let c1 = seed_costume(&db, "c1");
        let c2 = seed_costume(&db, "c2");

        db.submit_votes(&batch_for("device_a", c1)).unwrap();
        let err = db.submit_votes(&batch_for("device_a", c2)).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyVoted));
        assert_eq!(rows_for(&db, "device_a"), 4);
    }

    #[test]
    fn any_existing_row_blocks_the_batch() {
        let mut db = Database::open_in_memory().unwrap();
        let c1 = seed_costume(&db, "c1");

        // A single stray row, with no category overlap check involved.
        db.record_votes("device_a", &[(Category::BestGroup, c1)])
            .unwrap();

        let status = db.vote_status("device_a").unwrap();
        assert!(!status.has_voted);
        assert_eq!(status.voted_categories, 1);

        let err = db.submit_votes(&batch_for("device_a", c1)).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyVoted));
    }

    #[test]
    fn failure_mid_batch_leaves_no_rows() {
        let mut db = Database::open_in_memory().unwrap();
        let c1 = seed_costume(&db, "c1");
        let ghost = Uuid::new_v4();

        // The first three categories insert before the fourth fails.
        let mut batch = batch_for("device_a", c1);
        batch.votes.insert("best_group".into(), ghost.to_string());

        let err = db.submit_votes(&batch).unwrap_err();
        assert!(matches!(
            err,
            StoreError::UnknownCostume {
                category: Category::BestGroup,
                ..
            }
        ));
        assert_eq!(rows_for(&db, "device_a"), 0);

        // The device can still vote afterwards.
        db.submit_votes(&batch_for("device_a", c1)).unwrap();
        assert!(db.vote_status("device_a").unwrap().has_voted);
    }

    #[test]
    fn unique_constraint_maps_to_already_voted() {
        let db = Database::open_in_memory().unwrap();
        let insert = |id: &str| {
            db.conn().execute(
                "INSERT INTO votes (id, device_id, costume_id, category, created_at)
                 VALUES (?1, 'd', 'c', 'best', '2025-10-31T20:00:00.000000Z')",
                params![id],
            )
        };
        insert("v1").unwrap();
        let err = map_duplicate_vote(insert("v2").unwrap_err());
        assert!(matches!(err, StoreError::AlreadyVoted));
    }

    #[test]
    fn concurrent_batches_for_one_device_record_once() {
        use std::sync::{Arc, Barrier};

        const WRITERS: usize = 8;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("votes.db");
        let c1 = seed_costume(&Database::open_at(&path).unwrap(), "c1");

        let handles: Vec<Database> = (0..WRITERS)
            .map(|_| Database::open_at(&path).unwrap())
            .collect();
        let barrier = Arc::new(Barrier::new(WRITERS));

        let threads: Vec<_> = handles
            .into_iter()
            .map(|mut db| {
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    db.submit_votes(&batch_for("device_a", c1))
                })
            })
            .collect();
        let results: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, StoreError::AlreadyVoted)));

        let db = Database::open_at(&path).unwrap();
        assert_eq!(rows_for(&db, "device_a"), 4);
        assert!(db.vote_status("device_a").unwrap().has_voted);
    }

    #[test]
    fn votes_survive_costume_deletion() {
        let mut db = Database::open_in_memory().unwrap();
        let c1 = seed_costume(&db, "c1");
        db.submit_votes(&batch_for("device_a", c1)).unwrap();

        assert!(db.delete_costume(c1).unwrap());

        let status = db.vote_status("device_a").unwrap();
        assert!(status.has_voted);
        assert!(status.votes.values().all(|v| v.costume.is_none()));
        assert_eq!(db.count_votes().unwrap(), 4);
    }
}
