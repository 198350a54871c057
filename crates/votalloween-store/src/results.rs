//! Per-category leaderboards, derived on demand from the vote rows.

use std::collections::{BTreeMap, HashMap, HashSet};

use uuid::Uuid;

use votalloween_shared::protocol::{ResultsReport, Standing};
use votalloween_shared::Category;

use crate::database::Database;
use crate::error::Result;
use crate::models::{Costume, Vote};

impl Database {
    /// Tally every vote into per-category standings.
    pub fn results(&self) -> Result<ResultsReport> {
        let votes = self.list_votes()?;
        let costumes: HashMap<Uuid, Costume> = self
            .list_costumes()?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        Ok(tally(&votes, &costumes))
    }
}

/// Count `votes` per (category, costume) and rank each category.
///
/// Standings are sorted by vote count, highest first. The sort is stable and
/// standings are created in the order votes are scanned, so ties rank by the
/// first vote each costume received in that category. Votes whose costume is
/// not in `costumes` still count, with `costume: None`.
pub fn tally(votes: &[Vote], costumes: &HashMap<Uuid, Costume>) -> ResultsReport {
    let mut results: BTreeMap<Category, Vec<Standing>> = Category::ALL
        .into_iter()
        .map(|category| (category, Vec::new()))
        .collect();
    let mut positions: HashMap<(Category, Uuid), usize> = HashMap::new();
    let mut voters: HashSet<&str> = HashSet::new();

    for vote in votes {
        voters.insert(vote.device_id.as_str());

        let standings = results.entry(vote.category).or_default();
        match positions.get(&(vote.category, vote.costume_id)) {
            Some(&idx) => standings[idx].vote_count += 1,
            None => {
                positions.insert((vote.category, vote.costume_id), standings.len());
                standings.push(Standing {
                    costume_id: vote.costume_id,
                    costume: costumes.get(&vote.costume_id).cloned(),
                    vote_count: 1,
                });
            }
        }
    }

    for standings in results.values_mut() {
        standings.sort_by(|a, b| b.vote_count.cmp(&a.vote_count));
    }

    ResultsReport {
        results,
        total_voters: voters.len() as u64,
        total_votes: votes.len() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use votalloween_shared::protocol::VoteBatch;

    use crate::models::NewCostume;

    fn vote(device: &str, costume_id: Uuid, category: Category) -> Vote {
        Vote {
            id: Uuid::new_v4(),
            device_id: device.to_string(),
            costume_id,
            category,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_ledger_lists_every_category() {
        let report = tally(&[], &HashMap::new());
        assert_eq!(report.results.len(), 4);
        assert!(report.results.values().all(Vec::is_empty));
        assert_eq!(report.total_voters, 0);
        assert_eq!(report.total_votes, 0);
    }

    #[test]
    fn counts_and_sorts_descending() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let votes = vec![
            vote("d1", a, Category::Best),
            vote("d2", b, Category::Best),
            vote("d3", b, Category::Best),
            vote("d1", a, Category::Funniest),
        ];

        let report = tally(&votes, &HashMap::new());
        let best = &report.results[&Category::Best];
        assert_eq!(best[0].costume_id, b);
        assert_eq!(best[0].vote_count, 2);
        assert_eq!(best[1].costume_id, a);
        assert_eq!(best[1].vote_count, 1);

        assert_eq!(report.total_voters, 3);
        assert_eq!(report.total_votes, 4);

        let summed: u64 = report
            .results
            .values()
            .flat_map(|s| s.iter().map(|s| s.vote_count))
            .sum();
        assert_eq!(summed, report.total_votes);
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let votes = vec![
            vote("d1", c, Category::Best),
            vote("d2", a, Category::Best),
            vote("d3", b, Category::Best),
            vote("d4", b, Category::Best),
            vote("d5", a, Category::Best),
        ];

        let order: Vec<Uuid> = tally(&votes, &HashMap::new()).results[&Category::Best]
            .iter()
            .map(|s| s.costume_id)
            .collect();
        assert_eq!(order, vec![a, b, c]);
    }

    #[test]
    fn orphaned_votes_count_without_costume() {
        let ghost = Uuid::new_v4();
        let report = tally(&[vote("d1", ghost, Category::BestGroup)], &HashMap::new());
        let standing = &report.results[&Category::BestGroup][0];
        assert_eq!(standing.costume_id, ghost);
        assert!(standing.costume.is_none());
        assert_eq!(standing.vote_count, 1);
    }

    #[test]
    fn database_results_match_rows() {
        let mut db = Database::open_in_memory().unwrap();
        let mut ids = Vec::new();
        for name in ["Ana", "Bob"] {
            ids.push(
                db.create_costume(&NewCostume {
                    participant_name: name.into(),
                    costume_name: None,
                    image_url: format!("/uploads/{name}.png"),
                    device_id: "uploader".into(),
                })
                .unwrap()
                .id,
            );
        }

        for (device, pick) in [("d1", ids[0]), ("d2", ids[1]), ("d3", ids[1])] {
            let choices = Category::ALL.into_iter().map(|c| (c, pick)).collect();
            db.submit_votes(&VoteBatch::new(device, &choices)).unwrap();
        }

        let report = db.results().unwrap();
        assert_eq!(report.total_voters, 3);
        assert_eq!(report.total_votes, 12);
        for category in Category::ALL {
            let standings = &report.results[&category];
            assert_eq!(standings[0].costume_id, ids[1]);
            assert_eq!(standings[0].vote_count, 2);
            assert_eq!(
                standings[0].costume.as_ref().map(|c| c.participant_name.as_str()),
                Some("Bob")
            );
            assert_eq!(standings[1].vote_count, 1);
        }
    }
}
