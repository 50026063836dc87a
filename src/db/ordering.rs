//! Ordered membership of matches in flows.
//!
//! Every live occurrence of a flow holds an `order_index`. Once normalized the
//! indices are exactly `0..N-1`. Flows written before explicit ordering have
//! every index at 0 and are renumbered in creation order on first use.

use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;

use crate::error::{AppError, Result};
use crate::models::{FlowMatch, FlowStep, Match, MatchNote};

use super::store::{self, aliased_columns, datetime_at, Record, SoftDelete};
use super::Repository;

impl Record for FlowMatch {
    const TABLE: &'static str = "flow_matches";
    const COLUMNS: &'static [&'static str] = &[
        "flow_id",
        "match_id",
        "order_index",
        "archived",
        "created_at",
        "updated_at",
    ];

    fn from_row_at(row: &Row, offset: usize) -> rusqlite::Result<Self> {
        Ok(FlowMatch {
            id: row.get(offset)?,
            flow_id: row.get(offset + 1)?,
            match_id: row.get(offset + 2)?,
            order_index: row.get(offset + 3)?,
            archived: row.get(offset + 4)?,
            created_at: datetime_at(row, offset + 5)?,
            updated_at: datetime_at(row, offset + 6)?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.flow_id),
            Value::Integer(self.match_id),
            Value::Integer(self.order_index),
            Value::from(self.archived),
            Value::Text(store::timestamp(self.created_at)),
            Value::Text(store::timestamp(self.updated_at)),
        ]
    }
}

impl SoftDelete for FlowMatch {}

#[derive(Debug, Error)]
pub enum OrderingError {
    #[error("position {position} is out of range for a flow with {len} steps")]
    PositionOutOfRange { position: usize, len: usize },
}

/// Shared by display and renumbering so both agree on what "position" means.
const DISPLAY_ORDER: &str = "fm.order_index ASC, fm.created_at ASC, fm.id ASC";

/// Live occurrences of a flow, in display order.
fn live_occurrences(conn: &Connection, flow_id: i64) -> rusqlite::Result<Vec<FlowMatch>> {
    let mut stmt = conn.prepare(&format!(
        r#"SELECT {}
           FROM flow_matches fm
           JOIN matches m ON m.id = fm.match_id
           WHERE fm.flow_id = ?1 AND fm.archived = 0 AND m.archived = 0
           ORDER BY {DISPLAY_ORDER}"#,
        aliased_columns::<FlowMatch>("fm")
    ))?;
    let rows = stmt
        .query_map(params![flow_id], FlowMatch::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn set_order_index(conn: &Connection, id: i64, order_index: i64) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE flow_matches SET order_index = ?1, updated_at = ?2 WHERE id = ?3",
        params![order_index, store::now(), id],
    )?;
    Ok(())
}

/// Every index still at the uninitialized sentinel.
pub fn needs_normalization(rows: &[FlowMatch]) -> bool {
    rows.len() > 1 && rows.iter().all(|fm| fm.order_index == 0)
}

fn is_dense(rows: &[FlowMatch]) -> bool {
    rows.iter()
        .enumerate()
        .all(|(position, fm)| fm.order_index == position as i64)
}

/// Rewrites the flow's indices to `0..N-1` following display order. Returns
/// how many rows changed; running it twice changes nothing the second time.
pub(super) fn renumber(conn: &Connection, flow_id: i64) -> rusqlite::Result<usize> {
    let rows = live_occurrences(conn, flow_id)?;
    let mut changed = 0;
    for (position, fm) in rows.iter().enumerate() {
        if fm.order_index != position as i64 {
            set_order_index(conn, fm.id, position as i64)?;
            changed += 1;
        }
    }
    Ok(changed)
}

/// Appends at the end: the new index is the count of live occurrences.
pub(super) fn add_match_to_flow(conn: &Connection, flow_id: i64, match_id: i64) -> rusqlite::Result<i64> {
    let rows = live_occurrences(conn, flow_id)?;
    if needs_normalization(&rows) {
        renumber(conn, flow_id)?;
    }
    let order_index = rows.len() as i64;
    let id = store::insert(conn, &FlowMatch::new(flow_id, match_id, order_index))?;
    tracing::debug!(flow_id, match_id, order_index, "appended match to flow");
    Ok(id)
}

fn reorder_failed(flow_id: i64, err: tokio_rusqlite::Error) -> AppError {
    tracing::warn!(flow_id, error = %err, "reorder rolled back");
    AppError::Reorder {
        flow_id,
        reason: err.to_string(),
    }
}

impl Repository {
    // Flow membership operations

    pub async fn add_match_to_flow(&self, flow_id: i64, match_id: i64) -> Result<i64> {
        let id = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let id = add_match_to_flow(&tx, flow_id, match_id)?;
                tx.commit()?;
                Ok(id)
            })
            .await?;
        Ok(id)
    }

    pub async fn get_flow_match(&self, id: i64) -> Result<Option<FlowMatch>> {
        self.get::<FlowMatch>(id).await
    }

    /// The flow's live steps in display order, each with its note if any.
    /// Unknown and non-positive flow ids yield an empty list.
    pub async fn get_flow_matches(&self, flow_id: i64) -> Result<Vec<FlowStep>> {
        if flow_id <= 0 {
            return Ok(Vec::new());
        }

        let steps = self
            .conn
            .call(move |conn| {
                let occurrence_offset = Match::COLUMNS.len() + 1;
                let note_offset = occurrence_offset + FlowMatch::COLUMNS.len() + 1;

                let mut stmt = conn.prepare(&format!(
                    r#"SELECT {}, {}, {}
                       FROM flow_matches fm
                       JOIN matches m ON m.id = fm.match_id
                       LEFT JOIN match_notes n ON n.id = (
                           SELECT MAX(id) FROM match_notes
                           WHERE flow_match_id = fm.id AND archived = 0
                       )
                       WHERE fm.flow_id = ?1 AND fm.archived = 0 AND m.archived = 0
                       ORDER BY {DISPLAY_ORDER}"#,
                    aliased_columns::<Match>("m"),
                    aliased_columns::<FlowMatch>("fm"),
                    aliased_columns::<MatchNote>("n"),
                ))?;

                let steps = stmt
                    .query_map(params![flow_id], |row| {
                        let note = match row.get::<_, Option<i64>>(note_offset)? {
                            Some(_) => Some(MatchNote::from_row_at(row, note_offset)?),
                            None => None,
                        };
                        Ok(FlowStep {
                            matched: Match::from_row_at(row, 0)?,
                            occurrence: FlowMatch::from_row_at(row, occurrence_offset)?,
                            note,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(steps)
            })
            .await?;
        Ok(steps)
    }

    /// Steps for display, renumbering a legacy all-zero flow first.
    pub async fn load_flow_steps(&self, flow_id: i64) -> Result<Vec<FlowStep>> {
        let steps = self.get_flow_matches(flow_id).await?;
        let occurrences: Vec<FlowMatch> = steps.iter().map(|s| s.occurrence.clone()).collect();
        if !needs_normalization(&occurrences) {
            return Ok(steps);
        }

        self.normalize(flow_id).await?;
        self.get_flow_matches(flow_id).await
    }

    /// Assigns `0..N-1` in current order as one transaction. On failure
    /// nothing is written and the error is recoverable.
    pub async fn normalize(&self, flow_id: i64) -> Result<usize> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let changed = renumber(&tx, flow_id)?;
                tx.commit()?;
                Ok(changed)
            })
            .await
            .map(|changed| {
                tracing::debug!(flow_id, changed, "normalized flow order");
                changed
            })
            .map_err(|e| reorder_failed(flow_id, e))
    }

    /// Exchanges the order of the steps at positions `a` and `b`.
    ///
    /// Read, swap and write happen in one transaction. On error nothing
    /// persists; callers must reload the order from storage.
    pub async fn swap(&self, flow_id: i64, a: usize, b: usize) -> Result<()> {
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let mut rows = live_occurrences(&tx, flow_id)?;
                if let Some(&position) = [a, b].iter().find(|&&p| p >= rows.len()) {
                    return Err(tokio_rusqlite::Error::Other(Box::new(
                        OrderingError::PositionOutOfRange {
                            position,
                            len: rows.len(),
                        },
                    )));
                }
                if a == b {
                    return Ok(());
                }

                if !is_dense(&rows) {
                    renumber(&tx, flow_id)?;
                    rows = live_occurrences(&tx, flow_id)?;
                }

                let (first, second) = (&rows[a], &rows[b]);
                set_order_index(&tx, first.id, second.order_index)?;
                set_order_index(&tx, second.id, first.order_index)?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(|e| reorder_failed(flow_id, e))
    }

    /// Removes one live occurrence of `match_id` from the flow, the one with
    /// the highest index, so repeats go last-added-first. The occurrence is
    /// archived and the flow renumbered. Returns false when there is none.
    pub async fn remove_occurrence(&self, flow_id: i64, match_id: i64) -> Result<bool> {
        let removed = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let id: Option<i64> = tx
                    .query_row(
                        r#"SELECT id FROM flow_matches
                           WHERE flow_id = ?1 AND match_id = ?2 AND archived = 0
                           ORDER BY order_index DESC, id DESC
                           LIMIT 1"#,
                        params![flow_id, match_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                let Some(id) = id else {
                    return Ok(false);
                };

                store::archive::<FlowMatch>(&tx, id)?;
                renumber(&tx, flow_id)?;
                tx.commit()?;
                tracing::debug!(flow_id, match_id, flow_match_id = id, "removed occurrence");
                Ok(true)
            })
            .await?;
        Ok(removed)
    }

    /// Archives one occurrence by id and closes the gap it leaves. Returns
    /// false when the occurrence is missing or already archived.
    pub async fn archive_flow_match(&self, id: i64) -> Result<bool> {
        let archived = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let Some(occurrence) = store::get::<FlowMatch>(&tx, id)? else {
                    return Ok(false);
                };
                if occurrence.archived {
                    return Ok(false);
                }
                store::archive::<FlowMatch>(&tx, id)?;
                renumber(&tx, occurrence.flow_id)?;
                tx.commit()?;
                Ok(true)
            })
            .await?;
        Ok(archived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewMatch;

    async fn flow_with(repo: &Repository, lines: &[&str]) -> (i64, Vec<i64>) {
        let flow_id = repo.new_flow("F", None).await.unwrap();
        let mut match_ids = Vec::new();
        for line in lines {
            let match_id = repo
                .save_match(NewMatch::new(*line, format!("/src/{line}.rs"), Some(1)))
                .await
                .unwrap();
            repo.add_match_to_flow(flow_id, match_id).await.unwrap();
            match_ids.push(match_id);
        }
        (flow_id, match_ids)
    }

    fn lines(steps: &[FlowStep]) -> Vec<&str> {
        steps.iter().map(|s| s.matched.line.as_str()).collect()
    }

    fn indices(steps: &[FlowStep]) -> Vec<i64> {
        steps.iter().map(|s| s.occurrence.order_index).collect()
    }

    fn assignments(steps: &[FlowStep]) -> Vec<(i64, i64)> {
        steps
            .iter()
            .map(|s| (s.occurrence.id, s.occurrence.order_index))
            .collect()
    }

    /// Rewinds every index of a flow to 0, as older databases stored them.
    async fn zero_indices(repo: &Repository, flow_id: i64) {
        repo.conn
            .call(move |conn| {
                conn.execute(
                    "UPDATE flow_matches SET order_index = 0 WHERE flow_id = ?1",
                    params![flow_id],
                )?;
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn add_appends_at_the_end() {
        let repo = Repository::open_in_memory().await.unwrap();
        let (flow_id, _) = flow_with(&repo, &["a", "b", "c"]).await;

        let steps = repo.get_flow_matches(flow_id).await.unwrap();
        assert_eq!(lines(&steps), vec!["a", "b", "c"]);
        assert_eq!(indices(&steps), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn unknown_or_falsy_flow_ids_return_nothing() {
        let repo = Repository::open_in_memory().await.unwrap();
        assert!(repo.get_flow_matches(999).await.unwrap().is_empty());
        assert!(repo.get_flow_matches(0).await.unwrap().is_empty());
        assert!(repo.get_flow_matches(-1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn same_match_can_occur_twice() {
        let repo = Repository::open_in_memory().await.unwrap();
        let (flow_id, ids) = flow_with(&repo, &["a"]).await;
        repo.add_match_to_flow(flow_id, ids[0]).await.unwrap();

        let steps = repo.get_flow_matches(flow_id).await.unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].matched.id, steps[1].matched.id);
        assert_ne!(steps[0].occurrence.id, steps[1].occurrence.id);
    }

    #[tokio::test]
    async fn swap_exchanges_positions_and_is_an_involution() {
        let repo = Repository::open_in_memory().await.unwrap();
        let (flow_id, _) = flow_with(&repo, &["a", "b", "c"]).await;
        let before = assignments(&repo.get_flow_matches(flow_id).await.unwrap());

        repo.swap(flow_id, 0, 2).await.unwrap();
        let swapped = repo.get_flow_matches(flow_id).await.unwrap();
        assert_eq!(lines(&swapped), vec!["c", "b", "a"]);
        assert_eq!(indices(&swapped), vec![0, 1, 2]);

        repo.swap(flow_id, 0, 2).await.unwrap();
        let restored = assignments(&repo.get_flow_matches(flow_id).await.unwrap());
        assert_eq!(restored, before);
    }

    #[tokio::test]
    async fn swap_out_of_range_is_recoverable_and_writes_nothing() {
        let repo = Repository::open_in_memory().await.unwrap();
        let (flow_id, _) = flow_with(&repo, &["a", "b"]).await;

        let err = repo.swap(flow_id, 1, 2).await.unwrap_err();
        assert!(err.is_recoverable());
        assert!(matches!(err, AppError::Reorder { flow_id: f, .. } if f == flow_id));

        let steps = repo.get_flow_matches(flow_id).await.unwrap();
        assert_eq!(lines(&steps), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn failed_swap_rolls_back_the_first_write() {
        let repo = Repository::open_in_memory().await.unwrap();
        let (flow_id, _) = flow_with(&repo, &["a", "b", "c"]).await;
        let steps = repo.get_flow_matches(flow_id).await.unwrap();
        let second_id = steps[1].occurrence.id;

        repo.conn
            .call(move |conn| {
                conn.execute_batch(&format!(
                    r#"CREATE TRIGGER fail_second_write
                       BEFORE UPDATE OF order_index ON flow_matches
                       WHEN NEW.id = {second_id}
                       BEGIN SELECT RAISE(ABORT, 'injected failure'); END;"#
                ))?;
                Ok(())
            })
            .await
            .unwrap();

        let err = repo.swap(flow_id, 0, 1).await.unwrap_err();
        assert!(matches!(err, AppError::Reorder { .. }));

        let after = repo.get_flow_matches(flow_id).await.unwrap();
        assert_eq!(lines(&after), vec!["a", "b", "c"]);
        assert_eq!(indices(&after), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn legacy_zero_indices_are_normalized_in_creation_order() {
        let repo = Repository::open_in_memory().await.unwrap();
        let (flow_id, _) = flow_with(&repo, &["a", "b", "c", "d"]).await;
        zero_indices(&repo, flow_id).await;

        let raw = repo.get_flow_matches(flow_id).await.unwrap();
        assert_eq!(indices(&raw), vec![0, 0, 0, 0]);

        let steps = repo.load_flow_steps(flow_id).await.unwrap();
        assert_eq!(lines(&steps), vec!["a", "b", "c", "d"]);
        assert_eq!(indices(&steps), vec![0, 1, 2, 3]);

        // idempotent
        assert_eq!(repo.normalize(flow_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_normalize_leaves_the_legacy_order_untouched() {
        let repo = Repository::open_in_memory().await.unwrap();
        let (flow_id, _) = flow_with(&repo, &["a", "b", "c"]).await;
        zero_indices(&repo, flow_id).await;
        let last_id = repo.get_flow_matches(flow_id).await.unwrap()[2].occurrence.id;

        repo.conn
            .call(move |conn| {
                conn.execute_batch(&format!(
                    r#"CREATE TRIGGER fail_renumber
                       BEFORE UPDATE OF order_index ON flow_matches
                       WHEN NEW.id = {last_id}
                       BEGIN SELECT RAISE(ABORT, 'injected failure'); END;"#
                ))?;
                Ok(())
            })
            .await
            .unwrap();

        let err = repo.normalize(flow_id).await.unwrap_err();
        assert!(err.is_recoverable());
        assert!(matches!(err, AppError::Reorder { flow_id: f, .. } if f == flow_id));

        let after = repo.get_flow_matches(flow_id).await.unwrap();
        assert_eq!(lines(&after), vec!["a", "b", "c"]);
        assert_eq!(indices(&after), vec![0, 0, 0]);
    }

    #[tokio::test]
    async fn appending_to_a_legacy_flow_does_not_collide() {
        let repo = Repository::open_in_memory().await.unwrap();
        let (flow_id, _) = flow_with(&repo, &["a", "b"]).await;
        zero_indices(&repo, flow_id).await;

        let m = repo
            .save_match(NewMatch::new("c", "/src/c.rs", Some(1)))
            .await
            .unwrap();
        repo.add_match_to_flow(flow_id, m).await.unwrap();

        let steps = repo.get_flow_matches(flow_id).await.unwrap();
        assert_eq!(lines(&steps), vec!["a", "b", "c"]);
        assert_eq!(indices(&steps), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn swap_on_a_legacy_flow_normalizes_first() {
        let repo = Repository::open_in_memory().await.unwrap();
        let (flow_id, _) = flow_with(&repo, &["a", "b", "c"]).await;
        zero_indices(&repo, flow_id).await;

        repo.swap(flow_id, 0, 1).await.unwrap();
        let steps = repo.get_flow_matches(flow_id).await.unwrap();
        assert_eq!(lines(&steps), vec!["b", "a", "c"]);
        assert_eq!(indices(&steps), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn remove_occurrence_takes_the_last_added_repeat() {
        let repo = Repository::open_in_memory().await.unwrap();
        let (flow_id, ids) = flow_with(&repo, &["a", "b", "m", "c", "d"]).await;
        let m = ids[2];
        repo.add_match_to_flow(flow_id, m).await.unwrap();

        let steps = repo.get_flow_matches(flow_id).await.unwrap();
        let at_two = steps[2].occurrence.id;
        let at_five = steps[5].occurrence.id;
        assert_eq!(steps[5].occurrence.order_index, 5);

        assert!(repo.remove_occurrence(flow_id, m).await.unwrap());

        let removed = repo.get_flow_match(at_five).await.unwrap().unwrap();
        assert!(removed.archived);
        let kept = repo.get_flow_match(at_two).await.unwrap().unwrap();
        assert!(!kept.archived);
        assert_eq!(kept.order_index, 2);

        assert!(repo.remove_occurrence(flow_id, m).await.unwrap());
        assert!(!repo.remove_occurrence(flow_id, m).await.unwrap());
    }

    #[tokio::test]
    async fn removal_keeps_the_sequence_dense() {
        let repo = Repository::open_in_memory().await.unwrap();
        let (flow_id, ids) = flow_with(&repo, &["a", "b", "c"]).await;

        assert!(repo.remove_occurrence(flow_id, ids[0]).await.unwrap());
        let steps = repo.get_flow_matches(flow_id).await.unwrap();
        assert_eq!(lines(&steps), vec!["b", "c"]);
        assert_eq!(indices(&steps), vec![0, 1]);

        let m = repo
            .save_match(NewMatch::new("d", "/src/d.rs", Some(1)))
            .await
            .unwrap();
        repo.add_match_to_flow(flow_id, m).await.unwrap();
        let steps = repo.get_flow_matches(flow_id).await.unwrap();
        assert_eq!(indices(&steps), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn archive_flow_match_excludes_the_occurrence() {
        let repo = Repository::open_in_memory().await.unwrap();
        let (flow_id, _) = flow_with(&repo, &["a", "b"]).await;
        let steps = repo.get_flow_matches(flow_id).await.unwrap();

        assert!(repo.archive_flow_match(steps[0].occurrence.id).await.unwrap());
        assert!(!repo.archive_flow_match(steps[0].occurrence.id).await.unwrap());
        assert!(!repo.archive_flow_match(9999).await.unwrap());

        let steps = repo.get_flow_matches(flow_id).await.unwrap();
        assert_eq!(lines(&steps), vec!["b"]);
        assert_eq!(indices(&steps), vec![0]);
    }
}
