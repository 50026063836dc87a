use rusqlite::types::Value;
use rusqlite::{params, Connection, Row};

use crate::error::Result;
use crate::models::{Match, NewMatch};

use super::ordering::renumber;
use super::store::{self, datetime_at, json_at, json_value, NaturalKey, Record, SoftDelete};
use super::Repository;

impl Record for Match {
    const TABLE: &'static str = "matches";
    const COLUMNS: &'static [&'static str] = &[
        "line",
        "file_path",
        "file_name",
        "line_no",
        "grep_meta",
        "archived",
        "created_at",
        "updated_at",
    ];

    fn from_row_at(row: &Row, offset: usize) -> rusqlite::Result<Self> {
        Ok(Match {
            id: row.get(offset)?,
            line: row.get(offset + 1)?,
            file_path: row.get(offset + 2)?,
            file_name: row.get(offset + 3)?,
            line_no: row.get(offset + 4)?,
            grep_meta: json_at(row, offset + 5)?,
            archived: row.get(offset + 6)?,
            created_at: datetime_at(row, offset + 7)?,
            updated_at: datetime_at(row, offset + 8)?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.line.clone()),
            Value::Text(self.file_path.clone()),
            Value::Text(self.file_name.clone()),
            self.line_no.map_or(Value::Null, Value::Integer),
            json_value(&self.grep_meta),
            Value::from(self.archived),
            Value::Text(store::timestamp(self.created_at)),
            Value::Text(store::timestamp(self.updated_at)),
        ]
    }
}

impl SoftDelete for Match {}

impl NaturalKey for Match {
    const KEY: &'static [&'static str] = &["line", "file_path"];
}

/// Persists a candidate hit, or returns the live row already holding its
/// `(line, file_path)`.
pub(super) fn save_match(conn: &Connection, candidate: NewMatch) -> rusqlite::Result<i64> {
    let (id, created) = store::insert_or_get(conn, &Match::from(candidate))?;
    if !created {
        tracing::debug!(match_id = id, "hit already saved");
    }
    Ok(id)
}

impl Repository {
    // Match operations

    pub async fn save_match(&self, candidate: NewMatch) -> Result<i64> {
        let id = self
            .conn
            .call(move |conn| Ok(save_match(conn, candidate)?))
            .await?;
        Ok(id)
    }

    pub async fn get_match(&self, id: i64) -> Result<Option<Match>> {
        self.get::<Match>(id).await
    }

    /// Archives the match and every live occurrence of it, then renumbers the
    /// flows that lost an occurrence.
    pub async fn archive_match(&self, id: i64) -> Result<bool> {
        let archived = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                if !store::archive::<Match>(&tx, id)? {
                    return Ok(false);
                }

                let flow_ids = {
                    let mut stmt = tx.prepare(
                        "SELECT DISTINCT flow_id FROM flow_matches WHERE match_id = ?1 AND archived = 0",
                    )?;
                    let ids = stmt
                        .query_map(params![id], |row| row.get::<_, i64>(0))?
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    ids
                };

                tx.execute(
                    "UPDATE flow_matches SET archived = 1, updated_at = ?1 WHERE match_id = ?2 AND archived = 0",
                    params![store::now(), id],
                )?;
                for flow_id in flow_ids {
                    renumber(&tx, flow_id)?;
                }

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
    use crate::db::Filter;

    fn candidate() -> NewMatch {
        NewMatch::new("test content", "/path/to/file.py", Some(1))
            .with_meta(serde_json::json!({"line_number": 1, "file_path": "/path/to/file.py"}))
    }

    #[tokio::test]
    async fn save_match_stores_all_fields() {
        let repo = Repository::open_in_memory().await.unwrap();
        let id = repo.save_match(candidate()).await.unwrap();
        assert!(id > 0);

        let saved = repo.get_match(id).await.unwrap().unwrap();
        assert_eq!(saved.file_path, "/path/to/file.py");
        assert_eq!(saved.file_name, "file.py");
        assert_eq!(saved.line, "test content");
        assert_eq!(saved.line_no, Some(1));
        assert_eq!(
            saved.grep_meta,
            Some(serde_json::json!({"line_number": 1, "file_path": "/path/to/file.py"}))
        );
    }

    #[tokio::test]
    async fn saving_the_same_hit_twice_yields_one_row() {
        let repo = Repository::open_in_memory().await.unwrap();
        let first = repo.save_match(candidate()).await.unwrap();
        let second = repo.save_match(candidate()).await.unwrap();
        assert_eq!(first, second);

        let live: Vec<Match> = repo.list(Filter::live()).await.unwrap();
        assert_eq!(live.len(), 1);
    }

    #[tokio::test]
    async fn same_line_in_another_file_is_a_different_match() {
        let repo = Repository::open_in_memory().await.unwrap();
        let a = repo.save_match(candidate()).await.unwrap();
        let b = repo
            .save_match(NewMatch::new("test content", "/path/to/other.py", Some(1)))
            .await
            .unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn archive_match_hides_it_from_flows() {
        let repo = Repository::open_in_memory().await.unwrap();
        let flow_id = repo.new_flow("F", None).await.unwrap();
        let keep = repo
            .save_match(NewMatch::new("keep", "/k.py", Some(1)))
            .await
            .unwrap();
        let dropped = repo.save_match(candidate()).await.unwrap();
        repo.add_match_to_flow(flow_id, dropped).await.unwrap();
        repo.add_match_to_flow(flow_id, keep).await.unwrap();

        assert!(repo.archive_match(dropped).await.unwrap());
        assert!(repo.get_match(dropped).await.unwrap().unwrap().archived);

        let steps = repo.get_flow_matches(flow_id).await.unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].matched.id, keep);
        assert_eq!(steps[0].occurrence.order_index, 0);
    }

    #[tokio::test]
    async fn archive_missing_match_is_a_no_op() {
        let repo = Repository::open_in_memory().await.unwrap();
        assert!(!repo.archive_match(9999).await.unwrap());
    }
}
