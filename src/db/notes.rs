use rusqlite::types::Value;
use rusqlite::{params, OptionalExtension, Row};

use crate::error::Result;
use crate::models::MatchNote;

use super::store::{self, datetime_at, select_sql, Record, SoftDelete};
use super::Repository;

impl Record for MatchNote {
    const TABLE: &'static str = "match_notes";
    const COLUMNS: &'static [&'static str] = &[
        "flow_match_id",
        "name",
        "note",
        "archived",
        "created_at",
        "updated_at",
    ];

    fn from_row_at(row: &Row, offset: usize) -> rusqlite::Result<Self> {
        Ok(MatchNote {
            id: Some(row.get(offset)?),
            flow_match_id: row.get(offset + 1)?,
            name: row.get(offset + 2)?,
            note: row.get(offset + 3)?,
            archived: row.get(offset + 4)?,
            created_at: datetime_at(row, offset + 5)?,
            updated_at: datetime_at(row, offset + 6)?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.flow_match_id),
            self.name.clone().map_or(Value::Null, Value::Text),
            Value::Text(self.note.clone()),
            Value::from(self.archived),
            Value::Text(store::timestamp(self.created_at)),
            Value::Text(store::timestamp(self.updated_at)),
        ]
    }
}

impl SoftDelete for MatchNote {}

impl Repository {
    // Note operations

    /// Updates the note in place when it carries an id, otherwise inserts it.
    /// Returns the note's id either way.
    pub async fn add_or_update_note(&self, note: MatchNote) -> Result<i64> {
        let id = self
            .conn
            .call(move |conn| {
                let id = match note.id {
                    Some(id) if store::update(conn, id, &note)? => id,
                    _ => store::insert(conn, &note)?,
                };
                Ok(id)
            })
            .await?;
        tracing::debug!(note_id = id, "saved note");
        Ok(id)
    }

    pub async fn get_note(&self, id: i64) -> Result<Option<MatchNote>> {
        self.get::<MatchNote>(id).await
    }

    /// The newest live note on an occurrence.
    pub async fn get_note_for_occurrence(&self, flow_match_id: i64) -> Result<Option<MatchNote>> {
        let note = self
            .conn
            .call(move |conn| {
                let note = conn
                    .query_row(
                        &format!(
                            "{} WHERE flow_match_id = ?1 AND archived = 0 ORDER BY id DESC LIMIT 1",
                            select_sql::<MatchNote>()
                        ),
                        params![flow_match_id],
                        MatchNote::from_row,
                    )
                    .optional()?;
                Ok(note)
            })
            .await?;
        Ok(note)
    }

    pub async fn archive_note(&self, id: i64) -> Result<bool> {
        self.archive::<MatchNote>(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewMatch;

    async fn occurrence(repo: &Repository) -> i64 {
        let flow_id = repo.new_flow("F", None).await.unwrap();
        let match_id = repo
            .save_match(NewMatch::new("fn main()", "/src/main.rs", Some(1)))
            .await
            .unwrap();
        repo.add_match_to_flow(flow_id, match_id).await.unwrap()
    }

    #[tokio::test]
    async fn note_without_id_is_inserted() {
        let repo = Repository::open_in_memory().await.unwrap();
        let fm = occurrence(&repo).await;

        let id = repo
            .add_or_update_note(MatchNote::new(fm, "Test note content"))
            .await
            .unwrap();
        let note = repo.get_note(id).await.unwrap().unwrap();
        assert_eq!(note.id, Some(id));
        assert_eq!(note.flow_match_id, fm);
        assert_eq!(note.note, "Test note content");
        assert!(note.name.is_none());
    }

    #[tokio::test]
    async fn note_with_id_is_updated_in_place() {
        let repo = Repository::open_in_memory().await.unwrap();
        let fm = occurrence(&repo).await;
        let id = repo
            .add_or_update_note(MatchNote::new(fm, "first"))
            .await
            .unwrap();

        let mut note = repo.get_note(id).await.unwrap().unwrap();
        note.note = "second".to_string();
        note.name = Some("why".to_string());
        assert_eq!(repo.add_or_update_note(note).await.unwrap(), id);

        let note = repo.get_note_for_occurrence(fm).await.unwrap().unwrap();
        assert_eq!(note.id, Some(id));
        assert_eq!(note.note, "second");
        assert_eq!(note.name.as_deref(), Some("why"));
    }

    #[tokio::test]
    async fn note_travels_with_its_flow_step() {
        let repo = Repository::open_in_memory().await.unwrap();
        let fm = occurrence(&repo).await;
        let flow_id = repo.get_flow_match(fm).await.unwrap().unwrap().flow_id;

        let steps = repo.get_flow_matches(flow_id).await.unwrap();
        assert!(steps[0].note.is_none());

        repo.add_or_update_note(MatchNote::new(fm, "look here"))
            .await
            .unwrap();
        let steps = repo.get_flow_matches(flow_id).await.unwrap();
        assert_eq!(steps[0].note.as_ref().unwrap().note, "look here");
    }

    #[tokio::test]
    async fn archived_notes_are_hidden() {
        let repo = Repository::open_in_memory().await.unwrap();
        let fm = occurrence(&repo).await;
        let id = repo
            .add_or_update_note(MatchNote::new(fm, "temp"))
            .await
            .unwrap();

        assert!(repo.archive_note(id).await.unwrap());
        assert!(repo.get_note_for_occurrence(fm).await.unwrap().is_none());
        assert!(repo.get_note(id).await.unwrap().unwrap().archived);
        assert!(!repo.archive_note(9999).await.unwrap());
    }
}
