use std::collections::HashMap;

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};

use crate::error::Result;
use crate::models::Flow;

use super::store::{self, datetime_at, select_sql, Filter, Record, SoftDelete};
use super::Repository;

impl Record for Flow {
    const TABLE: &'static str = "flows";
    const COLUMNS: &'static [&'static str] =
        &["name", "description", "archived", "created_at", "updated_at"];

    fn from_row_at(row: &Row, offset: usize) -> rusqlite::Result<Self> {
        Ok(Flow {
            id: row.get(offset)?,
            name: row.get(offset + 1)?,
            description: row.get(offset + 2)?,
            archived: row.get(offset + 3)?,
            created_at: datetime_at(row, offset + 4)?,
            updated_at: datetime_at(row, offset + 5)?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Text(self.name.clone()),
            self.description.clone().map_or(Value::Null, Value::Text),
            Value::from(self.archived),
            Value::Text(store::timestamp(self.created_at)),
            Value::Text(store::timestamp(self.updated_at)),
        ]
    }
}

impl SoftDelete for Flow {}

pub(super) fn new_flow(
    conn: &Connection,
    name: String,
    description: Option<String>,
) -> rusqlite::Result<i64> {
    let id = store::insert(conn, &Flow::new(name.clone(), description))?;
    tracing::info!(flow_id = id, %name, "created flow");
    Ok(id)
}

impl Repository {
    // Flow operations

    pub async fn new_flow(
        &self,
        name: impl Into<String>,
        description: Option<String>,
    ) -> Result<i64> {
        let name = name.into();
        let id = self
            .conn
            .call(move |conn| Ok(new_flow(conn, name, description)?))
            .await?;
        Ok(id)
    }

    pub async fn get_flow(&self, id: i64) -> Result<Option<Flow>> {
        self.get::<Flow>(id).await
    }

    /// Live flows, oldest first.
    pub async fn list_flows(&self) -> Result<Vec<Flow>> {
        self.list::<Flow>(Filter::live()).await
    }

    /// Returns false when the flow does not exist.
    pub async fn rename_flow(&self, id: i64, new_name: impl Into<String>) -> Result<bool> {
        let new_name = new_name.into();
        let renamed = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let Some(mut flow) = store::get::<Flow>(&tx, id)? else {
                    return Ok(false);
                };
                flow.name = new_name;
                store::update(&tx, id, &flow)?;
                tx.commit()?;
                Ok(true)
            })
            .await?;
        Ok(renamed)
    }

    pub async fn archive_flow(&self, id: i64) -> Result<bool> {
        let archived = self.archive::<Flow>(id).await?;
        if archived {
            tracing::info!(flow_id = id, "archived flow");
        }
        Ok(archived)
    }

    /// The most recently created live flow (ties broken by highest id).
    pub async fn get_latest_flow(&self) -> Result<Option<Flow>> {
        let flow = self
            .conn
            .call(|conn| {
                let flow = conn
                    .query_row(
                        &format!(
                            "{} WHERE archived = 0 ORDER BY created_at DESC, id DESC LIMIT 1",
                            select_sql::<Flow>()
                        ),
                        [],
                        Flow::from_row,
                    )
                    .optional()?;
                Ok(flow)
            })
            .await?;
        Ok(flow)
    }

    /// Live occurrence counts keyed by flow id. Flows without occurrences are
    /// absent from the map.
    pub async fn get_flow_match_counts(&self, flow_ids: Vec<i64>) -> Result<HashMap<i64, usize>> {
        if flow_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let counts = self
            .conn
            .call(move |conn| {
                let placeholders = (1..=flow_ids.len())
                    .map(|i| format!("?{i}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                let mut stmt = conn.prepare(&format!(
                    r#"SELECT fm.flow_id, COUNT(*)
                       FROM flow_matches fm
                       JOIN matches m ON m.id = fm.match_id
                       WHERE fm.flow_id IN ({placeholders}) AND fm.archived = 0 AND m.archived = 0
                       GROUP BY fm.flow_id"#
                ))?;
                let counts = stmt
                    .query_map(params_from_iter(flow_ids), |row| {
                        Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)? as usize))
                    })?
                    .collect::<std::result::Result<HashMap<_, _>, _>>()?;
                Ok(counts)
            })
            .await?;
        Ok(counts)
    }
}
