use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{AppError, Result};
use crate::models::{ActiveFlow, Flow, FlowHistory, FlowHistoryEntry, SessionContext};

use super::store::{self, datetime_at, Record};
use super::Repository;

impl Record for FlowHistory {
    const TABLE: &'static str = "flow_history";
    const COLUMNS: &'static [&'static str] = &["flow_id", "created_at"];

    fn from_row_at(row: &Row, offset: usize) -> rusqlite::Result<Self> {
        Ok(FlowHistory {
            id: row.get(offset)?,
            flow_id: row.get(offset + 1)?,
            created_at: datetime_at(row, offset + 2)?,
        })
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Integer(self.flow_id),
            Value::Text(store::timestamp(self.created_at)),
        ]
    }
}

/// Appends an activation. The flow must exist; archived flows are accepted and
/// simply never resolve as active.
pub(super) fn activate_flow(conn: &Connection, flow_id: i64) -> rusqlite::Result<Option<i64>> {
    if store::get::<Flow>(conn, flow_id)?.is_none() {
        return Ok(None);
    }
    let id = store::insert(conn, &FlowHistory::new(flow_id))?;
    tracing::info!(flow_id, history_id = id, "activated flow");
    Ok(Some(id))
}

/// Most recent activation inside the session window wins. If its flow is
/// archived there is no active flow; earlier activations are not consulted.
pub(super) fn resolve_active_flow(
    conn: &Connection,
    session: &SessionContext,
) -> rusqlite::Result<ActiveFlow> {
    let latest: Option<(i64, Option<bool>)> = conn
        .query_row(
            r#"SELECT fh.flow_id, f.archived
               FROM flow_history fh
               LEFT JOIN flows f ON f.id = fh.flow_id
               WHERE fh.created_at >= ?1
               ORDER BY fh.created_at DESC, fh.id DESC
               LIMIT 1"#,
            params![store::timestamp_ceil(session.lower_bound())],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    Ok(match latest {
        Some((flow_id, Some(false))) => ActiveFlow::Active(flow_id),
        _ => ActiveFlow::Inactive,
    })
}

impl Repository {
    // Activation log

    pub async fn activate_flow(&self, flow_id: i64) -> Result<i64> {
        let id = self
            .conn
            .call(move |conn| Ok(activate_flow(conn, flow_id)?))
            .await?;
        id.ok_or(AppError::FlowNotFound(flow_id))
    }

    /// The `limit` most recent activations of live flows, newest first.
    pub async fn get_flow_history(&self, limit: usize) -> Result<Vec<FlowHistoryEntry>> {
        let history = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT fh.id, fh.flow_id, fh.created_at, f.name, f.description
                       FROM flow_history fh
                       JOIN flows f ON f.id = fh.flow_id
                       WHERE f.archived = 0
                       ORDER BY fh.created_at DESC, fh.id DESC
                       LIMIT ?1"#,
                )?;
                let history = stmt
                    .query_map(params![limit as i64], |row| {
                        Ok(FlowHistoryEntry {
                            id: row.get(0)?,
                            flow_id: row.get(1)?,
                            created_at: datetime_at(row, 2)?,
                            name: row.get(3)?,
                            description: row.get(4)?,
                        })
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(history)
            })
            .await?;
        Ok(history)
    }

    // Active-flow resolution

    pub async fn resolve_active_flow(&self, session: SessionContext) -> Result<ActiveFlow> {
        let active = self
            .conn
            .call(move |conn| Ok(resolve_active_flow(conn, &session)?))
            .await?;
        Ok(active)
    }

    pub async fn get_active_flow_id(&self, session: SessionContext) -> Result<Option<i64>> {
        Ok(self.resolve_active_flow(session).await?.flow_id())
    }

    pub async fn get_active_flow(&self, session: SessionContext) -> Result<Option<Flow>> {
        match self.get_active_flow_id(session).await? {
            Some(id) => self.get_flow(id).await,
            None => Ok(None),
        }
    }
}
