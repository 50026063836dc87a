//! Typed record mapping over the persisted tables.
//!
//! Each table is described by a [`Record`] impl (table name, column list and
//! struct <-> row conversion). The free functions here build parameterized
//! statements from that description, so no call site assembles SQL by hand
//! for plain CRUD. They take a `&Connection`, which lets callers compose them
//! inside a `Transaction`.

use chrono::{DateTime, DurationRound, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

/// Same shape as SQLite's `strftime('%Y-%m-%dT%H:%M:%fZ')`, so stored values
/// compare correctly as text.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

pub trait Record: Sized + Send + 'static {
    const TABLE: &'static str;

    /// Persisted columns after `id`, in the order `to_values` yields them and
    /// `from_row_at` reads them.
    const COLUMNS: &'static [&'static str];

    /// Reads `id` at `offset` and `COLUMNS` right after it. The offset lets
    /// joined queries map several records out of one row.
    fn from_row_at(row: &Row, offset: usize) -> rusqlite::Result<Self>;

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Self::from_row_at(row, 0)
    }

    /// Column values for `COLUMNS`. Never includes the identity.
    fn to_values(&self) -> Vec<Value>;
}

/// Tables with an `archived` flag and an `updated_at` column.
pub trait SoftDelete: Record {}

/// Tables whose live rows are unique on `KEY`.
pub trait NaturalKey: SoftDelete {
    const KEY: &'static [&'static str];
}

/// Equality predicate for [`list`]. Columns are checked against the record's
/// column list before any SQL is built.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    conditions: Vec<(&'static str, Value)>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn live() -> Self {
        Self::all().eq("archived", false)
    }

    pub fn archived() -> Self {
        Self::all().eq("archived", true)
    }

    pub fn eq(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.conditions.push((column, value.into()));
        self
    }
}

pub fn timestamp(dt: DateTime<Utc>) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

/// Like [`timestamp`], but rounds a sub-millisecond remainder up. Use for
/// lower bounds so a stored value earlier than `dt` never compares `>=`.
pub fn timestamp_ceil(dt: DateTime<Utc>) -> String {
    let millis = chrono::Duration::milliseconds(1);
    let floor = dt.duration_trunc(millis).unwrap_or(dt);
    if floor < dt {
        timestamp(floor + millis)
    } else {
        timestamp(floor)
    }
}

pub fn now() -> String {
    timestamp(Utc::now())
}

pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // RFC3339, which includes our own format (e.g., "2026-01-11T12:34:56.789Z")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

pub fn datetime_at(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_datetime(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("invalid timestamp: {raw}").into(),
        )
    })
}

pub fn json_at(row: &Row, idx: usize) -> rusqlite::Result<Option<serde_json::Value>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|text| {
        serde_json::from_str(&text)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

pub fn json_value(value: &Option<serde_json::Value>) -> Value {
    match value {
        Some(json) => Value::Text(json.to_string()),
        None => Value::Null,
    }
}

pub fn select_sql<R: Record>() -> String {
    format!("SELECT id, {} FROM {}", R::COLUMNS.join(", "), R::TABLE)
}

/// `alias.id, alias.col, ...` for use in joins.
pub fn aliased_columns<R: Record>(alias: &str) -> String {
    std::iter::once("id")
        .chain(R::COLUMNS.iter().copied())
        .map(|column| format!("{alias}.{column}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Values to write on insert: the store owns both timestamps.
fn insert_values<R: Record>(record: &R) -> Vec<Value> {
    let stamp = now();
    R::COLUMNS
        .iter()
        .zip(record.to_values())
        .map(|(column, value)| match *column {
            "created_at" | "updated_at" => Value::Text(stamp.clone()),
            _ => value,
        })
        .collect()
}

fn insert_sql<R: Record>(suffix: &str) -> String {
    format!(
        "INSERT INTO {} ({}) VALUES ({}){}",
        R::TABLE,
        R::COLUMNS.join(", "),
        placeholders(R::COLUMNS.len()),
        suffix
    )
}

fn check_column<R: Record>(column: &str) -> rusqlite::Result<()> {
    if column == "id" || R::COLUMNS.contains(&column) {
        Ok(())
    } else {
        Err(rusqlite::Error::InvalidColumnName(format!(
            "{}.{}",
            R::TABLE,
            column
        )))
    }
}

/// Inserts `record` and returns the storage-assigned id.
pub fn insert<R: Record>(conn: &Connection, record: &R) -> rusqlite::Result<i64> {
    conn.execute(&insert_sql::<R>(""), params_from_iter(insert_values(record)))?;
    let id = conn.last_insert_rowid();
    tracing::debug!(table = R::TABLE, id, "inserted row");
    Ok(id)
}

/// Inserts `record` unless a live row already holds its natural key, in which
/// case that row's id is returned. The flag is true when a row was created.
pub fn insert_or_get<R: NaturalKey>(conn: &Connection, record: &R) -> rusqlite::Result<(i64, bool)> {
    let values = insert_values(record);

    let key_values = R::KEY
        .iter()
        .map(|key| {
            R::COLUMNS
                .iter()
                .position(|column| column == key)
                .map(|idx| values[idx].clone())
                .ok_or_else(|| rusqlite::Error::InvalidColumnName(format!("{}.{}", R::TABLE, key)))
        })
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let inserted = conn.execute(
        &insert_sql::<R>(" ON CONFLICT DO NOTHING"),
        params_from_iter(values),
    )?;
    if inserted > 0 {
        let id = conn.last_insert_rowid();
        tracing::debug!(table = R::TABLE, id, "inserted row");
        return Ok((id, true));
    }

    let predicate = R::KEY
        .iter()
        .enumerate()
        .map(|(i, key)| format!("{key} = ?{}", i + 1))
        .collect::<Vec<_>>()
        .join(" AND ");
    let id = conn.query_row(
        &format!(
            "SELECT id FROM {} WHERE {predicate} AND archived = 0 ORDER BY id LIMIT 1",
            R::TABLE
        ),
        params_from_iter(key_values),
        |row| row.get(0),
    )?;
    tracing::debug!(table = R::TABLE, id, "reused row with same natural key");
    Ok((id, false))
}

pub fn get<R: Record>(conn: &Connection, id: i64) -> rusqlite::Result<Option<R>> {
    conn.query_row(
        &format!("{} WHERE id = ?1", select_sql::<R>()),
        params![id],
        R::from_row,
    )
    .optional()
}

/// Writes every column except `created_at`. Returns false when no row has `id`.
pub fn update<R: SoftDelete>(conn: &Connection, id: i64, record: &R) -> rusqlite::Result<bool> {
    let stamp = now();
    let mut assignments = Vec::with_capacity(R::COLUMNS.len());
    let mut values = Vec::with_capacity(R::COLUMNS.len() + 1);

    for (column, value) in R::COLUMNS.iter().zip(record.to_values()) {
        match *column {
            "created_at" => continue,
            "updated_at" => values.push(Value::Text(stamp.clone())),
            _ => values.push(value),
        }
        assignments.push(format!("{column} = ?{}", values.len()));
    }
    values.push(Value::Integer(id));

    let sql = format!(
        "UPDATE {} SET {} WHERE id = ?{}",
        R::TABLE,
        assignments.join(", "),
        values.len()
    );
    Ok(conn.execute(&sql, params_from_iter(values))? > 0)
}

/// Sets `archived = 1`. Returns false when no row has `id`.
pub fn archive<R: SoftDelete>(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        &format!(
            "UPDATE {} SET archived = 1, updated_at = ?1 WHERE id = ?2",
            R::TABLE
        ),
        params![now(), id],
    )?;
    if changed > 0 {
        tracing::debug!(table = R::TABLE, id, "archived row");
    }
    Ok(changed > 0)
}

/// Rows matching `filter`, oldest id first.
pub fn list<R: Record>(conn: &Connection, filter: &Filter) -> rusqlite::Result<Vec<R>> {
    let mut sql = select_sql::<R>();
    let mut values = Vec::with_capacity(filter.conditions.len());

    for (i, (column, value)) in filter.conditions.iter().enumerate() {
        check_column::<R>(column)?;
        sql.push_str(if i == 0 { " WHERE " } else { " AND " });
        sql.push_str(&format!("{column} = ?{}", i + 1));
        values.push(value.clone());
    }
    sql.push_str(" ORDER BY id");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), R::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
