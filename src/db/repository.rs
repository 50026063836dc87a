use tokio_rusqlite::Connection;

use crate::error::Result;

use super::schema::SCHEMA;
use super::store::{self, Filter, Record, SoftDelete};

/// Async facade over the single database connection.
///
/// `tokio_rusqlite` runs every `call` closure on one background thread, one
/// at a time. Multi-statement operations therefore live inside a single
/// closure and a single transaction, which also serializes mutations on the
/// same flow.
pub struct Repository {
    pub(super) conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;
        Self::init(conn).await
    }

    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().await?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    // Generic record operations
    //
    // Only reads are public. Writes go through the per-table operations,
    // which keep flow order dense and cascade archives.

    pub async fn get<R: Record>(&self, id: i64) -> Result<Option<R>> {
        let record = self
            .conn
            .call(move |conn| Ok(store::get::<R>(conn, id)?))
            .await?;
        Ok(record)
    }

    pub(crate) async fn archive<R: SoftDelete>(&self, id: i64) -> Result<bool> {
        let archived = self
            .conn
            .call(move |conn| Ok(store::archive::<R>(conn, id)?))
            .await?;
        Ok(archived)
    }

    pub async fn list<R: Record>(&self, filter: Filter) -> Result<Vec<R>> {
        let records = self
            .conn
            .call(move |conn| Ok(store::list::<R>(conn, &filter)?))
            .await?;
        Ok(records)
    }
}
