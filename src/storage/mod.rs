pub mod repository;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::InterruptHandle;
use rusqlite_migration::{Migrations, M};

use crate::error::{Error, Result};
use crate::insights::{FieldGroup, ProductiveRecord, ProjectTaskCounts};
use crate::model::{EntityKind, ObjectId, Priority};

/// Read-side queries the insights aggregators need from a datastore.
///
/// `Database` is the production implementation; anything offering the same
/// filter/group/count primitives can stand in for it.
#[async_trait]
pub trait InsightStore: Send + Sync {
    /// Count the owner's records of `kind` grouped by `fields`.
    /// Field names have already been checked against the kind's registry.
    async fn group_count(
        &self,
        owner_id: &ObjectId,
        kind: EntityKind,
        fields: &[&'static str],
    ) -> Result<Vec<FieldGroup>>;

    /// The owner's projects, optionally only one priority, each with its
    /// completed and total task counts.
    async fn project_task_counts(
        &self,
        owner_id: &ObjectId,
        priority: Option<Priority>,
    ) -> Result<Vec<ProjectTaskCounts>>;

    /// The owner's `completed` records of `kind`.
    async fn completed_records(
        &self,
        owner_id: &ObjectId,
        kind: EntityKind,
    ) -> Result<Vec<ProductiveRecord>>;

    /// Abandon queries that are running or queued. Called when a caller's
    /// deadline has passed and nobody will read the results.
    fn cancel(&self) {}
}

/// Cancellation state for the reader connection.
///
/// Each insight query records the generation it was submitted under and
/// skips itself if the generation moved on before the connection thread got
/// to it. The interrupt handle stops the statement that is already running.
struct ReadCancel {
    generation: AtomicU64,
    interrupt: InterruptHandle,
}

impl ReadCancel {
    fn current(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.interrupt.interrupt();
    }
}

fn interrupted() -> rusqlite::Error {
    rusqlite::Error::SqliteFailure(
        rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_INTERRUPT),
        Some("query cancelled".into()),
    )
}

/// Writer and reader `tokio_rusqlite` connections over one WAL database.
/// Writes are serialized on the writer; insight queries run on the reader
/// and can be cancelled as a group through [`InsightStore::cancel`].
#[derive(Clone)]
pub struct Database {
    writer: tokio_rusqlite::Connection,
    reader: tokio_rusqlite::Connection,
    read_cancel: Arc<ReadCancel>,
}

impl Database {
    /// Open the database at the default path (`~/.taskinsights/taskinsights.db`).
    pub async fn open() -> Result<Self> {
        let dir = dirs::home_dir()
            .ok_or_else(|| Error::Config("cannot determine home directory".into()))?
            .join(".taskinsights");
        std::fs::create_dir_all(&dir).map_err(|e| Error::Config(e.to_string()))?;
        Self::open_at(dir.join("taskinsights.db")).await
    }

    /// Open the database at the given path.
    pub async fn open_at(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let writer = tokio_rusqlite::Connection::open(&path).await?;
        Self::init_writer(&writer).await?;

        let reader = tokio_rusqlite::Connection::open(&path).await?;
        Self::init_reader(&reader).await?;

        Self::assemble(writer, reader).await
    }

    /// Open an in-memory database (for testing).
    pub async fn open_memory() -> Result<Self> {
        let writer = tokio_rusqlite::Connection::open_in_memory().await?;
        Self::init_writer(&writer).await?;

        // In-memory databases are per-connection, so reader and writer share one.
        Self::assemble(writer.clone(), writer).await
    }

    async fn assemble(
        writer: tokio_rusqlite::Connection,
        reader: tokio_rusqlite::Connection,
    ) -> Result<Self> {
        let interrupt = reader
            .call(|conn| Ok::<_, rusqlite::Error>(conn.get_interrupt_handle()))
            .await?;
        Ok(Self {
            writer,
            reader,
            read_cancel: Arc::new(ReadCancel {
                generation: AtomicU64::new(0),
                interrupt,
            }),
        })
    }

    async fn init_writer(conn: &tokio_rusqlite::Connection) -> Result<()> {
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;\
                 PRAGMA foreign_keys=ON;\
                 PRAGMA busy_timeout=5000;",
            )
            .map_err(|e| e.to_string())?;
            let migrations =
                Migrations::new(vec![M::up(include_str!("migrations/001_initial.sql"))]);
            migrations.to_latest(conn).map_err(|e| e.to_string())?;
            Ok::<(), String>(())
        })
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn init_reader(conn: &tokio_rusqlite::Connection) -> Result<()> {
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;\
                 PRAGMA foreign_keys=ON;\
                 PRAGMA busy_timeout=5000;",
            )?;
            Ok::<(), rusqlite::Error>(())
        })
        .await?;
        Ok(())
    }

    /// Get a reference to the writer connection.
    pub fn writer(&self) -> &tokio_rusqlite::Connection {
        &self.writer
    }

    /// Get a reference to the reader connection.
    pub fn reader(&self) -> &tokio_rusqlite::Connection {
        &self.reader
    }

    /// Run `query` on the reader unless [`InsightStore::cancel`] is called
    /// between submission and the connection thread picking it up.
    async fn read<T, F>(&self, query: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&rusqlite::Connection) -> std::result::Result<T, rusqlite::Error>
            + Send
            + 'static,
    {
        let cancel = Arc::clone(&self.read_cancel);
        let submitted = cancel.current();
        let value = self
            .reader
            .call(move |conn| {
                if cancel.current() != submitted {
                    return Err(interrupted());
                }
                query(conn)
            })
            .await?;
        Ok(value)
    }
}

#[async_trait]
impl InsightStore for Database {
    async fn group_count(
        &self,
        owner_id: &ObjectId,
        kind: EntityKind,
        fields: &[&'static str],
    ) -> Result<Vec<FieldGroup>> {
        let owner_id = owner_id.clone();
        let fields = fields.to_vec();
        self.read(move |conn| repository::group_count(conn, &owner_id, kind, &fields))
            .await
    }

    async fn project_task_counts(
        &self,
        owner_id: &ObjectId,
        priority: Option<Priority>,
    ) -> Result<Vec<ProjectTaskCounts>> {
        let owner_id = owner_id.clone();
        self.read(move |conn| repository::project_task_counts(conn, &owner_id, priority))
            .await
    }

    async fn completed_records(
        &self,
        owner_id: &ObjectId,
        kind: EntityKind,
    ) -> Result<Vec<ProductiveRecord>> {
        let owner_id = owner_id.clone();
        self.read(move |conn| repository::completed_records(conn, &owner_id, kind))
            .await
    }

    fn cancel(&self) {
        log::debug!("Cancelling outstanding insight queries");
        self.read_cancel.cancel();
    }
}
