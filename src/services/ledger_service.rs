//! src/services/ledger_service.rs
//!
//! FileLedger: metadata bookkeeping for files that live in an object store.
//! One SQLite table (`storedfiles`) keyed by `(bucket, object_name)` records
//! ownership, dataset, visibility and size; the ledger upserts entries as
//! write events arrive and rolls sizes up by owner, dataset or flow.
//!
//! Every public operation runs inside its own transaction. Returning early
//! through `?` drops the `Transaction`, which rolls it back.

use crate::models::{
    flow_ids::encode_flow_ids,
    stored_file::{NewStoredFile, StoredFile, StoredFileRow},
};
use sqlx::{QueryBuilder, SqliteConnection, SqlitePool, sqlite::Sqlite};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Schema applied by `init_db` and by the `--migrate` flag.
pub const SCHEMA_SQL: &str = include_str!("../../migrations/0001_init.sql");

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(
        "`{field}` of `{bucket}/{object_name}` is `{stored}`, refusing to change it to `{supplied}`"
    )]
    IdentityMismatch {
        bucket: String,
        object_name: String,
        field: &'static str,
        stored: String,
        supplied: String,
    },
    #[error("invalid file record: {0}")]
    InvalidInput(String),
    #[error("flow_ids column is not a JSON string array: {0}")]
    FlowIdsCodec(#[from] serde_json::Error),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Column a size roll-up groups on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SizeGrouping {
    Owner,
    DatasetId,
    /// Only the flow that wrote a file last is credited with its size.
    LastFlowId,
}

impl SizeGrouping {
    fn column(self) -> &'static str {
        match self {
            SizeGrouping::Owner => "owner",
            SizeGrouping::DatasetId => "dataset_id",
            SizeGrouping::LastFlowId => "last_flow_id",
        }
    }
}

/// FileLedger owns the `storedfiles` table:
/// - record a file write (idempotent upsert, flow ids accumulate)
/// - look up one file by bucket and object name
/// - sum sizes per owner, dataset or last-writing flow
#[derive(Clone)]
pub struct FileLedger {
    /// Shared SQLite connection pool, injected by the caller.
    pub db: Arc<SqlitePool>,
}

impl FileLedger {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Create the table and its indexes if they are missing.
    pub async fn init_db(&self) -> LedgerResult<()> {
        let statements = SCHEMA_SQL
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        debug!("applying {} schema statements", statements.len());
        for stmt in statements {
            sqlx::query(stmt).execute(&*self.db).await?;
        }
        Ok(())
    }

    /// Reject writes that could never form a valid ledger key.
    fn ensure_write_valid(write: &NewStoredFile) -> LedgerResult<()> {
        if write.bucket.is_empty() {
            return Err(LedgerError::InvalidInput("bucket must not be empty".into()));
        }
        if write.object_name.is_empty() {
            return Err(LedgerError::InvalidInput(
                "object_name must not be empty".into(),
            ));
        }
        if write.flow_id.is_empty() {
            return Err(LedgerError::InvalidInput("flow_id must not be empty".into()));
        }
        if write.size < 0 {
            return Err(LedgerError::InvalidInput(format!(
                "size must be non-negative, got {}",
                write.size
            )));
        }
        Ok(())
    }

    async fn fetch_file(
        conn: &mut SqliteConnection,
        bucket: &str,
        object_name: &str,
    ) -> LedgerResult<Option<StoredFile>> {
        let row = sqlx::query_as::<_, StoredFileRow>(
            "SELECT bucket, object_name, findability, owner, owner_id, dataset_id,
                    last_flow_id, flow_ids, size, created_at
             FROM storedfiles
             WHERE bucket = ? AND object_name = ?",
        )
        .bind(bucket)
        .bind(object_name)
        .fetch_optional(conn)
        .await?;

        row.map(StoredFile::try_from)
            .transpose()
            .map_err(LedgerError::from)
    }

    /// Record one observed write of a file.
    ///
    /// - First write for a key creates the entry with `flow_ids = {flow_id}`.
    /// - Later writes must agree on `owner`, `owner_id` and `dataset_id`;
    ///   a disagreement fails with `IdentityMismatch` and nothing is written.
    /// - Otherwise findability, size and timestamp are overwritten,
    ///   `last_flow_id` becomes `flow_id` and `flow_id` joins `flow_ids`.
    ///
    /// The read and the write share one `BEGIN IMMEDIATE` transaction: the
    /// write lock is taken up front, so concurrent writers queue on SQLite's
    /// busy timeout instead of failing a lock upgrade mid-transaction.
    pub async fn record_file(&self, write: NewStoredFile) -> LedgerResult<StoredFile> {
        Self::ensure_write_valid(&write)?;

        let mut tx = self.db.begin_with("BEGIN IMMEDIATE").await?;
        let existing = Self::fetch_file(&mut tx, &write.bucket, &write.object_name).await?;
        let created = existing.is_none();

        let file = match existing {
            None => StoredFile::first_write(write),
            Some(mut file) => {
                if let Some((field, stored, supplied)) = file.identity_conflict(&write) {
                    warn!(
                        "rejecting write to {}/{}: {} `{}` != `{}`",
                        file.bucket, file.object_name, field, stored, supplied
                    );
                    return Err(LedgerError::IdentityMismatch {
                        bucket: file.bucket.clone(),
                        object_name: file.object_name.clone(),
                        field,
                        stored: stored.to_string(),
                        supplied: supplied.to_string(),
                    });
                }
                file.apply_write(write);
                file
            }
        };

        let flow_ids = encode_flow_ids(&file.flow_ids)?;
        sqlx::query(
            r#"
            INSERT INTO storedfiles (
                bucket, object_name, findability, owner, owner_id, dataset_id,
                last_flow_id, flow_ids, size, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(bucket, object_name) DO UPDATE SET
                findability = excluded.findability,
                last_flow_id = excluded.last_flow_id,
                flow_ids = excluded.flow_ids,
                size = excluded.size,
                created_at = excluded.created_at
            "#,
        )
        .bind(&file.bucket)
        .bind(&file.object_name)
        .bind(&file.findability)
        .bind(&file.owner)
        .bind(&file.owner_id)
        .bind(&file.dataset_id)
        .bind(&file.last_flow_id)
        .bind(&flow_ids)
        .bind(file.size)
        .bind(file.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(
            "{} {}/{} from flow {} ({} flows, {} bytes)",
            if created { "created" } else { "updated" },
            file.bucket,
            file.object_name,
            file.last_flow_id,
            file.flow_ids.len(),
            file.size
        );
        Ok(file)
    }

    /// Fetch the ledger entry for one file, `None` when it was never recorded.
    pub async fn get_file_info(
        &self,
        bucket: &str,
        object_name: &str,
    ) -> LedgerResult<Option<StoredFile>> {
        let mut tx = self.db.begin().await?;
        let file = Self::fetch_file(&mut tx, bucket, object_name).await?;
        tx.commit().await?;
        Ok(file)
    }

    /// Total bytes owned by `owner`, optionally restricted to one findability.
    pub async fn sum_by_owner(&self, owner: &str, findability: Option<&str>) -> LedgerResult<i64> {
        self.sum_sizes(SizeGrouping::Owner, owner, findability).await
    }

    /// Total bytes in `dataset_id`, optionally restricted to one findability.
    pub async fn sum_by_dataset(
        &self,
        dataset_id: &str,
        findability: Option<&str>,
    ) -> LedgerResult<i64> {
        self.sum_sizes(SizeGrouping::DatasetId, dataset_id, findability)
            .await
    }

    /// Total bytes of files whose latest write came from `flow_id`.
    pub async fn sum_by_flow(
        &self,
        flow_id: &str,
        findability: Option<&str>,
    ) -> LedgerResult<i64> {
        self.sum_sizes(SizeGrouping::LastFlowId, flow_id, findability).await
    }

    /// Sum `size` over every entry whose grouping column equals `key`.
    ///
    /// No matching rows yields 0, never an error.
    pub async fn sum_sizes(
        &self,
        grouping: SizeGrouping,
        key: &str,
        findability: Option<&str>,
    ) -> LedgerResult<i64> {
        let mut builder =
            QueryBuilder::<Sqlite>::new("SELECT COALESCE(SUM(size), 0) FROM storedfiles WHERE ");
        builder.push(grouping.column());
        builder.push(" = ");
        builder.push_bind(key);
        if let Some(findability) = findability {
            builder.push(" AND findability = ");
            builder.push_bind(findability);
        }

        let mut tx = self.db.begin().await?;
        let total: i64 = builder.build_query_scalar::<i64>().fetch_one(&mut *tx).await?;
        tx.commit().await?;

        debug!(
            "{} = {} (findability {:?}) totals {} bytes",
            grouping.column(),
            key,
            findability,
            total
        );
        Ok(total)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::FileLedger;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Arc;

    /// Ledger over a private in-memory database with the schema applied.
    ///
    /// A single never-recycled connection, since every new connection to
    /// `sqlite::memory:` opens a fresh empty database.
    pub(crate) async fn memory_ledger() -> FileLedger {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .expect("open in-memory sqlite");
        let ledger = FileLedger::new(Arc::new(pool));
        ledger.init_db().await.expect("apply schema");
        ledger
    }
}
