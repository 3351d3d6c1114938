use async_trait::async_trait;
use shorty_core::{Repository, Result, ShortUrl, Stats, StorageError};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Connection, Postgres, Row, Transaction};
use tracing::{debug, error};

/// Schema of the `urls` table, applied idempotently on connect.
pub const SCHEMA: &str = include_str!("../ddl/postgres/urls.sql");

/// PostgreSQL implementation of the repository contract.
///
/// `id` and `url` carry unique constraints. Adding a known URL is absorbed by
/// `ON CONFLICT DO NOTHING` and resolved to the stored id. Deletion and
/// [`Repository::clear`] only flip the `deleted` flag; rows are never removed.
#[derive(Debug, Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a repository from an existing PostgreSQL connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates a repository by opening a new connection pool and ensuring
    /// the `urls` table exists.
    pub async fn connect(database_url: &str) -> Result<Self> {
        if database_url.is_empty() {
            return Err(StorageError::EmptyDbUrl);
        }

        let pool = PgPool::connect(database_url)
            .await
            .map_err(map_sqlx_error)?;
        let repository = Self::new(pool);
        repository.migrate().await?;
        Ok(repository)
    }

    /// Creates the `urls` table if it is absent.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

fn record_from_row(row: &PgRow) -> Result<ShortUrl> {
    Ok(ShortUrl {
        id: row.try_get("id").map_err(map_sqlx_error)?,
        url: row.try_get("url").map_err(map_sqlx_error)?,
        uid: row.try_get("uid").map_err(map_sqlx_error)?,
        deleted: row.try_get("deleted").map_err(map_sqlx_error)?,
    })
}

/// Inserts one record, falling back to the stored id when its URL is known.
async fn insert_or_resolve(
    tx: &mut Transaction<'_, Postgres>,
    record: &ShortUrl,
) -> Result<ShortUrl> {
    let inserted: Option<String> = sqlx::query_scalar(
        r#"
        INSERT INTO urls (id, url, uid, deleted)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT DO NOTHING
        RETURNING id
        "#,
    )
    .bind(&record.id)
    .bind(&record.url)
    .bind(&record.uid)
    .bind(record.deleted)
    .fetch_optional(&mut **tx)
    .await
    .map_err(map_sqlx_error)?;

    let id = match inserted {
        Some(id) => id,
        None => {
            let existing: Option<String> =
                sqlx::query_scalar("SELECT id FROM urls WHERE url = $1")
                    .bind(&record.url)
                    .fetch_optional(&mut **tx)
                    .await
                    .map_err(map_sqlx_error)?;

            // Nothing stored under this URL: the conflict was on the id.
            existing.ok_or_else(|| StorageError::Conflict(record.id.clone()))?
        }
    };

    Ok(ShortUrl {
        id,
        ..record.clone()
    })
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn add(&self, batch: &[ShortUrl]) -> Result<Vec<ShortUrl>> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let mut stored = Vec::with_capacity(batch.len());
        for record in batch {
            match insert_or_resolve(&mut tx, record).await {
                Ok(record) => stored.push(record),
                Err(err) => {
                    error!(id = %record.id, error = %err, "insert failed, rolling back batch");
                    if let Err(rollback) = tx.rollback().await {
                        error!(error = %rollback, "unable to roll back");
                    }
                    return Err(err);
                }
            }
        }

        tx.commit().await.map_err(|err| {
            error!(error = %err, "unable to commit");
            map_sqlx_error(err)
        })?;

        debug!(count = stored.len(), "stored records in postgres");
        Ok(stored)
    }

    async fn get(&self, id: &str) -> Result<ShortUrl> {
        let row = sqlx::query("SELECT id, url, uid, deleted FROM urls WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        match row {
            Some(row) => record_from_row(&row),
            None => Err(StorageError::UrlNotFound(id.to_string())),
        }
    }

    async fn get_all(&self, uid: &str) -> Result<Vec<ShortUrl>> {
        let rows = sqlx::query("SELECT id, url, uid, deleted FROM urls WHERE uid = $1")
            .bind(uid)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        rows.iter().map(record_from_row).collect()
    }

    async fn has(&self, id: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM urls WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(count != 0)
    }

    async fn delete(&self, batch: &[ShortUrl]) -> Result<()> {
        let Some(first) = batch.first() else {
            return Ok(());
        };

        // One deletion request always comes from one owner.
        let ids: Vec<String> = batch.iter().map(|record| record.id.clone()).collect();

        let result = sqlx::query("UPDATE urls SET deleted = TRUE WHERE uid = $1 AND id = ANY($2)")
            .bind(&first.uid)
            .bind(&ids)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        debug!(
            requested = ids.len(),
            affected = result.rows_affected(),
            "soft-deleted records in postgres"
        );
        Ok(())
    }

    async fn stats(&self) -> Result<Stats> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS urls, COUNT(DISTINCT uid) AS users FROM urls WHERE NOT deleted",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let urls: i64 = row.try_get("urls").map_err(map_sqlx_error)?;
        let users: i64 = row.try_get("users").map_err(map_sqlx_error)?;

        Ok(Stats {
            urls: urls.max(0) as u64,
            users: users.max(0) as u64,
        })
    }

    async fn ping(&self) -> bool {
        match self.pool.acquire().await {
            Ok(mut conn) => conn.ping().await.is_ok(),
            Err(_) => false,
        }
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("UPDATE urls SET deleted = TRUE")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}
