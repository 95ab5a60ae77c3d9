use sqlx::types::Json;
use sqlx::{PgPool, Pool, Postgres, Transaction};

use archivist_core::dispatch::{claim_pending, release_claims};
use archivist_core::error::AppError;
use archivist_core::models::{Entry, Link};
use archivist_core::traits::EntryStore;

use crate::task_repository::link_index_param;

/// Repository for entries and their link archive state in PostgreSQL.
///
/// Claim and release run as row-locked read-modify-writes; archive results are
/// written with a single `jsonb_set` on one array element.
#[derive(Clone)]
pub struct EntryRepository {
    pool: Pool<Postgres>,
}

impl EntryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> Result<Transaction<'static, Postgres>, AppError> {
        self.pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))
    }

    /// Number of links on the entry, `None` when the entry does not exist.
    async fn link_count(&self, id: &str) -> Result<Option<i32>, AppError> {
        let row: Option<(i32,)> =
            sqlx::query_as(r#"SELECT jsonb_array_length(links) FROM entries WHERE id = $1"#)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        Ok(row.map(|(count,)| count))
    }
}

#[derive(sqlx::FromRow)]
struct EntryRow {
    id: String,
    title: String,
    links: Json<Vec<Link>>,
}

impl From<EntryRow> for Entry {
    fn from(row: EntryRow) -> Self {
        Entry {
            id: row.id,
            title: row.title,
            links: row.links.0,
        }
    }
}

async fn lock_links(
    tx: &mut Transaction<'static, Postgres>,
    entry_id: &str,
) -> Result<Option<Vec<Link>>, AppError> {
    let row: Option<(Json<Vec<Link>>,)> =
        sqlx::query_as(r#"SELECT links FROM entries WHERE id = $1 FOR UPDATE"#)
            .bind(entry_id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;
    Ok(row.map(|(links,)| links.0))
}

async fn store_links(
    tx: &mut Transaction<'static, Postgres>,
    entry_id: &str,
    links: &[Link],
) -> Result<(), AppError> {
    sqlx::query(r#"UPDATE entries SET links = $2, updated_at = NOW() WHERE id = $1"#)
        .bind(entry_id)
        .bind(Json(links))
        .execute(&mut **tx)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;
    Ok(())
}

async fn commit(tx: Transaction<'static, Postgres>) -> Result<(), AppError> {
    tx.commit()
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))
}

impl EntryStore for EntryRepository {
    async fn get_entry(&self, id: &str) -> Result<Option<Entry>, AppError> {
        let row = sqlx::query_as::<_, EntryRow>(r#"SELECT id, title, links FROM entries WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(row.map(Into::into))
    }

    async fn upsert_entry(&self, mut entry: Entry) -> Result<Entry, AppError> {
        let mut tx = self.begin().await?;

        if let Some(links) = lock_links(&mut tx, &entry.id).await? {
            let previous = Entry {
                id: entry.id.clone(),
                title: String::new(),
                links,
            };
            entry.merge_archive_state(&previous);
        }

        sqlx::query(
            r#"
            INSERT INTO entries (id, title, links)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
            SET title = EXCLUDED.title, links = EXCLUDED.links, updated_at = NOW()
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.title)
        .bind(Json(&entry.links))
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        commit(tx).await?;
        Ok(entry)
    }

    async fn claim_links(&self, entry_id: &str, indices: &[usize]) -> Result<Vec<usize>, AppError> {
        let mut tx = self.begin().await?;
        let mut links = lock_links(&mut tx, entry_id)
            .await?
            .ok_or_else(|| AppError::EntryNotFound(entry_id.to_string()))?;

        let claimed = claim_pending(&mut links, indices);
        if !claimed.is_empty() {
            store_links(&mut tx, entry_id, &links).await?;
        }
        commit(tx).await?;

        Ok(claimed)
    }

    async fn release_links(&self, entry_id: &str, indices: &[usize]) -> Result<(), AppError> {
        let mut tx = self.begin().await?;
        if let Some(mut links) = lock_links(&mut tx, entry_id).await? {
            release_claims(&mut links, indices);
            store_links(&mut tx, entry_id, &links).await?;
        }
        commit(tx).await
    }

    async fn set_link_archive(
        &self,
        entry_id: &str,
        link_index: usize,
        href: &str,
        archive_url: &str,
    ) -> Result<(), AppError> {
        let missing_link = || AppError::LinkNotFound {
            entry_id: entry_id.to_string(),
            link_index,
        };
        let index = link_index_param(link_index).map_err(|_| missing_link())?;

        let result = sqlx::query(
            r#"
            UPDATE entries
            SET links = jsonb_set(
                    links,
                    ARRAY[$2::text],
                    ((links -> $2::int) - 'archiveTaskQueued')
                        || jsonb_build_object('archiveHref', $3::text)
                ),
                updated_at = NOW()
            WHERE id = $1
              AND jsonb_array_length(links) > $2::int
              AND links -> $2::int ->> 'href' = $4
            "#,
        )
        .bind(entry_id)
        .bind(index)
        .bind(archive_url)
        .bind(href)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        if result.rows_affected() > 0 {
            return Ok(());
        }
        match self.link_count(entry_id).await? {
            None => Err(AppError::EntryNotFound(entry_id.to_string())),
            Some(count) if count <= index => Err(missing_link()),
            Some(_) => Err(AppError::LinkChanged {
                entry_id: entry_id.to_string(),
                link_index,
            }),
        }
    }
}
