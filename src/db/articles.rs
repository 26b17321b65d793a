//! Deduplicating article writes and article lookups.

use crate::error::PersistenceError;
use crate::types::{ArticleRecord, PublicationId, WindowId};
use crate::{Error, Result};
use chrono::{DateTime, Utc};

use super::{Database, StoredArticle};

// SQLite default SQLITE_MAX_VARIABLE_NUMBER is 999.
// Each article uses 12 bind variables, so max 83 articles per INSERT.
const MAX_ARTICLES_PER_BATCH: usize = 80;

const ARTICLE_COLUMNS: &str = r#"
    id, publication_id, source_id, window_id, headline, published_at,
    section, news_desk, author, web_url, raw_payload, ingested_at
"#;

impl Database {
    /// Insert articles, ignoring any whose (publication_id, source_id) already exists
    ///
    /// The whole batch is written in one transaction and chunked to stay within
    /// SQLite's bind variable limit. Returns the number of rows actually inserted,
    /// so re-writing a page that is already stored returns 0.
    pub async fn insert_articles(
        &self,
        window_id: Option<&WindowId>,
        records: &[ArticleRecord],
    ) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }

        let now = Utc::now().timestamp();
        let window_id = window_id.map(WindowId::as_str);

        let rows = records
            .iter()
            .map(|record| Ok((record, serde_json::to_string(&record.raw_payload)?)))
            .collect::<Result<Vec<_>>>()?;

        let mut tx = self.pool.begin().await.map_err(|e| {
            Error::Persistence(PersistenceError::QueryFailed(format!(
                "Failed to begin article transaction: {}",
                e
            )))
        })?;

        let mut inserted = 0u64;
        for chunk in rows.chunks(MAX_ARTICLES_PER_BATCH) {
            let mut query_builder = sqlx::QueryBuilder::new(
                "INSERT INTO articles (publication_id, source_id, window_id, headline, published_at, \
                 section, news_desk, author, web_url, raw_payload, ingested_at) ",
            );

            query_builder.push_values(chunk, |mut b, (record, payload)| {
                b.push_bind(record.publication_id.as_str())
                    .push_bind(record.source_id.as_str())
                    .push_bind(window_id)
                    .push_bind(record.headline.as_str())
                    .push_bind(record.published_at.timestamp())
                    .push_bind(record.section.as_deref())
                    .push_bind(record.news_desk.as_deref())
                    .push_bind(record.author.as_deref())
                    .push_bind(record.web_url.as_deref())
                    .push_bind(payload.as_str())
                    .push_bind(now);
            });
            query_builder.push(" ON CONFLICT(publication_id, source_id) DO NOTHING");

            let result = query_builder
                .build()
                .execute(&mut *tx)
                .await
                .map_err(|e| write_error("insert articles batch", e))?;
            inserted += result.rows_affected();
        }

        tx.commit().await.map_err(|e| {
            Error::Persistence(PersistenceError::QueryFailed(format!(
                "Failed to commit article transaction: {}",
                e
            )))
        })?;

        Ok(inserted)
    }

    /// Count stored articles, optionally for a single publication
    pub async fn count_articles(&self, publication: Option<&PublicationId>) -> Result<u64> {
        let count: i64 = match publication {
            Some(publication) => {
                sqlx::query_scalar("SELECT COUNT(*) FROM articles WHERE publication_id = ?")
                    .bind(publication.as_str())
                    .fetch_one(&self.pool)
                    .await
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM articles")
                    .fetch_one(&self.pool)
                    .await
            }
        }
        .map_err(|e| {
            Error::Persistence(PersistenceError::QueryFailed(format!(
                "Failed to count articles: {}",
                e
            )))
        })?;

        Ok(count.max(0) as u64)
    }

    /// Get an article by its identity key
    pub async fn get_article(
        &self,
        publication: &PublicationId,
        source_id: &str,
    ) -> Result<Option<ArticleRecord>> {
        let row = sqlx::query_as::<_, StoredArticle>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE publication_id = ? AND source_id = ?"
        ))
        .bind(publication.as_str())
        .bind(source_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Persistence(PersistenceError::QueryFailed(format!(
                "Failed to get article: {}",
                e
            )))
        })?;

        row.map(ArticleRecord::try_from).transpose()
    }

    /// Articles published in `[from, to)`, oldest first
    pub async fn articles_between(
        &self,
        publication: &PublicationId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<ArticleRecord>> {
        let rows = sqlx::query_as::<_, StoredArticle>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles \
             WHERE publication_id = ? AND published_at >= ? AND published_at < ? \
             ORDER BY published_at ASC, id ASC"
        ))
        .bind(publication.as_str())
        .bind(from.timestamp())
        .bind(to.timestamp())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Persistence(PersistenceError::QueryFailed(format!(
                "Failed to list articles: {}",
                e
            )))
        })?;

        rows.into_iter().map(ArticleRecord::try_from).collect()
    }

    /// Raw stored rows for a window, in insertion order
    pub async fn articles_for_window(&self, window_id: &WindowId) -> Result<Vec<StoredArticle>> {
        sqlx::query_as::<_, StoredArticle>(&format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles WHERE window_id = ? ORDER BY id ASC"
        ))
        .bind(window_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Persistence(PersistenceError::QueryFailed(format!(
                "Failed to list window articles: {}",
                e
            )))
        })
    }
}

/// Map a write failure, separating constraint violations from other query errors
fn write_error(action: &str, e: sqlx::Error) -> Error {
    let is_constraint = e
        .as_database_error()
        .is_some_and(|db| !matches!(db.kind(), sqlx::error::ErrorKind::Other));

    let message = format!("Failed to {}: {}", action, e);
    if is_constraint {
        Error::Persistence(PersistenceError::ConstraintViolation(message))
    } else {
        Error::Persistence(PersistenceError::QueryFailed(message))
    }
}
