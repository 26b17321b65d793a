//! Read-only aggregates over persisted articles for trend analysis.

use crate::error::PersistenceError;
use crate::types::PublicationId;
use crate::{Error, Result};
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

use super::Database;

/// Number of articles published on one UTC day
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    /// Calendar day (UTC)
    pub day: NaiveDate,
    /// Articles published that day
    pub articles: u64,
}

/// Article attribute to group by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facet {
    /// `section_name`
    Section,
    /// `news_desk`
    NewsDesk,
    /// Normalized byline
    Author,
}

impl Facet {
    fn column(self) -> &'static str {
        match self {
            Facet::Section => "section",
            Facet::NewsDesk => "news_desk",
            Facet::Author => "author",
        }
    }
}

/// Number of articles sharing one facet value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetCount {
    /// Facet value, e.g. a section name
    pub value: String,
    /// Articles with that value
    pub articles: u64,
}

impl Database {
    /// Articles per day for `[from, to]` inclusive; days without articles are omitted
    pub async fn daily_headline_counts(
        &self,
        publication: &PublicationId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailyCount>> {
        let (start, end) = day_bounds(from, to);

        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT date(published_at, 'unixepoch') AS day, COUNT(*) AS articles
            FROM articles
            WHERE publication_id = ? AND published_at >= ? AND published_at < ?
            GROUP BY day
            ORDER BY day ASC
            "#,
        )
        .bind(publication.as_str())
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Persistence(PersistenceError::QueryFailed(format!(
                "Failed to count daily headlines: {}",
                e
            )))
        })?;

        rows.into_iter()
            .map(|(day, articles)| {
                let day = NaiveDate::parse_from_str(&day, "%Y-%m-%d").map_err(|e| {
                    Error::Persistence(PersistenceError::CorruptRecord(format!(
                        "invalid aggregate day {:?}: {}",
                        day, e
                    )))
                })?;
                Ok(DailyCount {
                    day,
                    articles: articles.max(0) as u64,
                })
            })
            .collect()
    }

    /// Most frequent facet values for `[from, to]` inclusive, largest first
    ///
    /// Articles without a value for the facet are not counted.
    pub async fn facet_counts(
        &self,
        publication: &PublicationId,
        facet: Facet,
        from: NaiveDate,
        to: NaiveDate,
        limit: u32,
    ) -> Result<Vec<FacetCount>> {
        let (start, end) = day_bounds(from, to);
        let column = facet.column();

        let rows: Vec<(String, i64)> = sqlx::query_as(&format!(
            "SELECT {column} AS value, COUNT(*) AS articles \
             FROM articles \
             WHERE publication_id = ? AND published_at >= ? AND published_at < ? \
               AND {column} IS NOT NULL \
             GROUP BY {column} \
             ORDER BY articles DESC, value ASC \
             LIMIT ?"
        ))
        .bind(publication.as_str())
        .bind(start)
        .bind(end)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Persistence(PersistenceError::QueryFailed(format!(
                "Failed to count articles by {}: {}",
                column, e
            )))
        })?;

        Ok(rows
            .into_iter()
            .map(|(value, articles)| FacetCount {
                value,
                articles: articles.max(0) as u64,
            })
            .collect())
    }
}

/// Unix-second bounds `[start of from, start of the day after to)`
fn day_bounds(from: NaiveDate, to: NaiveDate) -> (i64, i64) {
    let start = from.and_time(NaiveTime::MIN).and_utc().timestamp();
    let end = to
        .succ_opt()
        .map(|next| next.and_time(NaiveTime::MIN).and_utc().timestamp())
        .unwrap_or(i64::MAX);
    (start, end)
}
