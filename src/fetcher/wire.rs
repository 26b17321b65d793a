//! JSON shapes of the article search API and their mapping onto domain records.

use crate::types::{ArticleRecord, Cursor, PublicationId};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

/// Top-level search response
#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    pub(crate) response: SearchBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchBody {
    #[serde(default)]
    pub(crate) docs: Vec<serde_json::Value>,
    #[serde(default)]
    pub(crate) meta: Option<SearchMeta>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchMeta {
    pub(crate) hits: u64,
    #[serde(default)]
    pub(crate) offset: u64,
}

/// Fields read from a single search document
#[derive(Debug, Deserialize)]
struct Doc {
    #[serde(rename = "_id")]
    id: Option<String>,
    headline: Option<Headline>,
    pub_date: Option<String>,
    section_name: Option<String>,
    news_desk: Option<String>,
    byline: Option<Byline>,
    web_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Headline {
    main: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Byline {
    original: Option<String>,
}

/// Records extracted from one response page
#[derive(Debug)]
pub(crate) struct DecodedPage {
    pub(crate) records: Vec<ArticleRecord>,
    pub(crate) next_cursor: Option<Cursor>,
    pub(crate) skipped: usize,
}

/// Turn a parsed response into records plus the cursor of the following page
pub(crate) fn decode_page(
    publication: &PublicationId,
    cursor: Cursor,
    response: SearchResponse,
    max_pages: u32,
) -> DecodedPage {
    let SearchBody { docs, meta } = response.response;
    let returned = docs.len() as u64;

    let mut records = Vec::with_capacity(docs.len());
    let mut skipped = 0;
    for raw in docs {
        match to_record(publication, raw) {
            Ok(record) => records.push(record),
            Err(reason) => {
                skipped += 1;
                tracing::warn!(cursor = %cursor, reason = %reason, "Skipping malformed document");
            }
        }
    }

    let more_available = match meta {
        Some(meta) => meta.offset + returned < meta.hits,
        None => false,
    };
    let next = cursor.next();
    let next_cursor = if returned == 0 || !more_available {
        None
    } else if next.get() >= max_pages || next == cursor {
        tracing::warn!(
            cursor = %cursor,
            max_pages = max_pages,
            "Window has more results than the API will page through; narrow the window span"
        );
        None
    } else {
        Some(next)
    };

    DecodedPage {
        records,
        next_cursor,
        skipped,
    }
}

fn to_record(
    publication: &PublicationId,
    raw: serde_json::Value,
) -> Result<ArticleRecord, String> {
    let doc: Doc = serde_json::from_value(raw.clone()).map_err(|e| e.to_string())?;

    let source_id = non_empty(doc.id).ok_or("missing _id")?;
    let headline = doc
        .headline
        .and_then(|h| non_empty(h.main))
        .ok_or("missing headline.main")?;
    let pub_date = doc.pub_date.ok_or("missing pub_date")?;
    let published_at =
        parse_pub_date(&pub_date).ok_or_else(|| format!("unparseable pub_date {pub_date:?}"))?;

    Ok(ArticleRecord {
        publication_id: publication.clone(),
        source_id,
        headline,
        published_at,
        section: non_empty(doc.section_name),
        news_desk: non_empty(doc.news_desk),
        author: doc.byline.and_then(|b| b.original).and_then(normalize_byline),
        web_url: non_empty(doc.web_url),
        raw_payload: raw,
    })
}

/// Parse `pub_date`, which the API emits as RFC 3339 or with a `+0000` offset
pub(crate) fn parse_pub_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Strip the "By " prefix from a byline, e.g. "By Jane Doe and John Roe"
pub(crate) fn normalize_byline(byline: String) -> Option<String> {
    let trimmed = byline.trim_start();
    let stripped = trimmed
        .strip_prefix("By ")
        .or_else(|| trimmed.strip_prefix("BY "))
        .or_else(|| trimmed.strip_prefix("by "))
        .unwrap_or(trimmed)
        .trim();
    if stripped.is_empty() {
        None
    } else {
        Some(stripped.to_string())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
