//! Article Search response fixtures

use headline_ingest::{PublicationId, QueryWindow};
use chrono::NaiveDate;
use serde_json::{Value, json};

pub const SEARCH_PATH: &str = "/svc/search/v2/articlesearch.json";

pub fn nyt() -> PublicationId {
    PublicationId::new("The New York Times")
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// `begin_date` query value for a window
pub fn begin(window: &QueryWindow) -> String {
    window.start_date.format("%Y%m%d").to_string()
}

/// One search response page: `count` docs starting at `offset` out of `hits`
///
/// Doc ids are derived from the window start and position, so the same page
/// served twice carries the same ids.
pub fn search_page(window: &QueryWindow, offset: u64, count: u64, hits: u64) -> Value {
    let docs: Vec<Value> = (offset..offset + count)
        .map(|n| {
            json!({
                "_id": format!("nyt://article/{}-{n}", window.start_date),
                "headline": { "main": format!("Headline {} #{n}", window.start_date) },
                "pub_date": format!("{}T12:00:00+0000", window.start_date),
                "section_name": "World",
                "news_desk": "Foreign",
                "byline": { "original": "By A. Reporter" },
                "web_url": format!("https://www.nytimes.com/{}/{n}.html", window.start_date)
            })
        })
        .collect();

    json!({
        "status": "OK",
        "response": { "docs": docs, "meta": { "hits": hits, "offset": offset } }
    })
}
