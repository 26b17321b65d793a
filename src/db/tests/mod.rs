use crate::types::{ArticleRecord, PublicationId};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;


fn nyt() -> PublicationId {
    PublicationId::new("The New York Times")
}

fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

fn article(source_id: &str, published_at: DateTime<Utc>) -> ArticleRecord {
    ArticleRecord {
        publication_id: nyt(),
        source_id: source_id.to_string(),
        headline: format!("Headline {source_id}"),
        published_at,
        section: Some("World".to_string()),
        news_desk: Some("Foreign".to_string()),
        author: Some("Jane Doe".to_string()),
        web_url: Some(format!("https://www.nytimes.com/{source_id}.html")),
        raw_payload: json!({ "_id": source_id }),
    }
}
