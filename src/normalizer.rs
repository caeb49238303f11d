use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::warn;
use url::Url;

use crate::config::{Category, FeedSource};

/// Provider order is trusted; only the newest items per source are kept.
const MAX_ITEMS_PER_SOURCE: usize = 10;
const EXCERPT_WORD_LIMIT: usize = 50;

/// Placeholder link for items carrying neither a link nor a guid.
const LINK_PLACEHOLDER: &str = "#";

const FAVICON_TEMPLATE: &str =
    "https://t1.gstatic.com/faviconV2?client=SOCIAL&type=FAVICON&fallback_opts=TYPE,SIZE,URL&url=";

/// One canonical article. Built fresh on every aggregation cycle and
/// replaced wholesale on refetch, never mutated in place.
#[derive(Debug, Clone)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub link: String,
    pub published: DateTime<Utc>,
    pub excerpt: String,
    pub feed_name: String,
    pub favicon_url: String,
    pub category: Category,
}

/// Response shape of the RSS-to-JSON conversion API.
#[derive(Debug, Deserialize)]
pub struct FeedPayload {
    #[serde(default)]
    pub status: String,
    pub message: Option<String>,
    pub feed: Option<FeedMeta>,
    pub items: Option<Vec<RawItem>>,
}

#[derive(Debug, Deserialize)]
pub struct FeedMeta {
    pub link: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RawItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub guid: Option<String>,
    #[serde(rename = "pubDate")]
    pub pub_date: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
}

/// Convert one provider payload into canonical articles for its source.
///
/// A payload without an "ok" status or without items yields an empty list.
/// Individual items are never dropped: missing fields are defaulted and a
/// failed favicon derivation only degrades the item.
pub fn normalize(payload: &FeedPayload, source: &FeedSource) -> Vec<Article> {
    if payload.status != "ok" {
        warn!(
            "Invalid response for feed '{}': {}",
            source.name,
            payload.message.as_deref().unwrap_or("status not ok")
        );
        return Vec::new();
    }

    let Some(items) = &payload.items else {
        warn!("No items in response for feed '{}'", source.name);
        return Vec::new();
    };

    let feed_link = payload.feed.as_ref().and_then(|f| f.link.as_deref());

    items
        .iter()
        .take(MAX_ITEMS_PER_SOURCE)
        .map(|item| normalize_item(item, feed_link, source))
        .collect()
}

fn normalize_item(item: &RawItem, feed_link: Option<&str>, source: &FeedSource) -> Article {
    let link = item
        .link
        .as_deref()
        .filter(|l| !l.is_empty())
        .or(item.guid.as_deref().filter(|g| !g.is_empty()))
        .unwrap_or(LINK_PLACEHOLDER)
        .to_string();

    let published = parse_pub_date(item.pub_date.as_deref());

    let body = item
        .description
        .as_deref()
        .or(item.content.as_deref())
        .unwrap_or("");

    let origin_link = feed_link.unwrap_or(&link);
    let favicon_url = favicon_url(origin_link).unwrap_or_else(|| {
        warn!("Could not create favicon URL for link: {}", link);
        String::new()
    });

    Article {
        id: article_id(&link, published),
        title: item
            .title
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| "No title".to_string()),
        link,
        published,
        excerpt: make_excerpt(body, EXCERPT_WORD_LIMIT),
        feed_name: source.name.clone(),
        favicon_url,
        category: source.category,
    }
}

/// Identifiers are derived, not random: two items with the same link and
/// timestamp collide. Provider data is assumed unique in practice.
pub fn article_id(link: &str, published: DateTime<Utc>) -> String {
    format!("{}{}", link, published.to_rfc3339())
}

/// Parse the provider's date string, falling back to the current time when
/// it is absent or unparseable.
pub fn parse_pub_date(raw: Option<&str>) -> DateTime<Utc> {
    let Some(raw) = raw else {
        return Utc::now();
    };
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return dt.with_timezone(&Utc);
    }
    // rss2json's own format, no zone marker, taken as UTC
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return naive.and_utc();
    }

    Utc::now()
}

/// Strip HTML tags, collapse whitespace, and cap at `word_limit` words with
/// a trailing ellipsis iff the text was truncated.
pub fn make_excerpt(html: &str, word_limit: usize) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() > word_limit {
        format!("{}...", words[..word_limit].join(" "))
    } else {
        words.join(" ")
    }
}

/// Synthesize a favicon lookup URL from the origin of `origin_link`.
/// Returns None when no usable origin can be derived.
pub fn favicon_url(origin_link: &str) -> Option<String> {
    if origin_link.is_empty() || origin_link == LINK_PLACEHOLDER {
        return None;
    }
    let parsed = Url::parse(origin_link).ok()?;
    let origin = parsed.origin();
    if !origin.is_tuple() {
        return None;
    }
    Some(format!(
        "{}{}&size=32",
        FAVICON_TEMPLATE,
        origin.ascii_serialization()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn test_source() -> FeedSource {
        FeedSource {
            name: "Garden Therapy".to_string(),
            url: "https://gardentherapy.ca/feed/".to_string(),
            category: Category::GardeningTips,
        }
    }

    fn payload_with_items(items: Vec<RawItem>) -> FeedPayload {
        FeedPayload {
            status: "ok".to_string(),
            message: None,
            feed: Some(FeedMeta {
                link: Some("https://gardentherapy.ca".to_string()),
            }),
            items: Some(items),
        }
    }

    fn item(link: Option<&str>, guid: Option<&str>) -> RawItem {
        RawItem {
            title: Some("A Post".to_string()),
            link: link.map(String::from),
            guid: guid.map(String::from),
            pub_date: Some("2024-12-09 12:00:00".to_string()),
            description: Some("Some description".to_string()),
            content: None,
        }
    }

    mod status_tests {
        use super::*;

        #[test]
        fn test_non_ok_status_yields_empty() {
            let payload = FeedPayload {
                status: "error".to_string(),
                message: Some("feed unreachable".to_string()),
                feed: None,
                items: Some(vec![item(Some("https://a.com/1"), None)]),
            };

            let articles = normalize(&payload, &test_source());
            assert!(articles.is_empty());
        }

        #[test]
        fn test_missing_items_yields_empty() {
            let payload = FeedPayload {
                status: "ok".to_string(),
                message: None,
                feed: None,
                items: None,
            };

            let articles = normalize(&payload, &test_source());
            assert!(articles.is_empty());
        }

        #[test]
        fn test_missing_status_field_yields_empty() {
            // serde default gives an empty status string
            let payload: FeedPayload = serde_json::from_str("{\"items\": []}").unwrap();
            let articles = normalize(&payload, &test_source());
            assert!(articles.is_empty());
        }
    }

    mod item_mapping_tests {
        use super::*;

        #[test]
        fn test_caps_at_ten_items() {
            let items: Vec<RawItem> = (0..15)
                .map(|i| item(Some(&format!("https://a.com/{}", i)), None))
                .collect();
            let payload = payload_with_items(items);

            let articles = normalize(&payload, &test_source());
            assert_eq!(articles.len(), 10);
            // Provider order preserved
            assert_eq!(articles[0].link, "https://a.com/0");
            assert_eq!(articles[9].link, "https://a.com/9");
        }

        #[test]
        fn test_link_fallback_to_guid() {
            let payload = payload_with_items(vec![item(None, Some("https://a.com/guid-1"))]);

            let articles = normalize(&payload, &test_source());
            assert_eq!(articles[0].link, "https://a.com/guid-1");
        }

        #[test]
        fn test_link_fallback_to_placeholder() {
            let payload = payload_with_items(vec![item(None, None)]);

            let articles = normalize(&payload, &test_source());
            assert_eq!(articles[0].link, "#");
        }

        #[test]
        fn test_empty_link_treated_as_missing() {
            let payload = payload_with_items(vec![item(Some(""), Some("https://a.com/guid"))]);

            let articles = normalize(&payload, &test_source());
            assert_eq!(articles[0].link, "https://a.com/guid");
        }

        #[test]
        fn test_id_is_link_plus_timestamp() {
            let payload = payload_with_items(vec![item(Some("https://a.com/1"), None)]);

            let articles = normalize(&payload, &test_source());
            let expected_ts = Utc.with_ymd_and_hms(2024, 12, 9, 12, 0, 0).unwrap();
            assert_eq!(
                articles[0].id,
                format!("https://a.com/1{}", expected_ts.to_rfc3339())
            );
        }

        #[test]
        fn test_missing_title_defaults() {
            let mut raw = item(Some("https://a.com/1"), None);
            raw.title = None;
            let payload = payload_with_items(vec![raw]);

            let articles = normalize(&payload, &test_source());
            assert_eq!(articles[0].title, "No title");
        }

        #[test]
        fn test_excerpt_falls_back_to_content_field() {
            let mut raw = item(Some("https://a.com/1"), None);
            raw.description = None;
            raw.content = Some("<p>from content</p>".to_string());
            let payload = payload_with_items(vec![raw]);

            let articles = normalize(&payload, &test_source());
            assert_eq!(articles[0].excerpt, "from content");
        }

        #[test]
        fn test_category_inherited_from_source() {
            let payload = payload_with_items(vec![item(Some("https://a.com/1"), None)]);

            let articles = normalize(&payload, &test_source());
            assert_eq!(articles[0].category, Category::GardeningTips);
            assert_eq!(articles[0].feed_name, "Garden Therapy");
        }

        #[test]
        fn test_malformed_item_is_kept_not_dropped() {
            let payload = payload_with_items(vec![RawItem::default()]);

            let articles = normalize(&payload, &test_source());
            assert_eq!(articles.len(), 1);
            assert_eq!(articles[0].link, "#");
            assert_eq!(articles[0].title, "No title");
            assert_eq!(articles[0].excerpt, "");
        }
    }

    mod pub_date_tests {
        use super::*;

        #[test]
        fn test_parse_provider_format() {
            let dt = parse_pub_date(Some("2024-12-09 12:30:00"));
            assert_eq!(dt, Utc.with_ymd_and_hms(2024, 12, 9, 12, 30, 0).unwrap());
        }

        #[test]
        fn test_parse_rfc3339() {
            let dt = parse_pub_date(Some("2024-12-09T12:30:00+02:00"));
            assert_eq!(dt, Utc.with_ymd_and_hms(2024, 12, 9, 10, 30, 0).unwrap());
        }

        #[test]
        fn test_parse_rfc2822() {
            let dt = parse_pub_date(Some("Mon, 09 Dec 2024 12:00:00 GMT"));
            assert_eq!(dt, Utc.with_ymd_and_hms(2024, 12, 9, 12, 0, 0).unwrap());
        }

        #[test]
        fn test_unparseable_date_substitutes_now() {
            let before = Utc::now();
            let dt = parse_pub_date(Some("not a date"));
            let after = Utc::now();
            assert!(dt >= before && dt <= after);
        }

        #[test]
        fn test_missing_date_substitutes_now() {
            let before = Utc::now();
            let dt = parse_pub_date(None);
            let after = Utc::now();
            assert!(dt >= before && dt <= after);
        }
    }

    mod excerpt_tests {
        use super::*;

        #[test]
        fn test_strips_html_tags() {
            let excerpt = make_excerpt("<p>Hello <b>world</b></p>", 50);
            assert_eq!(excerpt, "Hello world");
        }

        #[test]
        fn test_collapses_whitespace() {
            let excerpt = make_excerpt("too   much\n\n  space", 50);
            assert_eq!(excerpt, "too much space");
        }

        #[test]
        fn test_truncates_with_ellipsis() {
            let text = (1..=60)
                .map(|i| format!("w{}", i))
                .collect::<Vec<_>>()
                .join(" ");
            let excerpt = make_excerpt(&text, 50);

            assert!(excerpt.ends_with("..."));
            let words: Vec<&str> = excerpt.trim_end_matches("...").split_whitespace().collect();
            assert_eq!(words.len(), 50);
            assert_eq!(words[49], "w50");
        }

        #[test]
        fn test_no_ellipsis_when_under_limit() {
            let excerpt = make_excerpt("short text here", 50);
            assert_eq!(excerpt, "short text here");
        }

        #[test]
        fn test_exactly_at_limit_not_truncated() {
            let text = (1..=50)
                .map(|i| format!("w{}", i))
                .collect::<Vec<_>>()
                .join(" ");
            let excerpt = make_excerpt(&text, 50);
            assert!(!excerpt.ends_with("..."));
        }

        #[test]
        fn test_empty_input() {
            assert_eq!(make_excerpt("", 50), "");
        }

        #[test]
        fn test_tag_only_input() {
            assert_eq!(make_excerpt("<br/><img src=\"x.png\">", 50), "");
        }
    }

    mod favicon_tests {
        use super::*;

        #[test]
        fn test_favicon_from_origin() {
            let url = favicon_url("https://gardentherapy.ca/some/post").unwrap();
            assert!(url.starts_with("https://t1.gstatic.com/faviconV2?"));
            assert!(url.contains("url=https://gardentherapy.ca&size=32"));
        }

        #[test]
        fn test_favicon_rejects_placeholder() {
            assert_eq!(favicon_url("#"), None);
        }

        #[test]
        fn test_favicon_rejects_unparseable() {
            assert_eq!(favicon_url("not a url"), None);
        }

        #[test]
        fn test_favicon_rejects_opaque_origin() {
            assert_eq!(favicon_url("data:text/plain,hello"), None);
        }

        #[test]
        fn test_item_link_used_when_feed_link_absent() {
            let payload = FeedPayload {
                status: "ok".to_string(),
                message: None,
                feed: None,
                items: Some(vec![item(Some("https://blog.example.com/post/1"), None)]),
            };

            let articles = normalize(&payload, &test_source());
            assert!(articles[0].favicon_url.contains("url=https://blog.example.com"));
        }

        #[test]
        fn test_unparseable_origin_degrades_item() {
            let payload = FeedPayload {
                status: "ok".to_string(),
                message: None,
                feed: None,
                items: Some(vec![item(None, None)]),
            };

            let articles = normalize(&payload, &test_source());
            assert_eq!(articles.len(), 1);
            assert_eq!(articles[0].favicon_url, "");
        }
    }
}
