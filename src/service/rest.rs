//! Supabase-compatible REST backend.
//!
//! Records go through the PostgREST interface under `/rest/v1`, blobs
//! through the storage interface under `/storage/v1`.

use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde::Deserialize;

use super::{DataService, Result, ServiceError};
use crate::config::ServiceConfig;
use crate::constants::{FEEDBACKS_TABLE, LOCATIONS_TABLE, LOW_RATING_THRESHOLD, MEDIA_BUCKET};
use crate::model::{
    FeedbackCategory, FeedbackQuery, FeedbackSummary, FeedbackWithLocation, Location, NewFeedback,
};

/// Embedded join returning the location display fields with each feedback row
const FEEDBACK_SELECT: &str = "*,toilets(name,location,building,floor)";

pub struct RestDataService {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct InsertedRow {
    id: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SummaryRow {
    cleanliness_rating: u8,
    water_available: bool,
    soap_available: bool,
}

impl RestDataService {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let base_url = config.url.trim_end_matches('/').to_string();
        url::Url::parse(&base_url)
            .map_err(|e| ServiceError::Config(format!("invalid URL '{}': {}", base_url, e)))?;

        let key = HeaderValue::from_str(&config.anon_key)
            .map_err(|e| ServiceError::Config(format!("invalid key: {}", e)))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", config.anon_key))
            .map_err(|e| ServiceError::Config(format!("invalid key: {}", e)))?;

        let mut headers = HeaderMap::new();
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);

        // No timeout: a hung call leaves the caller pending
        let client = Client::builder().default_headers(headers).build()?;

        Ok(Self { client, base_url })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn object_url(&self, object_path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            MEDIA_BUCKET,
            encode_path(object_path)
        )
    }

    /// Public URL of an uploaded object
    pub fn public_object_url(&self, object_path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            MEDIA_BUCKET,
            encode_path(object_path)
        )
    }
}

fn encode_path(object_path: &str) -> String {
    object_path
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Quote a value for use inside a PostgREST logic tree such as `or=(...)`
fn quote_filter_value(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

/// Escape LIKE metacharacters so `term` matches literally under `ilike`.
///
/// PostgREST turns every `*` into `%` before the backslash escapes are seen,
/// so a literal `*` cannot be expressed; it becomes the single-character
/// wildcard and the exact match is settled by [`FeedbackQuery::matches_search`].
fn ilike_literal(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        match c {
            '\\' | '%' | '_' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '*' => escaped.push('_'),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Query parameters selecting the dashboard rows for `query`
pub fn list_params(query: &FeedbackQuery) -> Vec<(String, String)> {
    let mut params = vec![
        ("select".to_string(), FEEDBACK_SELECT.to_string()),
        ("order".to_string(), "created_at.desc".to_string()),
    ];

    match query.category {
        FeedbackCategory::All => {}
        FeedbackCategory::LowRating => params.push((
            "cleanliness_rating".to_string(),
            format!("lte.{}", LOW_RATING_THRESHOLD),
        )),
        FeedbackCategory::NoWater => {
            params.push(("water_available".to_string(), "is.false".to_string()))
        }
        FeedbackCategory::NoSoap => {
            params.push(("soap_available".to_string(), "is.false".to_string()))
        }
    }

    if let Some(term) = &query.search {
        let pattern = quote_filter_value(&format!("*{}*", ilike_literal(term)));
        params.push((
            "or".to_string(),
            format!("(toilet_id.ilike.{},comments.ilike.{})", pattern, pattern),
        ));
    }

    params
}

/// Turn a non-success response into a `ServiceError::Status` carrying the service's message
async fn check_status(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Err(ServiceError::Status {
        status,
        message: error_message(&body),
    })
}

/// Pull the human-readable message out of an error body, falling back to the raw text
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "error_description", "error", "msg"]
                .iter()
                .find_map(|key| value.get(key).and_then(|m| m.as_str()).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[async_trait]
impl DataService for RestDataService {
    async fn find_location(&self, id: &str) -> Result<Option<Location>> {
        let response = self
            .client
            .get(self.table_url(LOCATIONS_TABLE))
            .query(&[("select", "*".to_string()), ("id", format!("eq.{}", id))])
            .send()
            .await?;
        let rows: Vec<Location> = check_status(response).await?.json().await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_feedback(&self, feedback: &NewFeedback) -> Result<String> {
        let response = self
            .client
            .post(self.table_url(FEEDBACKS_TABLE))
            .header("Prefer", "return=representation")
            .json(&[feedback])
            .send()
            .await?;
        let rows: Vec<InsertedRow> = check_status(response).await?.json().await?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::Decode("insert returned no rows".to_string()))?;

        let id = match row.id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        debug!("Inserted feedback {} for {}", id, feedback.location_id);
        Ok(id)
    }

    async fn list_feedback(&self, query: &FeedbackQuery) -> Result<Vec<FeedbackWithLocation>> {
        let response = self
            .client
            .get(self.table_url(FEEDBACKS_TABLE))
            .query(&list_params(query))
            .send()
            .await?;
        let rows: Vec<FeedbackWithLocation> = check_status(response).await?.json().await?;
        // ilike folds case by the database's rules; keep the same result as the local backend
        Ok(rows
            .into_iter()
            .filter(|row| {
                query.matches_search(&row.feedback.location_id, row.feedback.comments.as_deref())
            })
            .collect())
    }

    async fn feedback_summary(&self) -> Result<FeedbackSummary> {
        let response = self
            .client
            .get(self.table_url(FEEDBACKS_TABLE))
            .query(&[(
                "select",
                "cleanliness_rating,water_available,soap_available",
            )])
            .send()
            .await?;
        let rows: Vec<SummaryRow> = check_status(response).await?.json().await?;

        let mut summary = FeedbackSummary::default();
        for row in rows {
            summary.add(row.cleanliness_rating, row.water_available, row.soap_available);
        }
        Ok(summary)
    }

    async fn upload_media(
        &self,
        object_path: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<String> {
        let size = data.len();
        let response = self
            .client
            .post(self.object_url(object_path))
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(data)
            .send()
            .await?;
        check_status(response).await?;
        debug!("Uploaded {} ({} bytes)", object_path, size);
        Ok(self.public_object_url(object_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> RestDataService {
        RestDataService::new(&ServiceConfig {
            url: "https://abc.supabase.co/".to_string(),
            anon_key: "anon".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_public_url_encodes_segments() {
        let url = service().public_object_url("feedback-photos/toilet_1/1700000000000-ab12cd34.jpg");
        assert_eq!(
            url,
            "https://abc.supabase.co/storage/v1/object/public/feedback-media/feedback-photos/toilet_1/1700000000000-ab12cd34.jpg"
        );
        assert!(service()
            .public_object_url("feedback-photos/a b/x.jpg")
            .ends_with("feedback-photos/a%20b/x.jpg"));
    }

    #[test]
    fn test_list_params_for_category_and_search() {
        let params = list_params(&FeedbackQuery::new(
            FeedbackCategory::LowRating,
            Some("no \"soap\""),
        ));
        assert!(params.contains(&("cleanliness_rating".to_string(), "lte.2".to_string())));
        assert!(params.contains(&(
            "or".to_string(),
            r#"(toilet_id.ilike."*no \"soap\"*",comments.ilike."*no \"soap\"*")"#.to_string()
        )));

        let params = list_params(&FeedbackQuery::default());
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_list_params_escape_like_wildcards() {
        let params = list_params(&FeedbackQuery::new(
            FeedbackCategory::All,
            Some("toilet_1 50%"),
        ));
        // backslashes are doubled once more by the quoting inside or=(...)
        assert!(params.contains(&(
            "or".to_string(),
            r#"(toilet_id.ilike."*toilet\\_1 50\\%*",comments.ilike."*toilet\\_1 50\\%*")"#.to_string()
        )));

        assert_eq!(ilike_literal(r"a\b*c"), r"a\\b_c");
        assert_eq!(ilike_literal("plain"), "plain");
    }

    #[test]
    fn test_error_message_prefers_json_message() {
        assert_eq!(
            error_message(r#"{"code":"42501","message":"permission denied for table feedbacks"}"#),
            "permission denied for table feedbacks"
        );
        assert_eq!(error_message("Bad Gateway\n"), "Bad Gateway");
    }

    #[test]
    fn test_rejects_unparseable_url() {
        let result = RestDataService::new(&ServiceConfig {
            url: "not a url".to_string(),
            anon_key: "anon".to_string(),
        });
        assert!(matches!(result, Err(ServiceError::Config(_))));
    }
}
