use axum::{
    body::Bytes,
    extract::{Path, RawQuery, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use toilet_feedback::config::ServiceConfig;
use toilet_feedback::model::{FeedbackCategory, FeedbackQuery, NewFeedback};
use toilet_feedback::service::{DataService, RestDataService, ServiceError};

/// One request as seen by the mock service
#[derive(Debug, Clone)]
struct Captured {
    method: &'static str,
    path: String,
    query: Vec<(String, String)>,
    apikey: Option<String>,
    authorization: Option<String>,
    prefer: Option<String>,
    content_type: Option<String>,
    body: Vec<u8>,
}

type Log = Arc<Mutex<Vec<Captured>>>;

fn capture(method: &'static str, path: String, query: Option<String>, headers: &HeaderMap, body: &[u8]) -> Captured {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Captured {
        method,
        path,
        query: url::form_urlencoded::parse(query.unwrap_or_default().as_bytes())
            .into_owned()
            .collect(),
        apikey: header("apikey"),
        authorization: header("authorization"),
        prefer: header("prefer"),
        content_type: header("content-type"),
        body: body.to_vec(),
    }
}

async fn toilets_handler(
    State(log): State<Log>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> impl IntoResponse {
    let captured = capture("GET", "/rest/v1/toilets".to_string(), query, &headers, &[]);
    let known = captured
        .query
        .iter()
        .any(|(k, v)| k == "id" && v == "eq.toilet_1");
    log.lock().unwrap().push(captured);

    if known {
        Json(serde_json::json!([{
            "id": "toilet_1",
            "name": "Toilet 1",
            "location": "Building A - Ground Floor",
            "building": "A",
            "floor": "Ground Floor",
            "created_at": "2025-01-01T00:00:00+00:00"
        }]))
    } else {
        Json(serde_json::json!([]))
    }
}

async fn feedbacks_insert_handler(
    State(log): State<Log>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    log.lock()
        .unwrap()
        .push(capture("POST", "/rest/v1/feedbacks".to_string(), None, &headers, &body));
    (
        StatusCode::CREATED,
        Json(serde_json::json!([{"id": "0d6f5a2e-1111-4c44-9a0b-123456789abc"}])),
    )
}

async fn feedbacks_list_handler(
    State(log): State<Log>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> impl IntoResponse {
    let captured = capture("GET", "/rest/v1/feedbacks".to_string(), query, &headers, &[]);
    let summary_only = captured
        .query
        .iter()
        .any(|(k, v)| k == "select" && !v.contains("toilets("));
    log.lock().unwrap().push(captured);

    if summary_only {
        Json(serde_json::json!([
            {"cleanliness_rating": 1, "water_available": false, "soap_available": true},
            {"cleanliness_rating": 4, "water_available": true, "soap_available": false},
            {"cleanliness_rating": 2, "water_available": true, "soap_available": true}
        ]))
    } else {
        Json(serde_json::json!([{
            "id": "f1",
            "toilet_id": "toilet_1",
            "cleanliness_rating": 2,
            "water_available": true,
            "soap_available": false,
            "comments": "soap empty",
            "name": null,
            "mobile": null,
            "extra_feedback": null,
            "photos": [],
            "videos": null,
            "ip_address": null,
            "user_agent": null,
            "created_at": "2025-02-03T04:05:06.789+00:00",
            "toilets": {"name": "Toilet 1", "location": "Building A - Ground Floor", "building": "A", "floor": "Ground Floor"}
        }]))
    }
}

async fn upload_handler(
    State(log): State<Log>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let failing = path.contains("fail");
    log.lock().unwrap().push(capture(
        "POST",
        format!("/storage/v1/object/feedback-media/{}", path),
        None,
        &headers,
        &body,
    ));
    if failing {
        (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"statusCode": "404", "error": "Bucket not found", "message": "Bucket not found"})),
        )
    } else {
        (
            StatusCode::OK,
            Json(serde_json::json!({"Key": format!("feedback-media/{}", path)})),
        )
    }
}

/// Start a mock Supabase-compatible service
async fn start_mock_service() -> (String, Log) {
    let log: Log = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/rest/v1/toilets", get(toilets_handler))
        .route(
            "/rest/v1/feedbacks",
            get(feedbacks_list_handler).post(feedbacks_insert_handler),
        )
        .route("/storage/v1/object/feedback-media/{*path}", post(upload_handler))
        .with_state(log.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (url, log)
}

fn rest_service(url: &str) -> RestDataService {
    RestDataService::new(&ServiceConfig {
        url: url.to_string(),
        anon_key: "test-anon-key".to_string(),
    })
    .unwrap()
}

fn last_request(log: &Log) -> Captured {
    log.lock().unwrap().last().cloned().unwrap()
}

#[tokio::test]
async fn test_find_location_sends_filter_and_keys() {
    let (url, log) = start_mock_service().await;
    let service = rest_service(&url);

    let location = service.find_location("toilet_1").await.unwrap().unwrap();
    assert_eq!(location.name, "Toilet 1");
    assert_eq!(location.floor.as_deref(), Some("Ground Floor"));

    let request = last_request(&log);
    assert_eq!(request.apikey.as_deref(), Some("test-anon-key"));
    assert_eq!(request.authorization.as_deref(), Some("Bearer test-anon-key"));
    assert!(request
        .query
        .contains(&("id".to_string(), "eq.toilet_1".to_string())));

    assert!(service.find_location("toilet_999").await.unwrap().is_none());
}

#[tokio::test]
async fn test_insert_posts_array_and_returns_id() {
    let (url, log) = start_mock_service().await;
    let service = rest_service(&url);

    let feedback = NewFeedback {
        location_id: "toilet_1".to_string(),
        rating: 3,
        water_available: false,
        soap_available: true,
        comments: Some("no soap".to_string()),
        name: None,
        mobile: None,
        extra_feedback: None,
        photos: Vec::new(),
        videos: Vec::new(),
        ip_address: None,
        user_agent: Some("agent".to_string()),
    };
    let id = service.insert_feedback(&feedback).await.unwrap();
    assert_eq!(id, "0d6f5a2e-1111-4c44-9a0b-123456789abc");

    let request = last_request(&log);
    assert_eq!(request.method, "POST");
    assert_eq!(request.prefer.as_deref(), Some("return=representation"));
    let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
    let row = &body.as_array().unwrap()[0];
    assert_eq!(row["toilet_id"], "toilet_1");
    assert_eq!(row["cleanliness_rating"], 3);
    assert_eq!(row["water_available"], false);
    assert_eq!(row["soap_available"], true);
    assert_eq!(row["comments"], "no soap");
    assert_eq!(row["name"], serde_json::Value::Null);
    assert_eq!(row["photos"], serde_json::json!([]));
}

#[tokio::test]
async fn test_list_pushes_filter_and_search_down() {
    let (url, log) = start_mock_service().await;
    let service = rest_service(&url);

    let rows = service
        .list_feedback(&FeedbackQuery::new(FeedbackCategory::LowRating, Some("soap")))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].feedback.comments.as_deref(), Some("soap empty"));
    assert!(rows[0].feedback.videos.is_empty());
    assert_eq!(rows[0].location.as_ref().unwrap().name, "Toilet 1");

    let query = last_request(&log).query;
    assert!(query.contains(&(
        "select".to_string(),
        "*,toilets(name,location,building,floor)".to_string()
    )));
    assert!(query.contains(&("order".to_string(), "created_at.desc".to_string())));
    assert!(query.contains(&("cleanliness_rating".to_string(), "lte.2".to_string())));
    assert!(query.contains(&(
        "or".to_string(),
        r#"(toilet_id.ilike."*soap*",comments.ilike."*soap*")"#.to_string()
    )));
}

#[tokio::test]
async fn test_summary_counts_rows() {
    let (url, _log) = start_mock_service().await;
    let service = rest_service(&url);

    let summary = service.feedback_summary().await.unwrap();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.low_rating, 2);
    assert_eq!(summary.no_water, 1);
    assert_eq!(summary.no_soap, 1);
}

#[tokio::test]
async fn test_upload_returns_public_url() {
    let (url, log) = start_mock_service().await;
    let service = rest_service(&url);

    let public = service
        .upload_media(
            "feedback-photos/toilet_1/1700000000000-abcd1234.jpg",
            "image/jpeg",
            Bytes::from_static(b"\xff\xd8\xff"),
        )
        .await
        .unwrap();
    assert_eq!(
        public,
        format!(
            "{}/storage/v1/object/public/feedback-media/feedback-photos/toilet_1/1700000000000-abcd1234.jpg",
            url
        )
    );

    let request = last_request(&log);
    assert_eq!(
        request.path,
        "/storage/v1/object/feedback-media/feedback-photos/toilet_1/1700000000000-abcd1234.jpg"
    );
    assert_eq!(request.content_type.as_deref(), Some("image/jpeg"));
    assert_eq!(request.body, b"\xff\xd8\xff");
}

#[tokio::test]
async fn test_service_error_message_is_surfaced() {
    let (url, _log) = start_mock_service().await;
    let service = rest_service(&url);

    let err = service
        .upload_media("feedback-photos/toilet_1/fail.jpg", "image/jpeg", Bytes::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Status { status: 400, .. }));
    assert_eq!(err.to_string(), "Bucket not found");
}

#[tokio::test]
async fn test_unreachable_service_is_request_error() {
    // Bind then drop to get a port nothing listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let service = rest_service(&url);
    let err = service.feedback_summary().await.unwrap_err();
    assert!(matches!(err, ServiceError::Request(_)));
}

#[tokio::test]
async fn test_list_search_treats_wildcards_literally() {
    let (url, log) = start_mock_service().await;
    let service = rest_service(&url);

    // "soap_" would match "soap empty" if "_" were a wildcard
    let rows = service
        .list_feedback(&FeedbackQuery::new(FeedbackCategory::All, Some("soap_")))
        .await
        .unwrap();
    assert!(rows.is_empty());

    let query = last_request(&log).query;
    assert!(query.contains(&(
        "or".to_string(),
        r#"(toilet_id.ilike."*soap\\_*",comments.ilike."*soap\\_*")"#.to_string()
    )));

    // the local match folds case like ilike does
    let rows = service
        .list_feedback(&FeedbackQuery::new(FeedbackCategory::All, Some("SOAP EMPTY")))
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}
