use axum::{
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use log::{error, info, warn};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower_http::services::ServeDir;
use uuid::Uuid;

use crate::config::{AppConfig, DataBackend};
use crate::drafts::{spawn_draft_sweeper, DraftStore};
use crate::locations::{catalog, CatalogLocation};
use crate::model::{FeedbackCategory, FeedbackQuery};
use crate::pages::{self, DashboardData};
use crate::service::{self, DataService};
use crate::wizard::{ClientInfo, FeedbackDraft, FormInput, QueuedMedia, WizardAction, WizardError};

const SWEEP_PERIOD: Duration = Duration::from_secs(60);
const EXPIRED_DRAFT_MESSAGE: &str =
    "Your form session expired. Please fill in the form again.";

// State shared by every handler
pub struct AppState {
    pub service: Arc<dyn DataService>,
    pub drafts: Arc<DraftStore>,
    pub locations: Vec<CatalogLocation>,
    /// Cap on the file data one draft may hold before submission
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(
        service: Arc<dyn DataService>,
        draft_ttl: Duration,
        location_count: u32,
        max_upload_bytes: usize,
    ) -> Self {
        Self {
            service,
            drafts: Arc::new(DraftStore::new(draft_ttl)),
            locations: catalog(location_count),
            max_upload_bytes,
        }
    }
}

/// Directories served as static files
pub struct StaticDirs {
    /// Provisioner output, served under /qr-images
    pub qr_images: PathBuf,
    /// Locally stored uploads, served under /media
    pub media: Option<PathBuf>,
}

pub fn build_router(state: Arc<AppState>, dirs: &StaticDirs, max_upload_bytes: usize) -> Router {
    let mut app = Router::new()
        .route("/", get(landing_handler))
        .route("/health", get(health_handler))
        .route("/qr-codes", get(qr_codes_handler))
        .route("/toilet/{id}", get(form_handler).post(form_post_handler))
        .route("/location/{id}", get(location_redirect_handler))
        .route("/admin", get(dashboard_handler))
        .nest_service("/qr-images", ServeDir::new(&dirs.qr_images));

    if let Some(media) = &dirs.media {
        app = app.nest_service("/media", ServeDir::new(media));
    }

    app.fallback(not_found_handler)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

/// Run the web application until the process is stopped
pub fn serve_app(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let port = config.port;
    let media = match config.backend {
        DataBackend::Sqlite => Some(config.sqlite.media_dir.clone()),
        DataBackend::Rest => None,
    };
    let dirs = StaticDirs {
        qr_images: config.qr.output_dir.clone(),
        media,
    };

    println!("Starting toilet feedback server");
    match config.backend {
        DataBackend::Rest => println!("Data service: {}", config.service.url),
        DataBackend::Sqlite => println!(
            "Data service: SQLite {} (media in {})",
            config.sqlite.path.display(),
            config.sqlite.media_dir.display()
        ),
    }
    println!("Listening on: http://[::]:{} (IPv4 + IPv6)", port);
    println!("Endpoints:");
    println!("  GET /  - Landing page");
    println!("  GET /qr-codes  - QR code gallery");
    println!("  GET /qr-images/<id>_qr.png  - Generated QR images");
    println!("  GET|POST /toilet/:id  - Feedback form");
    println!("  GET /admin?filter=<all|low-rating|no-water|no-soap>&q=<text>  - Dashboard");
    if dirs.media.is_some() {
        println!("  GET /media/*  - Uploaded media");
    }
    println!("  GET /health  - Health check");

    // Create tokio runtime and run server
    let rt = tokio::runtime::Runtime::new()?;
    let max_upload_bytes = config.max_upload_mb * 1024 * 1024;
    rt.block_on(async {
        let data_service = service::connect(&config).await?;
        let state = Arc::new(AppState::new(
            data_service,
            Duration::from_secs(config.draft_ttl_minutes * 60),
            config.qr.location_count,
            max_upload_bytes,
        ));

        spawn_draft_sweeper(state.drafts.clone(), SWEEP_PERIOD);

        let app = build_router(state, &dirs, max_upload_bytes);

        let listener = tokio::net::TcpListener::bind(format!("[::]:{}", port))
            .await
            .map_err(|e| format!("Failed to bind to port {}: {}", port, e))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| format!("Server error: {}", e))?;

        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

// Health check endpoint - returns 200 OK if server is running
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn landing_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Html(pages::landing_page(state.locations.len() as u32))
}

async fn qr_codes_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Html(pages::qr_codes_page(&state.locations, "/qr-images/"))
}

async fn not_found_handler() -> Response {
    (StatusCode::NOT_FOUND, Html(pages::not_found_page())).into_response()
}

async fn location_redirect_handler(Path(id): Path<String>) -> impl IntoResponse {
    Redirect::permanent(&format!("/toilet/{}", urlencoding::encode(&id)))
}

fn service_error_response(message: &str) -> Response {
    (StatusCode::BAD_GATEWAY, Html(pages::service_error_page(message))).into_response()
}

/// Start a fresh draft for `id`, or answer 404 when the location is unknown
async fn fresh_draft(state: &AppState, id: &str, notice: Option<&str>) -> Response {
    match state.service.find_location(id).await {
        Ok(Some(location)) => {
            let draft = state.drafts.create(location);
            let mut draft = draft.lock().await;
            draft.error = notice.map(str::to_string);
            (StatusCode::OK, Html(pages::form_page(&draft))).into_response()
        }
        Ok(None) => not_found_handler().await,
        Err(e) => {
            error!("Failed to look up location {}: {}", id, e);
            service_error_response(&e.to_string())
        }
    }
}

async fn form_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Response {
    fresh_draft(&state, &id, None).await
}

/// Everything one form post carries
#[derive(Debug, Default)]
struct FormPost {
    draft_id: Option<String>,
    action: Option<String>,
    input: FormInput,
}

/// A form post that could not be read to the end
#[derive(Debug)]
struct FormReadError {
    status: StatusCode,
    message: String,
}

impl FormReadError {
    fn new(context: &str, e: MultipartError) -> Self {
        Self {
            status: e.status(),
            message: format!("{}: {}", context, e.body_text()),
        }
    }
}

/// Read the post into `post`. Fields read before a failure are kept, so the
/// draft id is known even when a later file part is cut off by the body limit.
async fn read_form_post(
    mut multipart: Multipart,
    post: &mut FormPost,
) -> Result<(), FormReadError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| FormReadError::new("Failed to read form data", e))?
    {
        let name = field.name().unwrap_or("").to_string();

        if name == "photos" || name == "videos" {
            let file_name = field.file_name().unwrap_or("").to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| FormReadError::new(&format!("Failed to read {}", name), e))?;
            // Browsers send an empty part for a file input with nothing selected
            if file_name.is_empty() && data.is_empty() {
                continue;
            }
            let media = QueuedMedia::new(file_name, content_type, data);
            if name == "photos" {
                post.input.photos.push(media);
            } else {
                post.input.videos.push(media);
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| FormReadError::new(&format!("Failed to read {}", name), e))?;
        match name.as_str() {
            "draft_id" => post.draft_id = Some(value),
            "action" => post.action = Some(value),
            "rating" => post.input.rating = Some(value),
            "water_available" => post.input.water_available = Some(value),
            "soap_available" => post.input.soap_available = Some(value),
            "comments" => post.input.comments = Some(value),
            "name" => post.input.name = Some(value),
            "mobile" => post.input.mobile = Some(value),
            "extra_feedback" => post.input.extra_feedback = Some(value),
            other => warn!("Ignoring unknown form field: {}", other),
        }
    }

    Ok(())
}

fn client_info(headers: &HeaderMap) -> ClientInfo {
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);
    ClientInfo {
        user_agent,
        ip_address,
    }
}

fn form_response(status: StatusCode, draft: &FeedbackDraft) -> Response {
    (status, Html(pages::form_page(draft))).into_response()
}

async fn form_post_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Response {
    let mut post = FormPost::default();
    let read = read_form_post(multipart, &mut post).await;
    if let Err(e) = &read {
        warn!("Rejected form post for {}: {}", id, e.message);
    }
    // Without a draft to return to, a broken post gets a plain error page
    let unreadable = |e: FormReadError| {
        (e.status, Html(pages::service_error_page(&e.message))).into_response()
    };

    let draft_id = post
        .draft_id
        .as_deref()
        .and_then(|value| Uuid::parse_str(value.trim()).ok());
    let shared = match draft_id.and_then(|draft_id| state.drafts.get(&draft_id)) {
        Some(shared) => shared,
        None => {
            return match read {
                Err(e) => unreadable(e),
                Ok(()) => fresh_draft(&state, &id, Some(EXPIRED_DRAFT_MESSAGE)).await,
            };
        }
    };

    // Held until the response is built; a second post for the same draft
    // while a submission is running lands here
    let mut draft = match shared.try_lock() {
        Ok(draft) => draft,
        Err(_) => {
            return (StatusCode::CONFLICT, Html(pages::submitting_page(&id))).into_response();
        }
    };

    if draft.location.id != id {
        drop(draft);
        return match read {
            Err(e) => unreadable(e),
            Ok(()) => fresh_draft(&state, &id, Some(EXPIRED_DRAFT_MESSAGE)).await,
        };
    }
    if draft.submitted_id.is_some() {
        return Html(pages::thank_you_page(&id)).into_response();
    }
    draft.touch();

    // Nothing from a partly read post is applied; the draft is shown as it was
    if let Err(e) = read {
        draft.error = Some(if e.status == StatusCode::PAYLOAD_TOO_LARGE {
            WizardError::AttachmentsTooLarge {
                limit_bytes: state.max_upload_bytes,
            }
            .to_string()
        } else {
            e.message
        });
        return form_response(e.status, &draft);
    }

    let action = match post.action.as_deref().unwrap_or("attach").parse::<WizardAction>() {
        Ok(action) => action,
        Err(e) => {
            draft.error = Some(e.to_string());
            return form_response(StatusCode::BAD_REQUEST, &draft);
        }
    };
    if let Err(e) = draft
        .check_attachment_room(&post.input, state.max_upload_bytes)
        .and_then(|()| draft.apply(post.input))
    {
        let status = match e {
            WizardError::AttachmentsTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        draft.error = Some(e.to_string());
        return form_response(status, &draft);
    }
    if let Err(e) = draft.navigate(action) {
        draft.error = Some(e.to_string());
        return form_response(StatusCode::BAD_REQUEST, &draft);
    }

    if action != WizardAction::Submit {
        return form_response(StatusCode::OK, &draft);
    }

    let client = client_info(&headers);
    match draft.submit(state.service.as_ref(), &client).await {
        Ok(feedback_id) => {
            info!("Draft {} completed as feedback {}", draft.id, feedback_id);
            Html(pages::thank_you_page(&id)).into_response()
        }
        // Error already recorded on the draft; the user stays on step 2
        Err(_) => form_response(StatusCode::BAD_GATEWAY, &draft),
    }
}

#[derive(Debug, Deserialize)]
pub struct DashboardParams {
    pub filter: Option<String>,
    pub q: Option<String>,
}

async fn dashboard_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DashboardParams>,
) -> Response {
    let category = FeedbackCategory::parse(params.filter.as_deref().unwrap_or("all"));
    let query = FeedbackQuery::new(category, params.q.as_deref());

    let result = tokio::try_join!(
        state.service.list_feedback(&query),
        state.service.feedback_summary()
    );

    match result {
        Ok((records, summary)) => Html(pages::dashboard_page(
            &query,
            DashboardData::Loaded {
                records: &records,
                summary,
            },
        ))
        .into_response(),
        Err(e) => {
            error!("Error fetching feedbacks: {}", e);
            let message = e.to_string();
            (
                StatusCode::BAD_GATEWAY,
                Html(pages::dashboard_page(&query, DashboardData::Failed(&message))),
            )
                .into_response()
        }
    }
}
