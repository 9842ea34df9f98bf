//! Access to the external data service.
//!
//! The application only ever talks to records and blobs through
//! [`DataService`]. One instance is built at startup and shared by every
//! handler.

use async_trait::async_trait;
use bytes::Bytes;
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use crate::config::{AppConfig, DataBackend};
use crate::model::{FeedbackQuery, FeedbackSummary, FeedbackWithLocation, Location, NewFeedback};

pub mod rest;
pub mod sqlite;

pub use rest::RestDataService;
pub use sqlite::SqliteDataService;

/// Errors returned by a data service backend
#[derive(Debug)]
pub enum ServiceError {
    /// Transport-level failure (connection refused, DNS, TLS, ...)
    Request(reqwest::Error),
    /// The service answered with a non-success status
    Status { status: u16, message: String },
    /// Local database failure
    Database(sqlx::Error),
    /// Local file system failure
    Io(std::io::Error),
    /// A response or stored value could not be decoded
    Decode(String),
    /// The backend cannot be built from the given settings
    Config(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Request(err) => write!(f, "{}", err),
            ServiceError::Status { status, message } if message.is_empty() => {
                write!(f, "Request failed with status {}", status)
            }
            ServiceError::Status { message, .. } => write!(f, "{}", message),
            ServiceError::Database(err) => write!(f, "{}", err),
            ServiceError::Io(err) => write!(f, "{}", err),
            ServiceError::Decode(msg) => write!(f, "Invalid response: {}", msg),
            ServiceError::Config(msg) => write!(f, "Invalid data service configuration: {}", msg),
        }
    }
}

impl StdError for ServiceError {}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::Request(err)
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Database(err)
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::Io(err)
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Decode(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

/// Record and blob operations offered by the external data service
#[async_trait]
pub trait DataService: Send + Sync {
    /// Look up one provisioned location
    async fn find_location(&self, id: &str) -> Result<Option<Location>>;

    /// Write one feedback record, returning its generated identifier
    async fn insert_feedback(&self, feedback: &NewFeedback) -> Result<String>;

    /// Feedback joined with location display fields, newest first
    async fn list_feedback(&self, query: &FeedbackQuery) -> Result<Vec<FeedbackWithLocation>>;

    /// Counts over every stored feedback record
    async fn feedback_summary(&self) -> Result<FeedbackSummary>;

    /// Store a blob under `object_path` in the media bucket, returning its public URL
    async fn upload_media(&self, object_path: &str, content_type: &str, data: Bytes)
        -> Result<String>;
}

/// Build the configured backend
pub async fn connect(config: &AppConfig) -> std::result::Result<Arc<dyn DataService>, ServiceError> {
    match config.backend {
        DataBackend::Rest => Ok(Arc::new(RestDataService::new(&config.service)?)),
        DataBackend::Sqlite => {
            let service = SqliteDataService::open(
                &config.sqlite.path,
                &config.sqlite.media_dir,
                &config.public_url,
                config.qr.location_count,
            )
            .await?;
            Ok(Arc::new(service))
        }
    }
}
