//! Self-hosted backend: a local SQLite file plus a media directory.
//!
//! Uses the same tables as the managed service. Photo and video URL lists
//! are stored as JSON text.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::{Path, PathBuf};

use super::{DataService, Result, ServiceError};
use crate::constants::MEDIA_BUCKET;
use crate::locations::catalog;
use crate::model::{
    FeedbackQuery, FeedbackRecord, FeedbackSummary, FeedbackWithLocation, Location,
    LocationSummary, NewFeedback,
};
use crate::queries::feedbacks::{self, FeedbackRow};
use crate::queries::{ddl, toilets};

pub struct SqliteDataService {
    pool: SqlitePool,
    media_dir: PathBuf,
    public_url: String,
}

impl SqliteDataService {
    /// Open (creating if needed) the database, ensure the schema exists and
    /// seed locations `1..=location_count`.
    pub async fn open(
        path: &Path,
        media_dir: &Path,
        public_url: &str,
        location_count: u32,
    ) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        init_schema(&pool).await?;
        let seeded = seed_locations(&pool, location_count).await?;
        info!(
            "SQLite database: {} ({} locations, {} newly seeded)",
            path.display(),
            location_count,
            seeded
        );

        Ok(Self {
            pool,
            media_dir: media_dir.to_path_buf(),
            public_url: public_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Create tables and indexes if they do not exist
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(&ddl::create_toilets_table()).execute(pool).await?;
    sqlx::query(&ddl::create_feedbacks_table()).execute(pool).await?;
    sqlx::query(&ddl::create_feedbacks_created_at_index())
        .execute(pool)
        .await?;
    sqlx::query(&ddl::create_feedbacks_toilet_id_index())
        .execute(pool)
        .await?;
    Ok(())
}

/// Insert missing catalog locations, returning how many rows were added
pub async fn seed_locations(pool: &SqlitePool, count: u32) -> Result<u64> {
    let created_at = now_timestamp();
    let mut tx = pool.begin().await?;
    let mut inserted = 0;
    for location in catalog(count) {
        let result = sqlx::query(&toilets::insert_if_absent(&location, &created_at))
            .execute(&mut *tx)
            .await?;
        inserted += result.rows_affected();
    }
    tx.commit().await?;
    Ok(inserted)
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ServiceError::Decode(format!("bad timestamp '{}': {}", value, e)))
}

fn decode_rating(value: i64) -> Result<u8> {
    u8::try_from(value).map_err(|_| ServiceError::Decode(format!("bad rating {}", value)))
}

fn decode_urls(json: Option<String>) -> Result<Vec<String>> {
    match json {
        Some(text) => Ok(serde_json::from_str(&text)?),
        None => Ok(Vec::new()),
    }
}

fn location_from_row(row: &SqliteRow) -> Result<Location> {
    let created_at: String = row.try_get("created_at")?;
    Ok(Location {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        location: row.try_get("location")?,
        building: row.try_get("building")?,
        floor: row.try_get("floor")?,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn feedback_from_row(row: &SqliteRow) -> Result<FeedbackWithLocation> {
    let created_at: String = row.try_get("created_at")?;
    let water: i64 = row.try_get("water_available")?;
    let soap: i64 = row.try_get("soap_available")?;

    let feedback = FeedbackRecord {
        id: row.try_get("id")?,
        location_id: row.try_get("toilet_id")?,
        rating: decode_rating(row.try_get("cleanliness_rating")?)?,
        water_available: water != 0,
        soap_available: soap != 0,
        comments: row.try_get("comments")?,
        name: row.try_get("name")?,
        mobile: row.try_get("mobile")?,
        extra_feedback: row.try_get("extra_feedback")?,
        photos: decode_urls(row.try_get("photos")?)?,
        videos: decode_urls(row.try_get("videos")?)?,
        ip_address: row.try_get("ip_address")?,
        user_agent: row.try_get("user_agent")?,
        created_at: parse_timestamp(&created_at)?,
    };

    // LEFT JOIN: all location columns are NULL when the location is gone
    let name: Option<String> = row.try_get("toilet_name")?;
    let location = match name {
        Some(name) => Some(LocationSummary {
            name,
            location: row.try_get::<Option<String>, _>("toilet_location")?.unwrap_or_default(),
            building: row.try_get("toilet_building")?,
            floor: row.try_get("toilet_floor")?,
        }),
        None => None,
    };

    Ok(FeedbackWithLocation { feedback, location })
}

/// Reject object paths that could escape the media directory
fn checked_object_path(object_path: &str) -> Result<&str> {
    let valid = !object_path.is_empty()
        && object_path
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != ".." && !segment.contains('\\'));
    if valid {
        Ok(object_path)
    } else {
        Err(ServiceError::Status {
            status: 400,
            message: format!("Invalid object path: {}", object_path),
        })
    }
}

#[async_trait]
impl DataService for SqliteDataService {
    async fn find_location(&self, id: &str) -> Result<Option<Location>> {
        let row = sqlx::query(&toilets::select_by_id(id))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(location_from_row).transpose()
    }

    async fn insert_feedback(&self, feedback: &NewFeedback) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let photos_json = serde_json::to_string(&feedback.photos)?;
        let videos_json = serde_json::to_string(&feedback.videos)?;
        let created_at = now_timestamp();

        let sql = feedbacks::insert(&FeedbackRow {
            id: &id,
            toilet_id: &feedback.location_id,
            rating: feedback.rating as i32,
            water_available: feedback.water_available,
            soap_available: feedback.soap_available,
            comments: feedback.comments.as_deref(),
            name: feedback.name.as_deref(),
            mobile: feedback.mobile.as_deref(),
            extra_feedback: feedback.extra_feedback.as_deref(),
            photos_json: &photos_json,
            videos_json: &videos_json,
            ip_address: feedback.ip_address.as_deref(),
            user_agent: feedback.user_agent.as_deref(),
            created_at: &created_at,
        });
        sqlx::query(&sql).execute(&self.pool).await?;

        debug!("Inserted feedback {} for {}", id, feedback.location_id);
        Ok(id)
    }

    async fn list_feedback(&self, query: &FeedbackQuery) -> Result<Vec<FeedbackWithLocation>> {
        let rows = sqlx::query(&feedbacks::select_with_location(query))
            .fetch_all(&self.pool)
            .await?;
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            let record = feedback_from_row(row)?;
            let feedback = &record.feedback;
            if query.matches_search(&feedback.location_id, feedback.comments.as_deref()) {
                records.push(record);
            }
        }
        Ok(records)
    }

    async fn feedback_summary(&self) -> Result<FeedbackSummary> {
        let row = sqlx::query(&feedbacks::select_summary())
            .fetch_one(&self.pool)
            .await?;

        // SUM over zero rows is NULL
        let count = |index: usize| -> Result<u64> {
            let value: Option<i64> = row.try_get(index)?;
            Ok(value.unwrap_or(0).max(0) as u64)
        };

        Ok(FeedbackSummary {
            total: count(0)?,
            low_rating: count(1)?,
            no_water: count(2)?,
            no_soap: count(3)?,
        })
    }

    async fn upload_media(
        &self,
        object_path: &str,
        _content_type: &str,
        data: Bytes,
    ) -> Result<String> {
        let object_path = checked_object_path(object_path)?;
        let target = self.media_dir.join(MEDIA_BUCKET).join(object_path);

        if tokio::fs::try_exists(&target).await? {
            return Err(ServiceError::Status {
                status: 409,
                message: "The resource already exists".to_string(),
            });
        }
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &data).await?;
        debug!("Stored {} ({} bytes)", target.display(), data.len());

        let encoded = object_path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        Ok(format!("{}/media/{}/{}", self.public_url, MEDIA_BUCKET, encoded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FeedbackCategory, FeedbackQuery};
    use tempfile::TempDir;

    async fn open_temp(dir: &TempDir) -> SqliteDataService {
        SqliteDataService::open(
            &dir.path().join("db/feedback.sqlite"),
            &dir.path().join("media"),
            "http://localhost:3000/",
            6,
        )
        .await
        .unwrap()
    }

    fn feedback(location_id: &str, rating: u8, water: bool, soap: bool, comments: Option<&str>) -> NewFeedback {
        NewFeedback {
            location_id: location_id.to_string(),
            rating,
            water_available: water,
            soap_available: soap,
            comments: comments.map(str::to_string),
            name: None,
            mobile: None,
            extra_feedback: None,
            photos: Vec::new(),
            videos: Vec::new(),
            ip_address: None,
            user_agent: Some("test-agent".to_string()),
        }
    }

    #[tokio::test]
    async fn test_open_seeds_catalog_once() {
        let dir = TempDir::new().unwrap();
        let service = open_temp(&dir).await;

        let location = service.find_location("toilet_4").await.unwrap().unwrap();
        assert_eq!(location.name, "Toilet 4");
        assert_eq!(location.location, "Building B - Ground Floor");
        assert_eq!(location.building.as_deref(), Some("B"));
        assert!(service.find_location("toilet_7").await.unwrap().is_none());

        // Re-seeding the same catalog adds nothing
        assert_eq!(seed_locations(service.pool(), 6).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insert_and_list_round_trip() {
        let dir = TempDir::new().unwrap();
        let service = open_temp(&dir).await;

        let mut new = feedback("toilet_2", 4, true, false, Some("no soap"));
        new.photos = vec!["http://localhost:3000/media/feedback-media/a.jpg".to_string()];
        let id = service.insert_feedback(&new).await.unwrap();

        let rows = service.list_feedback(&FeedbackQuery::default()).await.unwrap();
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.feedback.id, id);
        assert_eq!(row.feedback.rating, 4);
        assert!(row.feedback.water_available);
        assert!(!row.feedback.soap_available);
        assert_eq!(row.feedback.comments.as_deref(), Some("no soap"));
        assert_eq!(row.feedback.photos, new.photos);
        assert!(row.feedback.videos.is_empty());
        assert_eq!(
            row.location.as_ref().unwrap().location,
            "Building A - First Floor"
        );
    }

    #[tokio::test]
    async fn test_unknown_location_is_rejected_by_foreign_key() {
        let dir = TempDir::new().unwrap();
        let service = open_temp(&dir).await;

        let result = service
            .insert_feedback(&feedback("toilet_99", 3, true, true, None))
            .await;
        assert!(matches!(result, Err(ServiceError::Database(_))));
    }

    #[tokio::test]
    async fn test_summary_over_empty_and_filled_table() {
        let dir = TempDir::new().unwrap();
        let service = open_temp(&dir).await;
        assert_eq!(service.feedback_summary().await.unwrap(), FeedbackSummary::default());

        service.insert_feedback(&feedback("toilet_1", 1, false, true, None)).await.unwrap();
        service.insert_feedback(&feedback("toilet_1", 5, true, false, None)).await.unwrap();

        let summary = service.feedback_summary().await.unwrap();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.low_rating, 1);
        assert_eq!(summary.no_water, 1);
        assert_eq!(summary.no_soap, 1);

        let no_water = service
            .list_feedback(&FeedbackQuery::new(FeedbackCategory::NoWater, None))
            .await
            .unwrap();
        assert_eq!(no_water.len(), 1);
        assert_eq!(no_water[0].feedback.rating, 1);
    }

    #[tokio::test]
    async fn test_upload_writes_file_and_returns_public_url() {
        let dir = TempDir::new().unwrap();
        let service = open_temp(&dir).await;

        let url = service
            .upload_media("feedback-photos/toilet_1/1-abc.jpg", "image/jpeg", Bytes::from_static(b"jpeg"))
            .await
            .unwrap();
        assert_eq!(
            url,
            "http://localhost:3000/media/feedback-media/feedback-photos/toilet_1/1-abc.jpg"
        );
        let stored = std::fs::read(
            dir.path().join("media/feedback-media/feedback-photos/toilet_1/1-abc.jpg"),
        )
        .unwrap();
        assert_eq!(stored, b"jpeg");

        let again = service
            .upload_media("feedback-photos/toilet_1/1-abc.jpg", "image/jpeg", Bytes::from_static(b"x"))
            .await;
        assert!(matches!(again, Err(ServiceError::Status { status: 409, .. })));

        let escape = service
            .upload_media("../outside.jpg", "image/jpeg", Bytes::from_static(b"x"))
            .await;
        assert!(matches!(escape, Err(ServiceError::Status { status: 400, .. })));
    }
}
