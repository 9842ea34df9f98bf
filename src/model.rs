use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::LOW_RATING_THRESHOLD;

/// A provisioned facility feedback is collected against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    /// Free-text description such as "Building A - Ground Floor"
    pub location: String,
    #[serde(default)]
    pub building: Option<String>,
    #[serde(default)]
    pub floor: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Location fields joined onto a feedback row for the dashboard
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LocationSummary {
    pub name: String,
    pub location: String,
    #[serde(default)]
    pub building: Option<String>,
    #[serde(default)]
    pub floor: Option<String>,
}

/// Row written for one form submission
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewFeedback {
    #[serde(rename = "toilet_id")]
    pub location_id: String,
    #[serde(rename = "cleanliness_rating")]
    pub rating: u8,
    pub water_available: bool,
    pub soap_available: bool,
    pub comments: Option<String>,
    pub name: Option<String>,
    pub mobile: Option<String>,
    pub extra_feedback: Option<String>,
    pub photos: Vec<String>,
    pub videos: Vec<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

/// A stored submission, as read back from the data service
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeedbackRecord {
    pub id: String,
    #[serde(rename = "toilet_id")]
    pub location_id: String,
    #[serde(rename = "cleanliness_rating")]
    pub rating: u8,
    pub water_available: bool,
    pub soap_available: bool,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub extra_feedback: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub photos: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub videos: Vec<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Feedback row with its location's display fields
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeedbackWithLocation {
    #[serde(flatten)]
    pub feedback: FeedbackRecord,
    /// Missing when the referenced location does not exist
    #[serde(rename = "toilets", default)]
    pub location: Option<LocationSummary>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Dashboard category filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeedbackCategory {
    #[default]
    All,
    LowRating,
    NoWater,
    NoSoap,
}

impl FeedbackCategory {
    pub const ALL: [FeedbackCategory; 4] = [
        FeedbackCategory::All,
        FeedbackCategory::LowRating,
        FeedbackCategory::NoWater,
        FeedbackCategory::NoSoap,
    ];

    /// Parse the `filter` query value; anything unknown means `All`
    pub fn parse(value: &str) -> Self {
        match value {
            "low-rating" => FeedbackCategory::LowRating,
            "no-water" => FeedbackCategory::NoWater,
            "no-soap" => FeedbackCategory::NoSoap,
            _ => FeedbackCategory::All,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackCategory::All => "all",
            FeedbackCategory::LowRating => "low-rating",
            FeedbackCategory::NoWater => "no-water",
            FeedbackCategory::NoSoap => "no-soap",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            FeedbackCategory::All => "All Feedbacks",
            FeedbackCategory::LowRating => "Low Rating (≤2)",
            FeedbackCategory::NoWater => "No Water",
            FeedbackCategory::NoSoap => "No Soap",
        }
    }
}

/// Dashboard query pushed down to the data service
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeedbackQuery {
    pub category: FeedbackCategory,
    /// Case-insensitive substring of location id or comments
    pub search: Option<String>,
}

impl FeedbackQuery {
    pub fn new(category: FeedbackCategory, search: Option<&str>) -> Self {
        Self {
            category,
            search: search
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string),
        }
    }

    /// Whether a row passes the text search. NULL comments never match;
    /// no search term matches everything.
    pub fn matches_search(&self, location_id: &str, comments: Option<&str>) -> bool {
        let Some(term) = &self.search else {
            return true;
        };
        let term = term.to_lowercase();
        location_id.to_lowercase().contains(&term)
            || comments.is_some_and(|c| c.to_lowercase().contains(&term))
    }
}

/// Counts shown above the dashboard table, always over the full set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeedbackSummary {
    pub total: u64,
    pub low_rating: u64,
    pub no_water: u64,
    pub no_soap: u64,
}

impl FeedbackSummary {
    /// Count one row
    pub fn add(&mut self, rating: u8, water_available: bool, soap_available: bool) {
        self.total += 1;
        if rating <= LOW_RATING_THRESHOLD {
            self.low_rating += 1;
        }
        if !water_available {
            self.no_water += 1;
        }
        if !soap_available {
            self.no_soap += 1;
        }
    }
}

/// Kind of media attached to a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    /// Top-level folder inside the media bucket
    pub fn folder(&self) -> &'static str {
        match self {
            MediaKind::Photo => "feedback-photos",
            MediaKind::Video => "feedback-videos",
        }
    }

    /// Extension used when neither the file name nor the content type gives one
    pub fn fallback_extension(&self) -> &'static str {
        match self {
            MediaKind::Photo => "jpg",
            MediaKind::Video => "mp4",
        }
    }
}
