//! Two-step feedback form state.
//!
//! Step 1 collects the rating, water/soap availability and a comment;
//! step 2 collects optional contact details and media. Navigation between
//! the steps is unconditional. Submission is only possible from step 2 and
//! uploads every queued file before writing one feedback record.

use bytes::Bytes;
use log::{error, info};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use uuid::Uuid;

use crate::constants::{generate_media_file_name, DEFAULT_RATING, RATING_CHOICES};
use crate::model::{Location, MediaKind, NewFeedback};
use crate::service::{DataService, ServiceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Rating, availability and comments
    Details,
    /// Contact information and media
    Contact,
}

impl Step {
    pub fn number(&self) -> u8 {
        match self {
            Step::Details => 1,
            Step::Contact => 2,
        }
    }
}

/// A file selected by the user, waiting to be uploaded
#[derive(Debug, Clone)]
pub struct QueuedMedia {
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
    /// Public URL once the upload succeeded; retries skip files that have one
    pub uploaded_url: Option<String>,
}

impl QueuedMedia {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            data,
            uploaded_url: None,
        }
    }

    /// Extension for the stored object: from the file name, else the content type, else the kind's default
    pub fn extension(&self, kind: MediaKind) -> String {
        let from_name = self
            .file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()));

        from_name
            .or_else(|| extension_for_content_type(&self.content_type).map(str::to_string))
            .unwrap_or_else(|| kind.fallback_extension().to_string())
    }
}

fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    match essence.to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        "image/heic" => Some("heic"),
        "video/mp4" => Some("mp4"),
        "video/quicktime" => Some("mov"),
        "video/webm" => Some("webm"),
        _ => None,
    }
}

/// What the user asked the form to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardAction {
    Next,
    Back,
    /// Keep the newly selected files and stay on the current step
    Attach,
    RemovePhoto(usize),
    RemoveVideo(usize),
    Submit,
}

impl FromStr for WizardAction {
    type Err = WizardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "next" => Ok(WizardAction::Next),
            "back" => Ok(WizardAction::Back),
            "attach" => Ok(WizardAction::Attach),
            "submit" => Ok(WizardAction::Submit),
            other => {
                let index = |rest: &str| {
                    rest.parse::<usize>()
                        .map_err(|_| WizardError::UnknownAction(s.to_string()))
                };
                if let Some(rest) = other.strip_prefix("remove-photo-") {
                    index(rest).map(WizardAction::RemovePhoto)
                } else if let Some(rest) = other.strip_prefix("remove-video-") {
                    index(rest).map(WizardAction::RemoveVideo)
                } else {
                    Err(WizardError::UnknownAction(s.to_string()))
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardError {
    UnknownAction(String),
    /// A posted field could not be interpreted
    InvalidField { field: &'static str, value: String },
    /// Submit requested while still on step 1
    SubmitFromDetails,
    /// Queued files would exceed the per-draft byte limit
    AttachmentsTooLarge { limit_bytes: usize },
}

impl fmt::Display for WizardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WizardError::UnknownAction(action) => write!(f, "Unknown form action: {}", action),
            WizardError::InvalidField { field, value } => {
                write!(f, "Invalid value for {}: {}", field, value)
            }
            WizardError::SubmitFromDetails => {
                write!(f, "Feedback can only be submitted from the second step")
            }
            WizardError::AttachmentsTooLarge { limit_bytes } => write!(
                f,
                "Attached files exceed the {} limit. Remove some files or choose smaller ones.",
                format_size(*limit_bytes)
            ),
        }
    }
}

impl std::error::Error for WizardError {}

fn format_size(bytes: usize) -> String {
    const MB: usize = 1024 * 1024;
    if bytes >= MB {
        format!("{} MB", bytes / MB)
    } else {
        format!("{} KB", bytes / 1024)
    }
}

/// Fields posted with one form request. Absent fields leave the draft unchanged.
#[derive(Debug, Default)]
pub struct FormInput {
    pub rating: Option<String>,
    pub water_available: Option<String>,
    pub soap_available: Option<String>,
    pub comments: Option<String>,
    pub name: Option<String>,
    pub mobile: Option<String>,
    pub extra_feedback: Option<String>,
    pub photos: Vec<QueuedMedia>,
    pub videos: Vec<QueuedMedia>,
}

/// Request details recorded with a submission
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
}

fn parse_rating(value: &str) -> Result<u8, WizardError> {
    value
        .trim()
        .parse::<u8>()
        .ok()
        .filter(|rating| RATING_CHOICES.contains(rating))
        .ok_or_else(|| WizardError::InvalidField {
            field: "rating",
            value: value.to_string(),
        })
}

fn parse_flag(field: &'static str, value: &str) -> Result<bool, WizardError> {
    match value.trim() {
        "yes" | "true" => Ok(true),
        "no" | "false" => Ok(false),
        other => Err(WizardError::InvalidField {
            field,
            value: other.to_string(),
        }),
    }
}

/// Empty text is written as absent
fn optional_text(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// One in-progress form visit
#[derive(Debug)]
pub struct FeedbackDraft {
    pub id: Uuid,
    pub location: Location,
    pub step: Step,
    pub rating: u8,
    pub water_available: bool,
    pub soap_available: bool,
    pub comments: String,
    pub name: String,
    pub mobile: String,
    pub extra_feedback: String,
    pub photos: Vec<QueuedMedia>,
    pub videos: Vec<QueuedMedia>,
    /// Message from the last failed submission
    pub error: Option<String>,
    /// Identifier of the written record once submission succeeded
    pub submitted_id: Option<String>,
    pub last_touched: Instant,
}

impl FeedbackDraft {
    pub fn new(location: Location) -> Self {
        Self {
            id: Uuid::new_v4(),
            location,
            step: Step::Details,
            rating: DEFAULT_RATING,
            water_available: true,
            soap_available: true,
            comments: String::new(),
            name: String::new(),
            mobile: String::new(),
            extra_feedback: String::new(),
            photos: Vec::new(),
            videos: Vec::new(),
            error: None,
            submitted_id: None,
            last_touched: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_touched = Instant::now();
    }

    /// Bytes held in memory by queued photos and videos
    pub fn queued_bytes(&self) -> usize {
        self.photos
            .iter()
            .chain(&self.videos)
            .map(|m| m.data.len())
            .sum()
    }

    /// Refuse `input` when its files would take the queue past `limit_bytes`
    pub fn check_attachment_room(
        &self,
        input: &FormInput,
        limit_bytes: usize,
    ) -> Result<(), WizardError> {
        let incoming: usize = input
            .photos
            .iter()
            .chain(&input.videos)
            .map(|m| m.data.len())
            .sum();
        if incoming > 0 && self.queued_bytes() + incoming > limit_bytes {
            return Err(WizardError::AttachmentsTooLarge { limit_bytes });
        }
        Ok(())
    }

    /// Copy posted fields into the draft and append newly selected files.
    ///
    /// Nothing is changed when any field is invalid.
    pub fn apply(&mut self, input: FormInput) -> Result<(), WizardError> {
        let rating = input.rating.as_deref().map(parse_rating).transpose()?;
        let water = input
            .water_available
            .as_deref()
            .map(|v| parse_flag("water_available", v))
            .transpose()?;
        let soap = input
            .soap_available
            .as_deref()
            .map(|v| parse_flag("soap_available", v))
            .transpose()?;

        if let Some(rating) = rating {
            self.rating = rating;
        }
        if let Some(water) = water {
            self.water_available = water;
        }
        if let Some(soap) = soap {
            self.soap_available = soap;
        }
        if let Some(comments) = input.comments {
            self.comments = comments;
        }
        if let Some(name) = input.name {
            self.name = name;
        }
        if let Some(mobile) = input.mobile {
            self.mobile = mobile;
        }
        if let Some(extra) = input.extra_feedback {
            self.extra_feedback = extra;
        }
        self.photos.extend(input.photos);
        self.videos.extend(input.videos);
        Ok(())
    }

    /// Apply a navigation or editing action. `Submit` is handled by [`FeedbackDraft::submit`].
    pub fn navigate(&mut self, action: WizardAction) -> Result<(), WizardError> {
        match action {
            WizardAction::Next => {
                self.step = Step::Contact;
                self.error = None;
            }
            WizardAction::Back => {
                self.step = Step::Details;
                self.error = None;
            }
            WizardAction::Attach => {}
            WizardAction::RemovePhoto(index) => {
                if index < self.photos.len() {
                    self.photos.remove(index);
                }
            }
            WizardAction::RemoveVideo(index) => {
                if index < self.videos.len() {
                    self.videos.remove(index);
                }
            }
            WizardAction::Submit => {
                if self.step != Step::Contact {
                    return Err(WizardError::SubmitFromDetails);
                }
            }
        }
        Ok(())
    }

    /// The record written for this draft once every file has a public URL
    pub fn to_new_feedback(&self, client: &ClientInfo) -> NewFeedback {
        let urls = |media: &[QueuedMedia]| -> Vec<String> {
            media.iter().filter_map(|m| m.uploaded_url.clone()).collect()
        };
        NewFeedback {
            location_id: self.location.id.clone(),
            rating: self.rating,
            water_available: self.water_available,
            soap_available: self.soap_available,
            comments: optional_text(&self.comments),
            name: optional_text(&self.name),
            mobile: optional_text(&self.mobile),
            extra_feedback: optional_text(&self.extra_feedback),
            photos: urls(&self.photos),
            videos: urls(&self.videos),
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
        }
    }

    async fn upload_pending(
        service: &dyn DataService,
        location_id: &str,
        kind: MediaKind,
        media: &mut [QueuedMedia],
    ) -> Result<(), ServiceError> {
        for file in media.iter_mut().filter(|m| m.uploaded_url.is_none()) {
            let object_path = format!(
                "{}/{}/{}",
                kind.folder(),
                location_id,
                generate_media_file_name(&file.extension(kind))
            );
            let url = service
                .upload_media(&object_path, &file.content_type, file.data.clone())
                .await?;
            file.uploaded_url = Some(url);
        }
        Ok(())
    }

    /// Upload queued photos then videos, then write the feedback record.
    ///
    /// Any failure leaves the draft on step 2 with `error` set and every
    /// field and queued file intact. Files uploaded before the failure keep
    /// their URL and are not uploaded again on retry.
    pub async fn submit(
        &mut self,
        service: &dyn DataService,
        client: &ClientInfo,
    ) -> Result<String, ServiceError> {
        let result = self.try_submit(service, client).await;
        match &result {
            Ok(id) => {
                info!("Feedback {} submitted for {}", id, self.location.id);
                self.error = None;
                self.submitted_id = Some(id.clone());
                // the record holds the URLs; the file data is no longer needed
                self.photos.clear();
                self.videos.clear();
            }
            Err(e) => {
                error!("Feedback submission for {} failed: {}", self.location.id, e);
                self.step = Step::Contact;
                self.error = Some(e.to_string());
            }
        }
        result
    }

    async fn try_submit(
        &mut self,
        service: &dyn DataService,
        client: &ClientInfo,
    ) -> Result<String, ServiceError> {
        let location_id = self.location.id.clone();
        Self::upload_pending(service, &location_id, MediaKind::Photo, &mut self.photos).await?;
        Self::upload_pending(service, &location_id, MediaKind::Video, &mut self.videos).await?;
        service.insert_feedback(&self.to_new_feedback(client)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn location() -> Location {
        Location {
            id: "toilet_1".to_string(),
            name: "Toilet 1".to_string(),
            location: "Building A - Ground Floor".to_string(),
            building: Some("A".to_string()),
            floor: Some("Ground Floor".to_string()),
            created_at: Utc::now(),
        }
    }

    fn photo(name: &str) -> QueuedMedia {
        QueuedMedia::new(name, "image/jpeg", Bytes::from_static(b"jpeg"))
    }

    #[test]
    fn test_parse_actions() {
        assert_eq!("next".parse::<WizardAction>().unwrap(), WizardAction::Next);
        assert_eq!("submit".parse::<WizardAction>().unwrap(), WizardAction::Submit);
        assert_eq!(
            "remove-photo-2".parse::<WizardAction>().unwrap(),
            WizardAction::RemovePhoto(2)
        );
        assert_eq!(
            "remove-video-0".parse::<WizardAction>().unwrap(),
            WizardAction::RemoveVideo(0)
        );
        assert!("remove-photo-x".parse::<WizardAction>().is_err());
        assert!("jump".parse::<WizardAction>().is_err());
    }

    #[test]
    fn test_fresh_draft_defaults() {
        let draft = FeedbackDraft::new(location());
        assert_eq!(draft.step, Step::Details);
        assert_eq!(draft.rating, 3);
        assert!(draft.water_available);
        assert!(draft.soap_available);
        assert!(draft.photos.is_empty());
    }

    #[test]
    fn test_navigation_is_unconditional_and_keeps_fields() {
        let mut draft = FeedbackDraft::new(location());
        draft
            .apply(FormInput {
                rating: Some("1".to_string()),
                water_available: Some("no".to_string()),
                comments: Some("dirty".to_string()),
                ..Default::default()
            })
            .unwrap();
        draft.navigate(WizardAction::Next).unwrap();
        assert_eq!(draft.step, Step::Contact);
        draft.navigate(WizardAction::Back).unwrap();
        assert_eq!(draft.step, Step::Details);
        assert_eq!(draft.rating, 1);
        assert!(!draft.water_available);
        assert_eq!(draft.comments, "dirty");
    }

    #[test]
    fn test_invalid_rating_changes_nothing() {
        let mut draft = FeedbackDraft::new(location());
        let result = draft.apply(FormInput {
            rating: Some("9".to_string()),
            comments: Some("x".to_string()),
            ..Default::default()
        });
        assert!(matches!(result, Err(WizardError::InvalidField { field: "rating", .. })));
        assert_eq!(draft.rating, 3);
        assert!(draft.comments.is_empty());
    }

    #[test]
    fn test_files_append_and_remove_by_position() {
        let mut draft = FeedbackDraft::new(location());
        draft
            .apply(FormInput {
                photos: vec![photo("a.jpg"), photo("b.jpg")],
                ..Default::default()
            })
            .unwrap();
        draft
            .apply(FormInput {
                photos: vec![photo("c.jpg")],
                ..Default::default()
            })
            .unwrap();
        let names: Vec<_> = draft.photos.iter().map(|p| p.file_name.as_str()).collect();
        assert_eq!(names, ["a.jpg", "b.jpg", "c.jpg"]);

        draft.navigate(WizardAction::RemovePhoto(1)).unwrap();
        draft.navigate(WizardAction::RemovePhoto(7)).unwrap();
        draft.navigate(WizardAction::RemoveVideo(0)).unwrap();
        let names: Vec<_> = draft.photos.iter().map(|p| p.file_name.as_str()).collect();
        assert_eq!(names, ["a.jpg", "c.jpg"]);
    }

    #[test]
    fn test_attachment_room_counts_queued_files() {
        let mut draft = FeedbackDraft::new(location());
        let input = |names: &[&str]| FormInput {
            photos: names.iter().map(|n| photo(n)).collect(),
            ..Default::default()
        };

        // each photo is 4 bytes
        draft.check_attachment_room(&input(&["a.jpg", "b.jpg"]), 8).unwrap();
        draft.apply(input(&["a.jpg", "b.jpg"])).unwrap();
        assert_eq!(draft.queued_bytes(), 8);

        assert_eq!(
            draft.check_attachment_room(&input(&["c.jpg"]), 8),
            Err(WizardError::AttachmentsTooLarge { limit_bytes: 8 })
        );
        // posts without files are never refused
        draft.check_attachment_room(&FormInput::default(), 8).unwrap();

        draft.navigate(WizardAction::RemovePhoto(0)).unwrap();
        draft.check_attachment_room(&input(&["c.jpg"]), 8).unwrap();
    }

    #[test]
    fn test_size_limit_message() {
        let message = WizardError::AttachmentsTooLarge {
            limit_bytes: 100 * 1024 * 1024,
        }
        .to_string();
        assert!(message.contains("100 MB"));
        let message = WizardError::AttachmentsTooLarge { limit_bytes: 16 * 1024 }.to_string();
        assert!(message.contains("16 KB"));
    }

    #[test]
    fn test_submit_requires_contact_step() {
        let mut draft = FeedbackDraft::new(location());
        assert_eq!(
            draft.navigate(WizardAction::Submit),
            Err(WizardError::SubmitFromDetails)
        );
    }

    #[test]
    fn test_empty_text_becomes_absent() {
        let mut draft = FeedbackDraft::new(location());
        draft.comments = "   ".to_string();
        draft.name = "Sam".to_string();
        let record = draft.to_new_feedback(&ClientInfo::default());
        assert_eq!(record.comments, None);
        assert_eq!(record.name.as_deref(), Some("Sam"));
        assert_eq!(record.mobile, None);
    }

    #[test]
    fn test_media_extension() {
        assert_eq!(photo("IMG_1.JPEG").extension(MediaKind::Photo), "jpeg");
        let no_ext = QueuedMedia::new("blob", "video/quicktime", Bytes::new());
        assert_eq!(no_ext.extension(MediaKind::Video), "mov");
        let unknown = QueuedMedia::new("blob", "application/octet-stream", Bytes::new());
        assert_eq!(unknown.extension(MediaKind::Photo), "jpg");
        assert_eq!(unknown.extension(MediaKind::Video), "mp4");
    }
}
