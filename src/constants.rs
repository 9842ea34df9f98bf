use rand::Rng;

/// Placeholder endpoint used when no data service URL is configured.
/// Requests against it fail, but startup does not.
pub const PLACEHOLDER_SERVICE_URL: &str = "https://your-project.supabase.co";

/// Placeholder public key used when no key is configured
pub const PLACEHOLDER_ANON_KEY: &str = "public-anon-key";

/// Environment variable overriding the data service endpoint
pub const ENV_SERVICE_URL: &str = "DATA_SERVICE_URL";

/// Environment variable overriding the data service public key
pub const ENV_SERVICE_ANON_KEY: &str = "DATA_SERVICE_ANON_KEY";

/// Blob container holding uploaded photos and videos
pub const MEDIA_BUCKET: &str = "feedback-media";

/// Table names shared by every data service backend
pub const LOCATIONS_TABLE: &str = "toilets";
pub const FEEDBACKS_TABLE: &str = "feedbacks";

/// Number of locations provisioned when nothing else is configured
pub const DEFAULT_LOCATION_COUNT: u32 = 50;

/// Address encoded into QR codes when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Path prefix of the feedback form route
pub const FORM_PATH_PREFIX: &str = "toilet";

/// Ratings offered by the form, lowest first
pub const RATING_CHOICES: [u8; 5] = [1, 2, 3, 4, 5];

/// Rating preselected on a fresh form
pub const DEFAULT_RATING: u8 = 3;

/// Ratings at or below this value count as low
pub const LOW_RATING_THRESHOLD: u8 = 2;

/// Generate a collision-resistant file name for an uploaded media file.
/// Format: `<unix millis>-<8 random alphanumerics>.<ext>`
pub fn generate_media_file_name(extension: &str) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(8)
        .map(char::from)
        .collect::<String>()
        .to_lowercase();
    format!(
        "{}-{}.{}",
        chrono::Utc::now().timestamp_millis(),
        suffix,
        extension
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_file_names_do_not_collide() {
        let a = generate_media_file_name("jpg");
        let b = generate_media_file_name("jpg");
        assert_ne!(a, b);
        assert!(a.ends_with(".jpg"));

        let (millis, rest) = a.split_once('-').unwrap();
        assert!(millis.parse::<i64>().is_ok());
        assert_eq!(rest.len(), "abcdefgh.jpg".len());
    }
}
