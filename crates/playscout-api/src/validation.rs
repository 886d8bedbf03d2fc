//! Request validation

use playscout_core::AppError;

use crate::constants::{ALLOWED_URL_SCHEMES, MIN_MEDIA_URL_LEN};

/// Media URLs must use an allowed scheme and carry more than the scheme itself.
pub fn validate_media_url(url: &str) -> Result<(), AppError> {
    let url = url.trim();
    if url.len() < MIN_MEDIA_URL_LEN {
        return Err(AppError::InvalidInput(format!(
            "Media URL must be at least {} characters",
            MIN_MEDIA_URL_LEN
        )));
    }
    let lower = url.to_ascii_lowercase();
    if !ALLOWED_URL_SCHEMES
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return Err(AppError::InvalidInput(
            "Media URL must start with http://, https:// or gs://".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_supported_schemes() {
        assert!(validate_media_url("https://cdn.example.com/a.mp4").is_ok());
        assert!(validate_media_url("http://cdn.example.com/a.jpg").is_ok());
        assert!(validate_media_url("gs://bucket/clip.mp4").is_ok());
    }

    #[test]
    fn rejects_short_or_foreign_urls() {
        assert!(validate_media_url("http://a").is_err());
        assert!(validate_media_url("ftp://cdn.example.com/a.mp4").is_err());
        assert!(validate_media_url("   ").is_err());
    }
}
