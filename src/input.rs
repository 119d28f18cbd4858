use regex_lite::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

use crate::error::ApiError;

/// Query string accepted by `GET /download`.
#[derive(Deserialize, Debug, Default)]
pub struct DownloadQuery {
    #[serde(rename = "videoId")]
    pub video_id: Option<String>,
    pub url: Option<String>,
}

/// A validated video reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoTarget {
    pub video_id: String,
    pub watch_url: String,
}

impl VideoTarget {
    fn from_id(video_id: &str) -> Self {
        Self {
            video_id: video_id.to_string(),
            watch_url: format!("https://www.youtube.com/watch?v={video_id}"),
        }
    }
}

fn bare_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("static pattern"))
}

fn url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?:https?://)?(?:[A-Za-z0-9-]+\.)*(?:youtube\.com/(?:watch/?\?(?:[^#]*&)?v=|shorts/|embed/|live/|v/)|youtu\.be/)([A-Za-z0-9_-]{11})(?:[?&#/].*)?$",
        )
        .expect("static pattern")
    })
}

/// Extract the video id from a YouTube URL in any of the common shapes.
pub fn video_id_from_url(url: &str) -> Option<String> {
    url_re()
        .captures(url.trim())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Turn the raw query into a canonical watch URL. `videoId` wins over `url`.
pub fn normalize(query: &DownloadQuery) -> Result<VideoTarget, ApiError> {
    if let Some(id) = non_blank(&query.video_id) {
        if bare_id_re().is_match(id) {
            return Ok(VideoTarget::from_id(id));
        }
        // Clients sometimes paste a full link into videoId.
        return video_id_from_url(id)
            .map(|id| VideoTarget::from_id(&id))
            .ok_or_else(|| ApiError::InvalidInput(format!("Invalid videoId: {id}")));
    }

    if let Some(url) = non_blank(&query.url) {
        return video_id_from_url(url)
            .map(|id| VideoTarget::from_id(&id))
            .ok_or_else(|| ApiError::InvalidInput(format!("Invalid YouTube URL: {url}")));
    }

    Err(ApiError::MissingInput)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(video_id: Option<&str>, url: Option<&str>) -> DownloadQuery {
        DownloadQuery {
            video_id: video_id.map(String::from),
            url: url.map(String::from),
        }
    }

    #[test]
    fn test_bare_video_id() {
        let target = normalize(&query(Some(" dQw4w9WgXcQ "), None)).unwrap();
        assert_eq!(target.video_id, "dQw4w9WgXcQ");
        assert_eq!(target.watch_url, "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    }

    #[test]
    fn test_url_shapes() {
        let cases = [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ&t=42",
            "http://m.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://music.youtube.com/watch?v=dQw4w9WgXcQ&list=RD",
            "youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?si=abc",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://www.youtube.com/live/dQw4w9WgXcQ?feature=share",
            "https://www.youtube.com/v/dQw4w9WgXcQ",
        ];
        for case in cases {
            assert_eq!(
                video_id_from_url(case).as_deref(),
                Some("dQw4w9WgXcQ"),
                "failed on {case}"
            );
        }
    }

    #[test]
    fn test_rejects_foreign_and_malformed_urls() {
        let cases = [
            "https://vimeo.com/123456789",
            "https://www.youtube.com/watch?v=short",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQextra",
            "https://notyoutube.com.evil/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/channel/UC123",
            "not a url",
        ];
        for case in cases {
            assert!(video_id_from_url(case).is_none(), "accepted {case}");
        }
    }

    #[test]
    fn test_video_id_takes_precedence() {
        let target = normalize(&query(
            Some("dQw4w9WgXcQ"),
            Some("https://youtu.be/aaaaaaaaaaa"),
        ))
        .unwrap();
        assert_eq!(target.video_id, "dQw4w9WgXcQ");
    }

    #[test]
    fn test_url_pasted_into_video_id() {
        let target = normalize(&query(Some("https://youtu.be/dQw4w9WgXcQ"), None)).unwrap();
        assert_eq!(target.video_id, "dQw4w9WgXcQ");
    }

    #[test]
    fn test_missing_and_blank_input() {
        assert!(matches!(normalize(&query(None, None)), Err(ApiError::MissingInput)));
        assert!(matches!(
            normalize(&query(Some("  "), Some(""))),
            Err(ApiError::MissingInput)
        ));
    }

    #[test]
    fn test_malformed_input() {
        assert!(matches!(
            normalize(&query(Some("abc"), None)),
            Err(ApiError::InvalidInput(_))
        ));
        assert!(matches!(
            normalize(&query(None, Some("https://example.com/video"))),
            Err(ApiError::InvalidInput(_))
        ));
    }
}
