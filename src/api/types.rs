//! Request and response types for the posting service

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// One social account a post is published to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformTarget {
    pub platform: String,
    pub account_id: String,
}

impl PlatformTarget {
    pub fn new(platform: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            account_id: account_id.into(),
        }
    }
}

impl FromStr for PlatformTarget {
    type Err = String;

    /// Parse `platform:account_id`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((platform, account)) if !platform.trim().is_empty() && !account.trim().is_empty() => {
                Ok(Self::new(platform.trim().to_lowercase(), account.trim()))
            }
            _ => Err(format!("expected platform:account_id, got '{}'", s)),
        }
    }
}

impl fmt::Display for PlatformTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.platform, self.account_id)
    }
}

/// A media payload ready for upload.
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub data: Bytes,
    pub filename: String,
    pub mime_type: String,
}

impl MediaUpload {
    pub fn new(data: Bytes, filename: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            data,
            filename: filename.into(),
            mime_type: mime_type.into(),
        }
    }
}

/// A post to create.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreatePostRequest {
    pub text: String,
    pub media_urls: Vec<String>,
    pub platforms: Vec<PlatformTarget>,
    /// Publish time; `None` publishes immediately.
    pub scheduled_for: Option<DateTime<Utc>>,
    pub timezone: Option<String>,
}

impl CreatePostRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_media_url(mut self, url: impl Into<String>) -> Self {
        self.media_urls.push(url.into());
        self
    }

    pub fn with_platform(mut self, target: PlatformTarget) -> Self {
        self.platforms.push(target);
        self
    }

    pub fn with_platforms(mut self, targets: Vec<PlatformTarget>) -> Self {
        self.platforms.extend(targets);
        self
    }

    pub fn scheduled_for(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_for = Some(at);
        self
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    /// JSON body for `POST /posts`.
    pub fn to_body(&self) -> Value {
        let media_items: Vec<Value> = self
            .media_urls
            .iter()
            .map(|url| json!({ "type": media_kind_for(url), "url": url }))
            .collect();

        let mut body = json!({
            "content": self.text,
            "mediaItems": media_items,
            "platforms": self.platforms,
        });

        match self.scheduled_for {
            Some(at) => {
                body["scheduledFor"] = json!(at.to_rfc3339_opts(SecondsFormat::Secs, true));
            }
            None => {
                body["publishNow"] = json!(true);
            }
        }

        if let Some(tz) = &self.timezone {
            body["timezone"] = json!(tz);
        }

        body
    }
}

/// A post accepted by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedPost {
    pub post_id: String,
    pub success: bool,
}

impl CreatedPost {
    pub fn new(post_id: impl Into<String>) -> Self {
        Self {
            post_id: post_id.into(),
            success: true,
        }
    }
}

/// Find the post id in a create-post response.
///
/// The service has used `_id`, `id` and `postId`, sometimes nested under
/// `post`.
pub fn extract_post_id(body: &Value) -> Option<String> {
    const KEYS: [&str; 3] = ["_id", "id", "postId"];

    let lookup = |v: &Value| {
        KEYS.iter().find_map(|key| match v.get(key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    };

    lookup(body).or_else(|| body.get("post").and_then(lookup))
}

/// `video` for common video extensions, `image` otherwise.
pub fn media_kind_for(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ext = path.rsplit('.').next().unwrap_or("").to_ascii_lowercase();
    match ext.as_str() {
        "mp4" | "mov" | "webm" | "m4v" | "avi" | "mkv" => "video",
        _ => "image",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_platform_target_parse() {
        let target: PlatformTarget = "Instagram:acc_123".parse().unwrap();
        assert_eq!(target.platform, "instagram");
        assert_eq!(target.account_id, "acc_123");
        assert_eq!(target.to_string(), "instagram:acc_123");

        assert!("instagram".parse::<PlatformTarget>().is_err());
        assert!(":acc".parse::<PlatformTarget>().is_err());
        assert!("tiktok:".parse::<PlatformTarget>().is_err());
    }

    #[test]
    fn test_platform_target_serializes_camel_case() {
        let json = serde_json::to_value(PlatformTarget::new("twitter", "a1")).unwrap();
        assert_eq!(json["platform"], "twitter");
        assert_eq!(json["accountId"], "a1");
    }

    #[test]
    fn test_body_publish_now() {
        let request = CreatePostRequest::new("Hello")
            .with_media_url("https://cdn.example/a.jpg")
            .with_platform(PlatformTarget::new("twitter", "a1"));

        let body = request.to_body();

        assert_eq!(body["content"], "Hello");
        assert_eq!(body["mediaItems"][0]["type"], "image");
        assert_eq!(body["mediaItems"][0]["url"], "https://cdn.example/a.jpg");
        assert_eq!(body["platforms"][0]["accountId"], "a1");
        assert_eq!(body["publishNow"], true);
        assert!(body.get("scheduledFor").is_none());
        assert!(body.get("timezone").is_none());
    }

    #[test]
    fn test_body_scheduled() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();
        let request = CreatePostRequest::new("Later")
            .with_media_url("https://cdn.example/clip.MP4?sig=1")
            .scheduled_for(at)
            .with_timezone("Europe/Berlin");

        let body = request.to_body();

        assert_eq!(body["scheduledFor"], "2026-03-01T09:30:00Z");
        assert_eq!(body["timezone"], "Europe/Berlin");
        assert_eq!(body["mediaItems"][0]["type"], "video");
        assert!(body.get("publishNow").is_none());
    }

    #[test]
    fn test_extract_post_id_variants() {
        assert_eq!(extract_post_id(&json!({ "_id": "a" })), Some("a".to_string()));
        assert_eq!(extract_post_id(&json!({ "id": "b" })), Some("b".to_string()));
        assert_eq!(extract_post_id(&json!({ "postId": "c" })), Some("c".to_string()));
        assert_eq!(extract_post_id(&json!({ "id": 42 })), Some("42".to_string()));
        assert_eq!(extract_post_id(&json!({ "post": { "_id": "d" } })), Some("d".to_string()));
        assert_eq!(extract_post_id(&json!({ "_id": "", "id": "e" })), Some("e".to_string()));
        assert_eq!(extract_post_id(&json!({ "status": "ok" })), None);
    }

    #[test]
    fn test_media_kind_for() {
        assert_eq!(media_kind_for("https://x/y/photo.png"), "image");
        assert_eq!(media_kind_for("https://x/y/reel.mov"), "video");
        assert_eq!(media_kind_for("https://x/y/noext"), "image");
    }
}
