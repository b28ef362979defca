//! Platform and publish-target types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A social platform the engine can publish to.
///
/// This is a closed set: every consumer matches exhaustively, so adding a
/// platform is a compile-visible change rather than a new string constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Instagram. Media is mandatory, captions are long, no mixed media.
    Instagram,
    /// Facebook pages. Text-only posts are fine, mixed media allowed.
    Facebook,
    /// Twitter/X. 280-character captions, at most four images.
    Twitter,
}

/// Capability record for a platform.
///
/// The validator and orchestrator branch on these fields instead of comparing
/// platform names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformCaps {
    /// The platform rejects posts without at least one media attachment.
    pub media_required: bool,
    /// Maximum caption length in characters, if the platform enforces one.
    pub char_limit: Option<usize>,
    /// Maximum number of images in a single post.
    pub max_images: usize,
    /// Whether a video may be combined with images in the same post.
    pub allows_mixed_media: bool,
}

impl Platform {
    /// All known platforms.
    pub const ALL: [Platform; 3] = [Platform::Instagram, Platform::Facebook, Platform::Twitter];

    /// The capability record for this platform.
    pub fn caps(&self) -> PlatformCaps {
        match self {
            Platform::Instagram => PlatformCaps {
                media_required: true,
                char_limit: Some(2200),
                max_images: 10,
                allows_mixed_media: false,
            },
            Platform::Facebook => PlatformCaps {
                media_required: false,
                char_limit: None,
                max_images: 10,
                allows_mixed_media: true,
            },
            Platform::Twitter => PlatformCaps {
                media_required: false,
                char_limit: Some(280),
                max_images: 4,
                allows_mixed_media: false,
            },
        }
    }

    /// Stable lowercase name, used in logs and result keys.
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Instagram => "instagram",
            Platform::Facebook => "facebook",
            Platform::Twitter => "twitter",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a campaign publishes: one platform, or two at once.
///
/// A combined target dispatches each item to both platforms in the same
/// attempt. The pair is ordered; ordering is stable across retries so result
/// merging stays deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PublishTarget {
    /// Publish to a single platform.
    Single { platform: Platform },
    /// Publish to two platforms in one attempt.
    Combined { first: Platform, second: Platform },
}

impl PublishTarget {
    /// Create a single-platform target.
    pub fn single(platform: Platform) -> Self {
        PublishTarget::Single { platform }
    }

    /// Create a combined two-platform target.
    pub fn combined(first: Platform, second: Platform) -> Self {
        PublishTarget::Combined { first, second }
    }

    /// The platforms this target spans, in dispatch order.
    pub fn platforms(&self) -> Vec<Platform> {
        match self {
            PublishTarget::Single { platform } => vec![*platform],
            PublishTarget::Combined { first, second } => vec![*first, *second],
        }
    }

    /// Whether this target spans more than one platform.
    pub fn is_combined(&self) -> bool {
        matches!(self, PublishTarget::Combined { .. })
    }

    /// Whether this target includes the given platform.
    pub fn contains(&self, platform: Platform) -> bool {
        self.platforms().contains(&platform)
    }

    /// Narrow this target to a single platform.
    pub fn narrow(&self, platform: Platform) -> PublishTarget {
        PublishTarget::Single { platform }
    }
}

impl fmt::Display for PublishTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishTarget::Single { platform } => write!(f, "{}", platform),
            PublishTarget::Combined { first, second } => write!(f, "{}+{}", first, second),
        }
    }
}

/// Kind of a media attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

/// A media attachment selected for a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAttachment {
    /// Source URL of the asset.
    pub url: String,
    /// Whether this is an image or a video.
    pub kind: MediaKind,
}

impl MediaAttachment {
    /// Create an image attachment.
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: MediaKind::Image,
        }
    }

    /// Create a video attachment.
    pub fn video(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: MediaKind::Video,
        }
    }
}

/// Outcome of one publish attempt on one platform.
///
/// A post's result list holds at most one of these per platform; retries
/// replace the matching entry rather than appending a duplicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishResult {
    /// The platform this entry belongs to.
    pub platform: Platform,
    /// Whether the dispatch succeeded.
    pub success: bool,
    /// Remote identifier of the created post, on success.
    pub external_id: Option<String>,
    /// Public URL of the created post, when the platform returns one.
    pub permalink: Option<String>,
    /// The per-platform error message, on failure.
    pub error: Option<String>,
}

impl PublishResult {
    /// A successful result.
    pub fn ok(platform: Platform, external_id: String, permalink: Option<String>) -> Self {
        Self {
            platform,
            success: true,
            external_id: Some(external_id),
            permalink,
            error: None,
        }
    }

    /// A failed result.
    pub fn failed(platform: Platform, error: impl Into<String>) -> Self {
        Self {
            platform,
            success: false,
            external_id: None,
            permalink: None,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(Platform::Instagram => true; "instagram requires media")]
    #[test_case(Platform::Facebook => false; "facebook allows text only")]
    #[test_case(Platform::Twitter => false; "twitter allows text only")]
    fn media_required(platform: Platform) -> bool {
        platform.caps().media_required
    }

    #[test]
    fn twitter_char_limit_is_280() {
        assert_eq!(Platform::Twitter.caps().char_limit, Some(280));
    }

    #[test]
    fn facebook_has_no_char_limit() {
        assert_eq!(Platform::Facebook.caps().char_limit, None);
    }

    #[test]
    fn combined_target_spans_both_platforms() {
        let target = PublishTarget::combined(Platform::Instagram, Platform::Facebook);
        assert!(target.is_combined());
        assert_eq!(
            target.platforms(),
            vec![Platform::Instagram, Platform::Facebook]
        );
        assert!(target.contains(Platform::Instagram));
        assert!(target.contains(Platform::Facebook));
        assert!(!target.contains(Platform::Twitter));
    }

    #[test]
    fn narrow_produces_single_target() {
        let target = PublishTarget::combined(Platform::Instagram, Platform::Facebook);
        let narrowed = target.narrow(Platform::Facebook);
        assert!(!narrowed.is_combined());
        assert_eq!(narrowed.platforms(), vec![Platform::Facebook]);
    }

    #[test]
    fn platform_serde_round_trip() {
        let json = serde_json::to_string(&Platform::Instagram).unwrap();
        assert_eq!(json, "\"instagram\"");
        let back: Platform = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Platform::Instagram);
    }

    #[test]
    fn target_serde_uses_type_tag() {
        let target = PublishTarget::single(Platform::Twitter);
        let json = serde_json::to_value(&target).unwrap();
        assert_eq!(json["type"], "single");
        assert_eq!(json["platform"], "twitter");
    }

    #[test]
    fn result_constructors() {
        let ok = PublishResult::ok(
            Platform::Facebook,
            "fb_123".to_string(),
            Some("https://facebook.com/p/123".to_string()),
        );
        assert!(ok.success);
        assert!(ok.error.is_none());

        let failed = PublishResult::failed(Platform::Twitter, "rate limited");
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("rate limited"));
        assert!(failed.external_id.is_none());
    }
}
