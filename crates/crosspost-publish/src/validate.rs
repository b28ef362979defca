//! Compatibility validation.
//!
//! A pure, fail-fast gate between content generation and dispatch: any
//! non-empty issue list aborts the attempt for the entire item before a
//! single network call is made.

use std::fmt;

use serde::Serialize;

use crosspost_content::GeneratedContent;
use crosspost_platform::{Platform, PublishTarget};

/// One reason content is incompatible with the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// The offending platform, or `None` for target-level issues.
    pub platform: Option<Platform>,
    /// Human-readable description.
    pub message: String,
}

impl ValidationIssue {
    /// An issue tied to one platform.
    pub fn platform(platform: Platform, message: impl Into<String>) -> Self {
        Self {
            platform: Some(platform),
            message: message.into(),
        }
    }

    /// A target-level issue.
    pub fn general(message: impl Into<String>) -> Self {
        Self {
            platform: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.platform {
            Some(platform) => write!(f, "{}: {}", platform, self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Check generated content against every platform in the target.
///
/// Branches only on capability records, matched exhaustively over the closed
/// platform set. An empty return value means the content may be dispatched.
pub fn validate(target: &PublishTarget, content: &GeneratedContent) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let platforms = target.platforms();

    // Mixed-target video is unsupported regardless of capabilities.
    if content.is_single_video() && target.is_combined() {
        issues.push(ValidationIssue::general(
            "a single video cannot target multiple platforms at once",
        ));
    }

    let caption_len = content.caption.chars().count();

    for platform in platforms {
        let caps = platform.caps();

        if caps.media_required && !content.has_media() {
            issues.push(ValidationIssue::platform(
                platform,
                "at least one media attachment is required",
            ));
        }

        if let Some(limit) = caps.char_limit {
            if caption_len > limit {
                issues.push(ValidationIssue::platform(
                    platform,
                    format!(
                        "caption is {} characters, the limit is {}",
                        caption_len, limit
                    ),
                ));
            }
        }

        if content.image_count() > caps.max_images {
            issues.push(ValidationIssue::platform(
                platform,
                format!(
                    "{} images attached, at most {} allowed",
                    content.image_count(),
                    caps.max_images
                ),
            ));
        }

        if !caps.allows_mixed_media && content.has_video() && content.image_count() > 0 {
            issues.push(ValidationIssue::platform(
                platform,
                "video cannot be combined with images",
            ));
        }
    }

    issues
}
