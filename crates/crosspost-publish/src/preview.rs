//! Campaign preview: render every item without publishing.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crosspost_content::generate;
use crosspost_platform::MediaAttachment;
use crosspost_store::Campaign;

use crate::validate::validate;

/// Rendered preview of one campaign item.
#[derive(Debug, Clone, Serialize)]
pub struct ItemPreview {
    /// Item position.
    pub position: usize,
    /// When the item is scheduled.
    pub scheduled_at: DateTime<Utc>,
    /// Rendered caption.
    pub caption: String,
    /// Selected media.
    pub media: Vec<MediaAttachment>,
    /// Derived hashtags.
    pub hashtags: Vec<String>,
    /// Compatibility issues this item would fail with.
    pub issues: Vec<String>,
}

/// Generate content for every item of a campaign, with the validation issues
/// each would hit. Never touches the network.
pub fn preview_campaign(campaign: &Campaign) -> Vec<ItemPreview> {
    campaign
        .items
        .iter()
        .map(|item| {
            let content = generate(&item.product, item.product.design.as_ref(), &campaign.rule);
            let issues = validate(&campaign.target, &content)
                .into_iter()
                .map(|issue| issue.to_string())
                .collect();
            ItemPreview {
                position: item.position,
                scheduled_at: item.scheduled_at,
                caption: content.caption,
                media: content.media,
                hashtags: content.hashtags,
                issues,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use crosspost_content::{ContentRule, Product};
    use crosspost_platform::{Platform, PublishTarget};

    fn product(title: &str, with_media: bool) -> Product {
        Product {
            id: title.to_lowercase().replace(' ', "_"),
            title: title.to_string(),
            description: "A thing.".to_string(),
            url: "https://shop.example/p".to_string(),
            thumbnail_url: with_media.then(|| "https://cdn.example/t.jpg".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn preview_renders_every_item_in_position_order() {
        let campaign = Campaign::new(
            "Preview",
            PublishTarget::single(Platform::Facebook),
            ContentRule::default(),
            60,
            vec![product("First Mug", true), product("Second Mug", true)],
            Utc::now(),
        );

        let previews = preview_campaign(&campaign);
        assert_eq!(previews.len(), 2);
        assert_eq!(previews[0].position, 0);
        assert!(previews[0].caption.contains("First Mug"));
        assert_eq!(previews[1].position, 1);
        assert!(previews[1].caption.contains("Second Mug"));
        assert_eq!(
            previews[1].scheduled_at - previews[0].scheduled_at,
            Duration::minutes(60)
        );
    }

    #[test]
    fn preview_surfaces_validation_issues_per_item() {
        let campaign = Campaign::new(
            "Preview",
            PublishTarget::single(Platform::Instagram),
            ContentRule::default(),
            60,
            vec![product("Has Media", true), product("No Media", false)],
            Utc::now(),
        );

        let previews = preview_campaign(&campaign);
        assert!(previews[0].issues.is_empty());
        assert_eq!(previews[1].issues.len(), 1);
        assert!(previews[1].issues[0].contains("media"));
    }
}
