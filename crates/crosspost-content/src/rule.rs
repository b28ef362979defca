//! Content rule configuration.

use serde::{Deserialize, Serialize};

/// How hashtags are derived for a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum HashtagStrategy {
    /// Use the configured list verbatim.
    Custom { tags: Vec<String> },
    /// Derive from the product's tags and category.
    FromProduct,
    /// Derive from the design's tags and name.
    FromDesign,
    /// No hashtags.
    None,
}

/// Which media assets are attached to a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MediaSelection {
    /// Prefer the designated thumbnail, falling back to the first image.
    Thumbnail,
    /// The first image only.
    First,
    /// The thumbnail or, if absent, the first image.
    Featured,
    /// All assets up to `max_images` images, in source order.
    All { max_images: usize },
}

/// Configuration governing how a product is rendered into post content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRule {
    /// Caption template with `{{variable}}` and `{{#if variable}}` blocks.
    pub caption_template: String,
    /// Maximum description length before truncation.
    pub max_description_len: usize,
    /// Whether the price is exposed to the template.
    pub include_price: bool,
    /// Whether design fields are exposed to the template.
    pub include_design: bool,
    /// Hashtag derivation strategy.
    pub hashtags: HashtagStrategy,
    /// Media selection mode.
    pub media: MediaSelection,
}

impl Default for ContentRule {
    fn default() -> Self {
        Self {
            caption_template: "{{title}}\n\n{{description}}\
                               {{#if price}}\n\nNow {{price}}{{/if}}\
                               \n\n{{url}}\
                               {{#if hashtags}}\n\n{{hashtags}}{{/if}}"
                .to_string(),
            max_description_len: 300,
            include_price: true,
            include_design: false,
            hashtags: HashtagStrategy::FromProduct,
            media: MediaSelection::Featured,
        }
    }
}
