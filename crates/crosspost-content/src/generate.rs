//! The content generator: product + rule -> caption, media, hashtags.

use crosspost_platform::{MediaAttachment, MediaKind};

use crate::rule::{ContentRule, HashtagStrategy, MediaSelection};
use crate::template::{TemplateContext, render};
use crate::{Design, Product};

/// Maximum number of hashtags derived from product/design data.
const MAX_HASHTAGS: usize = 10;

/// Maximum length of a single normalized hashtag.
const MAX_HASHTAG_LEN: usize = 30;

/// Content generated for one post.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedContent {
    /// Rendered caption.
    pub caption: String,
    /// Selected media attachments.
    pub media: Vec<MediaAttachment>,
    /// Derived hashtags, without the leading `#`.
    pub hashtags: Vec<String>,
}

impl GeneratedContent {
    /// Whether any media was selected.
    pub fn has_media(&self) -> bool {
        !self.media.is_empty()
    }

    /// Number of image attachments.
    pub fn image_count(&self) -> usize {
        self.media
            .iter()
            .filter(|m| m.kind == MediaKind::Image)
            .count()
    }

    /// Whether any attachment is a video.
    pub fn has_video(&self) -> bool {
        self.media.iter().any(|m| m.kind == MediaKind::Video)
    }

    /// Whether the content is exactly one video and nothing else.
    pub fn is_single_video(&self) -> bool {
        self.media.len() == 1 && self.media[0].kind == MediaKind::Video
    }
}

/// Generate post content from a product, its optional design, and a rule.
///
/// Pure: the same inputs always yield the same output, and no I/O happens.
pub fn generate(product: &Product, design: Option<&Design>, rule: &ContentRule) -> GeneratedContent {
    let hashtags = derive_hashtags(product, design, &rule.hashtags);

    let mut ctx = TemplateContext {
        title: product.title.clone(),
        description: truncate_description(&product.description, rule.max_description_len),
        url: product.url.clone(),
        hashtags: hashtags
            .iter()
            .map(|t| format!("#{}", t))
            .collect::<Vec<_>>()
            .join(" "),
        ..Default::default()
    };

    if rule.include_price {
        if let Some(price) = product.price {
            ctx.price = format!("${:.2}", price);
        }
    }

    if rule.include_design {
        if let Some(design) = design {
            ctx.design_name = design.name.clone();
            ctx.design_description = design.description.clone().unwrap_or_default();
        }
    }

    GeneratedContent {
        caption: render(&rule.caption_template, &ctx),
        media: select_media(product, &rule.media),
        hashtags,
    }
}

/// Truncate a description to `max` characters.
///
/// Short descriptions are returned unchanged. Longer ones are cut at
/// `max - 3` to make room for the ellipsis; when the nearest preceding space
/// falls within the last 30% of that window, the cut moves back to it so
/// words stay whole.
pub fn truncate_description(text: &str, max: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max {
        return text.to_string();
    }

    let cut = max.saturating_sub(3);
    let threshold = cut.saturating_mul(7) / 10;

    let cut_at = match chars[..cut].iter().rposition(|c| *c == ' ') {
        Some(space) if space >= threshold => space,
        _ => cut,
    };

    let mut out: String = chars[..cut_at].iter().collect();
    out.truncate(out.trim_end().len());
    out.push_str("...");
    out
}

/// Select media for a post according to the rule's mode.
///
/// A product video is used as the fallback for single-asset modes when the
/// product has neither a thumbnail nor images, and leads the attachment list
/// in `all` mode. A product with no assets yields an empty list.
fn select_media(product: &Product, mode: &MediaSelection) -> Vec<MediaAttachment> {
    let thumbnail = product.thumbnail_url.as_deref();
    let first_image = product.image_urls.first().map(String::as_str);

    match mode {
        MediaSelection::Thumbnail | MediaSelection::Featured => {
            single_or_video_fallback(thumbnail.or(first_image), product)
        }
        MediaSelection::First => single_or_video_fallback(first_image, product),
        MediaSelection::All { max_images } => {
            let mut media = Vec::new();
            if let Some(video) = product.video_url.as_deref() {
                media.push(MediaAttachment::video(video));
            }
            media.extend(
                product
                    .image_urls
                    .iter()
                    .take(*max_images)
                    .map(|url| MediaAttachment::image(url.as_str())),
            );
            media
        }
    }
}

fn single_or_video_fallback(url: Option<&str>, product: &Product) -> Vec<MediaAttachment> {
    match url {
        Some(url) => vec![MediaAttachment::image(url)],
        None => product
            .video_url
            .as_deref()
            .map(|v| vec![MediaAttachment::video(v)])
            .unwrap_or_default(),
    }
}

/// Derive hashtags according to the strategy.
fn derive_hashtags(
    product: &Product,
    design: Option<&Design>,
    strategy: &HashtagStrategy,
) -> Vec<String> {
    let raw: Vec<&str> = match strategy {
        HashtagStrategy::Custom { tags } => return tags.clone(),
        HashtagStrategy::FromProduct => product
            .tags
            .iter()
            .map(String::as_str)
            .chain(product.category.as_deref())
            .collect(),
        HashtagStrategy::FromDesign => match design {
            Some(design) => design
                .tags
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(design.name.as_str()))
                .collect(),
            None => Vec::new(),
        },
        HashtagStrategy::None => return Vec::new(),
    };

    let mut seen = std::collections::HashSet::new();
    let mut tags = Vec::new();
    for candidate in raw {
        if let Some(tag) = normalize_hashtag(candidate) {
            if seen.insert(tag.clone()) {
                tags.push(tag);
                if tags.len() == MAX_HASHTAGS {
                    break;
                }
            }
        }
    }
    tags
}

/// Normalize one tag: lowercase, strip anything outside `[a-z0-9]`, cap the
/// length. Tags that normalize to nothing are dropped.
fn normalize_hashtag(raw: &str) -> Option<String> {
    let normalized: String = raw
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .take(MAX_HASHTAG_LEN)
        .collect();

    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}
