//! Source records content is generated from.

use serde::{Deserialize, Serialize};

/// A design associated with a product (e.g. the artwork printed on it).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Design {
    /// Design name.
    pub name: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// Design tags.
    pub tags: Vec<String>,
}

/// A product record, the source of one campaign item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Stable product identifier.
    pub id: String,
    /// Product title.
    pub title: String,
    /// Product description.
    pub description: String,
    /// Price, if the product has one.
    pub price: Option<f64>,
    /// Public product URL.
    pub url: String,
    /// Product tags.
    pub tags: Vec<String>,
    /// Product category.
    pub category: Option<String>,
    /// Designated thumbnail image URL.
    pub thumbnail_url: Option<String>,
    /// Product image URLs, in source order.
    pub image_urls: Vec<String>,
    /// Product video URL, if any.
    pub video_url: Option<String>,
    /// The design this product was produced from, if any.
    pub design: Option<Design>,
}
