//! Error types for the campaign store.

use thiserror::Error;

/// Errors that can occur in store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Campaign not found.
    #[error("campaign not found: {0}")]
    CampaignNotFound(String),

    /// Item not found within a campaign.
    #[error("item not found: campaign {campaign_id}, position {position}")]
    ItemNotFound {
        campaign_id: String,
        position: usize,
    },

    /// Post not found.
    #[error("post not found: {0}")]
    PostNotFound(String),

    /// A state-machine guard rejected the transition. Nothing was mutated.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// Bad input for a campaign or item.
    #[error("validation error: {0}")]
    Validation(String),
}
