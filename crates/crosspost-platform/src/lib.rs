//! Platform model for crosspost.
//!
//! This crate provides:
//! - The closed set of publishable platforms and their capability records
//! - Publish targets (single platform or a combined pair)
//! - The `PlatformClient` capability trait plus a generic HTTP implementation
//! - The `CredentialSource` capability trait and a TTL token cache

mod client;
mod credentials;
mod error;
mod types;

pub use client::{HttpPlatformClient, PlatformClient, PlatformEndpoints, PlatformPost, PublishRequest};
pub use credentials::{AccessToken, CredentialSource, StaticCredentials, TokenCache};
pub use error::PlatformError;
pub use types::{MediaAttachment, MediaKind, Platform, PlatformCaps, PublishResult, PublishTarget};
