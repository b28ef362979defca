//! Platform client capability and its HTTP implementation.
//!
//! The orchestrator only sees `PlatformClient`; the wire formats of the
//! individual platform APIs stay behind this boundary.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{CredentialSource, MediaAttachment, Platform, PlatformError};

/// Default interval between processing-status polls.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default number of processing-status polls before giving up.
const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 30;

/// Content handed to a platform for publishing.
#[derive(Debug, Clone, Serialize)]
pub struct PublishRequest {
    /// Rendered caption text.
    pub caption: String,
    /// Selected media attachments.
    pub media: Vec<MediaAttachment>,
    /// Derived hashtags, without the leading `#`.
    pub hashtags: Vec<String>,
}

/// A post created on a remote platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformPost {
    /// Remote identifier of the post.
    pub external_id: String,
    /// Public URL of the post, when the platform returns one.
    pub permalink: Option<String>,
}

/// Capability that performs the actual network call to a platform API.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Publish content to one platform.
    async fn publish(
        &self,
        platform: Platform,
        request: &PublishRequest,
    ) -> Result<PlatformPost, PlatformError>;
}

/// Per-platform API base URLs.
#[derive(Debug, Clone, Default)]
pub struct PlatformEndpoints {
    base_urls: HashMap<Platform, String>,
}

impl PlatformEndpoints {
    /// Create an empty endpoint table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the base URL for a platform.
    pub fn with_endpoint(mut self, platform: Platform, base_url: impl Into<String>) -> Self {
        self.base_urls
            .insert(platform, base_url.into().trim_end_matches('/').to_string());
        self
    }

    /// The base URL for a platform, if configured.
    pub fn url_for(&self, platform: Platform) -> Option<&str> {
        self.base_urls.get(&platform).map(String::as_str)
    }
}

/// Response from a post creation call.
#[derive(Debug, Deserialize)]
struct CreatePostResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    permalink: Option<String>,
    /// Present when the platform accepted the post for asynchronous
    /// processing (202) instead of creating it immediately.
    #[serde(default)]
    processing_id: Option<String>,
}

/// Response from a processing-status poll.
#[derive(Debug, Deserialize)]
struct ProcessingStatusResponse {
    status: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    permalink: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Generic HTTP implementation of `PlatformClient`.
///
/// Posts JSON to a per-platform endpoint with bearer auth. Platforms that
/// process media asynchronously answer `202 Accepted` with a processing id;
/// those are polled on a fixed interval with a bounded attempt count and fail
/// with a timeout once exhausted.
pub struct HttpPlatformClient {
    http: Client,
    endpoints: PlatformEndpoints,
    credentials: Arc<dyn CredentialSource>,
    poll_interval: Duration,
    max_poll_attempts: u32,
}

impl HttpPlatformClient {
    /// Create a client with default polling bounds.
    pub fn new(endpoints: PlatformEndpoints, credentials: Arc<dyn CredentialSource>) -> Self {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            endpoints,
            credentials,
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
        }
    }

    /// Override the processing-status polling bounds.
    pub fn with_polling(mut self, interval: Duration, max_attempts: u32) -> Self {
        self.poll_interval = interval;
        self.max_poll_attempts = max_attempts;
        self
    }

    async fn bearer_token(&self, platform: Platform) -> Result<String, PlatformError> {
        let token = self
            .credentials
            .resolve_token(platform)
            .await?
            .ok_or_else(|| {
                PlatformError::Credential(format!("no credentials configured for {}", platform))
            })?;

        if token.is_expired() {
            return Err(PlatformError::Credential(format!(
                "token for {} is expired",
                platform
            )));
        }

        Ok(token.secret().to_string())
    }

    /// Poll the processing-status endpoint until the post is ready.
    ///
    /// Bounded: at most `max_poll_attempts` polls, `poll_interval` apart.
    async fn poll_processing(
        &self,
        platform: Platform,
        base_url: &str,
        token: &str,
        processing_id: &str,
    ) -> Result<PlatformPost, PlatformError> {
        let url = format!("{}/posts/processing/{}", base_url, processing_id);

        for attempt in 1..=self.max_poll_attempts {
            let response = self
                .http
                .get(&url)
                .header("Authorization", format!("Bearer {}", token))
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(PlatformError::Api {
                    platform,
                    status: status.as_u16(),
                    message,
                });
            }

            let body: ProcessingStatusResponse = response.json().await?;
            match body.status.as_str() {
                "ready" => {
                    let external_id = body.id.ok_or_else(|| PlatformError::Api {
                        platform,
                        status: status.as_u16(),
                        message: "processing finished without a post id".to_string(),
                    })?;
                    debug!(platform = %platform, attempt, "media processing finished");
                    return Ok(PlatformPost {
                        external_id,
                        permalink: body.permalink,
                    });
                }
                "failed" => {
                    return Err(PlatformError::Api {
                        platform,
                        status: status.as_u16(),
                        message: body
                            .error
                            .unwrap_or_else(|| "media processing failed".to_string()),
                    });
                }
                _ => {
                    if attempt < self.max_poll_attempts {
                        sleep(self.poll_interval).await;
                    }
                }
            }
        }

        warn!(
            platform = %platform,
            attempts = self.max_poll_attempts,
            "media processing did not finish in time"
        );
        Err(PlatformError::Timeout {
            platform,
            attempts: self.max_poll_attempts,
        })
    }
}

#[async_trait]
impl PlatformClient for HttpPlatformClient {
    #[tracing::instrument(skip(self, request), fields(platform = %platform))]
    async fn publish(
        &self,
        platform: Platform,
        request: &PublishRequest,
    ) -> Result<PlatformPost, PlatformError> {
        let base_url = self
            .endpoints
            .url_for(platform)
            .ok_or(PlatformError::NotConfigured { platform })?;

        let token = self.bearer_token(platform).await?;
        let url = format!("{}/posts", base_url);

        debug!(media = request.media.len(), "dispatching post");

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", token))
            .json(request)
            .send()
            .await?;

        let status = response.status();

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let message = response.text().await.unwrap_or_default();
            return Err(PlatformError::Credential(format!(
                "{} rejected credentials ({}): {}",
                platform, status, message
            )));
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            return Err(PlatformError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PlatformError::Api {
                platform,
                status: status.as_u16(),
                message,
            });
        }

        let body: CreatePostResponse = response.json().await?;

        if status == StatusCode::ACCEPTED {
            let processing_id = body.processing_id.ok_or_else(|| PlatformError::Api {
                platform,
                status: status.as_u16(),
                message: "202 response without a processing id".to_string(),
            })?;
            debug!(processing_id = %processing_id, "post accepted for processing");
            return self
                .poll_processing(platform, base_url, &token, &processing_id)
                .await;
        }

        let external_id = body.id.ok_or_else(|| PlatformError::Api {
            platform,
            status: status.as_u16(),
            message: "response without a post id".to_string(),
        })?;

        Ok(PlatformPost {
            external_id,
            permalink: body.permalink,
        })
    }
}
