//! The publish orchestrator.
//!
//! Runs one claimed item through the publish saga. Callers (the scheduler
//! tick or a manual retry endpoint) claim the item first; the orchestrator
//! owns everything from context load to the persisted outcome.

use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crosspost_content::generate;
use crosspost_platform::{
    CredentialSource, PlatformClient, PlatformError, PublishRequest, PublishResult, PublishTarget,
};
use crosspost_store::{
    CampaignStore, ItemOutcome, ItemStatus, Post, PostStatus, StoreError,
};

use crate::saga::SagaLog;
use crate::validate::validate;
use crate::PublishError;

/// Result of one orchestrator run.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    /// The post the attempt was recorded on.
    pub post_id: String,
    /// True when every merged per-platform result succeeded.
    pub success: bool,
    /// The merged result list after this attempt.
    pub results: Vec<PublishResult>,
}

/// Resolve the effective publish target for an attempt.
///
/// Smart retry: when the configured target spans two platforms and a prior
/// attempt recorded exactly one success and one failure among them, the
/// target narrows to the still-failing platform. The platform that already
/// succeeded is not regenerated or re-dispatched.
pub fn resolve_target(configured: PublishTarget, prior_results: &[PublishResult]) -> PublishTarget {
    if let PublishTarget::Combined { first, second } = configured {
        let result_for = |p| prior_results.iter().find(|r: &&PublishResult| r.platform == p);
        match (result_for(first), result_for(second)) {
            (Some(a), Some(b)) if a.success && !b.success => configured.narrow(second),
            (Some(a), Some(b)) if !a.success && b.success => configured.narrow(first),
            _ => configured,
        }
    } else {
        configured
    }
}

/// Merge a new attempt's results into a prior result list, keyed by platform.
///
/// Entries for platforms present in `attempt` replace the matching prior
/// entry (or append when absent); platforms untouched by this attempt keep
/// their prior entry byte-for-byte. This is what lets a retry of only the
/// failed platform coexist with an earlier success without re-announcing it.
pub fn merge_results(prior: &[PublishResult], attempt: Vec<PublishResult>) -> Vec<PublishResult> {
    let mut merged = prior.to_vec();
    for new in attempt {
        match merged.iter_mut().find(|r| r.platform == new.platform) {
            Some(slot) => *slot = new,
            None => merged.push(new),
        }
    }
    merged
}

/// Concatenate the error messages of failing entries into one readable string.
fn error_summary(results: &[PublishResult]) -> Option<String> {
    let failures: Vec<String> = results
        .iter()
        .filter(|r| !r.success)
        .map(|r| {
            format!(
                "{}: {}",
                r.platform,
                r.error.as_deref().unwrap_or("unknown error")
            )
        })
        .collect();

    if failures.is_empty() {
        None
    } else {
        Some(failures.join("; "))
    }
}

/// Orchestrates publish attempts for claimed campaign items.
pub struct PublishOrchestrator {
    store: Arc<CampaignStore>,
    client: Arc<dyn PlatformClient>,
    credentials: Arc<dyn CredentialSource>,
}

impl PublishOrchestrator {
    /// Create an orchestrator.
    pub fn new(
        store: Arc<CampaignStore>,
        client: Arc<dyn PlatformClient>,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        Self {
            store,
            client,
            credentials,
        }
    }

    /// Publish one claimed item.
    ///
    /// The item must already be in `publishing`. On success or per-platform
    /// partial failure the merged outcome is persisted and returned; when a
    /// pre-dispatch step fails (credentials, validation), the failure is
    /// recorded on the post and item with a single-cause error, registered
    /// compensations run in reverse order, and the error propagates.
    #[tracing::instrument(skip(self), fields(campaign_id = %campaign_id, position))]
    pub async fn publish_item(
        &self,
        campaign_id: &str,
        position: usize,
    ) -> Result<PublishOutcome, PublishError> {
        let mut saga = SagaLog::new();

        match self.run(campaign_id, position, &mut saga).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                saga.compensate().await;
                // Store errors mean context load or persistence itself went
                // wrong; there is nothing coherent to record a failure on.
                if !matches!(err, PublishError::Store(_)) {
                    self.record_failure(campaign_id, position, &err);
                }
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        campaign_id: &str,
        position: usize,
        saga: &mut SagaLog,
    ) -> Result<PublishOutcome, PublishError> {
        // Step 1: load context. Read-only, no compensation.
        let campaign = self.store.get(campaign_id)?;
        let item = campaign
            .item(position)
            .ok_or_else(|| StoreError::ItemNotFound {
                campaign_id: campaign_id.to_string(),
                position,
            })?
            .clone();
        if item.status != ItemStatus::Publishing {
            return Err(StoreError::InvalidTransition(format!(
                "item at position {} is {}, expected publishing",
                position, item.status
            ))
            .into());
        }
        let prior_post = match item.post_id.as_deref() {
            Some(post_id) => self.store.get_post(post_id).ok(),
            None => self.store.post_for_item(campaign_id, position),
        };
        saga.record("load-context");

        // Step 2: validate credentials for every configured platform.
        // Nothing has been mutated, so no compensation; the failure is
        // terminal and requires re-authentication.
        for platform in campaign.target.platforms() {
            let token = self
                .credentials
                .resolve_token(platform)
                .await
                .map_err(|err| match err {
                    PlatformError::Credential(message) => PublishError::Credential(message),
                    other => PublishError::Platform(other),
                })?;
            match token {
                None => {
                    return Err(PublishError::Credential(format!(
                        "no credentials configured for {}",
                        platform
                    )));
                }
                Some(token) if token.is_expired() => {
                    return Err(PublishError::Credential(format!(
                        "token for {} is expired",
                        platform
                    )));
                }
                Some(_) => {}
            }
        }
        saga.record("validate-credentials");

        // Step 3: resolve the publish target, narrowing a combined target to
        // the still-failing platform after a split outcome.
        let prior_results = prior_post
            .as_ref()
            .map(|p| p.results.as_slice())
            .unwrap_or_default();
        let resolved = resolve_target(campaign.target, prior_results);
        if resolved != campaign.target {
            info!(configured = %campaign.target, resolved = %resolved, "smart retry narrowed target");
        }
        saga.record("resolve-target");

        // Step 4: generate and validate content. Pure; a validation failure
        // aborts before any network call.
        let content = generate(&item.product, item.product.design.as_ref(), &campaign.rule);
        let issues = validate(&resolved, &content);
        if !issues.is_empty() {
            return Err(PublishError::Validation(issues));
        }
        saga.record("generate-content");

        // Step 5: dispatch to each resolved platform. Calls are independent
        // and concurrent; one platform's failure never blocks another's
        // success. Deliberately no compensation: a successful remote post is
        // not deleted when a sibling platform fails, because partial
        // cross-platform success is a valid terminal state.
        let request = PublishRequest {
            caption: content.caption.clone(),
            media: content.media.clone(),
            hashtags: content.hashtags.clone(),
        };
        let handles: Vec<(_, JoinHandle<_>)> = resolved
            .platforms()
            .into_iter()
            .map(|platform| {
                let client = Arc::clone(&self.client);
                let request = request.clone();
                (
                    platform,
                    tokio::spawn(async move { client.publish(platform, &request).await }),
                )
            })
            .collect();

        let mut attempt_results = Vec::new();
        for (platform, handle) in handles {
            let result = match handle.await {
                Ok(Ok(post)) => PublishResult::ok(platform, post.external_id, post.permalink),
                Ok(Err(err)) => {
                    warn!(platform = %platform, error = %err, "platform dispatch failed");
                    PublishResult::failed(platform, err.to_string())
                }
                Err(join_err) => {
                    warn!(platform = %platform, error = %join_err, "dispatch task died");
                    PublishResult::failed(platform, format!("dispatch task failed: {}", join_err))
                }
            };
            attempt_results.push(result);
        }
        saga.record("dispatch");

        // Step 6: merge this attempt's results into the prior list by
        // platform key.
        let merged = merge_results(prior_results, attempt_results);
        saga.record("merge-results");

        // Step 7: persist. This is the commit point.
        let now = Utc::now();
        let mut post = prior_post.unwrap_or_else(|| Post::new(campaign_id, position));
        let is_retry = post.last_attempt_at.is_some();
        let success = merged.iter().all(|r| r.success);

        post.status = if success {
            PostStatus::Posted
        } else {
            PostStatus::Failed
        };
        post.permalink = merged
            .iter()
            .filter(|r| r.success)
            .find_map(|r| r.permalink.clone());
        post.error = error_summary(&merged);
        post.last_attempt_at = Some(now);
        if is_retry && post.last_retry_at.is_none() {
            post.last_retry_at = Some(now);
        }
        post.results = merged.clone();

        let post_id = post.id.clone();
        self.store.upsert_post(post);

        let outcome = if success {
            ItemOutcome::Published {
                post_id: post_id.clone(),
                published_at: now,
            }
        } else {
            ItemOutcome::Failed {
                post_id: Some(post_id.clone()),
                error: error_summary(&merged)
                    .unwrap_or_else(|| "publish attempt failed".to_string()),
            }
        };
        self.store.mark_item_result(campaign_id, position, outcome)?;
        saga.record("persist");

        info!(success, platforms = merged.len(), "publish attempt recorded");
        Ok(PublishOutcome {
            post_id,
            success,
            results: merged,
        })
    }

    /// Record a pre-dispatch failure (steps 2-4) on the post and item.
    fn record_failure(&self, campaign_id: &str, position: usize, err: &PublishError) {
        let mut post = self
            .store
            .post_for_item(campaign_id, position)
            .unwrap_or_else(|| Post::new(campaign_id, position));
        post.status = PostStatus::Failed;
        post.error = Some(err.to_string());
        post.last_attempt_at = Some(Utc::now());
        let post_id = post.id.clone();
        self.store.upsert_post(post);

        if let Err(store_err) = self.store.mark_item_result(
            campaign_id,
            position,
            ItemOutcome::Failed {
                post_id: Some(post_id),
                error: err.to_string(),
            },
        ) {
            warn!(error = %store_err, "could not record publish failure on item");
        }
    }
}
