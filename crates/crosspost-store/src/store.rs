//! The campaign store.
//!
//! Thread-safe and designed for concurrent access from the scheduler tick and
//! the control surface. Every guarded transition runs while holding the
//! campaign's map entry, so check-and-set sequences are atomic: two callers
//! racing to claim the same item cannot both win.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::{debug, info, trace, warn};

use crosspost_content::{ContentRule, Product};
use crosspost_platform::PublishTarget;

use crate::types::{Campaign, CampaignItem, CampaignStatus, ItemOutcome, ItemStatus, Post};
use crate::StoreError;

/// Input for campaign creation.
#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub name: String,
    pub target: PublishTarget,
    pub rule: ContentRule,
    pub interval_minutes: i64,
    pub start_at: DateTime<Utc>,
    pub products: Vec<Product>,
}

/// In-memory store for campaigns and posts.
///
/// The only place mutable campaign/item state lives.
pub struct CampaignStore {
    campaigns: DashMap<String, Campaign>,
    posts: DashMap<String, Post>,
}

impl CampaignStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            campaigns: DashMap::new(),
            posts: DashMap::new(),
        }
    }

    /// Create a campaign with its schedule materialized up front.
    pub fn create_campaign(&self, new: NewCampaign) -> Result<Campaign, StoreError> {
        if new.name.trim().is_empty() {
            return Err(StoreError::Validation("campaign name is empty".to_string()));
        }
        if new.interval_minutes <= 0 {
            return Err(StoreError::Validation(
                "interval must be at least one minute".to_string(),
            ));
        }
        if let PublishTarget::Combined { first, second } = new.target {
            if first == second {
                return Err(StoreError::Validation(format!(
                    "combined target must span two distinct platforms, got {} twice",
                    first
                )));
            }
        }

        let campaign = Campaign::new(
            new.name,
            new.target,
            new.rule,
            new.interval_minutes,
            new.products,
            new.start_at,
        );

        info!(
            campaign_id = %campaign.id,
            items = campaign.items.len(),
            target = %campaign.target,
            "created campaign"
        );
        self.campaigns.insert(campaign.id.clone(), campaign.clone());
        Ok(campaign)
    }

    /// Get a campaign by id.
    pub fn get(&self, id: &str) -> Result<Campaign, StoreError> {
        self.campaigns
            .get(id)
            .map(|c| c.clone())
            .ok_or_else(|| StoreError::CampaignNotFound(id.to_string()))
    }

    /// List all campaigns.
    pub fn list(&self) -> Vec<Campaign> {
        self.campaigns.iter().map(|c| c.clone()).collect()
    }

    /// List campaigns in a given status.
    pub fn list_by_status(&self, status: CampaignStatus) -> Vec<Campaign> {
        self.campaigns
            .iter()
            .filter(|c| c.status == status)
            .map(|c| c.clone())
            .collect()
    }

    /// Number of stored campaigns.
    pub fn campaign_count(&self) -> usize {
        self.campaigns.len()
    }

    fn with_campaign<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Campaign) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut campaign = self
            .campaigns
            .get_mut(id)
            .ok_or_else(|| StoreError::CampaignNotFound(id.to_string()))?;
        f(&mut campaign)
    }

    /// Start (or resume) a campaign.
    pub fn start(&self, id: &str, now: DateTime<Utc>) -> Result<Campaign, StoreError> {
        self.with_campaign(id, |c| {
            c.start(now)?;
            info!(campaign_id = %c.id, cursor = c.current_index, "campaign started");
            Ok(c.clone())
        })
    }

    /// Pause an active campaign.
    pub fn pause(&self, id: &str, now: DateTime<Utc>) -> Result<Campaign, StoreError> {
        self.with_campaign(id, |c| {
            c.pause(now)?;
            info!(campaign_id = %c.id, "campaign paused");
            Ok(c.clone())
        })
    }

    /// Cancel a non-terminal campaign.
    pub fn cancel(&self, id: &str) -> Result<Campaign, StoreError> {
        self.with_campaign(id, |c| {
            c.cancel()?;
            info!(campaign_id = %c.id, "campaign cancelled");
            Ok(c.clone())
        })
    }

    /// Move a campaign into `preview`.
    pub fn mark_preview(&self, id: &str) -> Result<Campaign, StoreError> {
        self.with_campaign(id, |c| {
            c.mark_preview()?;
            Ok(c.clone())
        })
    }

    /// Transition an active campaign to `completed` if every item is
    /// terminal. Returns true when the transition happened.
    pub fn complete_if_done(&self, id: &str, now: DateTime<Utc>) -> Result<bool, StoreError> {
        self.with_campaign(id, |c| {
            let done = c.complete_if_done(now);
            if done {
                info!(campaign_id = %c.id, "campaign completed");
            }
            Ok(done)
        })
    }

    /// Delete a campaign. Active campaigns must be paused or cancelled first.
    pub fn delete(&self, id: &str) -> Result<(), StoreError> {
        {
            let campaign = self
                .campaigns
                .get(id)
                .ok_or_else(|| StoreError::CampaignNotFound(id.to_string()))?;
            if campaign.status == CampaignStatus::Active {
                return Err(StoreError::InvalidTransition(
                    "cannot delete an active campaign; pause or cancel it first".to_string(),
                ));
            }
        }
        self.campaigns.remove(id);
        self.posts.retain(|_, post| post.campaign_id != id);
        info!(campaign_id = %id, "campaign deleted");
        Ok(())
    }

    /// Rewrite the pending schedule of a campaign from a new start.
    pub fn reschedule(&self, id: &str, new_start: DateTime<Utc>) -> Result<Campaign, StoreError> {
        self.with_campaign(id, |c| {
            c.reschedule(new_start);
            debug!(campaign_id = %c.id, new_start = %new_start, "campaign rescheduled");
            Ok(c.clone())
        })
    }

    /// Record a campaign-level bookkeeping error.
    pub fn set_campaign_error(&self, id: &str, error: impl Into<String>) {
        if let Some(mut campaign) = self.campaigns.get_mut(id) {
            campaign.last_error = Some(error.into());
        }
    }

    /// Skip a pending item. The precondition is exact: any other status is
    /// rejected without mutation.
    pub fn skip_item(&self, id: &str, position: usize) -> Result<Campaign, StoreError> {
        self.with_campaign(id, |c| {
            let campaign_id = c.id.clone();
            let item = c.items.get_mut(position).ok_or(StoreError::ItemNotFound {
                campaign_id: campaign_id.clone(),
                position,
            })?;
            if item.status != ItemStatus::Pending {
                return Err(StoreError::InvalidTransition(format!(
                    "cannot skip a {} item, only pending items can be skipped",
                    item.status
                )));
            }
            item.status = ItemStatus::Skipped;
            info!(campaign_id = %campaign_id, position, "item skipped");
            Ok(c.clone())
        })
    }

    /// Atomically claim an item for publishing.
    ///
    /// The claim succeeds only when the item's status is one of `expected`
    /// and no other item in the campaign is currently `publishing`
    /// (single-flight per campaign). Both the scheduler tick and the manual
    /// retry endpoints funnel through this check-and-set, which runs while
    /// holding the campaign's map entry, so a racing double-claim loses.
    pub fn claim_item(
        &self,
        id: &str,
        position: usize,
        expected: &[ItemStatus],
        now: DateTime<Utc>,
    ) -> Result<CampaignItem, StoreError> {
        self.with_campaign(id, |c| {
            let campaign_id = c.id.clone();
            if let Some(in_flight) = c.items.iter().find(|i| i.status == ItemStatus::Publishing) {
                return Err(StoreError::InvalidTransition(format!(
                    "item {} is already publishing in campaign {}",
                    in_flight.position, campaign_id
                )));
            }
            let item = c.items.get_mut(position).ok_or(StoreError::ItemNotFound {
                campaign_id: campaign_id.clone(),
                position,
            })?;
            if !expected.contains(&item.status) {
                return Err(StoreError::InvalidTransition(format!(
                    "cannot claim a {} item at position {}",
                    item.status, position
                )));
            }

            let retrying = item.status == ItemStatus::Failed;
            item.status = ItemStatus::Publishing;
            item.claimed_at = Some(now);
            debug!(campaign_id = %campaign_id, position, retrying, "item claimed");
            Ok(item.clone())
        })
    }

    /// Record the outcome of an orchestrator run and release the claim.
    pub fn mark_item_result(
        &self,
        id: &str,
        position: usize,
        outcome: ItemOutcome,
    ) -> Result<(), StoreError> {
        self.with_campaign(id, |c| {
            let campaign_id = c.id.clone();
            let item = c.items.get_mut(position).ok_or(StoreError::ItemNotFound {
                campaign_id: campaign_id.clone(),
                position,
            })?;
            if item.status != ItemStatus::Publishing {
                return Err(StoreError::InvalidTransition(format!(
                    "cannot record an outcome for a {} item",
                    item.status
                )));
            }

            match outcome {
                ItemOutcome::Published {
                    post_id,
                    published_at,
                } => {
                    item.status = ItemStatus::Published;
                    item.post_id = Some(post_id);
                    item.published_at = Some(published_at);
                    item.error = None;
                    info!(campaign_id = %campaign_id, position, "item published");
                }
                ItemOutcome::Failed { post_id, error } => {
                    item.status = ItemStatus::Failed;
                    if post_id.is_some() {
                        item.post_id = post_id;
                    }
                    warn!(campaign_id = %campaign_id, position, error = %error, "item failed");
                    item.error = Some(error);
                }
            }
            item.claimed_at = None;
            Ok(())
        })
    }

    /// Advance the campaign cursor past a processed position.
    ///
    /// The cursor is monotonic: it never moves backwards.
    pub fn advance_cursor(&self, id: &str, past_position: usize) -> Result<usize, StoreError> {
        self.with_campaign(id, |c| {
            c.current_index = c.current_index.max(past_position + 1);
            trace!(campaign_id = %c.id, cursor = c.current_index, "cursor advanced");
            Ok(c.current_index)
        })
    }

    /// Positions of all failed items, for retry-all.
    pub fn failed_positions(&self, id: &str) -> Result<Vec<usize>, StoreError> {
        let campaign = self.get(id)?;
        Ok(campaign
            .items
            .iter()
            .filter(|i| i.status == ItemStatus::Failed)
            .map(|i| i.position)
            .collect())
    }

    /// Reclaim items stuck in `publishing` longer than `max_age`.
    ///
    /// A crash mid-attempt leaves the claim dangling; reclaiming moves the
    /// item to `failed` so it becomes retryable instead of wedging its
    /// campaign. Returns the number of reclaimed items.
    pub fn reclaim_stuck(&self, max_age: Duration, now: DateTime<Utc>) -> usize {
        let mut reclaimed = 0;
        for mut campaign in self.campaigns.iter_mut() {
            let campaign_id = campaign.id.clone();
            for item in &mut campaign.items {
                if item.status != ItemStatus::Publishing {
                    continue;
                }
                let stuck = match item.claimed_at {
                    Some(claimed_at) => claimed_at + max_age <= now,
                    // A publishing item without a claim timestamp is a stale
                    // artifact; reclaim it immediately.
                    None => true,
                };
                if stuck {
                    warn!(
                        campaign_id = %campaign_id,
                        position = item.position,
                        claimed_at = ?item.claimed_at,
                        "reclaiming stuck item"
                    );
                    item.status = ItemStatus::Failed;
                    item.error = Some("publish attempt timed out and was reclaimed".to_string());
                    item.claimed_at = None;
                    reclaimed += 1;
                }
            }
        }
        reclaimed
    }

    /// Insert or replace a post.
    pub fn upsert_post(&self, post: Post) {
        trace!(post_id = %post.id, status = ?post.status, "post upserted");
        self.posts.insert(post.id.clone(), post);
    }

    /// Get a post by id.
    pub fn get_post(&self, id: &str) -> Result<Post, StoreError> {
        self.posts
            .get(id)
            .map(|p| p.clone())
            .ok_or_else(|| StoreError::PostNotFound(id.to_string()))
    }

    /// The post for an item, if one exists yet.
    pub fn post_for_item(&self, campaign_id: &str, position: usize) -> Option<Post> {
        self.posts
            .iter()
            .find(|p| p.campaign_id == campaign_id && p.position == position)
            .map(|p| p.clone())
    }

    /// Number of stored posts.
    pub fn post_count(&self) -> usize {
        self.posts.len()
    }
}

impl Default for CampaignStore {
    fn default() -> Self {
        Self::new()
    }
}
