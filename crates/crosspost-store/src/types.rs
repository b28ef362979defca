//! Campaign, item, and post types with their state machines.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crosspost_content::{ContentRule, Product};
use crosspost_platform::{PublishResult, PublishTarget};

use crate::StoreError;

/// Lifecycle status of a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    /// Created, not yet started.
    Draft,
    /// Content previewed, not yet started.
    Preview,
    /// The scheduler is publishing items.
    Active,
    /// Publishing suspended; the cursor is preserved.
    Paused,
    /// Every item reached a terminal status.
    Completed,
    /// Manually cancelled.
    Cancelled,
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CampaignStatus::Draft => "draft",
            CampaignStatus::Preview => "preview",
            CampaignStatus::Active => "active",
            CampaignStatus::Paused => "paused",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Status of one item within a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Waiting for its scheduled time.
    Pending,
    /// Claimed by the scheduler or a manual retry; an attempt is in flight.
    Publishing,
    /// Published on every targeted platform. Terminal.
    Published,
    /// The last attempt failed; awaiting manual retry.
    Failed,
    /// Manually skipped. Terminal.
    Skipped,
}

impl ItemStatus {
    /// Whether no further transition exists out of this status.
    ///
    /// `Failed` counts as terminal for campaign completion (the scheduler
    /// never revisits it), even though a manual retry can leave it.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ItemStatus::Published | ItemStatus::Failed | ItemStatus::Skipped
        )
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Publishing => "publishing",
            ItemStatus::Published => "published",
            ItemStatus::Failed => "failed",
            ItemStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Status of a post artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    /// Created but no attempt has fully succeeded yet.
    Draft,
    /// Every per-platform result succeeded.
    Posted,
    /// The last attempt left at least one failing platform.
    Failed,
}

/// One scheduled unit of work within a campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignItem {
    /// The product this item publishes.
    pub product: Product,
    /// Stable index within the campaign. Never reassigned.
    pub position: usize,
    /// When this item is due.
    pub scheduled_at: DateTime<Utc>,
    /// Current status.
    pub status: ItemStatus,
    /// The post produced by the first publish attempt, if any.
    pub post_id: Option<String>,
    /// Error message from the last failed attempt.
    pub error: Option<String>,
    /// When the item was published.
    pub published_at: Option<DateTime<Utc>>,
    /// When the current `publishing` claim was taken. Used to reclaim items
    /// stuck after a crash mid-attempt.
    pub claimed_at: Option<DateTime<Utc>>,
}

/// Computed per-campaign counters.
///
/// In-flight (`publishing`) items count as pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignStats {
    pub total: usize,
    pub published: usize,
    pub failed: usize,
    pub pending: usize,
    pub skipped: usize,
}

/// Outcome of one orchestrator run for an item.
#[derive(Debug, Clone)]
pub enum ItemOutcome {
    /// Every targeted platform succeeded.
    Published {
        post_id: String,
        published_at: DateTime<Utc>,
    },
    /// At least one platform failed, or the attempt aborted before dispatch.
    Failed {
        post_id: Option<String>,
        error: String,
    },
}

/// A scheduled sequence of publish items targeting one platform configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    /// Campaign identifier (UUID).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Platform(s) every item publishes to.
    pub target: PublishTarget,
    /// Content rule applied to every item.
    pub rule: ContentRule,
    /// Minutes between consecutive items.
    pub interval_minutes: i64,
    /// Ordered items. Positions are stable after creation.
    pub items: Vec<CampaignItem>,
    /// Lifecycle status.
    pub status: CampaignStatus,
    /// Cursor into `items`: the scheduler never looks behind it. Persisted so
    /// the scheduler is resumable after a restart.
    pub current_index: usize,
    /// When the campaign was first started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the campaign was last paused.
    pub paused_at: Option<DateTime<Utc>>,
    /// When the campaign completed.
    pub completed_at: Option<DateTime<Utc>>,
    /// Last campaign-level bookkeeping error.
    pub last_error: Option<String>,
    /// When the campaign was created.
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    /// Create a campaign with its full schedule materialized up front:
    /// `items[i].scheduled_at = start + i * interval`.
    pub fn new(
        name: impl Into<String>,
        target: PublishTarget,
        rule: ContentRule,
        interval_minutes: i64,
        products: Vec<Product>,
        start: DateTime<Utc>,
    ) -> Self {
        let interval = Duration::minutes(interval_minutes);
        let items = products
            .into_iter()
            .enumerate()
            .map(|(position, product)| CampaignItem {
                product,
                position,
                scheduled_at: start + interval * position as i32,
                status: ItemStatus::Pending,
                post_id: None,
                error: None,
                published_at: None,
                claimed_at: None,
            })
            .collect();

        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            target,
            rule,
            interval_minutes,
            items,
            status: CampaignStatus::Draft,
            current_index: 0,
            started_at: None,
            paused_at: None,
            completed_at: None,
            last_error: None,
            created_at: Utc::now(),
        }
    }

    /// The interval between consecutive items.
    pub fn interval(&self) -> Duration {
        Duration::minutes(self.interval_minutes)
    }

    /// The item at a position.
    pub fn item(&self, position: usize) -> Option<&CampaignItem> {
        self.items.get(position)
    }

    /// Position of the first `pending` item at or after the cursor whose
    /// scheduled time has passed.
    pub fn next_due(&self, now: DateTime<Utc>) -> Option<usize> {
        self.items[self.current_index.min(self.items.len())..]
            .iter()
            .find(|item| item.status == ItemStatus::Pending && item.scheduled_at <= now)
            .map(|item| item.position)
    }

    /// Whether the campaign has items and every one is terminal.
    pub fn all_terminal(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(|i| i.status.is_terminal())
    }

    /// Computed item counters.
    pub fn stats(&self) -> CampaignStats {
        let mut stats = CampaignStats {
            total: self.items.len(),
            published: 0,
            failed: 0,
            pending: 0,
            skipped: 0,
        };
        for item in &self.items {
            match item.status {
                ItemStatus::Pending | ItemStatus::Publishing => stats.pending += 1,
                ItemStatus::Published => stats.published += 1,
                ItemStatus::Failed => stats.failed += 1,
                ItemStatus::Skipped => stats.skipped += 1,
            }
        }
        stats
    }

    /// Scheduled time of the first pending item, in position order.
    pub fn next_publish_at(&self) -> Option<DateTime<Utc>> {
        self.items
            .iter()
            .find(|i| i.status == ItemStatus::Pending)
            .map(|i| i.scheduled_at)
    }

    /// Rewrite the schedule of every still-pending item from a new start,
    /// preserving positional spacing and ordering.
    pub fn reschedule(&mut self, new_start: DateTime<Utc>) {
        let interval = self.interval();
        for item in &mut self.items {
            if item.status == ItemStatus::Pending {
                item.scheduled_at = new_start + interval * item.position as i32;
            }
        }
    }

    /// Start the campaign.
    ///
    /// Allowed from `draft`, `preview`, and `paused`. Resuming from `paused`
    /// preserves the cursor; otherwise the cursor resets to zero, and a
    /// schedule that lies entirely in the past is recomputed from now.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), StoreError> {
        match self.status {
            CampaignStatus::Draft | CampaignStatus::Preview => {
                if self.items.is_empty() {
                    return Err(StoreError::Validation(
                        "cannot start a campaign with no items".to_string(),
                    ));
                }
                self.current_index = 0;
                if self.items.iter().all(|i| i.scheduled_at <= now) {
                    self.reschedule(now);
                }
                self.status = CampaignStatus::Active;
                self.started_at = Some(now);
                Ok(())
            }
            CampaignStatus::Paused => {
                // Resume: keep the cursor and schedule.
                self.status = CampaignStatus::Active;
                self.paused_at = None;
                Ok(())
            }
            other => Err(StoreError::InvalidTransition(format!(
                "cannot start a {} campaign",
                other
            ))),
        }
    }

    /// Pause an active campaign.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<(), StoreError> {
        match self.status {
            CampaignStatus::Active => {
                self.status = CampaignStatus::Paused;
                self.paused_at = Some(now);
                Ok(())
            }
            other => Err(StoreError::InvalidTransition(format!(
                "cannot pause a {} campaign",
                other
            ))),
        }
    }

    /// Cancel any non-terminal campaign.
    pub fn cancel(&mut self) -> Result<(), StoreError> {
        match self.status {
            CampaignStatus::Draft
            | CampaignStatus::Preview
            | CampaignStatus::Active
            | CampaignStatus::Paused => {
                self.status = CampaignStatus::Cancelled;
                Ok(())
            }
            other => Err(StoreError::InvalidTransition(format!(
                "cannot cancel a {} campaign",
                other
            ))),
        }
    }

    /// Move a draft campaign into `preview`.
    pub fn mark_preview(&mut self) -> Result<(), StoreError> {
        match self.status {
            CampaignStatus::Draft | CampaignStatus::Preview => {
                self.status = CampaignStatus::Preview;
                Ok(())
            }
            other => Err(StoreError::InvalidTransition(format!(
                "cannot preview a {} campaign",
                other
            ))),
        }
    }

    /// Transition to `completed` if active and every item is terminal.
    ///
    /// Returns true when the transition happened.
    pub fn complete_if_done(&mut self, now: DateTime<Utc>) -> bool {
        if self.status == CampaignStatus::Active && self.all_terminal() {
            self.status = CampaignStatus::Completed;
            self.completed_at = Some(now);
            true
        } else {
            false
        }
    }
}

/// The artifact produced by publish attempts for one item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// Post identifier (UUID).
    pub id: String,
    /// Owning campaign.
    pub campaign_id: String,
    /// Item position within the campaign.
    pub position: usize,
    /// Current status.
    pub status: PostStatus,
    /// Per-platform results, at most one entry per platform.
    pub results: Vec<PublishResult>,
    /// First available permalink among successful results.
    pub permalink: Option<String>,
    /// Concatenated error messages from failing platforms.
    pub error: Option<String>,
    /// When the last attempt ran.
    pub last_attempt_at: Option<DateTime<Utc>>,
    /// When the first retry ran, if the item was ever retried.
    pub last_retry_at: Option<DateTime<Utc>>,
    /// When the post record was created.
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// Create a draft post for an item.
    pub fn new(campaign_id: impl Into<String>, position: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            campaign_id: campaign_id.into(),
            position,
            status: PostStatus::Draft,
            results: Vec::new(),
            permalink: None,
            error: None,
            last_attempt_at: None,
            last_retry_at: None,
            created_at: Utc::now(),
        }
    }
}
