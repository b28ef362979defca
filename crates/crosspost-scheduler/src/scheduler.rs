//! Scheduler implementation.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crosspost_publish::PublishOrchestrator;
use crosspost_store::{Campaign, CampaignStatus, CampaignStore, ItemStatus, StoreError};

use crate::SchedulerError;

/// Default tick cadence: five minutes.
const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(300);

/// Default window after which a dangling `publishing` claim is reclaimed.
const DEFAULT_RECLAIM_MINUTES: i64 = 30;

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Stuck items reclaimed to `failed`.
    pub reclaimed: usize,
    /// Items published successfully.
    pub published: usize,
    /// Items whose attempt failed (fully or partially).
    pub failed: usize,
    /// Campaigns that reached `completed`.
    pub completed: usize,
    /// Campaigns whose bookkeeping failed.
    pub errors: usize,
}

impl TickSummary {
    fn has_activity(&self) -> bool {
        *self != TickSummary::default()
    }
}

/// The campaign scheduler.
pub struct Scheduler {
    store: Arc<CampaignStore>,
    orchestrator: Arc<PublishOrchestrator>,
    tick_interval: Duration,
    reclaim_window: chrono::Duration,
}

impl Scheduler {
    /// Create a scheduler with the default cadence and reclaim window.
    pub fn new(store: Arc<CampaignStore>, orchestrator: Arc<PublishOrchestrator>) -> Self {
        Self {
            store,
            orchestrator,
            tick_interval: DEFAULT_TICK_INTERVAL,
            reclaim_window: chrono::Duration::minutes(DEFAULT_RECLAIM_MINUTES),
        }
    }

    /// Override the tick cadence.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Override the stuck-claim reclaim window.
    pub fn with_reclaim_window(mut self, window: chrono::Duration) -> Self {
        self.reclaim_window = window;
        self
    }

    /// Run the scheduler loop until shutdown is signalled.
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(interval_secs = self.tick_interval.as_secs(), "scheduler starting");

        loop {
            if *shutdown_rx.borrow() {
                info!("scheduler shutting down");
                break;
            }

            let summary = self.tick().await;
            if summary.has_activity() {
                info!(
                    reclaimed = summary.reclaimed,
                    published = summary.published,
                    failed = summary.failed,
                    completed = summary.completed,
                    errors = summary.errors,
                    "tick finished"
                );
            }

            tokio::select! {
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("scheduler received shutdown signal");
                    }
                }
                _ = sleep(self.tick_interval) => {}
            }
        }

        info!("scheduler shut down gracefully");
    }

    /// Run one tick: reclaim stuck claims, then process every active
    /// campaign independently.
    pub async fn tick(&self) -> TickSummary {
        let now = Utc::now();
        let mut summary = TickSummary {
            reclaimed: self.store.reclaim_stuck(self.reclaim_window, now),
            ..TickSummary::default()
        };

        for campaign in self.store.list_by_status(CampaignStatus::Active) {
            if let Err(err) = self.process_campaign(&campaign, now, &mut summary).await {
                // Isolation: record the error on the campaign and keep going
                // with the others.
                error!(campaign_id = %campaign.id, error = %err, "campaign tick failed");
                self.store.set_campaign_error(&campaign.id, err.to_string());
                summary.errors += 1;
            }
        }

        summary
    }

    /// Process one campaign: publish its first due item (if any), then check
    /// for completion.
    async fn process_campaign(
        &self,
        campaign: &Campaign,
        now: DateTime<Utc>,
        summary: &mut TickSummary,
    ) -> Result<(), SchedulerError> {
        let Some(position) = campaign.next_due(now) else {
            // No due work. Once every item is terminal the campaign is done.
            if self.store.complete_if_done(&campaign.id, now)? {
                summary.completed += 1;
            }
            return Ok(());
        };

        let claimed = self
            .store
            .claim_item(&campaign.id, position, &[ItemStatus::Pending], now);
        match claimed {
            Ok(_) => {}
            // Lost a race against a manual retry, or another item is still
            // in flight. Not an error; try again next tick.
            Err(StoreError::InvalidTransition(reason)) => {
                debug!(campaign_id = %campaign.id, position, reason, "claim not taken");
                return Ok(());
            }
            Err(other) => return Err(other.into()),
        }

        debug!(campaign_id = %campaign.id, position, "publishing due item");
        match self.orchestrator.publish_item(&campaign.id, position).await {
            Ok(outcome) if outcome.success => summary.published += 1,
            Ok(_) => summary.failed += 1,
            Err(err) => {
                // The orchestrator already recorded the failure on the item;
                // it stays visible and retryable there.
                debug!(campaign_id = %campaign.id, position, error = %err, "publish attempt failed");
                summary.failed += 1;
            }
        }

        // Failed items are not revisited by the scanner; the cursor advances
        // regardless of outcome and they await manual retry.
        self.store.advance_cursor(&campaign.id, position)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crosspost_content::{ContentRule, Product};
    use crosspost_platform::{
        AccessToken, CredentialSource, Platform, PlatformClient, PlatformError, PlatformPost,
        PublishRequest, PublishTarget, StaticCredentials,
    };
    use crosspost_store::NewCampaign;

    struct FakeClient {
        failing: Mutex<HashSet<Platform>>,
        calls: AtomicUsize,
    }

    impl FakeClient {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                failing: Mutex::new(HashSet::new()),
                calls: AtomicUsize::new(0),
            })
        }

        fn fail_on(&self, platform: Platform) {
            self.failing.lock().unwrap().insert(platform);
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PlatformClient for FakeClient {
        async fn publish(
            &self,
            platform: Platform,
            _request: &PublishRequest,
        ) -> Result<PlatformPost, PlatformError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.failing.lock().unwrap().contains(&platform) {
                return Err(PlatformError::Api {
                    platform,
                    status: 500,
                    message: "over capacity".to_string(),
                });
            }
            Ok(PlatformPost {
                external_id: format!("{}_{}", platform, n),
                permalink: None,
            })
        }
    }

    fn credentials() -> Arc<dyn CredentialSource> {
        let mut creds = StaticCredentials::new();
        for platform in Platform::ALL {
            creds = creds.with_token(platform, AccessToken::new("tok", None));
        }
        Arc::new(creds)
    }

    fn product(n: usize) -> Product {
        Product {
            id: format!("prod_{}", n),
            title: format!("Product {}", n),
            url: "https://shop.example/p".to_string(),
            thumbnail_url: Some("https://cdn.example/t.jpg".to_string()),
            ..Default::default()
        }
    }

    fn scheduler_with(
        client: Arc<FakeClient>,
        creds: Arc<dyn CredentialSource>,
    ) -> (Arc<CampaignStore>, Scheduler) {
        let store = Arc::new(CampaignStore::new());
        let orchestrator = Arc::new(PublishOrchestrator::new(
            Arc::clone(&store),
            client as Arc<dyn PlatformClient>,
            creds,
        ));
        let scheduler = Scheduler::new(Arc::clone(&store), orchestrator);
        (store, scheduler)
    }

    fn due_campaign(store: &CampaignStore, n_items: usize) -> Campaign {
        let campaign = store
            .create_campaign(NewCampaign {
                name: "Drop".to_string(),
                target: PublishTarget::single(Platform::Twitter),
                rule: ContentRule::default(),
                interval_minutes: 1,
                start_at: Utc::now() - chrono::Duration::hours(1),
                products: (0..n_items).map(product).collect(),
            })
            .unwrap();
        store.start(&campaign.id, Utc::now()).unwrap();
        // Starting a fully stale schedule recomputes it from now, which
        // leaves only the first item due; backdate the whole schedule so
        // every item is already due.
        store
            .reschedule(&campaign.id, Utc::now() - chrono::Duration::hours(1))
            .unwrap();
        campaign
    }

    #[tokio::test]
    async fn tick_publishes_the_first_due_item_and_advances_cursor() {
        let client = FakeClient::new();
        let (store, scheduler) = scheduler_with(client.clone(), credentials());
        let campaign = due_campaign(&store, 3);

        let summary = scheduler.tick().await;

        assert_eq!(summary.published, 1);
        assert_eq!(client.calls(), 1);
        let stored = store.get(&campaign.id).unwrap();
        assert_eq!(stored.items[0].status, ItemStatus::Published);
        assert_eq!(stored.items[1].status, ItemStatus::Pending);
        assert_eq!(stored.current_index, 1);
    }

    #[tokio::test]
    async fn single_flight_one_item_per_campaign_per_tick() {
        let client = FakeClient::new();
        let (store, scheduler) = scheduler_with(client.clone(), credentials());
        due_campaign(&store, 3);

        scheduler.tick().await;
        scheduler.tick().await;

        // Two ticks, two publishes, never more.
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test]
    async fn failed_items_are_not_revisited_by_the_scanner() {
        let client = FakeClient::new();
        client.fail_on(Platform::Twitter);
        let (store, scheduler) = scheduler_with(client.clone(), credentials());
        let campaign = due_campaign(&store, 2);

        let first = scheduler.tick().await;
        assert_eq!(first.failed, 1);

        let second = scheduler.tick().await;
        assert_eq!(second.failed, 1);

        // Each item was attempted exactly once; the cursor moved past both.
        assert_eq!(client.calls(), 2);
        let stored = store.get(&campaign.id).unwrap();
        assert_eq!(stored.items[0].status, ItemStatus::Failed);
        assert_eq!(stored.items[1].status, ItemStatus::Failed);
        assert_eq!(stored.current_index, 2);
    }

    #[tokio::test]
    async fn campaign_completes_when_every_item_is_terminal() {
        let client = FakeClient::new();
        let (store, scheduler) = scheduler_with(client.clone(), credentials());
        let campaign = due_campaign(&store, 1);

        let first = scheduler.tick().await;
        assert_eq!(first.published, 1);

        let second = scheduler.tick().await;
        assert_eq!(second.completed, 1);
        assert_eq!(
            store.get(&campaign.id).unwrap().status,
            CampaignStatus::Completed
        );
        assert!(store.get(&campaign.id).unwrap().completed_at.is_some());
    }

    #[tokio::test]
    async fn campaign_with_failures_still_completes() {
        let client = FakeClient::new();
        client.fail_on(Platform::Twitter);
        let (store, scheduler) = scheduler_with(client.clone(), credentials());
        let campaign = due_campaign(&store, 2);

        scheduler.tick().await;
        scheduler.tick().await;
        let third = scheduler.tick().await;

        assert_eq!(third.completed, 1);
        assert_eq!(
            store.get(&campaign.id).unwrap().status,
            CampaignStatus::Completed
        );
    }

    #[tokio::test]
    async fn future_items_are_left_alone() {
        let client = FakeClient::new();
        let (store, scheduler) = scheduler_with(client.clone(), credentials());
        let campaign = store
            .create_campaign(NewCampaign {
                name: "Later".to_string(),
                target: PublishTarget::single(Platform::Twitter),
                rule: ContentRule::default(),
                interval_minutes: 60,
                start_at: Utc::now() + chrono::Duration::hours(1),
                products: vec![product(0)],
            })
            .unwrap();
        store.start(&campaign.id, Utc::now()).unwrap();

        let summary = scheduler.tick().await;

        assert_eq!(summary, TickSummary::default());
        assert_eq!(client.calls(), 0);
        assert_eq!(
            store.get(&campaign.id).unwrap().items[0].status,
            ItemStatus::Pending
        );
    }

    #[tokio::test]
    async fn one_failing_campaign_does_not_block_others() {
        let client = FakeClient::new();
        // Campaign A's platform has no credentials; campaign B's does.
        let creds: Arc<dyn CredentialSource> = Arc::new(
            StaticCredentials::new()
                .with_token(Platform::Twitter, AccessToken::new("tok", None)),
        );
        let (store, scheduler) = scheduler_with(client.clone(), creds);

        let blocked = store
            .create_campaign(NewCampaign {
                name: "Blocked".to_string(),
                target: PublishTarget::single(Platform::Instagram),
                rule: ContentRule::default(),
                interval_minutes: 1,
                start_at: Utc::now() - chrono::Duration::hours(1),
                products: vec![product(0)],
            })
            .unwrap();
        store.start(&blocked.id, Utc::now()).unwrap();
        let healthy = due_campaign(&store, 1);

        let summary = scheduler.tick().await;

        // The blocked campaign's item failed on credentials, the healthy one
        // published in the same tick.
        assert_eq!(summary.published, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(
            store.get(&healthy.id).unwrap().items[0].status,
            ItemStatus::Published
        );
        assert_eq!(
            store.get(&blocked.id).unwrap().items[0].status,
            ItemStatus::Failed
        );
    }

    #[tokio::test]
    async fn tick_reclaims_stuck_items() {
        let client = FakeClient::new();
        let (store, scheduler) = scheduler_with(client.clone(), credentials());
        let campaign = due_campaign(&store, 1);
        store
            .claim_item(
                &campaign.id,
                0,
                &[ItemStatus::Pending],
                Utc::now() - chrono::Duration::hours(2),
            )
            .unwrap();

        let summary = scheduler.tick().await;

        assert_eq!(summary.reclaimed, 1);
        let stored = store.get(&campaign.id).unwrap();
        assert_eq!(stored.items[0].status, ItemStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_stops_on_shutdown_signal() {
        let client = FakeClient::new();
        let (store, scheduler) = scheduler_with(client.clone(), credentials());
        due_campaign(&store, 1);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            scheduler.run(shutdown_rx).await;
        });

        // Let the first tick happen, then signal shutdown.
        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(client.calls(), 1);
    }
}
