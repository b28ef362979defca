//! Serve command: wire the store, orchestrator, scheduler, and control API
//! together under one runtime with graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use miette::{IntoDiagnostic, Result};
use tokio::sync::watch;
use tracing::{info, warn};

use crosspost_platform::{
    AccessToken, CredentialSource, HttpPlatformClient, Platform, PlatformEndpoints,
    StaticCredentials, TokenCache,
};
use crosspost_publish::PublishOrchestrator;
use crosspost_scheduler::Scheduler;
use crosspost_store::CampaignStore;
use crosspost_web::create_router;

/// Configuration for the serve command.
pub struct ServeConfig {
    pub bind: String,
    pub tick_interval: u64,
    pub reclaim_minutes: i64,
    pub token_cache_minutes: i64,
    pub poll_interval: u64,
    pub poll_attempts: u32,
    pub instagram_api_url: Option<String>,
    pub instagram_token: Option<String>,
    pub facebook_api_url: Option<String>,
    pub facebook_token: Option<String>,
    pub twitter_api_url: Option<String>,
    pub twitter_token: Option<String>,
}

/// Run the scheduler and control API until ctrl-c.
pub async fn run(config: ServeConfig) -> Result<()> {
    let mut endpoints = PlatformEndpoints::new();
    let mut credentials = StaticCredentials::new();
    let platform_config = [
        (
            Platform::Instagram,
            &config.instagram_api_url,
            &config.instagram_token,
        ),
        (
            Platform::Facebook,
            &config.facebook_api_url,
            &config.facebook_token,
        ),
        (
            Platform::Twitter,
            &config.twitter_api_url,
            &config.twitter_token,
        ),
    ];

    for (platform, api_url, token) in platform_config {
        match (api_url, token) {
            (Some(url), Some(token)) => {
                endpoints = endpoints.with_endpoint(platform, url.clone());
                credentials =
                    credentials.with_token(platform, AccessToken::new(token.clone(), None));
                info!(platform = %platform, "platform configured");
            }
            (None, None) => {}
            _ => {
                warn!(
                    platform = %platform,
                    "platform partially configured (needs both API URL and token), skipping"
                );
            }
        }
    }

    let credentials: Arc<dyn CredentialSource> = Arc::new(TokenCache::new(
        credentials,
        chrono::Duration::minutes(config.token_cache_minutes),
    ));

    let store = Arc::new(CampaignStore::new());
    let client = Arc::new(
        HttpPlatformClient::new(endpoints, Arc::clone(&credentials)).with_polling(
            Duration::from_secs(config.poll_interval),
            config.poll_attempts,
        ),
    );
    let orchestrator = Arc::new(PublishOrchestrator::new(
        Arc::clone(&store),
        client,
        Arc::clone(&credentials),
    ));

    let scheduler = Scheduler::new(Arc::clone(&store), Arc::clone(&orchestrator))
        .with_tick_interval(Duration::from_secs(config.tick_interval))
        .with_reclaim_window(chrono::Duration::minutes(config.reclaim_minutes));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler_handle = tokio::spawn(async move {
        scheduler.run(shutdown_rx).await;
    });

    // Ctrl-c flips the shutdown channel for both the scheduler and the API.
    {
        let shutdown_tx = shutdown_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("ctrl-c received, shutting down");
                let _ = shutdown_tx.send(true);
            }
        });
    }

    let router = create_router(Arc::clone(&store), orchestrator);
    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .into_diagnostic()?;
    info!(bind = %config.bind, "control API listening");

    let mut api_shutdown = shutdown_tx.subscribe();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = api_shutdown.changed().await;
        })
        .await
        .into_diagnostic()?;

    scheduler_handle.await.into_diagnostic()?;
    info!("shut down cleanly");
    Ok(())
}
