//! Control API routes.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crosspost_content::{ContentRule, Product};
use crosspost_platform::{PublishResult, PublishTarget};
use crosspost_publish::{ItemPreview, PublishOrchestrator, preview_campaign};
use crosspost_store::{Campaign, CampaignStats, CampaignStore, ItemStatus, NewCampaign};

use crate::WebError;

/// Shared state for the control API.
pub struct AppState {
    pub store: Arc<CampaignStore>,
    pub orchestrator: Arc<PublishOrchestrator>,
}

/// Create the control API router.
pub fn create_router(store: Arc<CampaignStore>, orchestrator: Arc<PublishOrchestrator>) -> Router {
    let state = Arc::new(AppState {
        store,
        orchestrator,
    });

    Router::new()
        .route("/api/campaigns", get(list_campaigns).post(create_campaign))
        .route(
            "/api/campaigns/{id}",
            get(get_campaign).delete(delete_campaign),
        )
        .route("/api/campaigns/{id}/start", post(start_campaign))
        .route("/api/campaigns/{id}/pause", post(pause_campaign))
        .route("/api/campaigns/{id}/cancel", post(cancel_campaign))
        .route("/api/campaigns/{id}/preview", post(preview))
        .route("/api/campaigns/{id}/items/{position}/skip", post(skip_item))
        .route(
            "/api/campaigns/{id}/items/{position}/retry",
            post(retry_item),
        )
        .route("/api/campaigns/{id}/retry-failed", post(retry_all_failed))
        .with_state(state)
}

/// Request body for campaign creation.
#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    pub name: String,
    pub target: PublishTarget,
    #[serde(default)]
    pub rule: Option<ContentRule>,
    pub interval_minutes: i64,
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    pub products: Vec<Product>,
}

/// A campaign with its computed stats.
#[derive(Debug, Serialize)]
pub struct CampaignView {
    #[serde(flatten)]
    pub campaign: Campaign,
    pub stats: CampaignStats,
    pub next_publish_at: Option<DateTime<Utc>>,
}

impl From<Campaign> for CampaignView {
    fn from(campaign: Campaign) -> Self {
        let stats = campaign.stats();
        let next_publish_at = campaign.next_publish_at();
        Self {
            campaign,
            stats,
            next_publish_at,
        }
    }
}

/// Response for preview.
#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub campaign: CampaignView,
    pub items: Vec<ItemPreview>,
}

/// Response for a single-item retry.
#[derive(Debug, Serialize)]
pub struct RetryResponse {
    pub position: usize,
    pub success: bool,
    pub post_id: String,
    pub results: Vec<PublishResult>,
}

/// One entry in a retry-all response.
#[derive(Debug, Serialize)]
pub struct RetryAllEntry {
    pub position: usize,
    pub success: bool,
    pub error: Option<String>,
}

async fn create_campaign(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateCampaignRequest>,
) -> Result<Json<CampaignView>, WebError> {
    let campaign = state.store.create_campaign(NewCampaign {
        name: request.name,
        target: request.target,
        rule: request.rule.unwrap_or_default(),
        interval_minutes: request.interval_minutes,
        start_at: request.start_at.unwrap_or_else(Utc::now),
        products: request.products,
    })?;
    Ok(Json(campaign.into()))
}

async fn list_campaigns(State(state): State<Arc<AppState>>) -> Json<Vec<CampaignView>> {
    let mut campaigns = state.store.list();
    campaigns.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Json(campaigns.into_iter().map(CampaignView::from).collect())
}

async fn get_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CampaignView>, WebError> {
    Ok(Json(state.store.get(&id)?.into()))
}

async fn delete_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, WebError> {
    state.store.delete(&id)?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

async fn start_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CampaignView>, WebError> {
    Ok(Json(state.store.start(&id, Utc::now())?.into()))
}

async fn pause_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CampaignView>, WebError> {
    Ok(Json(state.store.pause(&id, Utc::now())?.into()))
}

async fn cancel_campaign(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CampaignView>, WebError> {
    Ok(Json(state.store.cancel(&id)?.into()))
}

/// Generate content for every item without publishing and move the campaign
/// to `preview`.
async fn preview(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PreviewResponse>, WebError> {
    let campaign = state.store.mark_preview(&id)?;
    let items = preview_campaign(&campaign);
    Ok(Json(PreviewResponse {
        campaign: campaign.into(),
        items,
    }))
}

async fn skip_item(
    State(state): State<Arc<AppState>>,
    Path((id, position)): Path<(String, usize)>,
) -> Result<Json<CampaignView>, WebError> {
    Ok(Json(state.store.skip_item(&id, position)?.into()))
}

/// Retry one failed item. The claim goes through the same atomic
/// check-and-set as the scheduler, so racing with a tick cannot double-claim.
async fn retry_item(
    State(state): State<Arc<AppState>>,
    Path((id, position)): Path<(String, usize)>,
) -> Result<Json<RetryResponse>, WebError> {
    state
        .store
        .claim_item(&id, position, &[ItemStatus::Failed], Utc::now())?;
    let outcome = state.orchestrator.publish_item(&id, position).await?;
    Ok(Json(RetryResponse {
        position,
        success: outcome.success,
        post_id: outcome.post_id,
        results: outcome.results,
    }))
}

/// Retry every failed item, sequentially (single-flight per campaign).
/// Item failures are isolated: one item's error never aborts the rest.
async fn retry_all_failed(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<RetryAllEntry>>, WebError> {
    let positions = state.store.failed_positions(&id)?;
    info!(campaign_id = %id, count = positions.len(), "retrying failed items");

    let mut entries = Vec::with_capacity(positions.len());
    for position in positions {
        if let Err(err) = state
            .store
            .claim_item(&id, position, &[ItemStatus::Failed], Utc::now())
        {
            entries.push(RetryAllEntry {
                position,
                success: false,
                error: Some(err.to_string()),
            });
            continue;
        }

        match state.orchestrator.publish_item(&id, position).await {
            Ok(outcome) => entries.push(RetryAllEntry {
                position,
                success: outcome.success,
                error: state
                    .store
                    .get_post(&outcome.post_id)
                    .ok()
                    .and_then(|p| p.error),
            }),
            Err(err) => entries.push(RetryAllEntry {
                position,
                success: false,
                error: Some(err.to_string()),
            }),
        }
    }

    Ok(Json(entries))
}
