//! Campaign control API for crosspost.
//!
//! A JSON surface over the campaign store and publish orchestrator:
//! create/start/pause/cancel/preview campaigns, skip and retry items, and
//! query campaigns with computed stats.

mod error;
mod routes;

pub use error::WebError;
pub use routes::{AppState, create_router};
