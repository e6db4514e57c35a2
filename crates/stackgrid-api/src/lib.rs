//! stackgrid-api: REST API for StackGrid.
//!
//! Thin axum handlers over [`StackOrchestrator`]. Every response uses the
//! `{success, data?, error?}` envelope.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/v1/webhooks` | Create a webhook stack |
//! | DELETE | `/api/v1/webhooks/{tenant}/{version}` | Destroy a webhook stack |
//! | POST | `/api/v1/daipps` | Create a daipp stack |
//! | DELETE | `/api/v1/daipps/{tenant}/{version}` | Destroy a daipp stack |
//! | POST | `/api/v1/hosts` | Create a host stack |
//! | DELETE | `/api/v1/hosts/{tenant}/{version}` | Destroy a host stack |
//! | POST | `/api/v1/hosts/{tenant}/{version}/upgrade` | Re-apply settings and restart |
//! | PUT | `/api/v1/hosts/{tenant}/{version}/config/{role}` | Re-apply one role's settings |
//! | PUT | `/api/v1/stacks/{tenant}/{version}/{role}/image` | Swap a role's image |
//! | POST | `/api/v1/stacks/{tenant}/{version}/{role}/restart` | Roll a role's pods |
//! | GET | `/api/v1/intents` | Unfinished intents |
//! | GET | `/healthz` | Liveness |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post, put};
use stackgrid_cluster::ClusterApi;
use stackgrid_orchestrator::StackOrchestrator;

/// Orchestrator over whichever cluster backend the daemon selected.
pub type SharedOrchestrator = Arc<StackOrchestrator<dyn ClusterApi>>;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: SharedOrchestrator,
}

/// Build the complete API router.
pub fn build_router(orchestrator: SharedOrchestrator) -> Router {
    let api_state = ApiState { orchestrator };

    let api_routes = Router::new()
        .route("/webhooks", post(handlers::create_webhook))
        .route("/webhooks/{tenant}/{version}", delete(handlers::destroy_webhook))
        .route("/daipps", post(handlers::create_daipp))
        .route("/daipps/{tenant}/{version}", delete(handlers::destroy_daipp))
        .route("/hosts", post(handlers::create_host))
        .route("/hosts/{tenant}/{version}", delete(handlers::destroy_host))
        .route("/hosts/{tenant}/{version}/upgrade", post(handlers::upgrade_host))
        .route("/hosts/{tenant}/{version}/config/{role}", put(handlers::update_config))
        .route("/stacks/{tenant}/{version}/{role}/image", put(handlers::update_image))
        .route("/stacks/{tenant}/{version}/{role}/restart", post(handlers::restart))
        .route("/intents", get(handlers::list_pending_intents))
        .with_state(api_state);

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/healthz", get(handlers::healthz))
}
