//! HTTP surface of the dashboard: the page itself and the JSON API it
//! polls.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use axum::{Json, Router};

use porthole_core::{DiscoveryResult, ServiceDiscovery};

const INDEX_PAGE: &str = include_str!("../assets/index.html");

#[derive(Clone)]
pub struct AppState {
    pub discovery: Arc<ServiceDiscovery>,
    pub display_host: String,
    pub deadline: Duration,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/services", get(services))
        .with_state(state)
}

async fn index(State(state): State<AppState>) -> Html<String> {
    Html(INDEX_PAGE.replace("{{service_host}}", &state.display_host))
}

/// One full discovery pass per request. A pass that outlives the
/// deadline is abandoned and reported as a timeout.
async fn services(State(state): State<AppState>) -> Result<Json<DiscoveryResult>, StatusCode> {
    match tokio::time::timeout(state.deadline, state.discovery.run()).await {
        Ok(result) => Ok(Json(result)),
        Err(_) => {
            tracing::warn!(
                deadline_secs = state.deadline.as_secs(),
                "Discovery pass exceeded its deadline"
            );
            Err(StatusCode::GATEWAY_TIMEOUT)
        }
    }
}
