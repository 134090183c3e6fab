//! Click and page-view ingestion
//!
//! These records are what later conversions get attributed to.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{ConnectInfo, State, rejection::JsonRejection},
    http::HeaderMap,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracelink_core::{ClickEvent, LinkId, PageView};
use tracing::debug;

use crate::AppState;
use crate::error::ApiError;
use crate::middleware::AuthContext;

use super::client_ip;

/// Click ingestion body
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickRequest {
    pub link_id: String,
    /// Visitor IP; taken from the request when absent
    #[serde(default)]
    pub ip_address: Option<IpAddr>,
    #[serde(default)]
    pub tracker_id: Option<String>,
    #[serde(default)]
    pub clicked_at: Option<DateTime<Utc>>,
}

/// Page-view ingestion body
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageViewRequest {
    pub tracker_id: String,
    #[serde(default)]
    pub link_id: Option<String>,
    #[serde(default)]
    pub viewed_at: Option<DateTime<Utc>>,
}

/// Response for appended records
#[derive(Debug, Serialize, Deserialize)]
pub struct RecordedResponse {
    pub success: bool,
    pub id: String,
}

/// POST /api/clicks - Record a link click owned by the caller
pub async fn record_click(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    payload: Result<Json<ClickRequest>, JsonRejection>,
) -> Result<Json<RecordedResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    let link_id = required(request.link_id, "linkId")?;
    let ip_address = request
        .ip_address
        .or_else(|| client_ip(&headers, connect_info.as_ref(), state.auth.trusted_proxies()))
        .ok_or_else(|| ApiError::Validation("ipAddress could not be determined".to_string()))?;

    let mut click = ClickEvent::new(auth.owner().clone(), link_id, ip_address);
    if let Some(tracker_id) = request.tracker_id.filter(|t| !t.trim().is_empty()) {
        click = click.with_tracker(tracker_id);
    }
    if let Some(clicked_at) = request.clicked_at {
        click = click.at(clicked_at);
    }

    state.store.insert_click(&click).await?;
    debug!(
        click_id = %click.id,
        owner = %click.owner,
        link_id = %click.link_id,
        "Recorded click"
    );

    Ok(Json(RecordedResponse {
        success: true,
        id: click.id.to_string(),
    }))
}

/// POST /api/pageviews - Record a tracked page view owned by the caller
pub async fn record_page_view(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<PageViewRequest>, JsonRejection>,
) -> Result<Json<RecordedResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    let tracker_id = required(request.tracker_id, "trackerId")?;
    let link_id = request
        .link_id
        .filter(|l| !l.trim().is_empty())
        .map(LinkId::new);

    let mut view = PageView::new(auth.owner().clone(), tracker_id, link_id);
    if let Some(viewed_at) = request.viewed_at {
        view = view.at(viewed_at);
    }

    state.store.insert_page_view(&view).await?;
    debug!(page_view_id = %view.id, tracker_id = %view.tracker_id, "Recorded page view");

    Ok(Json(RecordedResponse {
        success: true,
        id: view.id.to_string(),
    }))
}

fn required(value: String, field: &str) -> Result<String, ApiError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ApiError::Validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}
