//! Attribution API handlers
//!
//! REST endpoints for submitting conversions, reading attribution results
//! and recording human feedback.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{ConnectInfo, Path, State, rejection::JsonRejection},
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};
use tracelink_core::{AttributionId, AttributionResult, ConversionEvent, FormMetadata};

use crate::AppState;
use crate::error::ApiError;
use crate::middleware::AuthContext;

use super::client_ip;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Conversion submission body
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub page_url: Option<String>,
    pub tracker_id: Option<String>,
    pub link_id: Option<String>,
    pub fingerprint: Option<String>,
    pub form_id: Option<String>,
    pub form_name: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Conversion submission response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub success: bool,
    /// Attribution result ID
    pub id: String,
    pub attributed: bool,
    pub confidence: f64,
    pub link_id: Option<String>,
}

/// Full attribution result
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributionResponse {
    pub id: String,
    pub conversion_id: String,
    pub attributed: bool,
    pub confidence: f64,
    pub click_id: Option<String>,
    pub link_id: Option<String>,
    pub signals: Vec<String>,
    pub elapsed_minutes: Option<i64>,
    pub feedback_status: String,
    /// When the result was recorded (ISO 8601)
    pub created_at: String,
}

impl From<AttributionResult> for AttributionResponse {
    fn from(result: AttributionResult) -> Self {
        Self {
            id: result.id.to_string(),
            conversion_id: result.conversion_id.to_string(),
            attributed: result.is_attributed(),
            confidence: result.confidence,
            click_id: result.click_id.map(|id| id.to_string()),
            link_id: result.link_id.map(|l| l.to_string()),
            signals: result.signals.iter().map(|s| s.to_string()).collect(),
            elapsed_minutes: result.elapsed_minutes,
            feedback_status: result.feedback_status.to_string(),
            created_at: result.created_at.to_rfc3339(),
        }
    }
}

/// Feedback body
#[derive(Debug, Serialize, Deserialize)]
pub struct FeedbackRequest {
    pub confirmed: bool,
}

/// Feedback response
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackResponse {
    pub success: bool,
    pub id: String,
    pub feedback_status: String,
}

// ============================================================================
// Endpoints
// ============================================================================

/// POST /api/attributions - Attribute a conversion
pub async fn submit(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    headers: HeaderMap,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    payload: Result<Json<SubmitRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;
    let page_url = non_blank(request.page_url)
        .ok_or_else(|| ApiError::Validation("pageUrl is required".to_string()))?;

    let mut conversion = ConversionEvent::new(auth.owner().clone(), page_url).with_form(FormMetadata {
        form_id: non_blank(request.form_id),
        form_name: non_blank(request.form_name),
        email: non_blank(request.email),
        name: non_blank(request.name),
        phone: non_blank(request.phone),
    });
    conversion.tracker_id = non_blank(request.tracker_id).map(Into::into);
    conversion.link_id = non_blank(request.link_id).map(Into::into);
    conversion.fingerprint = non_blank(request.fingerprint);
    conversion.ip_address =
        client_ip(&headers, connect_info.as_ref(), state.auth.trusted_proxies());
    conversion.metadata = request.metadata;

    let result = state.engine.process(conversion).await?;

    Ok(Json(SubmitResponse {
        success: true,
        id: result.id.to_string(),
        attributed: result.is_attributed(),
        confidence: result.confidence,
        link_id: result.link_id.map(|l| l.to_string()),
    }))
}

/// GET /api/attributions/:id - Read an attribution result
pub async fn get_attribution(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<AttributionResponse>, ApiError> {
    let id = parse_id(&id)?;
    let result = state.engine.get_attribution(id, auth.owner()).await?;
    Ok(Json(result.into()))
}

/// POST /api/attributions/:id/feedback - Confirm or reject an attribution
pub async fn feedback(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthContext>,
    payload: Result<Json<FeedbackRequest>, JsonRejection>,
) -> Result<Json<FeedbackResponse>, ApiError> {
    let id = parse_id(&id)?;
    let Json(request) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;

    let result = state
        .engine
        .submit_feedback(id, request.confirmed, auth.owner())
        .await?;

    Ok(Json(FeedbackResponse {
        success: true,
        id: result.id.to_string(),
        feedback_status: result.feedback_status.to_string(),
    }))
}

/// Malformed IDs cannot name an owned attribution
fn parse_id(id: &str) -> Result<AttributionId, ApiError> {
    id.parse()
        .map_err(|_| ApiError::NotFound("attribution not found".to_string()))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
