//! Negotiation trigger.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use chrono::{DateTime, Duration, Utc};
use domain::FlexibilityRequest;
use orchestrator::{FlowReport, Transport};
use serde::Deserialize;

use super::AppState;
use crate::error::ApiError;

/// Window length used when the request does not specify one.
const DEFAULT_WINDOW_HOURS: i64 = 1;

#[derive(Deserialize)]
pub struct StartFlowRequest {
    pub feeder_id: String,
    pub flexibility_kw: f64,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end: Option<DateTime<Utc>>,
}

impl StartFlowRequest {
    fn validate(self) -> Result<FlexibilityRequest, ApiError> {
        if self.feeder_id.trim().is_empty() {
            return Err(ApiError::BadRequest("feeder_id must not be empty".to_string()));
        }
        if !self.flexibility_kw.is_finite() || self.flexibility_kw <= 0.0 {
            return Err(ApiError::BadRequest(format!(
                "flexibility_kw must be positive, got {}",
                self.flexibility_kw
            )));
        }

        let window_start = self.window_start.unwrap_or_else(Utc::now);
        let window_end = self
            .window_end
            .unwrap_or(window_start + Duration::hours(DEFAULT_WINDOW_HOURS));
        if window_end <= window_start {
            return Err(ApiError::BadRequest(
                "window_end must be after window_start".to_string(),
            ));
        }

        Ok(FlexibilityRequest {
            feeder_id: self.feeder_id,
            flexibility_kw: self.flexibility_kw,
            window_start,
            window_end,
        })
    }
}

/// POST /flows — negotiate flexibility for a feeder and wait for the outcome.
///
/// Flow failures are part of the report (`success: false`), not HTTP errors.
#[tracing::instrument(skip_all, fields(feeder_id = %req.feeder_id))]
pub async fn start<T: Transport + 'static>(
    State(state): State<Arc<AppState<T>>>,
    Json(req): Json<StartFlowRequest>,
) -> Result<Json<FlowReport>, ApiError> {
    let request = req.validate()?;
    let result = state.orchestrator.run(request).await;
    Ok(Json(FlowReport::from(result)))
}
