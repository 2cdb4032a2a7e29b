//! Owner-level inactivity check handler.

use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::services::InactivityCheckAck;
use domain::models::gift::ScheduleInactivityRequest;

/// Schedule an inactivity check covering all of the owner's pending gifts.
///
/// POST /api/v1/inactivity-checks
pub async fn schedule_inactivity_check(
    State(state): State<AppState>,
    Json(request): Json<ScheduleInactivityRequest>,
) -> Result<(StatusCode, Json<InactivityCheckAck>), ApiError> {
    request.validate()?;

    let ack = state
        .delivery
        .schedule_inactivity_check(&request.username, request.custom_message)
        .await?;

    Ok((StatusCode::ACCEPTED, Json(ack)))
}
