//! Calendar and receiver views of an owner's gifts.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Serialize;

use crate::app::AppState;
use crate::error::ApiError;
use crate::routes::gifts::OwnerQuery;
use domain::models::CalendarEvent;

#[derive(Debug, Serialize)]
pub struct CalendarResponse {
    pub events: Vec<CalendarEvent>,
}

#[derive(Debug, Serialize)]
pub struct ReceiversResponse {
    pub receivers: Vec<String>,
}

/// GET /api/v1/calendar?username=<name>
pub async fn get_calendar(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<CalendarResponse>, ApiError> {
    let events = state.delivery.calendar(&query.username).await?;
    Ok(Json(CalendarResponse { events }))
}

/// Unique recipients across the owner's gifts.
///
/// GET /api/v1/receivers?username=<name>
pub async fn get_receivers(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<ReceiversResponse>, ApiError> {
    let receivers = state.delivery.receivers(&query.username).await?;
    Ok(Json(ReceiversResponse { receivers }))
}
