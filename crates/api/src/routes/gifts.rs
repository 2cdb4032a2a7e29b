//! Gift endpoint handlers.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::services::DeliveryAck;
use domain::models::gift::{
    ConfigureDeliveryRequest, GiftCountResponse, ListGiftsResponse, UploadGiftResponse,
};

/// Query parameters identifying the owner.
#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub username: String,
}

/// Upload a gift.
///
/// POST /api/v1/gifts?username=<name> (multipart: `file`, optional `emailMessage`)
pub async fn upload_gift(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadGiftResponse>), ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut message: Option<String> = None;

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await?;
                file = Some((file_name, bytes.to_vec()));
            }
            "emailMessage" => message = Some(field.text().await?),
            _ => {}
        }
    }

    let (file_name, bytes) =
        file.ok_or_else(|| ApiError::Validation("Multipart field 'file' is required".to_string()))?;

    let gift = state
        .delivery
        .upload_gift(&query.username, &file_name, &bytes, message)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadGiftResponse {
            message: "File uploaded successfully".to_string(),
            gift_id: gift.id,
        }),
    ))
}

/// List the owner's gifts without payloads.
///
/// GET /api/v1/gifts?username=<name>
pub async fn list_gifts(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<ListGiftsResponse>, ApiError> {
    let gifts = state.delivery.list_gifts(&query.username).await?;
    let total = gifts.len() as i64;
    Ok(Json(ListGiftsResponse { gifts, total }))
}

/// GET /api/v1/gifts/count?username=<name>
pub async fn count_gifts(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<GiftCountResponse>, ApiError> {
    let count = state.delivery.count_gifts(&query.username).await?;
    Ok(Json(GiftCountResponse { count }))
}

/// GET /api/v1/gifts/pending?username=<name>
pub async fn pending_gifts(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<ListGiftsResponse>, ApiError> {
    let gifts = state.delivery.pending_gifts(&query.username).await?;
    let total = gifts.len() as i64;
    Ok(Json(ListGiftsResponse { gifts, total }))
}

/// Download the gift payload as an attachment.
///
/// GET /api/v1/gifts/:id/download
pub async fn download_gift(
    State(state): State<AppState>,
    Path(gift_id): Path<i64>,
) -> Result<Response, ApiError> {
    let gift = state.delivery.download_gift(gift_id).await?;
    let content_type = mime_guess::from_path(&gift.file_name)
        .first_or_octet_stream()
        .to_string();
    let disposition = format!(
        "attachment; filename=\"{}\"",
        gift.file_name.replace('"', "")
    );

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        gift.file_data,
    )
        .into_response())
}

/// Configure recipients and schedule, then arm the release.
///
/// POST /api/v1/gifts/:id/delivery
pub async fn configure_delivery(
    State(state): State<AppState>,
    Path(gift_id): Path<i64>,
    Json(request): Json<ConfigureDeliveryRequest>,
) -> Result<(StatusCode, Json<DeliveryAck>), ApiError> {
    request.validate()?;

    let ack = state
        .delivery
        .configure_delivery(
            gift_id,
            request.receivers.into(),
            request.custom_message,
            request.scheduled_time.as_deref(),
        )
        .await?;

    Ok((StatusCode::ACCEPTED, Json(ack)))
}

/// Stop a gift: delete it and cancel its release.
///
/// DELETE /api/v1/gifts/:id
pub async fn stop_gift(
    State(state): State<AppState>,
    Path(gift_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.delivery.stop_gift(gift_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
