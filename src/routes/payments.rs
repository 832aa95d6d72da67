use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};

use crate::{
    dto::payments::{PollResult, WebhookAck, WebhookPayload},
    error::AppResult,
    response::ApiResponse,
    services::payment_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/bookings/{invoice_number}/payment-status", get(payment_status))
        .route("/payments/webhook/pakasir", post(webhook))
}

#[utoipa::path(
    get,
    path = "/bookings/{invoice_number}/payment-status",
    responses((status = 200, body = ApiResponse<PollResult>)),
    tag = "Payments"
)]
pub async fn payment_status(
    State(state): State<AppState>,
    Path(invoice_number): Path<String>,
) -> AppResult<Json<ApiResponse<PollResult>>> {
    let resp = payment_service::poll(&state, &invoice_number).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/payments/webhook/pakasir",
    request_body = WebhookPayload,
    responses((status = 200, body = ApiResponse<WebhookAck>)),
    tag = "Payments"
)]
pub async fn webhook(
    State(state): State<AppState>,
    Json(payload): Json<WebhookPayload>,
) -> AppResult<Json<ApiResponse<WebhookAck>>> {
    let resp = payment_service::webhook(&state, payload).await?;
    Ok(Json(resp))
}
