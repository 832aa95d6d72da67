use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::bookings::{
        AvailableSlotsData, BookingCreated, BookingDetail, BookingStatuses, CreateBookingRequest,
    },
    error::AppResult,
    response::ApiResponse,
    routes::params::SlotQuery,
    services::booking_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/studios/{studio_id}/packages/{package_id}/available-slots",
            get(available_slots),
        )
        .route(
            "/studios/{studio_id}/packages/{package_id}/bookings",
            post(create_booking),
        )
        .route("/bookings/statuses", get(booking_statuses))
        .route("/bookings/{invoice_number}", get(get_booking))
}

#[utoipa::path(
    get,
    path = "/studios/{studio_id}/packages/{package_id}/available-slots",
    params(("booking_date" = String, Query, description = "Date to inspect, YYYY-MM-DD")),
    responses((status = 200, body = ApiResponse<AvailableSlotsData>)),
    tag = "Bookings"
)]
pub async fn available_slots(
    State(state): State<AppState>,
    Path((studio_id, package_id)): Path<(Uuid, Uuid)>,
    Query(query): Query<SlotQuery>,
) -> AppResult<Json<ApiResponse<AvailableSlotsData>>> {
    let resp =
        booking_service::available_slots(&state, studio_id, package_id, query.booking_date).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/studios/{studio_id}/packages/{package_id}/bookings",
    request_body = CreateBookingRequest,
    responses((status = 201, body = ApiResponse<BookingCreated>)),
    tag = "Bookings"
)]
pub async fn create_booking(
    State(state): State<AppState>,
    Path((studio_id, package_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<CreateBookingRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<BookingCreated>>)> {
    let resp = booking_service::create_booking(&state, studio_id, package_id, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    get,
    path = "/bookings/statuses",
    responses((status = 200, body = ApiResponse<BookingStatuses>)),
    tag = "Bookings"
)]
pub async fn booking_statuses(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<BookingStatuses>>> {
    let resp = booking_service::statuses(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/bookings/{invoice_number}",
    responses((status = 200, body = ApiResponse<BookingDetail>)),
    tag = "Bookings"
)]
pub async fn get_booking(
    State(state): State<AppState>,
    Path(invoice_number): Path<String>,
) -> AppResult<Json<ApiResponse<BookingDetail>>> {
    let resp = booking_service::show_by_invoice(&state, &invoice_number).await?;
    Ok(Json(resp))
}
