use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        bookings::{
            BookingDetail, BookingList, DashboardSummary, RescheduleRequest,
            UpdateBookingStatusRequest,
        },
        payments::{PaymentHistoryList, TransactionDetailData, TransactionDetailQuery},
        vouchers::CreateVoucherRequest,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Voucher,
    response::ApiResponse,
    routes::params::{BookingListQuery, DashboardQuery, PaymentHistoryQuery},
    services::{booking_service, payment_service, voucher_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/bookings", get(list_bookings))
        .route("/bookings/{id}", get(get_booking))
        .route("/bookings/{id}/status", post(update_booking_status))
        .route("/bookings/{id}/reschedule", post(reschedule_booking))
        .route("/payments", get(payment_history))
        .route("/payments/transaction-detail", get(transaction_detail))
        .route("/vouchers", post(create_voucher))
}

#[utoipa::path(
    get,
    path = "/admin/dashboard",
    responses((status = 200, body = ApiResponse<DashboardSummary>)),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn dashboard(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<DashboardQuery>,
) -> AppResult<Json<ApiResponse<DashboardSummary>>> {
    let resp = booking_service::admin_dashboard(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/admin/bookings",
    responses((status = 200, body = ApiResponse<BookingList>)),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_bookings(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<BookingListQuery>,
) -> AppResult<Json<ApiResponse<BookingList>>> {
    let resp = booking_service::admin_list(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/admin/bookings/{id}",
    responses((status = 200, body = ApiResponse<BookingDetail>)),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn get_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<BookingDetail>>> {
    let resp = booking_service::admin_show(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/admin/bookings/{id}/status",
    request_body = UpdateBookingStatusRequest,
    responses((status = 200, body = ApiResponse<BookingDetail>)),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn update_booking_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateBookingStatusRequest>,
) -> AppResult<Json<ApiResponse<BookingDetail>>> {
    let resp = booking_service::admin_update_status(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/admin/bookings/{id}/reschedule",
    request_body = RescheduleRequest,
    responses((status = 200, body = ApiResponse<BookingDetail>)),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn reschedule_booking(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RescheduleRequest>,
) -> AppResult<Json<ApiResponse<BookingDetail>>> {
    let resp = booking_service::admin_reschedule(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/admin/payments",
    responses((status = 200, body = ApiResponse<PaymentHistoryList>)),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn payment_history(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<PaymentHistoryQuery>,
) -> AppResult<Json<ApiResponse<PaymentHistoryList>>> {
    let resp = payment_service::history(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/admin/payments/transaction-detail",
    responses((status = 200, body = ApiResponse<TransactionDetailData>)),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn transaction_detail(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<TransactionDetailQuery>,
) -> AppResult<Json<ApiResponse<TransactionDetailData>>> {
    let resp = payment_service::transaction_detail(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/admin/vouchers",
    request_body = CreateVoucherRequest,
    responses((status = 200, body = ApiResponse<Voucher>)),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_voucher(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateVoucherRequest>,
) -> AppResult<Json<ApiResponse<Voucher>>> {
    let resp = voucher_service::create_voucher(&state, &user, payload).await?;
    Ok(Json(resp))
}
