use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::vouchers::VoucherList, error::AppResult, response::ApiResponse,
    services::voucher_service, state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/vouchers/active", get(active_vouchers))
}

#[utoipa::path(
    get,
    path = "/vouchers/active",
    responses((status = 200, body = ApiResponse<VoucherList>)),
    tag = "Vouchers"
)]
pub async fn active_vouchers(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<VoucherList>>> {
    let resp = voucher_service::list_active(&state).await?;
    Ok(Json(resp))
}
