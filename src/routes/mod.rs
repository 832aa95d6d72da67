use axum::Router;

use crate::state::AppState;

pub mod admin;
pub mod bookings;
pub mod doc;
pub mod health;
pub mod params;
pub mod payments;
pub mod vouchers;

// Build the API router without binding state; it will be provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .merge(bookings::router())
        .merge(payments::router())
        .merge(vouchers::router())
        .nest("/admin", admin::router())
}
