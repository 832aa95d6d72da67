use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dto::payments::PaymentInit;
use crate::error::{AppError, AppResult};
use crate::models::{Booking, BookingAddon, Customer, Package, Payment, Studio, Voucher};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CustomerInput {
    pub name: String,
    pub phone: String,
    pub email: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct Preferences {
    pub background: Option<String>,
    pub allow_social_media_upload: Option<serde_json::Value>,
}

/// One requested add-on line. `id`/`quantity` are accepted as aliases so both
/// historical client payload shapes deserialize into the same thing.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AddonSelection {
    #[serde(alias = "id")]
    pub addon_id: Uuid,
    #[serde(alias = "quantity")]
    pub qty: i64,
}

/// Clients send add-ons either as a list of objects or as an `{addon_id: qty}`
/// map. Both normalize to the same list before any pricing runs.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum AddonsPayload {
    List(Vec<AddonSelection>),
    Map(HashMap<Uuid, i64>),
}

impl AddonsPayload {
    pub fn normalize(self) -> AppResult<Vec<(Uuid, i32)>> {
        let pairs: Vec<(Uuid, i64)> = match self {
            AddonsPayload::List(items) => items
                .into_iter()
                .map(|item| (item.addon_id, item.qty))
                .collect(),
            AddonsPayload::Map(map) => map.into_iter().collect(),
        };

        let mut normalized = Vec::with_capacity(pairs.len());
        for (addon_id, qty) in pairs {
            if qty < 1 {
                return Err(AppError::validation(
                    "addons",
                    "Each addon must contain addon_id and qty >= 1",
                ));
            }
            normalized.push((addon_id, qty as i32));
        }
        Ok(normalized)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBookingRequest {
    pub booking_date: NaiveDate,
    pub start_time: String,
    pub customer: CustomerInput,
    pub voucher_code: Option<String>,
    pub payment_mode: Option<String>,
    pub payment_method: Option<String>,
    pub qris_only: Option<bool>,
    pub redirect_url: Option<String>,
    pub addons: Option<AddonsPayload>,
    pub preferences: Option<Preferences>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RescheduleRequest {
    pub booking_date: NaiveDate,
    pub start_time: String,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateBookingStatusRequest {
    pub status: String,
    pub payment_status: Option<String>,
    pub payment_method: Option<String>,
    pub payment_reference: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SlotInfo {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub booked_count: i64,
    pub remaining_quota: i64,
    pub is_available: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AvailableSlotsData {
    pub booking_date: NaiveDate,
    pub slot_duration: i64,
    pub max_booking_per_slot: i32,
    pub slots: Vec<SlotInfo>,
}

/// Booking with its owned and referenced records loaded, the shape every
/// detail endpoint returns.
#[derive(Debug, Serialize, ToSchema)]
pub struct BookingDetail {
    pub booking: Booking,
    pub customer: Option<Customer>,
    pub package: Option<Package>,
    pub studio: Option<Studio>,
    pub addons: Vec<BookingAddon>,
    pub voucher: Option<Voucher>,
    pub payment: Option<Payment>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookingCreated {
    pub booking: BookingDetail,
    pub payment: PaymentInit,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookingList {
    pub items: Vec<BookingDetail>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StatusCount {
    pub status: String,
    pub total: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookingStatuses {
    pub booking_statuses: Vec<StatusCount>,
    pub payment_statuses: Vec<StatusCount>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardSummary {
    pub total_booking_today: i64,
    pub total_booking_month: i64,
    pub total_revenue_today: i64,
    pub total_revenue_month: i64,
    pub month: u32,
    pub year: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addons_list_shape_normalizes() {
        let payload: AddonsPayload = serde_json::from_value(serde_json::json!([
            { "addon_id": "7f1b7c2e-61f5-4fd4-9a86-1f2b4f6f3a11", "qty": 2 },
            { "id": "9a6c1d7e-0c3b-4f3f-8f53-2f9f5f7d2b22", "quantity": 1 },
        ]))
        .unwrap();

        let normalized = payload.normalize().unwrap();
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[0].1, 2);
        assert_eq!(normalized[1].1, 1);
    }

    #[test]
    fn addons_map_shape_normalizes() {
        let payload: AddonsPayload = serde_json::from_value(serde_json::json!({
            "7f1b7c2e-61f5-4fd4-9a86-1f2b4f6f3a11": 3,
        }))
        .unwrap();

        let normalized = payload.normalize().unwrap();
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized[0].1, 3);
    }

    #[test]
    fn addons_zero_qty_rejected() {
        let payload: AddonsPayload = serde_json::from_value(serde_json::json!({
            "7f1b7c2e-61f5-4fd4-9a86-1f2b4f6f3a11": 0,
        }))
        .unwrap();

        assert!(payload.normalize().is_err());
    }

    #[test]
    fn addons_garbage_shape_rejected() {
        let result: Result<AddonsPayload, _> =
            serde_json::from_value(serde_json::json!("not-addons"));
        assert!(result.is_err());
    }
}
