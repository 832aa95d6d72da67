use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub const BOOKING_STATUSES: [&str; 5] =
    ["pending", "confirmed", "completed", "cancelled", "expired"];
pub const PAYMENT_STATUSES: [&str; 4] = ["unpaid", "paid", "failed", "refunded"];
/// Once a booking reaches one of these, rescheduling is refused.
pub const TERMINAL_STATUSES: [&str; 3] = ["completed", "cancelled", "expired"];

pub fn is_booking_status(value: &str) -> bool {
    BOOKING_STATUSES.contains(&value)
}

pub fn is_payment_status(value: &str) -> bool {
    PAYMENT_STATUSES.contains(&value)
}

pub fn is_terminal_status(value: &str) -> bool {
    TERMINAL_STATUSES.contains(&value)
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Studio {
    pub id: Uuid,
    pub name: String,
    pub address: String,
    pub city: String,
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Package {
    pub id: Uuid,
    pub studio_id: Uuid,
    pub name: String,
    pub category: String,
    pub price: i64,
    pub duration_minutes: i32,
    pub max_booking_per_slot: i32,
    pub max_person: i32,
    pub description: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Addon {
    pub id: Uuid,
    pub package_id: Uuid,
    pub name: String,
    pub price: i64,
    pub addon_type: String,
    pub description: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Customer {
    pub id: Uuid,
    pub name: String,
    pub phone: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Voucher {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub discount_type: String,
    pub discount_value: i64,
    pub max_discount: Option<i64>,
    pub min_total: Option<i64>,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Booking {
    pub id: Uuid,
    pub invoice_number: String,
    pub customer_id: Uuid,
    pub package_id: Uuid,
    pub voucher_id: Option<Uuid>,
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub subtotal_price: i64,
    pub discount_amount: i64,
    pub total_price: i64,
    pub status: String,
    pub payment_status: String,
    pub payment_method: String,
    pub payment_reference: Option<String>,
    pub payment_expired_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BookingAddon {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub addon_id: Uuid,
    pub name: Option<String>,
    pub qty: i32,
    pub price: i64,
    pub subtotal: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub method: String,
    pub amount: i64,
    pub transaction_id: String,
    pub payment_status: String,
    pub paid_at: Option<DateTime<Utc>>,
    pub raw_response: Option<serde_json::Value>,
}
