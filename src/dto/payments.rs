use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Booking, Payment};
use crate::pakasir::GatewayTransaction;

/// Outcome of payment initialization, attached to the create-booking response.
#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentInit {
    pub provider: String,
    pub mode: String,
    pub order_id: String,
    pub amount: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_payment: Option<f64>,
    pub payment_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_number: Option<serde_json::Value>,
    pub payment_url: Option<String>,
    pub expired_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Inbound gateway webhook body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WebhookPayload {
    pub amount: f64,
    pub order_id: String,
    pub project: String,
    pub status: String,
    pub payment_method: Option<String>,
    pub completed_at: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub invoice_number: String,
    pub booking_status: String,
    pub payment_status: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PollResult {
    pub invoice_number: String,
    pub booking_status: String,
    pub payment_status: String,
    pub payment_method: String,
    pub payment_reference: Option<String>,
    pub transaction: GatewayTransaction,
    pub payment_record: Option<Payment>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LocalBookingSnapshot {
    pub id: Uuid,
    pub invoice_number: String,
    pub status: String,
    pub payment_status: String,
    pub payment_method: String,
    pub payment_reference: Option<String>,
    pub total_price: i64,
    pub payment_record: Option<Payment>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionDetailData {
    pub transaction: GatewayTransaction,
    pub local_booking: Option<LocalBookingSnapshot>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TransactionDetailQuery {
    pub order_id: String,
    pub amount: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentWithBooking {
    pub payment: Payment,
    pub booking: Option<Booking>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentHistoryList {
    pub items: Vec<PaymentWithBooking>,
}
