use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        bookings::{
            AvailableSlotsData, BookingCreated, BookingDetail, BookingList, BookingStatuses,
            CreateBookingRequest, CustomerInput, RescheduleRequest, SlotInfo, StatusCount,
            UpdateBookingStatusRequest, DashboardSummary,
        },
        payments::{
            PaymentHistoryList, PaymentInit, PaymentWithBooking, PollResult, TransactionDetailData,
            TransactionDetailQuery, WebhookAck, WebhookPayload,
        },
        vouchers::{CreateVoucherRequest, VoucherList},
    },
    models::{Addon, Booking, BookingAddon, Customer, Package, Payment, Studio, Voucher},
    response::{ApiResponse, Meta},
    routes::{admin, bookings, health, params, payments, vouchers},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        bookings::available_slots,
        bookings::create_booking,
        bookings::booking_statuses,
        bookings::get_booking,
        payments::payment_status,
        payments::webhook,
        vouchers::active_vouchers,
        admin::dashboard,
        admin::list_bookings,
        admin::get_booking,
        admin::update_booking_status,
        admin::reschedule_booking,
        admin::payment_history,
        admin::transaction_detail,
        admin::create_voucher
    ),
    components(
        schemas(
            Studio,
            Package,
            Addon,
            Customer,
            Voucher,
            Booking,
            BookingAddon,
            Payment,
            CustomerInput,
            CreateBookingRequest,
            RescheduleRequest,
            UpdateBookingStatusRequest,
            SlotInfo,
            AvailableSlotsData,
            BookingDetail,
            BookingCreated,
            BookingList,
            BookingStatuses,
            StatusCount,
            DashboardSummary,
            PaymentInit,
            WebhookPayload,
            WebhookAck,
            PollResult,
            TransactionDetailQuery,
            TransactionDetailData,
            PaymentWithBooking,
            PaymentHistoryList,
            CreateVoucherRequest,
            VoucherList,
            params::Pagination,
            params::SlotQuery,
            params::BookingListQuery,
            params::PaymentHistoryQuery,
            params::DashboardQuery,
            Meta,
            ApiResponse<BookingDetail>,
            ApiResponse<BookingCreated>,
            ApiResponse<BookingList>,
            ApiResponse<AvailableSlotsData>,
            ApiResponse<PollResult>,
            ApiResponse<PaymentHistoryList>,
            ApiResponse<VoucherList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Bookings", description = "Slot discovery and booking endpoints"),
        (name = "Payments", description = "Payment polling and gateway webhook"),
        (name = "Vouchers", description = "Public voucher endpoints"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
