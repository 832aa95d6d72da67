use chrono::NaiveDate;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;
        (page, per_page, offset)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BookingSortBy {
    CreatedAt,
    BookingDate,
    TotalPrice,
    Status,
    PaymentStatus,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SlotQuery {
    pub booking_date: NaiveDate,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BookingListQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub search: Option<String>,
    pub customer_name: Option<String>,
    pub booking_date: Option<NaiveDate>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub studio_id: Option<Uuid>,
    pub package_id: Option<Uuid>,
    pub studio_name: Option<String>,
    pub package_name: Option<String>,
    pub sort_by: Option<BookingSortBy>,
    pub sort_order: Option<SortOrder>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PaymentHistoryQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub payment_status: Option<String>,
    pub method: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DashboardQuery {
    pub month: Option<u32>,
    pub year: Option<i32>,
}
