use std::collections::HashMap;

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveTime, Utc};
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::Expr;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, EntityTrait,
    JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::bookings::{
        AvailableSlotsData, BookingCreated, BookingDetail, BookingList, BookingStatuses,
        CreateBookingRequest, CustomerInput, DashboardSummary, Preferences, RescheduleRequest,
        StatusCount, UpdateBookingStatusRequest,
    },
    entity::{
        addons::{Column as AddonCol, Entity as Addons, Model as AddonModel},
        booking_addons::{
            ActiveModel as BookingAddonActive, Column as BookingAddonCol, Entity as BookingAddons,
        },
        bookings::{
            self, ActiveModel as BookingActive, Column as BookingCol, Entity as Bookings,
            Model as BookingModel,
        },
        customers::{
            ActiveModel as CustomerActive, Column as CustomerCol, Entity as Customers,
            Model as CustomerModel,
        },
        packages::{self, Column as PackageCol, Entity as Packages, Model as PackageModel},
        payments::{Column as PaymentCol, Entity as Payments},
        studios::{self, Entity as Studios, Model as StudioModel},
        vouchers::Entity as Vouchers,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{
        self, Booking, BookingAddon, Customer, Package, Studio, is_booking_status,
        is_payment_status, is_terminal_status,
    },
    pakasir::is_gateway_payment_method,
    response::{ApiResponse, Meta},
    routes::params::{BookingListQuery, BookingSortBy, DashboardQuery, SortOrder},
    services::{payment_service, pricing, slots, voucher_service},
    state::AppState,
};

pub async fn available_slots(
    state: &AppState,
    studio_id: Uuid,
    package_id: Uuid,
    booking_date: NaiveDate,
) -> AppResult<ApiResponse<AvailableSlotsData>> {
    let (package, studio) = find_active_package(&state.orm, studio_id, package_id).await?;
    let slot_list = slots::build_slots(&state.orm, &package, &studio, booking_date, None).await?;

    Ok(ApiResponse::success(
        "Available slots",
        AvailableSlotsData {
            booking_date,
            slot_duration: slots::SLOT_DURATION_MINUTES,
            max_booking_per_slot: package.max_booking_per_slot,
            slots: slot_list,
        },
        Some(Meta::empty()),
    ))
}

pub async fn create_booking(
    state: &AppState,
    studio_id: Uuid,
    package_id: Uuid,
    payload: CreateBookingRequest,
) -> AppResult<ApiResponse<BookingCreated>> {
    let (package, studio) = find_active_package(&state.orm, studio_id, package_id).await?;

    let start_time = normalize_time(&payload.start_time).ok_or_else(|| {
        AppError::validation("start_time", "Invalid start_time format. Use HH:MM or HH.MM")
    })?;

    let requested_addons = match payload.addons {
        Some(addons) => addons.normalize()?,
        None => Vec::new(),
    };

    let voucher_code = payload
        .voucher_code
        .as_deref()
        .map(|code| code.trim().to_uppercase())
        .filter(|code| !code.is_empty());

    let (payment_mode, payment_method) =
        resolve_payment_mode(payload.payment_mode.as_deref(), payload.payment_method.as_deref())?;
    let qris_only = payload.qris_only.unwrap_or(false);

    if payment_mode == "api" && !is_gateway_payment_method(&payment_method) {
        return Err(AppError::validation("payment_method", "Invalid payment method"));
    }
    if payment_mode == "api" && qris_only {
        return Err(AppError::validation(
            "qris_only",
            "qris_only can only be used with payment_mode=url",
        ));
    }

    // Payment initialization runs after the booking commits, so the gateway
    // config is checked here, before any rows are written.
    if !state.pakasir.is_configured() {
        return Err(AppError::validation(
            "payment",
            "Payment gateway configuration is incomplete",
        ));
    }

    // Recompute slots fresh; a stale client-side slot list must not win.
    let slot_list =
        slots::build_slots(&state.orm, &package, &studio, payload.booking_date, None).await?;
    let selected = slot_list
        .iter()
        .find(|slot| slot.start_time == start_time)
        .ok_or_else(|| {
            AppError::Conflict("Selected time is not available in this package schedule".into())
        })?;
    if !selected.is_available {
        return Err(AppError::Conflict("Selected time slot is full".into()));
    }
    let end_time = selected.end_time;

    let resolved = resolve_addons(&state.orm, package.id, &requested_addons).await?;
    let (lines, addons_total) = pricing::price_addons(&resolved);
    let subtotal_price = package.price + addons_total;

    let notes = encode_notes(payload.preferences, payload.notes)?;

    let txn = state.orm.begin().await?;

    let (voucher, discount_amount) = match voucher_code.as_deref() {
        Some(code) => {
            let (voucher, discount) = voucher_service::reserve(&txn, code, subtotal_price).await?;
            (Some(voucher), discount)
        }
        None => (None, 0),
    };
    let total_price = (subtotal_price - discount_amount).max(0);

    let customer = upsert_customer(&txn, &payload.customer).await?;
    let invoice_number = generate_invoice_number(&txn).await?;

    let booking = BookingActive {
        id: Set(Uuid::new_v4()),
        invoice_number: Set(invoice_number),
        customer_id: Set(customer.id),
        package_id: Set(package.id),
        voucher_id: Set(voucher.as_ref().map(|v| v.id)),
        booking_date: Set(payload.booking_date),
        start_time: Set(start_time),
        end_time: Set(end_time),
        subtotal_price: Set(subtotal_price),
        discount_amount: Set(discount_amount),
        total_price: Set(total_price),
        status: Set("pending".into()),
        payment_status: Set("unpaid".into()),
        payment_method: Set("pending".into()),
        payment_reference: Set(None),
        payment_expired_at: Set(Some((Utc::now() + Duration::minutes(30)).into())),
        notes: Set(notes),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&txn)
    .await?;

    for line in &lines {
        BookingAddonActive {
            id: Set(Uuid::new_v4()),
            booking_id: Set(booking.id),
            addon_id: Set(line.addon_id),
            qty: Set(line.qty),
            price: Set(line.price),
            subtotal: Set(line.subtotal),
            created_at: NotSet,
        }
        .insert(&txn)
        .await?;
    }

    txn.commit().await?;

    let payment = payment_service::initialize_payment(
        state,
        &booking,
        &payment_mode,
        &payment_method,
        payload.redirect_url.as_deref(),
        qris_only,
    )
    .await?;

    // Initialization mutates payment columns; reload before responding.
    let booking = Bookings::find_by_id(booking.id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let detail = load_detail(&state.orm, booking).await?;

    Ok(ApiResponse::success(
        "Booking created",
        BookingCreated {
            booking: detail,
            payment,
        },
        Some(Meta::empty()),
    ))
}

pub async fn show_by_invoice(
    state: &AppState,
    invoice_number: &str,
) -> AppResult<ApiResponse<BookingDetail>> {
    let booking = Bookings::find()
        .filter(BookingCol::InvoiceNumber.eq(invoice_number))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let detail = load_detail(&state.orm, booking).await?;
    Ok(ApiResponse::success("Booking detail", detail, Some(Meta::empty())))
}

pub async fn statuses(state: &AppState) -> AppResult<ApiResponse<BookingStatuses>> {
    let mut booking_statuses = Vec::with_capacity(models::BOOKING_STATUSES.len());
    for status in models::BOOKING_STATUSES {
        let total = Bookings::find()
            .filter(BookingCol::Status.eq(status))
            .count(&state.orm)
            .await? as i64;
        booking_statuses.push(StatusCount {
            status: status.into(),
            total,
        });
    }

    let mut payment_statuses = Vec::with_capacity(models::PAYMENT_STATUSES.len());
    for status in models::PAYMENT_STATUSES {
        let total = Bookings::find()
            .filter(BookingCol::PaymentStatus.eq(status))
            .count(&state.orm)
            .await? as i64;
        payment_statuses.push(StatusCount {
            status: status.into(),
            total,
        });
    }

    Ok(ApiResponse::success(
        "Booking statuses",
        BookingStatuses {
            booking_statuses,
            payment_statuses,
        },
        Some(Meta::empty()),
    ))
}

pub async fn admin_dashboard(
    state: &AppState,
    user: &AuthUser,
    query: DashboardQuery,
) -> AppResult<ApiResponse<DashboardSummary>> {
    ensure_admin(user)?;

    let now = Local::now();
    let month = query.month.unwrap_or_else(|| now.month());
    let year = query.year.unwrap_or_else(|| now.year());
    if !(1..=12).contains(&month) {
        return Err(AppError::validation("month", "month must be between 1 and 12"));
    }
    if !(2000..=2100).contains(&year) {
        return Err(AppError::validation("year", "year must be between 2000 and 2100"));
    }

    let today = now.date_naive();
    let month_start = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| AppError::validation("month", "Invalid month"))?;
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    let month_end = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .ok_or_else(|| AppError::validation("month", "Invalid month"))?
        - Duration::days(1);

    let total_booking_today = Bookings::find()
        .filter(BookingCol::BookingDate.eq(today))
        .count(&state.orm)
        .await? as i64;

    let total_booking_month = Bookings::find()
        .filter(BookingCol::BookingDate.gte(month_start))
        .filter(BookingCol::BookingDate.lte(month_end))
        .count(&state.orm)
        .await? as i64;

    let total_revenue_today = sum_paid_revenue(&state.orm, today, today).await?;
    let total_revenue_month = sum_paid_revenue(&state.orm, month_start, month_end).await?;

    Ok(ApiResponse::success(
        "Admin dashboard summary",
        DashboardSummary {
            total_booking_today,
            total_booking_month,
            total_revenue_today,
            total_revenue_month,
            month,
            year,
        },
        Some(Meta::empty()),
    ))
}

async fn sum_paid_revenue<C: ConnectionTrait>(
    conn: &C,
    from: NaiveDate,
    to: NaiveDate,
) -> AppResult<i64> {
    let totals: Vec<i64> = Bookings::find()
        .select_only()
        .column(BookingCol::TotalPrice)
        .filter(BookingCol::PaymentStatus.eq("paid"))
        .filter(BookingCol::BookingDate.gte(from))
        .filter(BookingCol::BookingDate.lte(to))
        .into_tuple()
        .all(conn)
        .await?;
    Ok(totals.into_iter().sum())
}

pub async fn admin_list(
    state: &AppState,
    user: &AuthUser,
    query: BookingListQuery,
) -> AppResult<ApiResponse<BookingList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination.normalize();

    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        if !is_booking_status(status) {
            return Err(AppError::validation("status", "Invalid booking status"));
        }
    }
    if let Some(payment_status) = query.payment_status.as_deref().filter(|s| !s.is_empty()) {
        if !is_payment_status(payment_status) {
            return Err(AppError::validation("payment_status", "Invalid payment status"));
        }
    }

    let mut condition = Condition::all();

    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(BookingCol::Status.eq(status.clone()));
    }
    if let Some(payment_status) = query.payment_status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(BookingCol::PaymentStatus.eq(payment_status.clone()));
    }
    if let Some(booking_date) = query.booking_date {
        condition = condition.add(BookingCol::BookingDate.eq(booking_date));
    }
    if let Some(date_from) = query.date_from {
        condition = condition.add(BookingCol::BookingDate.gte(date_from));
    }
    if let Some(date_to) = query.date_to {
        condition = condition.add(BookingCol::BookingDate.lte(date_to));
    }
    if let Some(studio_id) = query.studio_id {
        condition = condition.add(PackageCol::StudioId.eq(studio_id));
    }
    if let Some(package_id) = query.package_id {
        condition = condition.add(BookingCol::PackageId.eq(package_id));
    }
    if let Some(studio_name) = query.studio_name.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{studio_name}%");
        condition = condition
            .add(Expr::col((studios::Entity, studios::Column::Name)).ilike(pattern));
    }
    if let Some(package_name) = query.package_name.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{package_name}%");
        condition = condition
            .add(Expr::col((packages::Entity, packages::Column::Name)).ilike(pattern));
    }
    if let Some(customer_name) = query.customer_name.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{customer_name}%");
        condition = condition.add(Expr::col((Customers, CustomerCol::Name)).ilike(pattern));
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        condition = condition.add(
            Condition::any()
                .add(Expr::col((Bookings, BookingCol::InvoiceNumber)).ilike(pattern.clone()))
                .add(Expr::col((Customers, CustomerCol::Name)).ilike(pattern.clone()))
                .add(Expr::col((Customers, CustomerCol::Phone)).ilike(pattern.clone()))
                .add(Expr::col((Customers, CustomerCol::Email)).ilike(pattern.clone()))
                .add(Expr::col((packages::Entity, packages::Column::Name)).ilike(pattern.clone()))
                .add(Expr::col((studios::Entity, studios::Column::Name)).ilike(pattern)),
        );
    }

    let sort_col = match query.sort_by.unwrap_or(BookingSortBy::CreatedAt) {
        BookingSortBy::CreatedAt => BookingCol::CreatedAt,
        BookingSortBy::BookingDate => BookingCol::BookingDate,
        BookingSortBy::TotalPrice => BookingCol::TotalPrice,
        BookingSortBy::Status => BookingCol::Status,
        BookingSortBy::PaymentStatus => BookingCol::PaymentStatus,
    };
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Bookings::find()
        .join(JoinType::InnerJoin, bookings::Relation::Packages.def())
        .join(JoinType::InnerJoin, packages::Relation::Studios.def())
        .join(JoinType::InnerJoin, bookings::Relation::Customers.def())
        .filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let rows = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in rows {
        items.push(load_detail(&state.orm, row).await?);
    }

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Booking list",
        BookingList { items },
        Some(meta),
    ))
}

pub async fn admin_show(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<BookingDetail>> {
    ensure_admin(user)?;
    let booking = Bookings::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let detail = load_detail(&state.orm, booking).await?;
    Ok(ApiResponse::success("Booking detail", detail, Some(Meta::empty())))
}

pub async fn admin_update_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateBookingStatusRequest,
) -> AppResult<ApiResponse<BookingDetail>> {
    ensure_admin(user)?;

    let booking = Bookings::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if !is_booking_status(&payload.status) {
        return Err(AppError::validation("status", "Invalid booking status"));
    }
    if let Some(payment_status) = payload.payment_status.as_deref() {
        if !is_payment_status(payment_status) {
            return Err(AppError::validation("payment_status", "Invalid payment status"));
        }
    }

    let mut active: BookingActive = booking.into();
    active.status = Set(payload.status.clone());
    if let Some(payment_status) = payload.payment_status {
        active.payment_status = Set(payment_status);
    }
    if let Some(payment_method) = payload.payment_method {
        active.payment_method = Set(payment_method);
    }
    if let Some(payment_reference) = payload.payment_reference {
        active.payment_reference = Set(Some(payment_reference));
    }
    if let Some(notes) = payload.notes {
        active.notes = Set(Some(notes));
    }
    active.updated_at = Set(Utc::now().into());
    let booking = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "booking_status_update",
        Some("bookings"),
        Some(serde_json::json!({ "booking_id": booking.id, "status": booking.status })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let detail = load_detail(&state.orm, booking).await?;
    Ok(ApiResponse::success(
        "Booking status updated",
        detail,
        Some(Meta::empty()),
    ))
}

pub async fn admin_reschedule(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: RescheduleRequest,
) -> AppResult<ApiResponse<BookingDetail>> {
    ensure_admin(user)?;

    let booking = Bookings::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if is_terminal_status(&booking.status) {
        return Err(AppError::Conflict("This booking cannot be rescheduled".into()));
    }

    let start_time = normalize_time(&payload.start_time).ok_or_else(|| {
        AppError::validation("start_time", "Invalid start_time format. Use HH:MM or HH.MM")
    })?;

    let package = Packages::find_by_id(booking.package_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    let studio = Studios::find_by_id(package.studio_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    // The booking's current reservation must not block its own move.
    let slot_list = slots::build_slots(
        &state.orm,
        &package,
        &studio,
        payload.booking_date,
        Some(booking.id),
    )
    .await?;
    let selected = slot_list
        .iter()
        .find(|slot| slot.start_time == start_time)
        .ok_or_else(|| {
            AppError::Conflict("Selected time is not available in this package schedule".into())
        })?;
    if !selected.is_available {
        return Err(AppError::Conflict("Selected time slot is full".into()));
    }
    let end_time = selected.end_time;

    let mut active: BookingActive = booking.into();
    active.booking_date = Set(payload.booking_date);
    active.start_time = Set(start_time);
    active.end_time = Set(end_time);
    if let Some(notes) = payload.notes.filter(|n| !n.is_empty()) {
        active.notes = Set(Some(notes));
    }
    active.updated_at = Set(Utc::now().into());
    let booking = active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "booking_reschedule",
        Some("bookings"),
        Some(serde_json::json!({
            "booking_id": booking.id,
            "booking_date": booking.booking_date,
            "start_time": booking.start_time,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    let detail = load_detail(&state.orm, booking).await?;
    Ok(ApiResponse::success(
        "Booking rescheduled",
        detail,
        Some(Meta::empty()),
    ))
}

pub(crate) async fn find_active_package<C: ConnectionTrait>(
    conn: &C,
    studio_id: Uuid,
    package_id: Uuid,
) -> AppResult<(PackageModel, StudioModel)> {
    let package = Packages::find()
        .filter(PackageCol::StudioId.eq(studio_id))
        .filter(PackageCol::Id.eq(package_id))
        .filter(PackageCol::IsActive.eq(true))
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;

    let studio = Studios::find_by_id(package.studio_id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok((package, studio))
}

/// Accepts `HH:MM` or `HH.MM` (both zero-padded) and nothing else.
pub fn normalize_time(value: &str) -> Option<NaiveTime> {
    let normalized = value.trim().replace('.', ":");
    let bytes = normalized.as_bytes();
    if bytes.len() != 5 || bytes[2] != b':' {
        return None;
    }
    if ![0, 1, 3, 4].iter().all(|&i| bytes[i].is_ascii_digit()) {
        return None;
    }
    NaiveTime::parse_from_str(&normalized, "%H:%M").ok()
}

fn resolve_payment_mode(
    raw_mode: Option<&str>,
    raw_method: Option<&str>,
) -> AppResult<(String, String)> {
    if let Some(mode) = raw_mode {
        if mode != "url" && mode != "api" {
            return Err(AppError::validation(
                "payment_mode",
                "payment_mode must be url or api",
            ));
        }
    }

    let method = raw_method.map(|m| m.trim().to_lowercase()).filter(|m| !m.is_empty());

    // Without an explicit mode, a known gateway method implies api mode.
    let mode = match raw_mode {
        Some(mode) => mode.to_string(),
        None => match method.as_deref() {
            Some(m) if is_gateway_payment_method(m) => "api".to_string(),
            _ => "url".to_string(),
        },
    };

    let default_method = if mode == "api" { "qris" } else { "url" };
    let method = method.unwrap_or_else(|| default_method.to_string());

    Ok((mode, method))
}

async fn resolve_addons<C: ConnectionTrait>(
    conn: &C,
    package_id: Uuid,
    requested: &[(Uuid, i32)],
) -> AppResult<Vec<(AddonModel, i32)>> {
    if requested.is_empty() {
        return Ok(Vec::new());
    }

    let mut distinct: Vec<Uuid> = requested.iter().map(|(id, _)| *id).collect();
    distinct.sort();
    distinct.dedup();

    let found = Addons::find()
        .filter(AddonCol::PackageId.eq(package_id))
        .filter(AddonCol::IsActive.eq(true))
        .filter(AddonCol::Id.is_in(distinct.clone()))
        .all(conn)
        .await?;

    if found.len() != distinct.len() {
        return Err(AppError::validation(
            "addons",
            "One or more addons are invalid for this package",
        ));
    }

    let by_id: HashMap<Uuid, AddonModel> =
        found.into_iter().map(|addon| (addon.id, addon)).collect();

    requested
        .iter()
        .map(|(id, qty)| {
            by_id
                .get(id)
                .cloned()
                .map(|addon| (addon, *qty))
                .ok_or_else(|| {
                    AppError::validation("addons", "One or more addons are invalid for this package")
                })
        })
        .collect()
}

fn encode_notes(
    preferences: Option<Preferences>,
    notes: Option<String>,
) -> AppResult<Option<String>> {
    let mut map = serde_json::Map::new();
    if let Some(preferences) = preferences {
        map.insert(
            "preferences".into(),
            serde_json::to_value(preferences).map_err(anyhow::Error::from)?,
        );
    }
    if let Some(notes) = notes.filter(|n| !n.is_empty()) {
        map.insert("notes".into(), serde_json::Value::String(notes));
    }

    if map.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::Value::Object(map).to_string()))
    }
}

async fn upsert_customer(
    txn: &DatabaseTransaction,
    input: &CustomerInput,
) -> AppResult<CustomerModel> {
    let existing = Customers::find()
        .filter(CustomerCol::Phone.eq(input.phone.clone()))
        .one(txn)
        .await?;

    match existing {
        Some(customer) => {
            let mut active: CustomerActive = customer.into();
            active.name = Set(input.name.clone());
            active.email = Set(input.email.clone());
            active.updated_at = Set(Utc::now().into());
            Ok(active.update(txn).await?)
        }
        None => Ok(CustomerActive {
            id: Set(Uuid::new_v4()),
            name: Set(input.name.clone()),
            phone: Set(input.phone.clone()),
            email: Set(input.email.clone()),
            created_at: NotSet,
            updated_at: NotSet,
        }
        .insert(txn)
        .await?),
    }
}

async fn generate_invoice_number(txn: &DatabaseTransaction) -> AppResult<String> {
    loop {
        let suffix = Uuid::new_v4().simple().to_string()[..6].to_uppercase();
        let candidate = format!("INV-{}-{}", Local::now().format("%Y%m%d"), suffix);
        let taken = Bookings::find()
            .filter(BookingCol::InvoiceNumber.eq(candidate.clone()))
            .count(txn)
            .await?
            > 0;
        if !taken {
            return Ok(candidate);
        }
    }
}

/// Load a booking with everything a detail response carries.
pub(crate) async fn load_detail<C: ConnectionTrait>(
    conn: &C,
    booking: BookingModel,
) -> AppResult<BookingDetail> {
    let customer = Customers::find_by_id(booking.customer_id).one(conn).await?;
    let package = Packages::find_by_id(booking.package_id).one(conn).await?;
    let studio = match &package {
        Some(package) => Studios::find_by_id(package.studio_id).one(conn).await?,
        None => None,
    };
    let voucher = match booking.voucher_id {
        Some(voucher_id) => Vouchers::find_by_id(voucher_id).one(conn).await?,
        None => None,
    };
    let payment = Payments::find()
        .filter(PaymentCol::BookingId.eq(booking.id))
        .one(conn)
        .await?;

    let addon_rows = BookingAddons::find()
        .filter(BookingAddonCol::BookingId.eq(booking.id))
        .find_also_related(Addons)
        .all(conn)
        .await?;

    let addons = addon_rows
        .into_iter()
        .map(|(row, addon)| BookingAddon {
            id: row.id,
            booking_id: row.booking_id,
            addon_id: row.addon_id,
            name: addon.map(|a| a.name),
            qty: row.qty,
            price: row.price,
            subtotal: row.subtotal,
        })
        .collect();

    Ok(BookingDetail {
        booking: booking_from_entity(booking),
        customer: customer.map(customer_from_entity),
        package: package.map(package_from_entity),
        studio: studio.map(studio_from_entity),
        addons,
        voucher: voucher.map(voucher_service::voucher_from_entity),
        payment: payment.map(payment_service::payment_from_entity),
    })
}

pub(crate) fn booking_from_entity(model: BookingModel) -> Booking {
    Booking {
        id: model.id,
        invoice_number: model.invoice_number,
        customer_id: model.customer_id,
        package_id: model.package_id,
        voucher_id: model.voucher_id,
        booking_date: model.booking_date,
        start_time: model.start_time,
        end_time: model.end_time,
        subtotal_price: model.subtotal_price,
        discount_amount: model.discount_amount,
        total_price: model.total_price,
        status: model.status,
        payment_status: model.payment_status,
        payment_method: model.payment_method,
        payment_reference: model.payment_reference,
        payment_expired_at: model.payment_expired_at.map(|dt| dt.with_timezone(&Utc)),
        notes: model.notes,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn customer_from_entity(model: CustomerModel) -> Customer {
    Customer {
        id: model.id,
        name: model.name,
        phone: model.phone,
        email: model.email,
    }
}

fn package_from_entity(model: PackageModel) -> Package {
    Package {
        id: model.id,
        studio_id: model.studio_id,
        name: model.name,
        category: model.category,
        price: model.price,
        duration_minutes: model.duration_minutes,
        max_booking_per_slot: model.max_booking_per_slot,
        max_person: model.max_person,
        description: model.description,
        is_active: model.is_active,
    }
}

fn studio_from_entity(model: StudioModel) -> Studio {
    Studio {
        id: model.id,
        name: model.name,
        address: model.address,
        city: model.city,
        open_time: model.open_time,
        close_time: model.close_time,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_accepts_colon_and_dot_separators() {
        let expected = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
        assert_eq!(normalize_time("09:30"), Some(expected));
        assert_eq!(normalize_time("09.30"), Some(expected));
        assert_eq!(normalize_time(" 09:30 "), Some(expected));
    }

    #[test]
    fn time_rejects_malformed_values() {
        assert_eq!(normalize_time("9:30"), None);
        assert_eq!(normalize_time("0930"), None);
        assert_eq!(normalize_time("25:00"), None);
        assert_eq!(normalize_time("09:61"), None);
        assert_eq!(normalize_time("morning"), None);
        assert_eq!(normalize_time(""), None);
    }

    #[test]
    fn explicit_mode_wins_over_method_inference() {
        let (mode, method) = resolve_payment_mode(Some("url"), Some("qris")).unwrap();
        assert_eq!(mode, "url");
        assert_eq!(method, "qris");
    }

    #[test]
    fn gateway_method_implies_api_mode() {
        let (mode, method) = resolve_payment_mode(None, Some("bni_va")).unwrap();
        assert_eq!(mode, "api");
        assert_eq!(method, "bni_va");
    }

    #[test]
    fn defaults_are_url_mode() {
        let (mode, method) = resolve_payment_mode(None, None).unwrap();
        assert_eq!(mode, "url");
        assert_eq!(method, "url");

        let (mode, method) = resolve_payment_mode(Some("api"), None).unwrap();
        assert_eq!(mode, "api");
        assert_eq!(method, "qris");
    }

    #[test]
    fn unknown_mode_rejected() {
        assert!(resolve_payment_mode(Some("cash"), None).is_err());
    }

    #[test]
    fn notes_payload_skips_empty_parts() {
        assert_eq!(encode_notes(None, None).unwrap(), None);

        let encoded = encode_notes(None, Some("bring a tripod".into()))
            .unwrap()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value["notes"], "bring a tripod");
        assert!(value.get("preferences").is_none());
    }
}
