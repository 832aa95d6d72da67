use chrono::{DateTime, Duration, NaiveTime, Utc};
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::Expr;
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Select, SelectTwo, Set,
    TransactionTrait,
};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::payments::{
        LocalBookingSnapshot, PaymentHistoryList, PaymentInit, PaymentWithBooking, PollResult,
        TransactionDetailData, TransactionDetailQuery, WebhookAck, WebhookPayload,
    },
    entity::{
        bookings::{
            self, ActiveModel as BookingActive, Column as BookingCol, Entity as Bookings,
            Model as BookingModel,
        },
        customers::{self, Column as CustomerCol},
        payments::{
            self, ActiveModel as PaymentActive, Column as PaymentCol, Entity as Payments,
            Model as PaymentModel,
        },
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Payment,
    pakasir::{GatewayTransaction, map_gateway_status},
    response::{ApiResponse, Meta},
    routes::params::PaymentHistoryQuery,
    services::booking_service,
    state::AppState,
};

/// Kick off payment for a freshly created booking. Runs after the booking
/// transaction commits; the booking exists even if the gateway is down.
pub async fn initialize_payment(
    state: &AppState,
    booking: &BookingModel,
    mode: &str,
    method: &str,
    redirect_url: Option<&str>,
    qris_only: bool,
) -> AppResult<PaymentInit> {
    if !state.pakasir.is_configured() {
        return Err(AppError::validation(
            "payment",
            "Payment gateway configuration is incomplete",
        ));
    }

    let amount = booking.total_price.max(0);
    let invoice = booking.invoice_number.clone();

    if amount == 0 {
        update_booking_payment(
            &state.orm,
            booking.clone(),
            "paid",
            "free",
            Some(invoice.clone()),
            Some(None),
        )
        .await?;
        upsert_payment(
            &state.orm,
            booking.id,
            PaymentWrite {
                method: "free".into(),
                amount: 0,
                transaction_id: invoice.clone(),
                payment_status: "completed".into(),
                paid_at: Some(Utc::now()),
                raw: json!({ "message": "No payment required" }),
            },
        )
        .await?;

        return Ok(PaymentInit {
            provider: "pakasir".into(),
            mode: "free".into(),
            order_id: invoice,
            amount: 0,
            fee: None,
            total_payment: None,
            payment_method: "free".into(),
            payment_number: None,
            payment_url: None,
            expired_at: None,
            warning: None,
        });
    }

    let hosted_url = state
        .pakasir
        .payment_url(&invoice, amount, redirect_url, qris_only, method);

    if mode == "url" {
        update_booking_payment(
            &state.orm,
            booking.clone(),
            "unpaid",
            method,
            None,
            None,
        )
        .await?;
        upsert_payment(
            &state.orm,
            booking.id,
            PaymentWrite {
                method: method.into(),
                amount,
                transaction_id: invoice.clone(),
                payment_status: "pending".into(),
                paid_at: None,
                raw: json!({ "payment_url": hosted_url }),
            },
        )
        .await?;

        return Ok(PaymentInit {
            provider: "pakasir".into(),
            mode: "url".into(),
            order_id: invoice,
            amount,
            fee: None,
            total_payment: None,
            payment_method: method.into(),
            payment_number: None,
            payment_url: Some(hosted_url),
            expired_at: booking.payment_expired_at.map(|dt| dt.with_timezone(&Utc)),
            warning: None,
        });
    }

    match state.pakasir.create_transaction(method, &invoice, amount).await {
        Ok(resp) => {
            let expired_at = parse_gateway_time(resp.payment.expired_at.as_deref())
                .unwrap_or_else(|| Utc::now() + Duration::minutes(30));

            update_booking_payment(
                &state.orm,
                booking.clone(),
                "unpaid",
                method,
                Some(invoice.clone()),
                Some(Some(expired_at)),
            )
            .await?;

            let charged = resp
                .payment
                .total_payment
                .map(|total| total.round() as i64)
                .unwrap_or(amount);
            upsert_payment(
                &state.orm,
                booking.id,
                PaymentWrite {
                    method: method.into(),
                    amount: charged,
                    transaction_id: invoice.clone(),
                    payment_status: "pending".into(),
                    paid_at: None,
                    raw: resp.raw.clone(),
                },
            )
            .await?;

            Ok(PaymentInit {
                provider: "pakasir".into(),
                mode: "api".into(),
                order_id: invoice,
                amount,
                fee: resp.payment.fee,
                total_payment: resp.payment.total_payment,
                payment_method: method.into(),
                payment_number: resp.payment.payment_number,
                payment_url: Some(hosted_url),
                expired_at: Some(expired_at),
                warning: None,
            })
        }
        Err(err) => {
            tracing::warn!(error = %err, invoice = %invoice, "transaction create failed, falling back to hosted URL");

            update_booking_payment(
                &state.orm,
                booking.clone(),
                "unpaid",
                method,
                None,
                None,
            )
            .await?;
            upsert_payment(
                &state.orm,
                booking.id,
                PaymentWrite {
                    method: method.into(),
                    amount,
                    transaction_id: invoice.clone(),
                    payment_status: "pending".into(),
                    paid_at: None,
                    raw: json!({
                        "fallback": true,
                        "error": err.to_string(),
                        "payment_url": hosted_url,
                    }),
                },
            )
            .await?;

            Ok(PaymentInit {
                provider: "pakasir".into(),
                mode: "url_fallback".into(),
                order_id: invoice,
                amount,
                fee: None,
                total_payment: None,
                payment_method: method.into(),
                payment_number: None,
                payment_url: Some(hosted_url),
                expired_at: booking.payment_expired_at.map(|dt| dt.with_timezone(&Utc)),
                warning: Some("Pakasir API unavailable, using payment URL fallback".into()),
            })
        }
    }
}

/// Poll the gateway for a booking's payment state and reconcile local rows.
pub async fn poll(state: &AppState, invoice_number: &str) -> AppResult<ApiResponse<PollResult>> {
    let booking = Bookings::find()
        .filter(BookingCol::InvoiceNumber.eq(invoice_number))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let detail = state
        .pakasir
        .transaction_detail(&booking.invoice_number, booking.total_price)
        .await?;
    let tx = &detail.transaction;

    let amount_matches = tx
        .amount
        .map(|amount| amount.round() as i64 == booking.total_price)
        .unwrap_or(false);
    let identity_matches = tx.project.as_deref() == Some(state.pakasir.project_slug())
        && tx.order_id.as_deref() == Some(booking.invoice_number.as_str());

    if !amount_matches || !identity_matches {
        tracing::warn!(invoice = %booking.invoice_number, "transaction detail mismatch during polling");
        if let Err(err) = log_audit(
            &state.pool,
            None,
            "payment_integrity_mismatch",
            Some("payments"),
            Some(json!({
                "invoice_number": booking.invoice_number,
                "source": "polling",
                "transaction_detail": detail.raw,
            })),
        )
        .await
        {
            tracing::warn!(error = %err, "audit log failed");
        }
        return Err(AppError::Integrity("Transaction detail mismatch".into()));
    }

    let remote_status = tx.status.clone().unwrap_or_default();
    let payment_status = map_gateway_status(&remote_status);
    let payment_method = tx
        .payment_method
        .clone()
        .unwrap_or_else(|| booking.payment_method.clone());
    let paid_at = if remote_status == "completed" {
        Some(parse_gateway_time(tx.completed_at.as_deref()).unwrap_or_else(Utc::now))
    } else {
        None
    };

    let txn = state.orm.begin().await?;

    let mut active: BookingActive = booking.clone().into();
    active.payment_status = Set(payment_status.into());
    active.payment_method = Set(payment_method.clone());
    active.payment_reference = Set(Some(booking.invoice_number.clone()));
    if remote_status == "completed" {
        active.payment_expired_at = Set(None);
        if booking.status == "pending" {
            active.status = Set("confirmed".into());
        }
    }
    active.updated_at = Set(Utc::now().into());
    let booking = active.update(&txn).await?;

    let record = upsert_payment(
        &txn,
        booking.id,
        PaymentWrite {
            method: payment_method.clone(),
            amount: booking.total_price,
            transaction_id: booking.invoice_number.clone(),
            payment_status: if remote_status.is_empty() {
                "pending".into()
            } else {
                remote_status
            },
            paid_at,
            raw: json!({ "source": "polling", "transaction_detail": detail.raw }),
        },
    )
    .await?;

    txn.commit().await?;

    Ok(ApiResponse::success(
        "Payment status",
        PollResult {
            invoice_number: booking.invoice_number.clone(),
            booking_status: booking.status.clone(),
            payment_status: booking.payment_status.clone(),
            payment_method: booking.payment_method.clone(),
            payment_reference: booking.payment_reference.clone(),
            transaction: detail.transaction,
            payment_record: Some(payment_from_entity(record)),
        },
        Some(Meta::empty()),
    ))
}

/// Gateway webhook. A `completed` notification is never trusted on its own;
/// the transaction is re-verified against the detail endpoint before the
/// booking is marked paid.
pub async fn webhook(
    state: &AppState,
    payload: WebhookPayload,
) -> AppResult<ApiResponse<WebhookAck>> {
    if payload.project != state.pakasir.project_slug() {
        reject_webhook(state, &payload, "Invalid project").await?;
        return Err(AppError::Integrity("Invalid project".into()));
    }

    let booking = Bookings::find()
        .filter(BookingCol::InvoiceNumber.eq(payload.order_id.clone()))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if payload.amount.round() as i64 != booking.total_price {
        reject_webhook(state, &payload, "Amount does not match booking total").await?;
        return Err(AppError::Integrity("Amount does not match booking total".into()));
    }

    let status = payload.status.trim().to_lowercase();
    if status != "completed" {
        upsert_payment(
            &state.orm,
            booking.id,
            PaymentWrite {
                method: payload
                    .payment_method
                    .clone()
                    .unwrap_or_else(|| booking.payment_method.clone()),
                amount: booking.total_price,
                transaction_id: booking.invoice_number.clone(),
                payment_status: status,
                paid_at: None,
                raw: json!({ "webhook": payload }),
            },
        )
        .await?;

        return Ok(ApiResponse::success(
            "Webhook received, waiting for completed status",
            WebhookAck {
                invoice_number: booking.invoice_number,
                booking_status: booking.status,
                payment_status: booking.payment_status,
            },
            Some(Meta::empty()),
        ));
    }

    let detail = state
        .pakasir
        .transaction_detail(&booking.invoice_number, booking.total_price)
        .await?;
    let tx = &detail.transaction;

    if !verify_completed(
        tx,
        state.pakasir.project_slug(),
        &booking.invoice_number,
        booking.total_price,
    ) {
        reject_webhook(state, &payload, "Transaction detail verification failed").await?;
        return Err(AppError::Integrity(
            "Transaction detail verification failed".into(),
        ));
    }

    let paid_at = parse_gateway_time(payload.completed_at.as_deref())
        .or_else(|| parse_gateway_time(tx.completed_at.as_deref()))
        .unwrap_or_else(Utc::now);
    let payment_method = payload
        .payment_method
        .clone()
        .or_else(|| tx.payment_method.clone())
        .unwrap_or_else(|| booking.payment_method.clone());

    let txn = state.orm.begin().await?;

    let mut active: BookingActive = booking.clone().into();
    active.payment_status = Set("paid".into());
    active.payment_method = Set(payment_method.clone());
    active.payment_reference = Set(Some(booking.invoice_number.clone()));
    active.payment_expired_at = Set(None);
    if booking.status == "pending" {
        active.status = Set("confirmed".into());
    }
    active.updated_at = Set(Utc::now().into());
    let booking = active.update(&txn).await?;

    upsert_payment(
        &txn,
        booking.id,
        PaymentWrite {
            method: payment_method,
            amount: booking.total_price,
            transaction_id: booking.invoice_number.clone(),
            payment_status: "completed".into(),
            paid_at: Some(paid_at),
            raw: json!({ "webhook": payload, "transaction_detail": detail.raw }),
        },
    )
    .await?;

    txn.commit().await?;

    Ok(ApiResponse::success(
        "Payment confirmed and booking updated",
        WebhookAck {
            invoice_number: booking.invoice_number,
            booking_status: booking.status,
            payment_status: booking.payment_status,
        },
        Some(Meta::empty()),
    ))
}

/// Admin passthrough to the gateway's transaction-detail endpoint, with the
/// matching local booking attached when one exists.
pub async fn transaction_detail(
    state: &AppState,
    user: &AuthUser,
    query: TransactionDetailQuery,
) -> AppResult<ApiResponse<TransactionDetailData>> {
    ensure_admin(user)?;

    let booking = Bookings::find()
        .filter(BookingCol::InvoiceNumber.eq(query.order_id.clone()))
        .one(&state.orm)
        .await?;

    let amount = match (query.amount, &booking) {
        (Some(amount), _) => amount,
        (None, Some(booking)) => booking.total_price,
        (None, None) => {
            return Err(AppError::validation(
                "amount",
                "Amount is required when order_id is not found in local booking",
            ));
        }
    };

    let detail = state.pakasir.transaction_detail(&query.order_id, amount).await?;

    let local_booking = match booking {
        Some(booking) => {
            let payment = Payments::find()
                .filter(PaymentCol::BookingId.eq(booking.id))
                .one(&state.orm)
                .await?;
            Some(LocalBookingSnapshot {
                id: booking.id,
                invoice_number: booking.invoice_number,
                status: booking.status,
                payment_status: booking.payment_status,
                payment_method: booking.payment_method,
                payment_reference: booking.payment_reference,
                total_price: booking.total_price,
                payment_record: payment.map(payment_from_entity),
            })
        }
        None => None,
    };

    Ok(ApiResponse::success(
        "Transaction detail",
        TransactionDetailData {
            transaction: detail.transaction,
            local_booking,
        },
        Some(Meta::empty()),
    ))
}

pub async fn history(
    state: &AppState,
    user: &AuthUser,
    query: PaymentHistoryQuery,
) -> AppResult<ApiResponse<PaymentHistoryList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if let Some(payment_status) = query.payment_status.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(PaymentCol::PaymentStatus.eq(payment_status.clone()));
    }
    if let Some(method) = query.method.as_ref().filter(|s| !s.is_empty()) {
        condition = condition.add(PaymentCol::Method.eq(method.clone()));
    }
    if let Some(date_from) = query.date_from {
        let from = date_from.and_time(NaiveTime::MIN).and_utc();
        condition = condition.add(PaymentCol::CreatedAt.gte(from));
    }
    if let Some(date_to) = query.date_to {
        let to = (date_to + Duration::days(1))
            .and_time(NaiveTime::MIN)
            .and_utc();
        condition = condition.add(PaymentCol::CreatedAt.lt(to));
    }
    if let Some(search) = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        condition = condition.add(
            Condition::any()
                .add(Expr::col((Payments, PaymentCol::TransactionId)).ilike(pattern.clone()))
                .add(Expr::col((Payments, PaymentCol::Method)).ilike(pattern.clone()))
                .add(Expr::col((Bookings, BookingCol::InvoiceNumber)).ilike(pattern.clone()))
                .add(Expr::col((customers::Entity, CustomerCol::Name)).ilike(pattern.clone()))
                .add(Expr::col((customers::Entity, CustomerCol::Phone)).ilike(pattern.clone()))
                .add(Expr::col((customers::Entity, CustomerCol::Email)).ilike(pattern)),
        );
    }

    let total = history_count_query(condition.clone())
        .count(&state.orm)
        .await? as i64;

    let rows = history_rows_query(condition)
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let items = rows
        .into_iter()
        .map(|(payment, booking)| PaymentWithBooking {
            payment: payment_from_entity(payment),
            booking: booking.map(booking_service::booking_from_entity),
        })
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Payment history",
        PaymentHistoryList { items },
        Some(meta),
    ))
}

async fn reject_webhook(
    state: &AppState,
    payload: &WebhookPayload,
    reason: &str,
) -> AppResult<()> {
    tracing::warn!(order_id = %payload.order_id, reason, "webhook rejected");
    if let Err(err) = log_audit(
        &state.pool,
        None,
        "payment_integrity_mismatch",
        Some("payments"),
        Some(json!({ "source": "webhook", "reason": reason, "payload": payload })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }
    Ok(())
}

/// `expired_at` update is three-valued: leave alone, clear, or set.
async fn update_booking_payment<C: ConnectionTrait>(
    conn: &C,
    booking: BookingModel,
    payment_status: &str,
    payment_method: &str,
    payment_reference: Option<String>,
    payment_expired_at: Option<Option<DateTime<Utc>>>,
) -> AppResult<BookingModel> {
    let mut active: BookingActive = booking.into();
    active.payment_status = Set(payment_status.into());
    active.payment_method = Set(payment_method.into());
    if let Some(reference) = payment_reference {
        active.payment_reference = Set(Some(reference));
    }
    if let Some(expired_at) = payment_expired_at {
        active.payment_expired_at = Set(expired_at.map(Into::into));
    }
    active.updated_at = Set(Utc::now().into());
    Ok(active.update(conn).await?)
}

struct PaymentWrite {
    method: String,
    amount: i64,
    transaction_id: String,
    payment_status: String,
    paid_at: Option<DateTime<Utc>>,
    raw: Value,
}

/// One payment row per booking; reconciliation overwrites it in place.
async fn upsert_payment<C: ConnectionTrait>(
    conn: &C,
    booking_id: Uuid,
    write: PaymentWrite,
) -> AppResult<PaymentModel> {
    let existing = Payments::find()
        .filter(PaymentCol::BookingId.eq(booking_id))
        .one(conn)
        .await?;

    match existing {
        Some(payment) => {
            let mut active: PaymentActive = payment.into();
            active.method = Set(write.method);
            active.amount = Set(write.amount);
            active.transaction_id = Set(write.transaction_id);
            active.payment_status = Set(write.payment_status);
            active.paid_at = Set(write.paid_at.map(Into::into));
            active.raw_response = Set(Some(write.raw));
            active.updated_at = Set(Utc::now().into());
            Ok(active.update(conn).await?)
        }
        None => Ok(PaymentActive {
            id: Set(Uuid::new_v4()),
            booking_id: Set(booking_id),
            method: Set(write.method),
            amount: Set(write.amount),
            transaction_id: Set(write.transaction_id),
            payment_status: Set(write.payment_status),
            paid_at: Set(write.paid_at.map(Into::into)),
            raw_response: Set(Some(write.raw)),
            created_at: NotSet,
            updated_at: NotSet,
        }
        .insert(conn)
        .await?),
    }
}

/// A completed webhook is only honored when the detail endpoint agrees on
/// status, project, order id and amount.
fn verify_completed(
    tx: &GatewayTransaction,
    project: &str,
    invoice_number: &str,
    total_price: i64,
) -> bool {
    tx.status.as_deref() == Some("completed")
        && tx.project.as_deref() == Some(project)
        && tx.order_id.as_deref() == Some(invoice_number)
        && tx
            .amount
            .map(|amount| amount.round() as i64 == total_price)
            .unwrap_or(false)
}

/// The row query gets its single `bookings` join from `find_also_related`,
/// with the customers join hanging off it. The count query has no related
/// fetch and joins `bookings` itself.
fn history_count_query(condition: Condition) -> Select<Payments> {
    Payments::find()
        .join(JoinType::InnerJoin, payments::Relation::Bookings.def())
        .join(JoinType::InnerJoin, bookings::Relation::Customers.def())
        .filter(condition)
}

fn history_rows_query(condition: Condition) -> SelectTwo<Payments, Bookings> {
    Payments::find()
        .find_also_related(Bookings)
        .join(JoinType::InnerJoin, bookings::Relation::Customers.def())
        .filter(condition)
        .order_by_desc(PaymentCol::CreatedAt)
}

fn parse_gateway_time(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

pub(crate) fn payment_from_entity(model: PaymentModel) -> Payment {
    Payment {
        id: model.id,
        booking_id: model.booking_id,
        method: model.method,
        amount: model.amount,
        transaction_id: model.transaction_id,
        payment_status: model.payment_status,
        paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
        raw_response: model.raw_response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DbBackend, QueryTrait};

    fn detail(status: &str, amount: f64) -> GatewayTransaction {
        GatewayTransaction {
            project: Some("studio".into()),
            order_id: Some("INV-1".into()),
            amount: Some(amount),
            status: Some(status.into()),
            payment_method: Some("qris".into()),
            completed_at: None,
        }
    }

    #[test]
    fn completed_verification_requires_full_agreement() {
        assert!(verify_completed(&detail("completed", 120_000.0), "studio", "INV-1", 120_000));

        // Gateway still reporting pending must not confirm the booking.
        assert!(!verify_completed(&detail("pending", 120_000.0), "studio", "INV-1", 120_000));
        assert!(!verify_completed(&detail("completed", 50_000.0), "studio", "INV-1", 120_000));
        assert!(!verify_completed(&detail("completed", 120_000.0), "other", "INV-1", 120_000));
        assert!(!verify_completed(&detail("completed", 120_000.0), "studio", "INV-2", 120_000));
        assert!(!verify_completed(&GatewayTransaction::default(), "studio", "INV-1", 120_000));
    }

    #[test]
    fn history_queries_join_bookings_exactly_once() {
        let sql = history_rows_query(Condition::all())
            .build(DbBackend::Postgres)
            .to_string();
        assert_eq!(sql.matches("JOIN \"bookings\"").count(), 1, "{sql}");
        assert_eq!(sql.matches("JOIN \"customers\"").count(), 1, "{sql}");

        let count_sql = history_count_query(Condition::all())
            .build(DbBackend::Postgres)
            .to_string();
        assert_eq!(count_sql.matches("JOIN \"bookings\"").count(), 1, "{count_sql}");
    }

    #[test]
    fn gateway_timestamps_parse_rfc3339_only() {
        let parsed = parse_gateway_time(Some("2026-03-01T10:30:00+07:00")).unwrap();
        assert_eq!(parsed.to_rfc3339(), "2026-03-01T03:30:00+00:00");

        assert!(parse_gateway_time(Some("2026-03-01 10:30")).is_none());
        assert!(parse_gateway_time(None).is_none());
    }
}
