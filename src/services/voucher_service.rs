use chrono::Utc;
use sea_orm::sea_query::{Expr, Func, LockType};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseTransaction, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::vouchers::{CreateVoucherRequest, VoucherList},
    entity::vouchers::{
        self, ActiveModel as VoucherActive, Column as VoucherCol, Entity as Vouchers,
        Model as VoucherModel,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Voucher,
    response::{ApiResponse, Meta},
    services::pricing,
    state::AppState,
};

/// Validate and redeem a voucher inside the caller's booking transaction.
///
/// The row is locked for the rest of the transaction, so two concurrent
/// redemptions of the same code serialize here: validity is checked first,
/// then the quota against the locked `used_count`, and only then is the
/// count incremented. An aborted booking transaction rolls the increment
/// back with everything else.
pub async fn reserve(
    txn: &DatabaseTransaction,
    code: &str,
    subtotal: i64,
) -> AppResult<(VoucherModel, i64)> {
    let normalized = code.trim().to_uppercase();

    // UPPER() equality keeps `%` and `_` in codes literal.
    let voucher = Vouchers::find()
        .filter(Expr::expr(Func::upper(Expr::col(VoucherCol::Code))).eq(normalized))
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::validation("voucher_code", "Voucher not found"))?;

    let discount = pricing::voucher_discount(&voucher, subtotal, Utc::now())?;

    if let Some(usage_limit) = voucher.usage_limit {
        if voucher.used_count >= usage_limit {
            return Err(AppError::validation(
                "voucher_code",
                "Voucher quota has been reached",
            ));
        }
    }

    let used_count = voucher.used_count + 1;
    let mut active: VoucherActive = voucher.into();
    active.used_count = Set(used_count);
    active.updated_at = Set(Utc::now().into());
    let voucher = active.update(txn).await?;

    Ok((voucher, discount))
}

/// Vouchers currently redeemable: active flag set and inside the validity
/// window. Quota exhaustion is not filtered here; redemption reports it.
pub async fn list_active(state: &AppState) -> AppResult<ApiResponse<VoucherList>> {
    let now = Utc::now();
    let vouchers = Vouchers::find()
        .filter(VoucherCol::IsActive.eq(true))
        .filter(
            Condition::any()
                .add(VoucherCol::StartsAt.is_null())
                .add(VoucherCol::StartsAt.lte(now)),
        )
        .filter(
            Condition::any()
                .add(VoucherCol::EndsAt.is_null())
                .add(VoucherCol::EndsAt.gte(now)),
        )
        .order_by_asc(VoucherCol::Code)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(voucher_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Active vouchers",
        VoucherList { items: vouchers },
        Some(Meta::empty()),
    ))
}

pub async fn create_voucher(
    state: &AppState,
    user: &AuthUser,
    payload: CreateVoucherRequest,
) -> AppResult<ApiResponse<Voucher>> {
    ensure_admin(user)?;

    if payload.discount_type != vouchers::TYPE_FIXED
        && payload.discount_type != vouchers::TYPE_PERCENT
    {
        return Err(AppError::validation(
            "discount_type",
            "discount_type must be fixed or percent",
        ));
    }

    if payload.discount_value < 0 {
        return Err(AppError::validation(
            "discount_value",
            "discount_value must be >= 0",
        ));
    }

    let code = payload.code.trim().to_uppercase();
    if code.is_empty() {
        return Err(AppError::validation("code", "code is required"));
    }

    let existing = Vouchers::find()
        .filter(Expr::expr(Func::upper(Expr::col(VoucherCol::Code))).eq(code.clone()))
        .one(&state.orm)
        .await?;
    if existing.is_some() {
        return Err(AppError::validation("code", "Voucher code already exists"));
    }

    let voucher = VoucherActive {
        id: Set(Uuid::new_v4()),
        code: Set(code),
        name: Set(payload.name),
        description: Set(payload.description),
        discount_type: Set(payload.discount_type),
        discount_value: Set(payload.discount_value),
        max_discount: Set(payload.max_discount),
        min_total: Set(payload.min_total),
        usage_limit: Set(payload.usage_limit),
        used_count: Set(0),
        starts_at: Set(payload.starts_at.map(Into::into)),
        ends_at: Set(payload.ends_at.map(Into::into)),
        is_active: Set(payload.is_active.unwrap_or(true)),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "voucher_create",
        Some("vouchers"),
        Some(serde_json::json!({ "voucher_id": voucher.id, "code": voucher.code })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Voucher created",
        voucher_from_entity(voucher),
        Some(Meta::empty()),
    ))
}

pub(crate) fn voucher_from_entity(model: VoucherModel) -> Voucher {
    Voucher {
        id: model.id,
        code: model.code,
        name: model.name,
        description: model.description,
        discount_type: model.discount_type,
        discount_value: model.discount_value,
        max_discount: model.max_discount,
        min_total: model.min_total,
        usage_limit: model.usage_limit,
        used_count: model.used_count,
        starts_at: model.starts_at.map(|dt| dt.with_timezone(&Utc)),
        ends_at: model.ends_at.map(|dt| dt.with_timezone(&Utc)),
        is_active: model.is_active,
    }
}
