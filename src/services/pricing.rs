use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    entity::{addons, vouchers},
    error::{AppError, AppResult},
};

/// Line-item snapshot taken at pricing time; stored verbatim on the booking.
#[derive(Debug, Clone)]
pub struct AddonLine {
    pub addon_id: Uuid,
    pub name: String,
    pub qty: i32,
    pub price: i64,
    pub subtotal: i64,
}

/// Price resolved add-ons. Callers are responsible for resolving ids against
/// the package first (see `booking_service::resolve_addons`), so this stays a
/// pure fold over snapshots.
pub fn price_addons(resolved: &[(addons::Model, i32)]) -> (Vec<AddonLine>, i64) {
    let mut lines = Vec::with_capacity(resolved.len());
    let mut total: i64 = 0;

    for (addon, qty) in resolved {
        let qty = *qty;
        let subtotal = addon.price * i64::from(qty);
        total += subtotal;
        lines.push(AddonLine {
            addon_id: addon.id,
            name: addon.name.clone(),
            qty,
            price: addon.price,
            subtotal,
        });
    }

    (lines, total)
}

/// Discount a voucher grants on a subtotal, or why it cannot be applied.
/// The result is clamped so it never exceeds `max_discount` nor the subtotal.
pub fn voucher_discount(
    voucher: &vouchers::Model,
    subtotal: i64,
    now: DateTime<Utc>,
) -> AppResult<i64> {
    if !voucher.is_active {
        return Err(AppError::validation("voucher_code", "Voucher is inactive"));
    }

    if let Some(starts_at) = voucher.starts_at {
        if now < starts_at.with_timezone(&Utc) {
            return Err(AppError::validation(
                "voucher_code",
                "Voucher is not active yet",
            ));
        }
    }

    if let Some(ends_at) = voucher.ends_at {
        if now > ends_at.with_timezone(&Utc) {
            return Err(AppError::validation("voucher_code", "Voucher has expired"));
        }
    }

    if let Some(min_total) = voucher.min_total {
        if subtotal < min_total {
            return Err(AppError::validation(
                "voucher_code",
                "Minimum booking total for this voucher is not reached",
            ));
        }
    }

    let mut discount = if voucher.discount_type == vouchers::TYPE_PERCENT {
        subtotal * voucher.discount_value / 100
    } else {
        voucher.discount_value
    };

    if let Some(max_discount) = voucher.max_discount {
        discount = discount.min(max_discount);
    }

    Ok(discount.clamp(0, subtotal))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn addon(name: &str, price: i64) -> addons::Model {
        addons::Model {
            id: Uuid::new_v4(),
            package_id: Uuid::new_v4(),
            name: name.into(),
            price,
            addon_type: "item".into(),
            description: None,
            is_active: true,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn voucher() -> vouchers::Model {
        vouchers::Model {
            id: Uuid::new_v4(),
            code: "SAVE10".into(),
            name: "Save 10%".into(),
            description: None,
            discount_type: vouchers::TYPE_PERCENT.into(),
            discount_value: 10,
            max_discount: None,
            min_total: None,
            usage_limit: None,
            used_count: 0,
            starts_at: None,
            ends_at: None,
            is_active: true,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[test]
    fn addon_lines_snapshot_price_and_subtotal() {
        let frame = addon("Extra frame", 15_000);
        let (lines, total) = price_addons(&[(frame.clone(), 2)]);
        assert_eq!(total, 30_000);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].price, 15_000);
        assert_eq!(lines[0].subtotal, 30_000);
        assert_eq!(lines[0].name, "Extra frame");
    }

    #[test]
    fn percent_discount_capped_by_max_discount() {
        let mut v = voucher();
        v.max_discount = Some(5_000);
        v.min_total = Some(50_000);
        // 10% of 100_000 is 10_000, capped at 5_000.
        assert_eq!(voucher_discount(&v, 100_000, Utc::now()).unwrap(), 5_000);
    }

    #[test]
    fn fixed_discount_never_exceeds_subtotal() {
        let mut v = voucher();
        v.discount_type = vouchers::TYPE_FIXED.into();
        v.discount_value = 75_000;
        assert_eq!(voucher_discount(&v, 50_000, Utc::now()).unwrap(), 50_000);
    }

    #[test]
    fn inactive_voucher_rejected() {
        let mut v = voucher();
        v.is_active = false;
        assert!(voucher_discount(&v, 100_000, Utc::now()).is_err());
    }

    #[test]
    fn voucher_outside_window_rejected() {
        let now = Utc::now();

        let mut early = voucher();
        early.starts_at = Some((now + Duration::hours(1)).into());
        assert!(voucher_discount(&early, 100_000, now).is_err());

        let mut late = voucher();
        late.ends_at = Some((now - Duration::hours(1)).into());
        assert!(voucher_discount(&late, 100_000, now).is_err());
    }

    #[test]
    fn minimum_total_enforced() {
        let mut v = voucher();
        v.min_total = Some(50_000);
        assert!(voucher_discount(&v, 49_999, Utc::now()).is_err());
        assert!(voucher_discount(&v, 50_000, Utc::now()).is_ok());
    }

    #[test]
    fn discount_is_within_bounds() {
        for subtotal in [0, 1, 99, 100_000, 1_000_000] {
            let d = voucher_discount(&voucher(), subtotal, Utc::now()).unwrap();
            assert!(d >= 0 && d <= subtotal);
        }
    }
}
