use chrono::{Duration, Local, NaiveTime};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    Set, Statement, TransactionTrait,
};
use studio_booking_api::{
    config::PakasirConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::{
        bookings::{AddonsPayload, CreateBookingRequest, CustomerInput, RescheduleRequest, UpdateBookingStatusRequest},
        payments::WebhookPayload,
    },
    entity::{
        addons::ActiveModel as AddonActive,
        customers::{Column as CustomerCol, Entity as Customers},
        packages::ActiveModel as PackageActive,
        studios::ActiveModel as StudioActive,
        vouchers::{ActiveModel as VoucherActive, Entity as Vouchers},
    },
    error::AppError,
    middleware::auth::AuthUser,
    pakasir::PakasirClient,
    services::{booking_service, payment_service, voucher_service},
    state::AppState,
};
use uuid::Uuid;

// Integration flow: guest books a slot with add-ons and a voucher, the slot
// quota fills up, a webhook arrives, and an admin manages the booking.
#[tokio::test]
async fn booking_payment_and_admin_flow() -> anyhow::Result<()> {
    // Allow skipping when no DB is configured in the environment.
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let state = setup_state(&database_url).await?;

    // Seed a studio with one bookable package and an add-on.
    let studio = StudioActive {
        id: Set(Uuid::new_v4()),
        name: Set("Test Studio".into()),
        address: Set("Jl. Test 1".into()),
        city: Set("Yogyakarta".into()),
        open_time: Set(NaiveTime::from_hms_opt(9, 0, 0).unwrap()),
        close_time: Set(NaiveTime::from_hms_opt(18, 0, 0).unwrap()),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let package = PackageActive {
        id: Set(Uuid::new_v4()),
        studio_id: Set(studio.id),
        name: Set("Self Photo".into()),
        category: Set("self_photo".into()),
        price: Set(100_000),
        duration_minutes: Set(60),
        max_booking_per_slot: Set(2),
        max_person: Set(4),
        description: Set(None),
        is_active: Set(true),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let addon = AddonActive {
        id: Set(Uuid::new_v4()),
        package_id: Set(package.id),
        name: Set("Extra Print".into()),
        price: Set(15_000),
        addon_type: Set("print".into()),
        description: Set(None),
        is_active: Set(true),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let voucher = VoucherActive {
        id: Set(Uuid::new_v4()),
        code: Set("HEMAT10K".into()),
        name: Set("Hemat 10rb".into()),
        description: Set(None),
        discount_type: Set("fixed".into()),
        discount_value: Set(10_000),
        max_discount: Set(None),
        min_total: Set(Some(100_000)),
        usage_limit: Set(Some(5)),
        used_count: Set(0),
        starts_at: Set(None),
        ends_at: Set(None),
        is_active: Set(true),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let booking_date = Local::now().date_naive() + Duration::days(7);

    // Slot calendar covers opening hours and starts fully free.
    let slots_resp =
        booking_service::available_slots(&state, studio.id, package.id, booking_date).await?;
    let slots = slots_resp.data.unwrap();
    assert!(!slots.slots.is_empty());
    assert!(slots.slots.iter().all(|s| s.is_available && s.remaining_quota == 2));

    // First booking: add-on x2 plus a fixed voucher, hosted payment URL mode.
    let created = booking_service::create_booking(
        &state,
        studio.id,
        package.id,
        CreateBookingRequest {
            booking_date,
            start_time: "10.00".into(),
            customer: CustomerInput {
                name: "Rina".into(),
                phone: "0812000111".into(),
                email: "rina@example.com".into(),
            },
            voucher_code: Some("hemat10k".into()),
            payment_mode: Some("url".into()),
            payment_method: None,
            qris_only: None,
            redirect_url: None,
            addons: Some(serde_json::from_value::<AddonsPayload>(serde_json::json!([
                { "addon_id": addon.id, "qty": 2 }
            ]))?),
            preferences: None,
            notes: Some("first session".into()),
        },
    )
    .await?;
    let created = created.data.unwrap();
    let booking = &created.booking.booking;

    assert_eq!(booking.subtotal_price, 130_000);
    assert_eq!(booking.discount_amount, 10_000);
    assert_eq!(booking.total_price, 120_000);
    assert_eq!(booking.status, "pending");
    assert_eq!(booking.payment_status, "unpaid");
    assert!(booking.invoice_number.starts_with("INV-"));
    assert_eq!(created.payment.mode, "url");
    assert!(created.payment.payment_url.is_some());
    assert_eq!(created.booking.addons.len(), 1);
    assert_eq!(created.booking.addons[0].subtotal, 30_000);

    // Voucher usage was incremented inside the booking transaction.
    let voucher = Vouchers::find_by_id(voucher.id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(voucher.used_count, 1);

    // Second booking takes the last seat in the slot.
    booking_service::create_booking(
        &state,
        studio.id,
        package.id,
        simple_request(booking_date, "10:00", "0812000222"),
    )
    .await?;

    // Third attempt on the same slot is refused.
    let err = booking_service::create_booking(
        &state,
        studio.id,
        package.id,
        simple_request(booking_date, "10:00", "0812000333"),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // A pending (non-completed) webhook only records the payment attempt.
    let ack = payment_service::webhook(
        &state,
        WebhookPayload {
            amount: 120_000.0,
            order_id: booking.invoice_number.clone(),
            project: "testproj".into(),
            status: "pending".into(),
            payment_method: Some("qris".into()),
            completed_at: None,
        },
    )
    .await?;
    let ack = ack.data.unwrap();
    assert_eq!(ack.payment_status, "unpaid");
    assert_eq!(ack.booking_status, "pending");

    // A webhook with the wrong amount is rejected outright.
    let err = payment_service::webhook(
        &state,
        WebhookPayload {
            amount: 50_000.0,
            order_id: booking.invoice_number.clone(),
            project: "testproj".into(),
            status: "pending".into(),
            payment_method: None,
            completed_at: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Integrity(_)));

    let admin = AuthUser {
        user_id: Uuid::new_v4(),
        role: "admin".into(),
    };

    // Admin reschedules the booking to a free slot.
    let rescheduled = booking_service::admin_reschedule(
        &state,
        &admin,
        booking.id,
        RescheduleRequest {
            booking_date,
            start_time: "14:00".into(),
            notes: None,
        },
    )
    .await?;
    let rescheduled = rescheduled.data.unwrap();
    assert_eq!(
        rescheduled.booking.start_time,
        NaiveTime::from_hms_opt(14, 0, 0).unwrap()
    );
    assert_eq!(
        rescheduled.booking.end_time,
        NaiveTime::from_hms_opt(15, 0, 0).unwrap()
    );

    // Admin closes the booking out; terminal bookings cannot move again.
    let updated = booking_service::admin_update_status(
        &state,
        &admin,
        booking.id,
        UpdateBookingStatusRequest {
            status: "completed".into(),
            payment_status: Some("paid".into()),
            payment_method: None,
            payment_reference: None,
            notes: None,
        },
    )
    .await?;
    assert_eq!(updated.data.unwrap().booking.status, "completed");

    let err = booking_service::admin_reschedule(
        &state,
        &admin,
        booking.id,
        RescheduleRequest {
            booking_date,
            start_time: "16:00".into(),
            notes: None,
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    // Non-admin callers are refused on admin surfaces.
    let guest = AuthUser {
        user_id: Uuid::new_v4(),
        role: "user".into(),
    };
    let err = booking_service::admin_show(&state, &guest, booking.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    // Wildcard characters in a submitted code are literal, not patterns.
    let txn = state.orm.begin().await?;
    let err = voucher_service::reserve(&txn, "HEMAT___", 200_000)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
    let err = voucher_service::reserve(&txn, "HEMAT%", 200_000)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
    let (matched, _) = voucher_service::reserve(&txn, "hemat10k", 200_000).await?;
    assert_eq!(matched.code, "HEMAT10K");
    txn.rollback().await?;

    // A zero-total booking is settled immediately, no gateway involved.
    let free_package = PackageActive {
        id: Set(Uuid::new_v4()),
        studio_id: Set(studio.id),
        name: Set("Free Trial".into()),
        category: Set("self_photo".into()),
        price: Set(0),
        duration_minutes: Set(30),
        max_booking_per_slot: Set(1),
        max_person: Set(2),
        description: Set(None),
        is_active: Set(true),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let free = booking_service::create_booking(
        &state,
        studio.id,
        free_package.id,
        simple_request(booking_date, "09:00", "0812000555"),
    )
    .await?;
    let free = free.data.unwrap();
    assert_eq!(free.booking.booking.total_price, 0);
    assert_eq!(free.booking.booking.payment_status, "paid");
    assert_eq!(free.booking.booking.payment_method, "free");
    assert_eq!(free.payment.mode, "free");
    assert!(free.payment.payment_url.is_none());
    let free_record = free.booking.payment.unwrap();
    assert_eq!(free_record.payment_status, "completed");
    assert!(free_record.paid_at.is_some());

    // Concurrent redemptions of the same voucher never exceed its quota.
    let race_voucher = VoucherActive {
        id: Set(Uuid::new_v4()),
        code: Set("LIMIT2".into()),
        name: Set("Two seats".into()),
        description: Set(None),
        discount_type: Set("fixed".into()),
        discount_value: Set(5_000),
        max_discount: Set(None),
        min_total: Set(None),
        usage_limit: Set(Some(2)),
        used_count: Set(0),
        starts_at: Set(None),
        ends_at: Set(None),
        is_active: Set(true),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let race_date = booking_date + Duration::days(1);
    let mut handles = Vec::new();
    for (i, start) in ["09:00", "11:00", "12:00", "13:00"].into_iter().enumerate() {
        let state = state.clone();
        let studio_id = studio.id;
        let package_id = package.id;
        let start = start.to_string();
        handles.push(tokio::spawn(async move {
            let mut request = simple_request(race_date, &start, &format!("0812777{i}"));
            request.voucher_code = Some("LIMIT2".into());
            booking_service::create_booking(&state, studio_id, package_id, request).await
        }));
    }
    let mut redeemed = 0;
    for handle in handles {
        if handle.await?.is_ok() {
            redeemed += 1;
        }
    }
    assert_eq!(redeemed, 2);
    let race_voucher = Vouchers::find_by_id(race_voucher.id)
        .one(&state.orm)
        .await?
        .unwrap();
    assert_eq!(race_voucher.used_count, 2);

    // Missing gateway credentials are rejected before anything is written.
    let unconfigured = AppState {
        pool: state.pool.clone(),
        orm: state.orm.clone(),
        pakasir: PakasirClient::new(PakasirConfig {
            base_url: "https://gateway.test".into(),
            project_slug: "testproj".into(),
            api_key: String::new(),
        })?,
    };
    let err = booking_service::create_booking(
        &unconfigured,
        studio.id,
        package.id,
        simple_request(race_date, "16:00", "0812000666"),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
    let orphaned = Customers::find()
        .filter(CustomerCol::Phone.eq("0812000666"))
        .count(&state.orm)
        .await?;
    assert_eq!(orphaned, 0);

    Ok(())
}

fn simple_request(
    booking_date: chrono::NaiveDate,
    start_time: &str,
    phone: &str,
) -> CreateBookingRequest {
    CreateBookingRequest {
        booking_date,
        start_time: start_time.into(),
        customer: CustomerInput {
            name: "Guest".into(),
            phone: phone.into(),
            email: "guest@example.com".into(),
        },
        voucher_code: None,
        payment_mode: Some("url".into()),
        payment_method: None,
        qris_only: None,
        redirect_url: None,
        addons: None,
        preferences: None,
        notes: None,
    }
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

    // Clean tables between runs
    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE payments, booking_addons, bookings, customers, vouchers, addons, packages, studios, audit_logs RESTART IDENTITY CASCADE",
    ))
    .await?;

    // Hosted-URL mode never talks to the gateway, so dummy credentials work.
    let pakasir = PakasirClient::new(PakasirConfig {
        base_url: "https://gateway.test".into(),
        project_slug: "testproj".into(),
        api_key: "testkey".into(),
    })?;

    Ok(AppState { pool, orm, pakasir })
}
