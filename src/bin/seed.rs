use studio_booking_api::{
    config::AppConfig,
    db::create_pool,
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let studio_id = seed_studio(&pool).await?;
    seed_packages(&pool, studio_id).await?;
    seed_voucher(&pool).await?;

    println!("Seed completed. Studio ID: {studio_id}");
    Ok(())
}

async fn seed_studio(pool: &sqlx::PgPool) -> anyhow::Result<Uuid> {
    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        INSERT INTO studios (id, name, address, city, open_time, close_time)
        VALUES ($1, $2, $3, $4, '09:00', '21:00')
        ON CONFLICT (name) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind("Lumen Studio")
    .bind("Jl. Kaliurang KM 5 No. 21")
    .bind("Yogyakarta")
    .fetch_optional(pool)
    .await?;

    let studio_id = match row {
        Some((id,)) => id,
        None => {
            let existing: (Uuid,) = sqlx::query_as("SELECT id FROM studios WHERE name = $1")
                .bind("Lumen Studio")
                .fetch_one(pool)
                .await?;
            existing.0
        }
    };

    println!("Ensured studio Lumen Studio");
    Ok(studio_id)
}

async fn seed_packages(pool: &sqlx::PgPool, studio_id: Uuid) -> anyhow::Result<()> {
    let packages = vec![
        ("Self Photo Basic", "self_photo", 100_000, 30, 1, 4),
        ("Self Photo Group", "self_photo", 180_000, 60, 1, 8),
        ("Studio Family", "studio", 350_000, 90, 1, 10),
    ];

    for (name, category, price, duration, per_slot, max_person) in packages {
        let row: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO packages
                (id, studio_id, name, category, price, duration_minutes, max_booking_per_slot, max_person)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (studio_id, name) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(studio_id)
        .bind(name)
        .bind(category)
        .bind(price)
        .bind(duration)
        .bind(per_slot)
        .bind(max_person)
        .fetch_optional(pool)
        .await?;

        if let Some((package_id,)) = row {
            seed_addons(pool, package_id).await?;
        }
    }

    println!("Seeded packages");
    Ok(())
}

async fn seed_addons(pool: &sqlx::PgPool, package_id: Uuid) -> anyhow::Result<()> {
    let addons = vec![
        ("Extra Print 4R", "print", 15_000),
        ("Extra Person", "person", 25_000),
        ("All Soft Files", "file", 50_000),
    ];

    for (name, addon_type, price) in addons {
        sqlx::query(
            r#"
            INSERT INTO addons (id, package_id, name, addon_type, price)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(package_id)
        .bind(name)
        .bind(addon_type)
        .bind(price)
        .execute(pool)
        .await?;
    }

    Ok(())
}

async fn seed_voucher(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO vouchers
            (id, code, name, discount_type, discount_value, max_discount, min_total, usage_limit)
        VALUES ($1, 'WELCOME10', 'Welcome discount', 'percent', 10, 20000, 100000, 100)
        ON CONFLICT (code) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .execute(pool)
    .await?;

    println!("Seeded voucher WELCOME10");
    Ok(())
}
