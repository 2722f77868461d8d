use std::{env, path::PathBuf};

use foodgram_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    seed::{ensure_admin, load_ingredients, seed_ingredients, seed_tags},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_INGREDIENTS_FILE: &str = "data/ingredients.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    // Ensure migrations are applied.
    run_migrations(&create_orm_conn(pool.clone())).await?;

    let admin_email = env::var("SEED_ADMIN_EMAIL").unwrap_or_else(|_| "admin@example.com".into());
    let admin_username = env::var("SEED_ADMIN_USERNAME").unwrap_or_else(|_| "admin".into());
    let admin_password = env::var("SEED_ADMIN_PASSWORD").unwrap_or_else(|_| "admin12345".into());
    let admin_id = ensure_admin(&pool, &admin_email, &admin_username, &admin_password).await?;

    seed_tags(&pool).await?;
    println!("Seeded tags");

    let path = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_INGREDIENTS_FILE));
    let records = load_ingredients(&path)?;
    let inserted = seed_ingredients(&pool, &records).await?;

    println!("Seed completed. Admin ID: {admin_id}, new ingredients: {inserted}");
    Ok(())
}
