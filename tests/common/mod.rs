#![allow(dead_code)]

use foodgram_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::{
        auth::RegisterRequest,
        recipes::{CreateRecipeRequest, IngredientAmount},
    },
    middleware::auth::{AuthUser, ROLE_ADMIN, ROLE_USER},
    services::auth_service,
    state::AppState,
};
use tempfile::TempDir;
use tokio::sync::OnceCell;
use uuid::Uuid;

pub const PASSWORD: &str = "password123";
pub const PIXEL_PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg==";

// Tests in one binary run concurrently; DDL only needs to run once.
static MIGRATED: OnceCell<()> = OnceCell::const_new();

pub struct TestApp {
    pub state: AppState,
    // Keeps the media directory alive for the duration of the test.
    pub media: TempDir,
}

/// Connect to the test database, or `None` when none is configured.
pub async fn setup() -> anyhow::Result<Option<TestApp>> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests.");
            return Ok(None);
        }
    };

    let pool = create_pool(&database_url, 5).await?;
    let orm = create_orm_conn(pool.clone());
    MIGRATED
        .get_or_try_init(|| async { run_migrations(&orm).await })
        .await?;

    let media = tempfile::tempdir()?;
    let config = AppConfig {
        database_url,
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "test-secret".into(),
        jwt_ttl_hours: 1,
        media_root: media.path().to_string_lossy().into_owned(),
        db_max_connections: 5,
    };

    Ok(Some(TestApp {
        state: AppState::new(pool, orm, config),
        media,
    }))
}

pub fn unique(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

/// Register a fresh account through the service and return its identity.
pub async fn create_user(state: &AppState) -> anyhow::Result<AuthUser> {
    let username = unique("cook");
    let resp = auth_service::register_user(
        state,
        RegisterRequest {
            email: format!("{username}@example.com"),
            username,
            first_name: "Test".into(),
            last_name: "Cook".into(),
            password: PASSWORD.into(),
        },
    )
    .await?;
    let user = resp.data.expect("registered user");
    Ok(AuthUser {
        user_id: user.id,
        role: ROLE_USER.into(),
    })
}

pub async fn create_admin(state: &AppState) -> anyhow::Result<AuthUser> {
    let user = create_user(state).await?;
    sqlx::query("UPDATE users SET role = $2 WHERE id = $1")
        .bind(user.user_id)
        .bind(ROLE_ADMIN)
        .execute(&state.pool)
        .await?;
    Ok(AuthUser {
        user_id: user.user_id,
        role: ROLE_ADMIN.into(),
    })
}

pub async fn create_ingredient(state: &AppState, name: &str, unit: &str) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) RETURNING id",
    )
    .bind(name)
    .bind(unit)
    .fetch_one(&state.pool)
    .await?;
    Ok(id)
}

pub async fn create_tag(state: &AppState, slug: &str) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        "INSERT INTO tags (name, color, slug) VALUES ($1, '#aabbcc', $1) RETURNING id",
    )
    .bind(slug)
    .fetch_one(&state.pool)
    .await?;
    Ok(id)
}

pub fn recipe_payload(
    name: &str,
    ingredients: &[(Uuid, i32)],
    tags: &[Uuid],
) -> CreateRecipeRequest {
    CreateRecipeRequest {
        ingredients: ingredients
            .iter()
            .map(|(id, amount)| IngredientAmount {
                id: *id,
                amount: *amount,
            })
            .collect(),
        tags: tags.to_vec(),
        image: PIXEL_PNG.into(),
        name: name.into(),
        text: "Mix everything and bake.".into(),
        cooking_time: 30,
    }
}
