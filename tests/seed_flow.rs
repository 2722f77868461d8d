mod common;

use foodgram_api::{dto::auth::LoginRequest, seed, services::auth_service};

#[tokio::test]
async fn admin_seed_normalizes_email_and_is_idempotent() -> anyhow::Result<()> {
    let Some(app) = common::setup().await? else {
        return Ok(());
    };
    let pool = &app.state.pool;

    let username = common::unique("root");
    let mixed_case = format!("  {}@Example.COM ", username.to_uppercase());
    let id = seed::ensure_admin(pool, &mixed_case, &username, common::PASSWORD).await?;

    let token = auth_service::login_user(
        &app.state,
        LoginRequest {
            email: mixed_case.trim().to_lowercase(),
            password: common::PASSWORD.into(),
        },
    )
    .await?
    .data
    .expect("token")
    .token;
    assert!(token.starts_with("Bearer "));

    let again = seed::ensure_admin(pool, &mixed_case, &username, common::PASSWORD).await?;
    assert_eq!(again, id);

    let (role,): (String,) = sqlx::query_as("SELECT role FROM users WHERE id = $1")
        .bind(id)
        .fetch_one(pool)
        .await?;
    assert_eq!(role, "admin");
    Ok(())
}

#[tokio::test]
async fn admin_seed_promotes_existing_account() -> anyhow::Result<()> {
    let Some(app) = common::setup().await? else {
        return Ok(());
    };
    let user = common::create_user(&app.state).await?;
    let (email, username): (String, String) =
        sqlx::query_as("SELECT email, username FROM users WHERE id = $1")
            .bind(user.user_id)
            .fetch_one(&app.state.pool)
            .await?;

    let id = seed::ensure_admin(&app.state.pool, &email.to_uppercase(), &username, "ignored")
        .await?;
    assert_eq!(id, user.user_id);
    Ok(())
}

#[tokio::test]
async fn admin_seed_rejects_username_owned_by_another_account() -> anyhow::Result<()> {
    let Some(app) = common::setup().await? else {
        return Ok(());
    };
    let user = common::create_user(&app.state).await?;
    let (taken,): (String,) = sqlx::query_as("SELECT username FROM users WHERE id = $1")
        .bind(user.user_id)
        .fetch_one(&app.state.pool)
        .await?;

    let email = format!("{}@example.com", common::unique("other"));
    let err = seed::ensure_admin(&app.state.pool, &email, &taken, common::PASSWORD)
        .await
        .unwrap_err();
    assert!(err.to_string().contains(&taken));

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = $1")
        .bind(&email)
        .fetch_one(&app.state.pool)
        .await?;
    assert_eq!(count, 0);
    Ok(())
}

#[tokio::test]
async fn seeding_tags_and_ingredients_twice_adds_nothing_new() -> anyhow::Result<()> {
    let Some(app) = common::setup().await? else {
        return Ok(());
    };
    let pool = &app.state.pool;

    seed::seed_tags(pool).await?;
    seed::seed_tags(pool).await?;

    let name = common::unique("salt");
    let records = vec![seed::IngredientRecord {
        name: name.clone(),
        measurement_unit: "g".into(),
    }];
    assert_eq!(seed::seed_ingredients(pool, &records).await?, 1);
    assert_eq!(seed::seed_ingredients(pool, &records).await?, 0);
    Ok(())
}
