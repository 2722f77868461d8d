mod common;

use foodgram_api::{
    dto::auth::{LoginRequest, RegisterRequest, SetPasswordRequest},
    error::AppError,
    services::{auth_service, user_service},
};

#[tokio::test]
async fn register_login_and_change_password() -> anyhow::Result<()> {
    let Some(app) = common::setup().await? else {
        return Ok(());
    };
    let state = &app.state;

    let username = common::unique("chef");
    let email = format!("{username}@Example.com");
    let created = auth_service::register_user(
        state,
        RegisterRequest {
            email: email.clone(),
            username: username.clone(),
            first_name: "Anna".into(),
            last_name: "Smith".into(),
            password: common::PASSWORD.into(),
        },
    )
    .await?
    .data
    .expect("user");
    assert_eq!(created.email, email.to_lowercase());
    assert!(!created.is_subscribed);

    // same email, different case and username
    let err = auth_service::register_user(
        state,
        RegisterRequest {
            email: email.to_uppercase(),
            username: common::unique("other"),
            first_name: String::new(),
            last_name: String::new(),
            password: common::PASSWORD.into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(ref m) if m == "Email is already taken"));

    let token = auth_service::login_user(
        state,
        LoginRequest {
            email: email.clone(),
            password: common::PASSWORD.into(),
        },
    )
    .await?
    .data
    .expect("token")
    .token;
    assert!(token.starts_with("Bearer "));

    let err = auth_service::login_user(
        state,
        LoginRequest {
            email: email.clone(),
            password: "wrong-password".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let me = foodgram_api::middleware::auth::AuthUser {
        user_id: created.id,
        role: "user".into(),
    };
    let err = auth_service::set_password(
        state,
        &me,
        SetPasswordRequest {
            current_password: "not-my-password".into(),
            new_password: "brand-new-secret".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    auth_service::set_password(
        state,
        &me,
        SetPasswordRequest {
            current_password: common::PASSWORD.into(),
            new_password: "brand-new-secret".into(),
        },
    )
    .await?;
    auth_service::login_user(
        state,
        LoginRequest {
            email,
            password: "brand-new-secret".into(),
        },
    )
    .await?;

    let profile = user_service::me(state, &me).await?.data.expect("profile");
    assert_eq!(profile.username, username);
    Ok(())
}

#[tokio::test]
async fn register_rejects_invalid_username_and_short_password() -> anyhow::Result<()> {
    let Some(app) = common::setup().await? else {
        return Ok(());
    };

    let err = auth_service::register_user(
        &app.state,
        RegisterRequest {
            email: format!("{}@example.com", common::unique("x")),
            username: "has spaces".into(),
            first_name: String::new(),
            last_name: String::new(),
            password: common::PASSWORD.into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let err = auth_service::register_user(
        &app.state,
        RegisterRequest {
            email: format!("{}@example.com", common::unique("x")),
            username: common::unique("x"),
            first_name: String::new(),
            last_name: String::new(),
            password: "short".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));
    Ok(())
}
