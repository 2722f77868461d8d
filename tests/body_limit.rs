use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use foodgram_api::{
    app::{BODY_LIMIT_BYTES, build_app},
    config::AppConfig,
    db::create_orm_conn,
    middleware::auth::ROLE_USER,
    services::auth_service::issue_token,
    state::AppState,
};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "body-limit-secret";

// Requests here are rejected before any query runs, so a lazy pool is enough.
fn offline_state() -> anyhow::Result<AppState> {
    let url = "postgres://foodgram@localhost/unused";
    let pool = PgPoolOptions::new().connect_lazy(url)?;
    let orm = create_orm_conn(pool.clone());
    let config = AppConfig {
        database_url: url.into(),
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: SECRET.into(),
        jwt_ttl_hours: 1,
        media_root: std::env::temp_dir().to_string_lossy().into_owned(),
        db_max_connections: 1,
    };
    Ok(AppState::new(pool, orm, config))
}

fn create_recipe_request(image_payload_len: usize) -> anyhow::Result<Request<Body>> {
    let token = issue_token(SECRET, 1, Uuid::new_v4(), ROLE_USER)?;
    let body = serde_json::json!({
        "ingredients": [],
        "tags": [],
        "image": format!("data:image/png;base64,{}", "A".repeat(image_payload_len)),
        "name": "Large photo",
        "text": "Too many pixels.",
        "cooking_time": 10,
    });
    Ok(Request::builder()
        .method("POST")
        .uri("/api/recipes")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(serde_json::to_vec(&body)?))?)
}

#[tokio::test]
async fn json_bodies_above_two_megabytes_reach_validation() -> anyhow::Result<()> {
    let app = build_app(offline_state()?);

    let response = app
        .oneshot(create_recipe_request(3 * 1024 * 1024)?)
        .await?;
    // empty ingredient list is rejected by validation, not by the body limit
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn bodies_over_the_configured_limit_are_rejected() -> anyhow::Result<()> {
    let app = build_app(offline_state()?);

    let response = app
        .oneshot(create_recipe_request(BODY_LIMIT_BYTES + 1024)?)
        .await?;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    Ok(())
}
