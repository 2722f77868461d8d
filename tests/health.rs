mod common;

use axum::{extract::State, http::StatusCode};
use foodgram_api::routes::health::health_check;

#[tokio::test]
async fn health_check_reports_database_up() -> anyhow::Result<()> {
    let Some(app) = common::setup().await? else {
        return Ok(());
    };

    let (status, response) = health_check(State(app.state.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response.0.message, "Health check");

    let data = response.0.data.expect("health data");
    assert_eq!(data.status, "ok");
    assert_eq!(data.database, "up");
    Ok(())
}
