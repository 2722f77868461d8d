use uuid::Uuid;

use crate::{
    audit,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::RecipeShort,
    response::{ApiResponse, Meta},
    services::recipe_service::find_recipe_short,
    state::AppState,
};

const ALREADY_FAVORITED: &str = "Recipe is already in favorites";

pub async fn add_favorite(
    state: &AppState,
    user: &AuthUser,
    recipe_id: Uuid,
) -> AppResult<ApiResponse<RecipeShort>> {
    let recipe = find_recipe_short(&state.pool, recipe_id).await?;

    let existing: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM favorites WHERE user_id = $1 AND recipe_id = $2")
            .bind(user.user_id)
            .bind(recipe.id)
            .fetch_optional(&state.pool)
            .await?;
    if existing.is_some() {
        return Err(AppError::bad_request(ALREADY_FAVORITED));
    }

    sqlx::query(
        r#"
        INSERT INTO favorites (id, user_id, recipe_id)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(recipe.id)
    .execute(&state.pool)
    .await
    .map_err(|e| AppError::on_sqlx_conflict(e, ALREADY_FAVORITED))?;

    tracing::info!(user_id = %user.user_id, recipe_id = %recipe.id, "favorite added");
    audit::record(
        &state.pool,
        user.user_id,
        "favorite_add",
        "favorites",
        serde_json::json!({ "recipe_id": recipe.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Added to favorites",
        recipe,
        Some(Meta::empty()),
    ))
}

pub async fn remove_favorite(state: &AppState, user: &AuthUser, recipe_id: Uuid) -> AppResult<()> {
    let recipe = find_recipe_short(&state.pool, recipe_id).await?;

    let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND recipe_id = $2")
        .bind(user.user_id)
        .bind(recipe.id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::bad_request(
            "Recipe is not in favorites or was already removed",
        ));
    }

    tracing::info!(user_id = %user.user_id, recipe_id = %recipe.id, "favorite removed");
    audit::record(
        &state.pool,
        user.user_id,
        "favorite_remove",
        "favorites",
        serde_json::json!({ "recipe_id": recipe.id }),
    )
    .await;

    Ok(())
}
