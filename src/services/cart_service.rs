use uuid::Uuid;

use crate::{
    audit,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{RecipeShort, ShoppingListLine},
    response::{ApiResponse, Meta},
    services::recipe_service::find_recipe_short,
    state::AppState,
};

const ALREADY_IN_CART: &str = "Recipe is already in the shopping cart";
pub const SHOPPING_LIST_FILENAME: &str = "shopping_cart.txt";

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    recipe_id: Uuid,
) -> AppResult<ApiResponse<RecipeShort>> {
    let recipe = find_recipe_short(&state.pool, recipe_id).await?;

    let exist: Option<(Uuid,)> =
        sqlx::query_as("SELECT id FROM shopping_carts WHERE user_id = $1 AND recipe_id = $2")
            .bind(user.user_id)
            .bind(recipe.id)
            .fetch_optional(&state.pool)
            .await?;
    if exist.is_some() {
        return Err(AppError::bad_request(ALREADY_IN_CART));
    }

    sqlx::query("INSERT INTO shopping_carts (id, user_id, recipe_id) VALUES ($1, $2, $3)")
        .bind(Uuid::new_v4())
        .bind(user.user_id)
        .bind(recipe.id)
        .execute(&state.pool)
        .await
        .map_err(|e| AppError::on_sqlx_conflict(e, ALREADY_IN_CART))?;

    tracing::info!(user_id = %user.user_id, recipe_id = %recipe.id, "added to cart");
    audit::record(
        &state.pool,
        user.user_id,
        "cart_add",
        "shopping_carts",
        serde_json::json!({ "recipe_id": recipe.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Added to shopping cart",
        recipe,
        Some(Meta::empty()),
    ))
}

pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    recipe_id: Uuid,
) -> AppResult<()> {
    let recipe = find_recipe_short(&state.pool, recipe_id).await?;

    let result = sqlx::query("DELETE FROM shopping_carts WHERE recipe_id = $1 AND user_id = $2")
        .bind(recipe.id)
        .bind(user.user_id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::bad_request(
            "Recipe is not in the shopping cart or was already removed",
        ));
    }

    tracing::info!(user_id = %user.user_id, recipe_id = %recipe.id, "removed from cart");
    audit::record(
        &state.pool,
        user.user_id,
        "cart_remove",
        "shopping_carts",
        serde_json::json!({ "recipe_id": recipe.id }),
    )
    .await;

    Ok(())
}

/// Sum ingredient amounts over every recipe in the user's cart, one line per
/// (name, unit) pair.
pub async fn shopping_list(state: &AppState, user: &AuthUser) -> AppResult<Vec<ShoppingListLine>> {
    let lines = sqlx::query_as::<_, ShoppingListLine>(
        r#"
        SELECT i.name, i.measurement_unit, SUM(ri.amount)::BIGINT AS amount
        FROM shopping_carts sc
        JOIN recipe_ingredients ri ON ri.recipe_id = sc.recipe_id
        JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE sc.user_id = $1
        GROUP BY i.name, i.measurement_unit
        ORDER BY i.name, i.measurement_unit
        "#,
    )
    .bind(user.user_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(lines)
}

pub async fn download_shopping_list(state: &AppState, user: &AuthUser) -> AppResult<String> {
    let lines = shopping_list(state, user).await?;
    tracing::debug!(user_id = %user.user_id, lines = lines.len(), "shopping list rendered");
    Ok(render_shopping_list(&lines))
}

pub fn render_shopping_list(lines: &[ShoppingListLine]) -> String {
    lines
        .iter()
        .map(|line| {
            format!(
                "{} - {} {}",
                capitalize(&line.name),
                line.amount,
                line.measurement_unit
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// First character upper-cased, the rest lower-cased.
fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}
