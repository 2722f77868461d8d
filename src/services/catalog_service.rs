use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::{
    audit,
    dto::catalog::{CreateIngredientRequest, CreateTagRequest, IngredientList, TagList},
    entity::{
        ingredients::{
            ActiveModel as IngredientActive, Column as IngredientCol, Entity as Ingredients,
            Model as IngredientModel,
        },
        tags::{ActiveModel as TagActive, Column as TagCol, Entity as Tags, Model as TagModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Ingredient, Tag},
    response::{ApiResponse, Meta},
    routes::params::IngredientQuery,
    state::AppState,
    validation::{DEFAULT_TAG_COLOR, MAX_NAME_LEN, validate_hex_color, validate_slug, validate_text},
};

pub async fn list_tags(state: &AppState) -> AppResult<ApiResponse<TagList>> {
    let items = Tags::find()
        .order_by_asc(TagCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(tag_from_entity)
        .collect();
    Ok(ApiResponse::success("Tags", TagList { items }, None))
}

pub async fn get_tag(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Tag>> {
    let tag = Tags::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(tag_from_entity)
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Tag", tag, None))
}

pub async fn create_tag(
    state: &AppState,
    user: &AuthUser,
    payload: CreateTagRequest,
) -> AppResult<ApiResponse<Tag>> {
    ensure_admin(user)?;
    validate_text("name", &payload.name, Some(MAX_NAME_LEN))?;
    validate_slug(&payload.slug)?;
    let color = payload
        .color
        .unwrap_or_else(|| DEFAULT_TAG_COLOR.to_string());
    validate_hex_color(&color)?;

    let taken = Tags::find()
        .filter(TagCol::Slug.eq(payload.slug.as_str()))
        .one(&state.orm)
        .await?;
    if taken.is_some() {
        return Err(AppError::bad_request("A tag with this slug already exists"));
    }

    let tag = TagActive {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name),
        color: Set(color),
        slug: Set(payload.slug),
    }
    .insert(&state.orm)
    .await
    .map_err(|e| AppError::on_conflict(e, "A tag with this slug already exists"))?;

    tracing::info!(tag_id = %tag.id, slug = %tag.slug, "tag created");
    audit::record(
        &state.pool,
        user.user_id,
        "tag_create",
        "tags",
        serde_json::json!({ "tag_id": tag.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Tag created",
        tag_from_entity(tag),
        Some(Meta::empty()),
    ))
}

pub async fn list_ingredients(
    state: &AppState,
    query: IngredientQuery,
) -> AppResult<ApiResponse<IngredientList>> {
    let mut finder = Ingredients::find();
    if let Some(prefix) = query.name.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("{}%", escape_like(prefix));
        finder = finder.filter(Expr::col(IngredientCol::Name).ilike(pattern));
    }

    let items = finder
        .order_by_asc(IngredientCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(ingredient_from_entity)
        .collect();
    Ok(ApiResponse::success(
        "Ingredients",
        IngredientList { items },
        None,
    ))
}

pub async fn get_ingredient(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Ingredient>> {
    let ingredient = Ingredients::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(ingredient_from_entity)
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Ingredient", ingredient, None))
}

pub async fn create_ingredient(
    state: &AppState,
    user: &AuthUser,
    payload: CreateIngredientRequest,
) -> AppResult<ApiResponse<Ingredient>> {
    ensure_admin(user)?;
    validate_text("name", &payload.name, Some(MAX_NAME_LEN))?;
    validate_text("measurement_unit", &payload.measurement_unit, Some(MAX_NAME_LEN))?;

    let ingredient = IngredientActive {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name),
        measurement_unit: Set(payload.measurement_unit),
    }
    .insert(&state.orm)
    .await?;

    tracing::info!(ingredient_id = %ingredient.id, "ingredient created");
    audit::record(
        &state.pool,
        user.user_id,
        "ingredient_create",
        "ingredients",
        serde_json::json!({ "ingredient_id": ingredient.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Ingredient created",
        ingredient_from_entity(ingredient),
        Some(Meta::empty()),
    ))
}

/// Escape LIKE wildcards so user input only ever matches literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

pub fn tag_from_entity(model: TagModel) -> Tag {
    Tag {
        id: model.id,
        name: model.name,
        color: model.color,
        slug: model.slug,
    }
}

pub fn ingredient_from_entity(model: IngredientModel) -> Ingredient {
    Ingredient {
        id: model.id,
        name: model.name,
        measurement_unit: model.measurement_unit,
    }
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn escapes_like_wildcards() {
        assert_eq!(escape_like("sug"), "sug");
        assert_eq!(escape_like("100%_"), "100\\%\\_");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
    }
}
