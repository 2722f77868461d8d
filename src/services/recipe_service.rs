use std::collections::{HashMap, HashSet};

use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, EntityTrait,
    FromQueryResult, JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
    RelationTrait, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    db::DbPool,
    dto::recipes::{CreateRecipeRequest, IngredientAmount, RecipeList, UpdateRecipeRequest},
    entity::{
        favorites::{Column as FavCol, Entity as Favorites},
        ingredients::{Column as IngredientCol, Entity as Ingredients},
        recipe_ingredients::{
            self, ActiveModel as RecipeIngredientActive, Column as RecipeIngredientCol,
            Entity as RecipeIngredients,
        },
        recipe_tags::{
            self, ActiveModel as RecipeTagActive, Column as RecipeTagCol, Entity as RecipeTags,
        },
        recipes::{
            ActiveModel as RecipeActive, Column as RecipeCol, Entity as Recipes,
            Model as RecipeModel,
        },
        shopping_carts::{Column as CartCol, Entity as ShoppingCarts},
        tags::{Column as TagCol, Entity as Tags},
        users::{Column as UserCol, Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    media,
    middleware::auth::{AuthUser, ensure_author_or_admin},
    models::{Recipe, RecipeIngredient, RecipeShort, Tag, media_url},
    response::{ApiResponse, Meta},
    routes::params::RecipeQuery,
    services::{subscription_service::subscribed_author_ids, user_service::user_from_entity},
    state::AppState,
    validation::{
        MAX_NAME_LEN, dedup_tags, validate_cooking_time, validate_recipe_ingredients,
        validate_text,
    },
};

#[derive(Debug, FromQueryResult)]
struct RecipeTagRow {
    recipe_id: Uuid,
    id: Uuid,
    name: String,
    color: String,
    slug: String,
}

#[derive(Debug, FromQueryResult)]
struct RecipeIngredientRow {
    recipe_id: Uuid,
    id: Uuid,
    name: String,
    measurement_unit: String,
    amount: i32,
}

pub fn short_from_entity(model: RecipeModel) -> RecipeShort {
    RecipeShort {
        id: model.id,
        name: model.name,
        image: media_url(&model.image),
        cooking_time: model.cooking_time,
    }
}

pub async fn find_recipe<C: ConnectionTrait>(conn: &C, id: Uuid) -> AppResult<RecipeModel> {
    Recipes::find_by_id(id)
        .one(conn)
        .await?
        .ok_or(AppError::NotFound)
}

/// Recipe ids among `recipe_ids` linked to `user_id` through a (user, recipe) join table.
async fn member_ids<C, E>(
    conn: &C,
    user_col: E::Column,
    recipe_col: E::Column,
    user_id: Uuid,
    recipe_ids: &[Uuid],
) -> AppResult<HashSet<Uuid>>
where
    C: ConnectionTrait,
    E: EntityTrait,
{
    let ids = E::find()
        .select_only()
        .column(recipe_col)
        .filter(user_col.eq(user_id))
        .filter(recipe_col.is_in(recipe_ids.iter().copied()))
        .into_tuple::<Uuid>()
        .all(conn)
        .await?;
    Ok(ids.into_iter().collect())
}

/// Expand recipe rows into their full representation, batching every lookup
/// across the whole page.
pub async fn build_recipe_views<C: ConnectionTrait>(
    conn: &C,
    recipes: Vec<RecipeModel>,
    viewer: Option<Uuid>,
) -> AppResult<Vec<Recipe>> {
    if recipes.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<Uuid> = recipes.iter().map(|r| r.id).collect();
    let author_ids: Vec<Uuid> = recipes
        .iter()
        .map(|r| r.author_id)
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();

    let authors: HashMap<Uuid, UserModel> = Users::find()
        .filter(UserCol::Id.is_in(author_ids.clone()))
        .all(conn)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();
    let followed = subscribed_author_ids(conn, viewer, &author_ids).await?;

    let mut tags: HashMap<Uuid, Vec<Tag>> = HashMap::new();
    let tag_rows = RecipeTags::find()
        .select_only()
        .column(RecipeTagCol::RecipeId)
        .column_as(TagCol::Id, "id")
        .column_as(TagCol::Name, "name")
        .column_as(TagCol::Color, "color")
        .column_as(TagCol::Slug, "slug")
        .join(JoinType::InnerJoin, recipe_tags::Relation::Tags.def())
        .filter(RecipeTagCol::RecipeId.is_in(ids.clone()))
        .order_by_asc(TagCol::Name)
        .into_model::<RecipeTagRow>()
        .all(conn)
        .await?;
    for row in tag_rows {
        tags.entry(row.recipe_id).or_default().push(Tag {
            id: row.id,
            name: row.name,
            color: row.color,
            slug: row.slug,
        });
    }

    let mut ingredients: HashMap<Uuid, Vec<RecipeIngredient>> = HashMap::new();
    let ingredient_rows = RecipeIngredients::find()
        .select_only()
        .column(RecipeIngredientCol::RecipeId)
        .column_as(IngredientCol::Id, "id")
        .column_as(IngredientCol::Name, "name")
        .column_as(IngredientCol::MeasurementUnit, "measurement_unit")
        .column(RecipeIngredientCol::Amount)
        .join(
            JoinType::InnerJoin,
            recipe_ingredients::Relation::Ingredients.def(),
        )
        .filter(RecipeIngredientCol::RecipeId.is_in(ids.clone()))
        .order_by_asc(IngredientCol::Name)
        .into_model::<RecipeIngredientRow>()
        .all(conn)
        .await?;
    for row in ingredient_rows {
        ingredients
            .entry(row.recipe_id)
            .or_default()
            .push(RecipeIngredient {
                id: row.id,
                name: row.name,
                measurement_unit: row.measurement_unit,
                amount: row.amount,
            });
    }

    let (favorited, in_cart) = match viewer {
        Some(viewer) => (
            member_ids::<_, Favorites>(conn, FavCol::UserId, FavCol::RecipeId, viewer, &ids)
                .await?,
            member_ids::<_, ShoppingCarts>(conn, CartCol::UserId, CartCol::RecipeId, viewer, &ids)
                .await?,
        ),
        None => (HashSet::new(), HashSet::new()),
    };

    recipes
        .into_iter()
        .map(|recipe| {
            let author = authors
                .get(&recipe.author_id)
                .cloned()
                .ok_or_else(|| AppError::Internal(anyhow::anyhow!("recipe author missing")))?;
            let is_subscribed = followed.contains(&author.id);
            Ok(Recipe {
                id: recipe.id,
                tags: tags.remove(&recipe.id).unwrap_or_default(),
                author: user_from_entity(author, is_subscribed),
                ingredients: ingredients.remove(&recipe.id).unwrap_or_default(),
                is_favorited: favorited.contains(&recipe.id),
                is_in_shopping_cart: in_cart.contains(&recipe.id),
                name: recipe.name,
                image: media_url(&recipe.image),
                text: recipe.text,
                cooking_time: recipe.cooking_time,
                pub_date: recipe.pub_date.with_timezone(&Utc),
            })
        })
        .collect()
}

async fn single_view<C: ConnectionTrait>(
    conn: &C,
    recipe: RecipeModel,
    viewer: Option<Uuid>,
) -> AppResult<Recipe> {
    build_recipe_views(conn, vec![recipe], viewer)
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("missing recipe view")))
}

pub async fn list_recipes(
    state: &AppState,
    viewer: Option<&AuthUser>,
    query: RecipeQuery,
) -> AppResult<ApiResponse<RecipeList>> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();

    if let Some(author) = query.author {
        condition = condition.add(RecipeCol::AuthorId.eq(author));
    }

    let slugs = query.tag_slugs();
    if !slugs.is_empty() {
        let tagged = Query::select()
            .column((RecipeTags, RecipeTagCol::RecipeId))
            .from(RecipeTags)
            .inner_join(
                Tags,
                Expr::col((Tags, TagCol::Id)).equals((RecipeTags, RecipeTagCol::TagId)),
            )
            .and_where(TagCol::Slug.is_in(slugs))
            .to_owned();
        condition = condition.add(RecipeCol::Id.in_subquery(tagged));
    }

    // Favorite and cart filters only mean something for a known user.
    if let Some(viewer) = viewer {
        if query.favorited_only() {
            let favorited = Query::select()
                .column(FavCol::RecipeId)
                .from(Favorites)
                .and_where(FavCol::UserId.eq(viewer.user_id))
                .to_owned();
            condition = condition.add(RecipeCol::Id.in_subquery(favorited));
        }
        if query.in_cart_only() {
            let in_cart = Query::select()
                .column(CartCol::RecipeId)
                .from(ShoppingCarts)
                .and_where(CartCol::UserId.eq(viewer.user_id))
                .to_owned();
            condition = condition.add(RecipeCol::Id.in_subquery(in_cart));
        }
    }

    let finder = Recipes::find()
        .filter(condition)
        .order_by_desc(RecipeCol::PubDate)
        .order_by_desc(RecipeCol::Id);

    let total = finder.clone().count(&state.orm).await? as i64;
    let recipes = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let items = build_recipe_views(&state.orm, recipes, viewer.map(|v| v.user_id)).await?;

    Ok(ApiResponse::page("Recipes", RecipeList { items }, page, limit, total))
}

pub async fn get_recipe(
    state: &AppState,
    viewer: Option<&AuthUser>,
    id: Uuid,
) -> AppResult<ApiResponse<Recipe>> {
    let recipe = find_recipe(&state.orm, id).await?;
    let view = single_view(&state.orm, recipe, viewer.map(|v| v.user_id)).await?;
    Ok(ApiResponse::success("Recipe", view, None))
}

/// Swap the recipe's tag set and ingredient rows for the given ones.
/// Unknown tags are a validation error; unknown ingredients are not found.
async fn replace_relations<C: ConnectionTrait>(
    conn: &C,
    recipe_id: Uuid,
    tag_ids: &[Uuid],
    ingredients: &[IngredientAmount],
) -> AppResult<()> {
    RecipeTags::delete_many()
        .filter(RecipeTagCol::RecipeId.eq(recipe_id))
        .exec(conn)
        .await?;
    RecipeIngredients::delete_many()
        .filter(RecipeIngredientCol::RecipeId.eq(recipe_id))
        .exec(conn)
        .await?;

    if !tag_ids.is_empty() {
        let known: HashSet<Uuid> = Tags::find()
            .select_only()
            .column(TagCol::Id)
            .filter(TagCol::Id.is_in(tag_ids.iter().copied()))
            .into_tuple::<Uuid>()
            .all(conn)
            .await?
            .into_iter()
            .collect();
        if let Some(missing) = tag_ids.iter().find(|id| !known.contains(id)) {
            return Err(AppError::bad_request(format!("Tag {missing} does not exist")));
        }

        RecipeTags::insert_many(tag_ids.iter().map(|tag_id| RecipeTagActive {
            recipe_id: Set(recipe_id),
            tag_id: Set(*tag_id),
        }))
        .exec_without_returning(conn)
        .await?;
    }

    let ingredient_ids: Vec<Uuid> = ingredients.iter().map(|i| i.id).collect();
    let known: HashSet<Uuid> = Ingredients::find()
        .select_only()
        .column(IngredientCol::Id)
        .filter(IngredientCol::Id.is_in(ingredient_ids))
        .into_tuple::<Uuid>()
        .all(conn)
        .await?
        .into_iter()
        .collect();
    if ingredients.iter().any(|i| !known.contains(&i.id)) {
        return Err(AppError::NotFound);
    }

    RecipeIngredients::insert_many(ingredients.iter().map(|item| RecipeIngredientActive {
        id: Set(Uuid::new_v4()),
        recipe_id: Set(recipe_id),
        ingredient_id: Set(item.id),
        amount: Set(item.amount),
    }))
    .exec_without_returning(conn)
    .await
    .map_err(|e| {
        AppError::on_conflict(e, "the same ingredient cannot be added to a recipe twice")
    })?;

    Ok(())
}

/// Roll back after a failed write; the write's own error is what the caller sees.
async fn rollback(txn: DatabaseTransaction) {
    if let Err(err) = txn.rollback().await {
        tracing::warn!(error = %err, "transaction rollback failed");
    }
}

pub async fn create_recipe(
    state: &AppState,
    user: &AuthUser,
    payload: CreateRecipeRequest,
) -> AppResult<ApiResponse<Recipe>> {
    validate_recipe_ingredients(&payload.ingredients)?;
    validate_text("name", &payload.name, Some(MAX_NAME_LEN))?;
    validate_text("text", &payload.text, None)?;
    validate_cooking_time(payload.cooking_time)?;
    let tag_ids = dedup_tags(&payload.tags);

    let image = media::save_image(&state.config.media_root, &payload.image).await?;

    let txn = state.orm.begin().await?;
    let created = async {
        let recipe = RecipeActive {
            id: Set(Uuid::new_v4()),
            author_id: Set(user.user_id),
            name: Set(payload.name),
            text: Set(payload.text),
            image: Set(image.clone()),
            cooking_time: Set(payload.cooking_time),
            pub_date: NotSet,
        }
        .insert(&txn)
        .await?;
        replace_relations(&txn, recipe.id, &tag_ids, &payload.ingredients).await?;
        Ok::<_, AppError>(recipe)
    }
    .await;

    let recipe = match created {
        Ok(recipe) => {
            if let Err(err) = txn.commit().await {
                media::remove_image(&state.config.media_root, &image).await;
                return Err(err.into());
            }
            recipe
        }
        Err(err) => {
            media::remove_image(&state.config.media_root, &image).await;
            rollback(txn).await;
            return Err(err);
        }
    };

    tracing::info!(recipe_id = %recipe.id, author_id = %user.user_id, "recipe created");
    audit::record(
        &state.pool,
        user.user_id,
        "recipe_create",
        "recipes",
        serde_json::json!({ "recipe_id": recipe.id }),
    )
    .await;

    let view = single_view(&state.orm, recipe, Some(user.user_id)).await?;
    Ok(ApiResponse::success("Recipe created", view, Some(Meta::empty())))
}

pub async fn update_recipe(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateRecipeRequest,
) -> AppResult<ApiResponse<Recipe>> {
    let existing = find_recipe(&state.orm, id).await?;
    ensure_author_or_admin(user, existing.author_id)?;

    validate_recipe_ingredients(&payload.ingredients)?;
    if let Some(name) = &payload.name {
        validate_text("name", name, Some(MAX_NAME_LEN))?;
    }
    if let Some(text) = &payload.text {
        validate_text("text", text, None)?;
    }
    if let Some(minutes) = payload.cooking_time {
        validate_cooking_time(minutes)?;
    }
    let tag_ids = dedup_tags(&payload.tags);

    let new_image = match &payload.image {
        Some(data) => Some(media::save_image(&state.config.media_root, data).await?),
        None => None,
    };
    let old_image = existing.image.clone();

    let txn = state.orm.begin().await?;
    let updated = async {
        replace_relations(&txn, existing.id, &tag_ids, &payload.ingredients).await?;

        let mut active: RecipeActive = existing.clone().into();
        let mut changed = false;
        if let Some(name) = payload.name {
            active.name = Set(name);
            changed = true;
        }
        if let Some(text) = payload.text {
            active.text = Set(text);
            changed = true;
        }
        if let Some(minutes) = payload.cooking_time {
            active.cooking_time = Set(minutes);
            changed = true;
        }
        if let Some(image) = &new_image {
            active.image = Set(image.clone());
            changed = true;
        }

        if changed {
            Ok::<_, AppError>(active.update(&txn).await?)
        } else {
            Ok(existing)
        }
    }
    .await;

    let recipe = match updated {
        Ok(recipe) => match txn.commit().await {
            Ok(()) => recipe,
            Err(err) => {
                if let Some(image) = &new_image {
                    media::remove_image(&state.config.media_root, image).await;
                }
                return Err(err.into());
            }
        },
        Err(err) => {
            if let Some(image) = &new_image {
                media::remove_image(&state.config.media_root, image).await;
            }
            rollback(txn).await;
            return Err(err);
        }
    };

    if new_image.is_some() {
        media::remove_image(&state.config.media_root, &old_image).await;
    }

    tracing::info!(recipe_id = %recipe.id, user_id = %user.user_id, "recipe updated");
    audit::record(
        &state.pool,
        user.user_id,
        "recipe_update",
        "recipes",
        serde_json::json!({ "recipe_id": recipe.id }),
    )
    .await;

    let view = single_view(&state.orm, recipe, Some(user.user_id)).await?;
    Ok(ApiResponse::success("Updated", view, Some(Meta::empty())))
}

pub async fn delete_recipe(state: &AppState, user: &AuthUser, id: Uuid) -> AppResult<()> {
    let existing = find_recipe(&state.orm, id).await?;
    ensure_author_or_admin(user, existing.author_id)?;

    let result = Recipes::delete_by_id(existing.id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }
    media::remove_image(&state.config.media_root, &existing.image).await;

    tracing::info!(recipe_id = %id, user_id = %user.user_id, "recipe deleted");
    audit::record(
        &state.pool,
        user.user_id,
        "recipe_delete",
        "recipes",
        serde_json::json!({ "recipe_id": id }),
    )
    .await;

    Ok(())
}

/// Minimal representation straight from SQL; used by the favorite and cart toggles.
pub async fn find_recipe_short(pool: &DbPool, id: Uuid) -> AppResult<RecipeShort> {
    let recipe: Option<RecipeShort> =
        sqlx::query_as("SELECT id, name, image, cooking_time FROM recipes WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    let mut recipe = recipe.ok_or(AppError::NotFound)?;
    recipe.image = media_url(&recipe.image);
    Ok(recipe)
}
