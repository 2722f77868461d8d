use std::collections::{HashMap, HashSet};

use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Query;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::users::SubscriptionList,
    entity::{
        recipes::{Column as RecipeCol, Entity as Recipes},
        subscriptions::{
            ActiveModel as SubscriptionActive, Column as SubCol, Entity as Subscriptions,
        },
        users::{Column as UserCol, Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{RecipeShort, Subscription},
    response::{ApiResponse, Meta},
    routes::params::SubscriptionQuery,
    services::{recipe_service::short_from_entity, user_service::user_from_entity},
    state::AppState,
};

const ALREADY_SUBSCRIBED: &str = "You are already subscribed to this user";

/// Which of `author_ids` the viewer follows. Anonymous viewers follow nobody.
pub async fn subscribed_author_ids<C: ConnectionTrait>(
    conn: &C,
    viewer: Option<Uuid>,
    author_ids: &[Uuid],
) -> AppResult<HashSet<Uuid>> {
    let Some(viewer) = viewer else {
        return Ok(HashSet::new());
    };
    if author_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let followed = Subscriptions::find()
        .select_only()
        .column(SubCol::AuthorId)
        .filter(SubCol::UserId.eq(viewer))
        .filter(SubCol::AuthorId.is_in(author_ids.iter().copied()))
        .into_tuple::<Uuid>()
        .all(conn)
        .await?;

    Ok(followed.into_iter().collect())
}

/// Build the subscription view for each author: newest recipes first,
/// truncated to `recipes_limit`, with the untruncated count alongside.
pub async fn author_previews<C: ConnectionTrait>(
    conn: &C,
    authors: Vec<UserModel>,
    recipes_limit: Option<u64>,
) -> AppResult<Vec<Subscription>> {
    let ids: Vec<Uuid> = authors.iter().map(|a| a.id).collect();
    let recipes = if ids.is_empty() {
        Vec::new()
    } else {
        Recipes::find()
            .filter(RecipeCol::AuthorId.is_in(ids))
            .order_by_desc(RecipeCol::PubDate)
            .order_by_desc(RecipeCol::Id)
            .all(conn)
            .await?
    };

    let mut by_author: HashMap<Uuid, (Vec<RecipeShort>, i64)> = HashMap::new();
    for recipe in recipes {
        let entry = by_author.entry(recipe.author_id).or_default();
        entry.1 += 1;
        if recipes_limit.is_none_or(|limit| (entry.0.len() as u64) < limit) {
            entry.0.push(short_from_entity(recipe));
        }
    }

    Ok(authors
        .into_iter()
        .map(|author| {
            let (recipes, recipes_count) = by_author.remove(&author.id).unwrap_or_default();
            Subscription {
                author: user_from_entity(author, true),
                recipes,
                recipes_count,
            }
        })
        .collect())
}

pub async fn subscribe(
    state: &AppState,
    user: &AuthUser,
    author_id: Uuid,
    recipes_limit: Option<u64>,
) -> AppResult<ApiResponse<Subscription>> {
    let author = Users::find_by_id(author_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if author.id == user.user_id {
        return Err(AppError::bad_request("You cannot subscribe to yourself"));
    }

    let existing = Subscriptions::find()
        .filter(SubCol::UserId.eq(user.user_id))
        .filter(SubCol::AuthorId.eq(author.id))
        .one(&state.orm)
        .await?;
    if existing.is_some() {
        return Err(AppError::bad_request(ALREADY_SUBSCRIBED));
    }

    SubscriptionActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        author_id: Set(author.id),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await
    .map_err(|e| AppError::on_conflict(e, ALREADY_SUBSCRIBED))?;

    tracing::info!(user_id = %user.user_id, author_id = %author.id, "subscribed");
    audit::record(
        &state.pool,
        user.user_id,
        "subscribe",
        "subscriptions",
        serde_json::json!({ "author_id": author.id }),
    )
    .await;

    let view = author_previews(&state.orm, vec![author], recipes_limit)
        .await?
        .pop()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("missing subscription view")))?;

    Ok(ApiResponse::success("Subscribed", view, Some(Meta::empty())))
}

pub async fn unsubscribe(state: &AppState, user: &AuthUser, author_id: Uuid) -> AppResult<()> {
    let author = Users::find_by_id(author_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let result = Subscriptions::delete_many()
        .filter(SubCol::UserId.eq(user.user_id))
        .filter(SubCol::AuthorId.eq(author.id))
        .exec(&state.orm)
        .await?;

    if result.rows_affected == 0 {
        return Err(AppError::bad_request("You are not subscribed to this user"));
    }

    tracing::info!(user_id = %user.user_id, author_id = %author.id, "unsubscribed");
    audit::record(
        &state.pool,
        user.user_id,
        "unsubscribe",
        "subscriptions",
        serde_json::json!({ "author_id": author.id }),
    )
    .await;

    Ok(())
}

pub async fn list_subscriptions(
    state: &AppState,
    user: &AuthUser,
    query: SubscriptionQuery,
) -> AppResult<ApiResponse<SubscriptionList>> {
    let (page, limit, offset) = query.pagination().normalize();

    let followed = Query::select()
        .column(SubCol::AuthorId)
        .from(Subscriptions)
        .and_where(SubCol::UserId.eq(user.user_id))
        .to_owned();

    let finder = Users::find()
        .filter(UserCol::Id.in_subquery(followed))
        .order_by_asc(UserCol::Username);

    let total = finder.clone().count(&state.orm).await? as i64;
    let authors = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let items = author_previews(&state.orm, authors, query.recipes_limit).await?;

    Ok(ApiResponse::page(
        "Subscriptions",
        SubscriptionList { items },
        page,
        limit,
        total,
    ))
}
