use sea_orm::{EntityTrait, PaginatorTrait, QueryOrder, QuerySelect};
use uuid::Uuid;

use crate::{
    dto::users::UserList,
    entity::users::{Column as UserCol, Entity as Users, Model as UserModel},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::User,
    response::ApiResponse,
    routes::params::Pagination,
    services::subscription_service::subscribed_author_ids,
    state::AppState,
};

pub fn user_from_entity(model: UserModel, is_subscribed: bool) -> User {
    User {
        id: model.id,
        email: model.email,
        username: model.username,
        first_name: model.first_name,
        last_name: model.last_name,
        is_subscribed,
    }
}

pub async fn list_users(
    state: &AppState,
    viewer: Option<&AuthUser>,
    pagination: Pagination,
) -> AppResult<ApiResponse<UserList>> {
    let (page, limit, offset) = pagination.normalize();
    let finder = Users::find().order_by_asc(UserCol::Username);
    let total = finder.clone().count(&state.orm).await? as i64;

    let users = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let ids: Vec<Uuid> = users.iter().map(|u| u.id).collect();
    let followed = subscribed_author_ids(&state.orm, viewer.map(|v| v.user_id), &ids).await?;

    let items = users
        .into_iter()
        .map(|u| {
            let subscribed = followed.contains(&u.id);
            user_from_entity(u, subscribed)
        })
        .collect();

    Ok(ApiResponse::page("Users", UserList { items }, page, limit, total))
}

pub async fn get_user(
    state: &AppState,
    viewer: Option<&AuthUser>,
    id: Uuid,
) -> AppResult<ApiResponse<User>> {
    let user = Users::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let followed = subscribed_author_ids(&state.orm, viewer.map(|v| v.user_id), &[id]).await?;
    Ok(ApiResponse::success(
        "User",
        user_from_entity(user, followed.contains(&id)),
        None,
    ))
}

pub async fn me(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<User>> {
    let model = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success(
        "Current user",
        user_from_entity(model, false),
        None,
    ))
}
