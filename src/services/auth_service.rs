use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::OsRng;
use sqlx::FromRow;
use uuid::Uuid;

use crate::dto::auth::{Claims, LoginRequest, LoginResponse, RegisterRequest, SetPasswordRequest};
use crate::{
    audit,
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ROLE_USER},
    models::User,
    response::{ApiResponse, Meta},
    state::AppState,
    validation::{
        MAX_USER_FIELD_LEN, validate_email, validate_password, validate_username,
    },
};

#[derive(FromRow)]
struct Credentials {
    id: Uuid,
    role: String,
    password_hash: String,
}

#[derive(FromRow)]
struct CreatedUser {
    id: Uuid,
    email: String,
    username: String,
    first_name: String,
    last_name: String,
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn issue_token(secret: &str, ttl_hours: i64, user_id: Uuid, role: &str) -> AppResult<String> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(ttl_hours))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_string(),
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub async fn register_user(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<User>> {
    let RegisterRequest {
        email,
        username,
        first_name,
        last_name,
        password,
    } = payload;
    let email = email.trim().to_lowercase();
    validate_email(&email)?;
    validate_username(&username)?;
    validate_password(&password)?;
    if first_name.chars().count() > MAX_USER_FIELD_LEN
        || last_name.chars().count() > MAX_USER_FIELD_LEN
    {
        return Err(AppError::bad_request(format!(
            "names must be at most {MAX_USER_FIELD_LEN} characters"
        )));
    }

    let exist: Option<(String,)> =
        sqlx::query_as("SELECT email FROM users WHERE email = $1 OR username = $2")
            .bind(email.as_str())
            .bind(username.as_str())
            .fetch_optional(&state.pool)
            .await?;
    if let Some((taken_email,)) = exist {
        let message = if taken_email == email {
            "Email is already taken"
        } else {
            "Username is already taken"
        };
        return Err(AppError::bad_request(message));
    }

    let password_hash = hash_password(&password)?;

    let user: CreatedUser = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, username, first_name, last_name, password_hash, role)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING id, email, username, first_name, last_name
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email.as_str())
    .bind(username.as_str())
    .bind(first_name)
    .bind(last_name)
    .bind(password_hash)
    .bind(ROLE_USER)
    .fetch_one(&state.pool)
    .await
    .map_err(|e| AppError::on_sqlx_conflict(e, "Email or username is already taken"))?;

    tracing::info!(user_id = %user.id, username = %user.username, "user registered");
    audit::record(
        &state.pool,
        user.id,
        "user_register",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    let user = User {
        id: user.id,
        email: user.email,
        username: user.username,
        first_name: user.first_name,
        last_name: user.last_name,
        is_subscribed: false,
    };
    Ok(ApiResponse::success("User created", user, Some(Meta::empty())))
}

pub async fn login_user(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let LoginRequest { email, password } = payload;
    let email = email.trim().to_lowercase();
    let user: Option<Credentials> =
        sqlx::query_as("SELECT id, role, password_hash FROM users WHERE email = $1")
            .bind(email.as_str())
            .fetch_optional(&state.pool)
            .await?;

    let user = match user {
        Some(u) => u,
        None => return Err(AppError::bad_request("Invalid email or password")),
    };

    if !verify_password(&password, &user.password_hash)? {
        return Err(AppError::bad_request("Invalid email or password"));
    }

    let token = issue_token(
        &state.config.jwt_secret,
        state.config.jwt_ttl_hours,
        user.id,
        &user.role,
    )?;
    let resp = LoginResponse {
        token: format!("Bearer {}", token),
    };

    audit::record(
        &state.pool,
        user.id,
        "user_login",
        "users",
        serde_json::json!({ "user_id": user.id }),
    )
    .await;

    Ok(ApiResponse::success("Logged in", resp, Some(Meta::empty())))
}

pub async fn set_password(
    state: &AppState,
    user: &AuthUser,
    payload: SetPasswordRequest,
) -> AppResult<()> {
    let current: Option<(String,)> =
        sqlx::query_as("SELECT password_hash FROM users WHERE id = $1")
            .bind(user.user_id)
            .fetch_optional(&state.pool)
            .await?;
    let (hash,) = current.ok_or(AppError::NotFound)?;

    if !verify_password(&payload.current_password, &hash)? {
        return Err(AppError::bad_request("Current password is incorrect"));
    }
    validate_password(&payload.new_password)?;

    sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
        .bind(user.user_id)
        .bind(hash_password(&payload.new_password)?)
        .execute(&state.pool)
        .await?;

    tracing::info!(user_id = %user.user_id, "password changed");
    audit::record(
        &state.pool,
        user.user_id,
        "password_change",
        "users",
        serde_json::json!({ "user_id": user.user_id }),
    )
    .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("battery staple", &hash).unwrap());
    }

    #[test]
    fn issued_token_carries_subject_and_role() {
        use jsonwebtoken::{DecodingKey, Validation, decode};

        let id = Uuid::new_v4();
        let token = issue_token("secret", 1, id, "admin").unwrap();
        let decoded = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(b"secret"),
            &Validation::default(),
        )
        .unwrap();
        assert_eq!(decoded.claims.sub, id.to_string());
        assert_eq!(decoded.claims.role, "admin");
    }
}
