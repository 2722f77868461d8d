use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

use crate::{dto::auth::Claims, error::AppError, state::AppState};

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

pub fn ensure_role(user: &AuthUser, role: &str) -> Result<(), AppError> {
    if user.role != role {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, ROLE_ADMIN)
}

/// Writes to a recipe are reserved for its author and admins.
pub fn ensure_author_or_admin(user: &AuthUser, author_id: Uuid) -> Result<(), AppError> {
    if user.user_id == author_id || user.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

fn decode_bearer(auth_header: &header::HeaderValue, secret: &str) -> Result<AuthUser, AppError> {
    let auth_str = auth_header
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid Authorization header".into()))?;

    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Invalid Authorization scheme".into()))?
        .trim();

    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))?;

    let user_id = Uuid::parse_str(&decoded.claims.sub)
        .map_err(|_| AppError::Unauthorized("Invalid user id in token".into()))?;

    Ok(AuthUser {
        user_id,
        role: decoded.claims.role,
    })
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

        decode_bearer(auth_header, &state.config.jwt_secret)
    }
}

/// Anonymous requests resolve to `None`; a present but broken token is still rejected.
impl OptionalFromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Option<Self>, Self::Rejection> {
        match parts.headers.get(header::AUTHORIZATION) {
            Some(value) => decode_bearer(value, &state.config.jwt_secret).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header, encode};

    fn token(secret: &str, sub: &str, exp: usize) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            role: ROLE_USER.to_string(),
            exp,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn far_future() -> usize {
        (chrono::Utc::now().timestamp() + 3600) as usize
    }

    #[test]
    fn decodes_valid_bearer_token() {
        let id = Uuid::new_v4();
        let raw = token("s3cret", &id.to_string(), far_future());
        let value = header::HeaderValue::from_str(&format!("Bearer {raw}")).unwrap();
        let user = decode_bearer(&value, "s3cret").unwrap();
        assert_eq!(user.user_id, id);
        assert!(!user.is_admin());
    }

    #[test]
    fn rejects_wrong_secret_and_scheme() {
        let raw = token("s3cret", &Uuid::new_v4().to_string(), far_future());
        let value = header::HeaderValue::from_str(&format!("Bearer {raw}")).unwrap();
        assert!(matches!(
            decode_bearer(&value, "other"),
            Err(AppError::Unauthorized(_))
        ));

        let value = header::HeaderValue::from_str(&format!("Token {raw}")).unwrap();
        assert!(decode_bearer(&value, "s3cret").is_err());
    }

    #[test]
    fn author_or_admin_guard() {
        let author = Uuid::new_v4();
        let owner = AuthUser {
            user_id: author,
            role: ROLE_USER.into(),
        };
        let stranger = AuthUser {
            user_id: Uuid::new_v4(),
            role: ROLE_USER.into(),
        };
        let admin = AuthUser {
            user_id: Uuid::new_v4(),
            role: ROLE_ADMIN.into(),
        };
        assert!(ensure_author_or_admin(&owner, author).is_ok());
        assert!(ensure_author_or_admin(&admin, author).is_ok());
        assert!(matches!(
            ensure_author_or_admin(&stranger, author),
            Err(AppError::Forbidden)
        ));
    }
}
