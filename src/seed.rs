//! Idempotent bootstrap data: an admin account, default tags, ingredients.

use std::path::Path;

use serde::Deserialize;
use uuid::Uuid;

use crate::{db::DbPool, middleware::auth::ROLE_ADMIN, services::auth_service::hash_password};

pub const DEFAULT_TAGS: [(&str, &str, &str); 3] = [
    ("Breakfast", "#e26c2d", "breakfast"),
    ("Lunch", "#49b64e", "lunch"),
    ("Dinner", "#8775d2", "dinner"),
];

#[derive(Debug, Deserialize)]
pub struct IngredientRecord {
    pub name: String,
    pub measurement_unit: String,
}

/// Promote the account owning `email` to admin, creating it when absent.
///
/// Emails are matched lowercased, the same way registration stores them.
pub async fn ensure_admin(
    pool: &DbPool,
    email: &str,
    username: &str,
    password: &str,
) -> anyhow::Result<Uuid> {
    let email = email.trim().to_lowercase();

    let promoted: Option<(Uuid,)> =
        sqlx::query_as("UPDATE users SET role = $2 WHERE email = $1 RETURNING id")
            .bind(email.as_str())
            .bind(ROLE_ADMIN)
            .fetch_optional(pool)
            .await?;
    if let Some((id,)) = promoted {
        tracing::info!(%email, "existing account promoted to admin");
        return Ok(id);
    }

    let taken: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await?;
    if taken.is_some() {
        anyhow::bail!(
            "username '{username}' belongs to another account; choose a different admin username"
        );
    }

    let password_hash = hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (email, username, password_hash, role)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(email.as_str())
    .bind(username)
    .bind(password_hash)
    .bind(ROLE_ADMIN)
    .fetch_one(pool)
    .await?;

    tracing::info!(%email, %username, "admin account created");
    Ok(id)
}

pub async fn seed_tags(pool: &DbPool) -> anyhow::Result<()> {
    for (name, color, slug) in DEFAULT_TAGS {
        sqlx::query(
            r#"
            INSERT INTO tags (name, color, slug)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(name)
        .bind(color)
        .bind(slug)
        .execute(pool)
        .await?;
    }
    Ok(())
}

/// Read `[{"name": .., "measurement_unit": ..}]` records from a JSON file.
pub fn load_ingredients(path: &Path) -> anyhow::Result<Vec<IngredientRecord>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Insert the records, skipping (name, unit) pairs that already exist.
/// Returns how many rows were added.
pub async fn seed_ingredients(pool: &DbPool, records: &[IngredientRecord]) -> anyhow::Result<u64> {
    let mut inserted = 0;
    for record in records {
        let result = sqlx::query(
            r#"
            INSERT INTO ingredients (name, measurement_unit)
            SELECT $1, $2
            WHERE NOT EXISTS (
                SELECT 1 FROM ingredients WHERE name = $1 AND measurement_unit = $2
            )
            "#,
        )
        .bind(record.name.trim())
        .bind(record.measurement_unit.trim())
        .execute(pool)
        .await?;
        inserted += result.rows_affected();
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_ingredient_file_parses() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("data/ingredients.json");
        let records = load_ingredients(&path).unwrap();
        assert!(!records.is_empty());
        assert!(records.iter().all(|r| !r.name.is_empty() && !r.measurement_unit.is_empty()));
    }
}
