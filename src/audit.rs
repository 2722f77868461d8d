//! Append-only trail of account and content mutations.

use serde_json::Value;
use uuid::Uuid;

use crate::db::DbPool;

/// Record an audit entry without failing the surrounding request.
///
/// `resource` names the table that was touched; `metadata` carries the ids
/// needed to find the affected rows later.
pub async fn record(pool: &DbPool, user_id: Uuid, action: &str, resource: &str, metadata: Value) {
    let inserted = sqlx::query(
        r#"
        INSERT INTO audit_logs (id, user_id, action, resource, metadata)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(action)
    .bind(resource)
    .bind(metadata)
    .execute(pool)
    .await;

    if let Err(err) = inserted {
        tracing::warn!(error = %err, action, resource, "audit log failed");
    }
}
