use axum::http::HeaderMap;
use serde::Serialize;
use sqlx::{PgPool, Row};

use crate::{
    auth::{require_identity, VerifiedIdentity},
    error::{AppError, AppResult},
    state::AppState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Agent,
    Assistant,
    Client,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "admin" | "administrateur" | "administrator" => Some(Self::Admin),
            "agent" => Some(Self::Agent),
            "assistant" | "assistante" => Some(Self::Assistant),
            "client" | "customer" => Some(Self::Client),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Agent => "agent",
            Self::Assistant => "assistant",
            Self::Client => "client",
        }
    }
}

pub fn db_pool(state: &AppState) -> AppResult<&PgPool> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::ServiceUnavailable("Database is not configured. Set DATABASE_URL.".to_string())
    })
}

/// Role of `user_id` according to the `users` table. Deactivated or unknown
/// users have no role.
pub async fn resolve_role(state: &AppState, user_id: &str) -> AppResult<Role> {
    if let Some(role) = state.role_cache.get(user_id).await {
        return Ok(role);
    }

    let pool = db_pool(state)?;
    let row = sqlx::query(
        "SELECT role::text AS role, is_active
         FROM users
         WHERE id::text = $1
         LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Err(AppError::Unauthorized(
            "Unauthorized: unknown user.".to_string(),
        ));
    };
    let is_active = row.try_get::<Option<bool>, _>("is_active")?;
    let raw_role = row
        .try_get::<Option<String>, _>("role")?
        .unwrap_or_default();

    let role = role_for_account(&raw_role, is_active)?;
    state.role_cache.insert(user_id.to_string(), role).await;
    Ok(role)
}

pub async fn assert_role(state: &AppState, user_id: &str, allowed: &[Role]) -> AppResult<Role> {
    let role = resolve_role(state, user_id).await?;
    authorize(role, allowed)
}

/// Verifies the caller's credential, then checks the stored role is admin.
pub async fn require_admin(state: &AppState, headers: &HeaderMap) -> AppResult<VerifiedIdentity> {
    let identity = require_identity(state, headers)?;
    assert_role(state, &identity.user_id, &[Role::Admin]).await?;
    Ok(identity)
}

fn role_for_account(raw_role: &str, is_active: Option<bool>) -> AppResult<Role> {
    if is_active == Some(false) {
        return Err(AppError::Forbidden(
            "Forbidden: account is deactivated.".to_string(),
        ));
    }
    Role::parse(raw_role).ok_or_else(|| {
        tracing::warn!(role = %raw_role, "User has an unrecognised role");
        AppError::Forbidden("Forbidden: account has no usable role.".to_string())
    })
}

fn authorize(role: Role, allowed: &[Role]) -> AppResult<Role> {
    if allowed.contains(&role) {
        return Ok(role);
    }
    Err(AppError::Forbidden(format!(
        "Forbidden: role '{}' is not allowed for this action.",
        role.as_str()
    )))
}
