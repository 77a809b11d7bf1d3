use axum::{extract::State, http::HeaderMap, Json};
use serde_json::{json, Value};

use crate::{access::resolve_role, auth::require_identity, error::AppResult, state::AppState};

/// The caller's verified identity and the role the access policy grants it.
pub async fn me(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Json<Value>> {
    let identity = require_identity(&state, &headers)?;
    let role = resolve_role(&state, &identity.user_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "userId": identity.user_id,
            "email": identity.email,
            "role": role,
        }
    })))
}
