use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::{
    config::AppConfig,
    error::{AppError, AppResult},
    state::AppState,
};

const TOKEN_COOKIE: &str = "token";
const DEV_USER_HEADER: &str = "x-user-id";

/// Claims this service reads from a session token. Any `role` claim from the
/// issuer is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: usize,
}

/// An identity whose credential was verified. Carries no authorization.
#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub user_id: String,
    pub email: Option<String>,
}

pub fn require_identity(state: &AppState, headers: &HeaderMap) -> AppResult<VerifiedIdentity> {
    if state.config.auth_dev_overrides_enabled() {
        if let Some(user_id) = header_str(headers, DEV_USER_HEADER) {
            tracing::debug!(user_id = %user_id, "Using dev auth override");
            return Ok(VerifiedIdentity {
                user_id,
                email: None,
            });
        }
    }

    let token = session_token(headers)
        .ok_or_else(|| AppError::Unauthorized("Unauthorized: missing session token.".to_string()))?;
    let claims = verify_token(&state.config, &token)?;
    if claims.sub.trim().is_empty() {
        return Err(AppError::Unauthorized(
            "Unauthorized: token has no subject.".to_string(),
        ));
    }

    Ok(VerifiedIdentity {
        user_id: claims.sub.trim().to_string(),
        email: claims.email,
    })
}

pub fn verify_token(config: &AppConfig, token: &str) -> AppResult<TokenClaims> {
    let Some(secret) = config.jwt_secret.as_deref() else {
        tracing::error!("JWT_SECRET is not set, rejecting every session token");
        return Err(AppError::Unauthorized(
            "Unauthorized: token verification unavailable.".to_string(),
        ));
    };

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_required_spec_claims(&["exp", "sub"]);
    if let Some(issuer) = config.jwt_issuer.as_deref() {
        validation.set_issuer(&[issuer]);
    }

    decode::<TokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|error| {
        tracing::debug!(error = %error, "Session token rejected");
        AppError::Unauthorized("Unauthorized: invalid session token.".to_string())
    })
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = header_str(headers, header::AUTHORIZATION.as_str()) {
        let token = value
            .strip_prefix("Bearer ")
            .or_else(|| value.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty());
        if let Some(token) = token {
            return Some(token.to_string());
        }
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == TOKEN_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

#[cfg(test)]
pub(crate) fn sign_token_for_tests(secret: &str, sub: &str, extra_role: Option<&str>) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let exp = (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp();
    let mut claims = serde_json::json!({ "sub": sub, "exp": exp });
    if let Some(role) = extra_role {
        claims["role"] = serde_json::Value::String(role.to_string());
    }
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{session_token, sign_token_for_tests, verify_token};
    use crate::config::AppConfig;
    use axum::http::{header, HeaderMap, HeaderValue};

    #[test]
    fn reads_bearer_header_before_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(header::COOKIE, HeaderValue::from_static("token=xyz"));
        assert_eq!(session_token(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn falls_back_to_token_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; token=xyz; lang=fr"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("xyz"));
        assert_eq!(session_token(&HeaderMap::new()), None);
    }

    #[test]
    fn accepts_valid_token_and_ignores_role_claim() {
        let config = AppConfig::for_tests();
        let token = sign_token_for_tests("test-secret", "user-1", Some("admin"));
        let claims = verify_token(&config, &token).expect("token should verify");
        assert_eq!(claims.sub, "user-1");
    }

    #[test]
    fn rejects_token_signed_with_another_secret() {
        let config = AppConfig::for_tests();
        let token = sign_token_for_tests("other-secret", "user-1", None);
        assert!(verify_token(&config, &token).is_err());
        assert!(verify_token(&config, "not-a-jwt").is_err());
    }
}
