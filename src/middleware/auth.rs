use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::models::Actor;
use crate::routes::AppState;

const ADMIN_ROLES: [&str; 2] = ["admin", "super_admin"];

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String, // subject (employee) id
    #[serde(default)]
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        ADMIN_ROLES.contains(&self.role.as_str())
    }
}

/// Bearer 토큰에서 얻은 요청자
#[derive(Debug, Clone)]
pub struct AuthUser(pub Actor);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or(AuthError::MissingToken)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AuthError::InvalidToken)?;

        let claims = verify_access_token(token, &state.jwt_secret)?;

        Ok(AuthUser(Actor {
            is_admin: claims.is_admin(),
            subject_id: claims.sub,
        }))
    }
}

#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidToken,
    ExpiredToken,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (code, message) = match self {
            AuthError::MissingToken => ("missing_token", "Authorization token is required"),
            AuthError::InvalidToken => ("invalid_token", "Invalid authorization token"),
            AuthError::ExpiredToken => ("expired_token", "Authorization token has expired"),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (StatusCode::UNAUTHORIZED, body).into_response()
    }
}

/// 토큰 발급은 외부 인증 서비스의 일이지만, 같은 비밀키로 서명한 토큰을
/// 만들 수 있어야 운영 도구와 테스트에서 API를 호출할 수 있습니다.
pub fn create_access_token(
    subject_id: &str,
    role: &str,
    secret: &str,
    ttl: Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now();
    let claims = Claims {
        sub: subject_id.to_string(),
        role: role.to_string(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn verify_access_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
        _ => AuthError::InvalidToken,
    })?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_claim_decides_admin_rights() {
        let token = create_access_token("emp-1", "super_admin", "secret", Duration::minutes(5)).unwrap();
        let claims = verify_access_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, "emp-1");
        assert!(claims.is_admin());

        let token = create_access_token("emp-2", "employee", "secret", Duration::minutes(5)).unwrap();
        assert!(!verify_access_token(&token, "secret").unwrap().is_admin());
    }

    #[test]
    fn wrong_secret_and_expired_tokens_are_rejected() {
        let token = create_access_token("emp-1", "admin", "secret", Duration::minutes(5)).unwrap();
        assert!(matches!(
            verify_access_token(&token, "other"),
            Err(AuthError::InvalidToken)
        ));

        let expired = create_access_token("emp-1", "admin", "secret", Duration::hours(-2)).unwrap();
        assert!(matches!(
            verify_access_token(&expired, "secret"),
            Err(AuthError::ExpiredToken)
        ));
    }
}
