//! Authentication middleware and JWT verification

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    RequestExt,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::app::AppState;
use crate::game::UserId;
use crate::util::time::unix_millis;

type HmacSha256 = Hmac<Sha256>;

/// Claims of a player token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: UserId,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: u64,
    #[serde(default)]
    pub name: Option<String>,
}

/// Verify a JWT token and extract claims
pub fn verify_jwt(token: &str, secret: &str) -> Result<JwtClaims, AuthError> {
    let mut parts = token.split('.');
    let (header_b64, payload_b64, signature_b64) =
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(h), Some(p), Some(s), None) => (h, p, s),
            _ => return Err(AuthError::InvalidToken),
        };

    // HMAC-SHA256 over "header.payload"
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidToken)?;
    mac.update(header_b64.as_bytes());
    mac.update(b".");
    mac.update(payload_b64.as_bytes());

    let provided_signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AuthError::InvalidToken)?;
    mac.verify_slice(&provided_signature)
        .map_err(|_| AuthError::InvalidToken)?;

    let payload_json = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| AuthError::InvalidToken)?;
    let claims: JwtClaims =
        serde_json::from_slice(&payload_json).map_err(|_| AuthError::InvalidToken)?;

    if claims.exp < unix_millis() / 1000 {
        return Err(AuthError::TokenExpired);
    }

    Ok(claims)
}

/// Sign `claims` with `secret`. Used by tooling and tests to mint player tokens.
pub fn sign_jwt(claims: &JwtClaims, secret: &str) -> Result<String, AuthError> {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = serde_json::to_vec(claims).map_err(|_| AuthError::InvalidToken)?;
    let message = format!("{}.{}", header, URL_SAFE_NO_PAD.encode(payload));

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidToken)?;
    mac.update(message.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{}.{}", message, signature))
}

/// Authentication error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingHeader,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    #[error("User is not part of this round")]
    NotInRoster,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::MissingHeader => StatusCode::UNAUTHORIZED,
            AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::TokenExpired => StatusCode::UNAUTHORIZED,
            AuthError::NotInRoster => StatusCode::FORBIDDEN,
        };

        (status, self.to_string()).into_response()
    }
}

/// Authenticated user extractor result
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub claims: JwtClaims,
}

/// Verify `token` and check the subject plays in this round
pub fn authenticate(state: &AppState, token: &str) -> Result<AuthenticatedUser, AuthError> {
    let claims = verify_jwt(token, &state.config.jwt_secret)?;
    if !state.config.roster.contains(&claims.sub) {
        return Err(AuthError::NotInRoster);
    }
    Ok(AuthenticatedUser {
        user_id: claims.sub,
        claims,
    })
}

/// Middleware to require authentication
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let TypedHeader(Authorization(bearer)) = request
        .extract_parts::<TypedHeader<Authorization<Bearer>>>()
        .await
        .map_err(|_| AuthError::MissingHeader)?;

    let auth_user = authenticate(&state, bearer.token())?;

    // Insert into request extensions for handlers to access
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(sub: UserId, exp: u64) -> JwtClaims {
        JwtClaims {
            sub,
            exp,
            iat: 0,
            name: Some("tester".into()),
        }
    }

    #[test]
    fn signed_token_verifies() {
        let exp = unix_millis() / 1000 + 60;
        let token = sign_jwt(&claims(42, exp), "secret").unwrap();

        let verified = verify_jwt(&token, "secret").unwrap();
        assert_eq!(verified.sub, 42);
        assert_eq!(verified.name.as_deref(), Some("tester"));
    }

    #[test]
    fn wrong_secret_and_malformed_tokens_are_rejected() {
        let exp = unix_millis() / 1000 + 60;
        let token = sign_jwt(&claims(42, exp), "secret").unwrap();

        assert!(matches!(
            verify_jwt(&token, "other"),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            verify_jwt("a.b", "secret"),
            Err(AuthError::InvalidToken)
        ));
        assert!(matches!(
            verify_jwt(&format!("{}.x", token), "secret"),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let token = sign_jwt(&claims(1, 10), "secret").unwrap();
        assert!(matches!(
            verify_jwt(&token, "secret"),
            Err(AuthError::TokenExpired)
        ));
    }
}
