//! JWT authentication middleware.

use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, Request},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::web::error::ApiError;

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID).
    pub sub: i64,
    pub username: String,
    /// `regular` or `admin` at issue time. Informational for clients;
    /// handlers authorize against the stored account.
    pub role: String,
    /// Issued at timestamp.
    pub iat: u64,
    /// Expiration timestamp.
    pub exp: u64,
    /// JWT ID (unique identifier).
    pub jti: String,
}

/// Decoding side of the JWT setup, shared through request extensions.
#[derive(Clone)]
pub struct JwtState {
    pub decoding_key: DecodingKey,
    pub validation: Validation,
}

impl JwtState {
    pub fn new(secret: &str) -> Self {
        let decoding_key = DecodingKey::from_secret(secret.as_bytes());
        let mut validation = Validation::default();
        validation.validate_exp = true;

        Self {
            decoding_key,
            validation,
        }
    }

    /// Decode and validate an access token.
    pub fn verify(&self, token: &str) -> Result<JwtClaims, ApiError> {
        decode::<JwtClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("JWT validation failed: {}", e);
                ApiError::unauthorized("Invalid or expired token")
            })
    }
}

/// Token from `Authorization: Bearer`, or the `token` query parameter so
/// download links can be opened directly.
fn extract_token(parts: &Parts) -> Option<String> {
    if let Some(auth_header) = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
    {
        return auth_header.strip_prefix("Bearer ").map(|t| t.to_string());
    }

    parts.uri.query()?.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key == "token" {
            urlencoding::decode(value).ok().map(|s| s.into_owned())
        } else {
            None
        }
    })
}

/// Extractor for authenticated users.
#[derive(Debug, Clone)]
pub struct AuthUser(pub JwtClaims);

impl AuthUser {
    pub fn user_id(&self) -> i64 {
        self.0.sub
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    fn from_request_parts<'life0, 'life1, 'async_trait>(
        parts: &'life0 mut Parts,
        _state: &'life1 S,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self, Self::Rejection>> + Send + 'async_trait>,
    >
    where
        'life0: 'async_trait,
        'life1: 'async_trait,
        Self: 'async_trait,
    {
        Box::pin(async move {
            let token =
                extract_token(parts).ok_or_else(|| ApiError::unauthorized("Missing authorization"))?;

            let jwt_state = parts.extensions.get::<Arc<JwtState>>().ok_or_else(|| {
                tracing::error!("JWT state missing from request extensions");
                ApiError::internal("An internal error occurred")
            })?;

            Ok(AuthUser(jwt_state.verify(&token)?))
        })
    }
}

/// Middleware function to inject JWT state into request extensions.
pub async fn jwt_auth(
    jwt_state: Arc<JwtState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    request.extensions_mut().insert(jwt_state);
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn claims(role: &str, exp_offset: i64) -> JwtClaims {
        let now = chrono::Utc::now().timestamp();
        JwtClaims {
            sub: 7,
            username: "alice".to_string(),
            role: role.to_string(),
            iat: now as u64,
            exp: (now + exp_offset) as u64,
            jti: uuid::Uuid::new_v4().to_string(),
        }
    }

    fn sign(secret: &str, claims: &JwtClaims) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn parts_for(uri: &str, auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = auth {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_verify_token() {
        let state = JwtState::new("test-secret");
        let token = sign("test-secret", &claims("admin", 3600));

        let decoded = state.verify(&token).unwrap();
        assert_eq!(decoded.sub, 7);
        assert_eq!(decoded.role, "admin");
    }

    #[test]
    fn test_expired_token_rejected() {
        let state = JwtState::new("test-secret");
        let token = sign("test-secret", &claims("regular", -3600));
        assert!(state.verify(&token).is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let state = JwtState::new("secret2");
        let token = sign("secret1", &claims("regular", 3600));
        assert!(state.verify(&token).is_err());
    }

    #[test]
    fn test_extract_token_sources() {
        let parts = parts_for("/api/files", Some("Bearer abc"));
        assert_eq!(extract_token(&parts).as_deref(), Some("abc"));

        let parts = parts_for("/api/files/1/download?x=1&token=a%2Eb", None);
        assert_eq!(extract_token(&parts).as_deref(), Some("a.b"));

        let parts = parts_for("/api/files", Some("Basic abc"));
        assert_eq!(extract_token(&parts), None);

        let parts = parts_for("/api/files", None);
        assert_eq!(extract_token(&parts), None);
    }

    #[tokio::test]
    async fn test_extractor_uses_injected_state() {
        let state = Arc::new(JwtState::new("s"));
        let token = sign("s", &claims("regular", 3600));
        let mut parts = parts_for("/", Some(&format!("Bearer {token}")));
        parts.extensions.insert(state);

        let user = AuthUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(user.user_id(), 7);
        assert_eq!(user.0.username, "alice");
    }
}
