// Bearer-token authentication: decodes externally issued JWTs and injects a
// ViewerContext into request extensions. Tokens are never issued here.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::infrastructure::middleware::viewer::{UserIdentity, ViewerContext};

/// Claims carried by the upstream-issued access token.
#[derive(Debug, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// Validates HS256 bearer tokens against the shared secret.
pub struct JwtAuthenticator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Decode a token into an identity. Any invalid, expired, or malformed
    /// token yields `None`; required-auth decisions happen at the handler.
    pub fn identity_from_token(&self, token: &str) -> Option<UserIdentity> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).ok()?;
        let user_id = data.claims.sub.parse::<i64>().ok()?;
        let username = data
            .claims
            .username
            .or(data.claims.name)
            .unwrap_or_default();

        Some(UserIdentity {
            user_id,
            username,
            avatar: data.claims.avatar,
        })
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Create the request-scoped ViewerContext and stash it in extensions. An
/// absent or invalid token degrades to an anonymous viewer; write handlers
/// turn that into a 401 via `require_user`.
pub async fn viewer_context_middleware(
    State(auth): State<Arc<JwtAuthenticator>>,
    mut request: Request,
    next: Next,
) -> Response {
    let request_id = format!("req-{}", Uuid::new_v4());

    let viewer_context = match bearer_token(request.headers())
        .and_then(|token| auth.identity_from_token(token))
    {
        Some(identity) => ViewerContext::authenticated(request_id, identity),
        None => ViewerContext::anonymous(request_id),
    };

    request.extensions_mut().insert(Arc::new(viewer_context));

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "test-secret";

    fn token_for(claims: serde_json::Value) -> String {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    fn far_future() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[test]
    fn test_valid_token_resolves_identity() {
        let auth = JwtAuthenticator::new(SECRET);
        let token = token_for(json!({
            "sub": "42",
            "exp": far_future(),
            "username": "alice",
            "avatar": "https://cdn.example/a.png"
        }));

        let identity = auth.identity_from_token(&token).unwrap();
        assert_eq!(identity.user_id, 42);
        assert_eq!(identity.username, "alice");
        assert_eq!(identity.avatar.as_deref(), Some("https://cdn.example/a.png"));
    }

    #[test]
    fn test_name_claim_backfills_username() {
        let auth = JwtAuthenticator::new(SECRET);
        let token = token_for(json!({"sub": "7", "exp": far_future(), "name": "bob"}));

        let identity = auth.identity_from_token(&token).unwrap();
        assert_eq!(identity.username, "bob");
    }

    #[test]
    fn test_garbage_and_wrong_secret_are_rejected() {
        let auth = JwtAuthenticator::new(SECRET);
        assert!(auth.identity_from_token("not-a-token").is_none());

        let other = token_for(json!({"sub": "1", "exp": far_future()}));
        let wrong_secret = JwtAuthenticator::new("other-secret");
        assert!(wrong_secret.identity_from_token(&other).is_none());
    }

    #[test]
    fn test_non_numeric_subject_is_rejected() {
        let auth = JwtAuthenticator::new(SECRET);
        let token = token_for(json!({"sub": "alice", "exp": far_future()}));
        assert!(auth.identity_from_token(&token).is_none());
    }
}
