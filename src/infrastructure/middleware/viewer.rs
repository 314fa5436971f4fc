// Request-scoped viewer context: who is looking, injected by the auth
// middleware and consumed by handlers through the `Vc` extractor.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use std::sync::Arc;

use crate::error::{AppError, AppResult};

/// Identity resolved from a pre-issued, externally signed credential.
#[derive(Debug, Clone)]
pub struct UserIdentity {
    pub user_id: i64,
    pub username: String,
    pub avatar: Option<String>,
}

/// Per-request viewer context. Reads work with an anonymous viewer; write
/// handlers demand an identity through `require_user`.
#[derive(Debug, Clone)]
pub struct ViewerContext {
    pub request_id: String,
    user: Option<UserIdentity>,
}

impl ViewerContext {
    pub fn anonymous(request_id: String) -> Self {
        ViewerContext {
            request_id,
            user: None,
        }
    }

    pub fn authenticated(request_id: String, user: UserIdentity) -> Self {
        ViewerContext {
            request_id,
            user: Some(user),
        }
    }

    pub fn user(&self) -> Option<&UserIdentity> {
        self.user.as_ref()
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user.as_ref().map(|u| u.user_id)
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn require_user(&self) -> AppResult<&UserIdentity> {
        self.user
            .as_ref()
            .ok_or_else(|| AppError::Unauthorized("Missing bearer token".to_string()))
    }
}

/// Ergonomic ViewerContext wrapper with reference-like semantics; cloning
/// only bumps the inner Arc.
#[derive(Debug, Clone)]
pub struct Vc(Arc<ViewerContext>);

impl Vc {
    pub fn new(vc: Arc<ViewerContext>) -> Self {
        Self(vc)
    }
}

impl std::ops::Deref for Vc {
    type Target = ViewerContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Vc
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let vc = parts
            .extensions
            .get::<Arc<ViewerContext>>()
            .map(|vc| Vc(vc.clone()))
            .ok_or(StatusCode::INTERNAL_SERVER_ERROR);

        async move { vc }
    }
}
