use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::debug;
use uuid::Uuid;

use crate::auth::roles::{Role, ADMIN_ROLES, MANAGER_ROLES};
use crate::errors::AppError;
use crate::state::AppState;

/// The verified caller, placed in request extensions by [`authenticate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn require(&self, allowed: &[Role]) -> Result<(), AppError> {
        if self.role.is_allowed(allowed) {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .copied()
            .ok_or(AppError::Unauthorized)
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Verifies the bearer token, then attaches [`AuthUser`] with the role the
/// account holds now. Tokens for deleted accounts are rejected.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers()).ok_or(AppError::Unauthorized)?;
    let (id, token_role) = state.jwt.verify(token)?;
    let role = state.accounts.current_role(id).await?.ok_or_else(|| {
        debug!("Token for missing account {id}");
        AppError::Unauthorized
    })?;
    if role != token_role {
        debug!("Account {id} is now {role}, token says {token_role}");
    }
    req.extensions_mut().insert(AuthUser { id, role });
    Ok(next.run(req).await)
}

/// Guard for team analytics routes. Must run after [`authenticate`].
pub async fn require_manager(
    auth: AuthUser,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    auth.require(MANAGER_ROLES)?;
    Ok(next.run(req).await)
}

/// Guard for `/api/admin`. Must run after [`authenticate`].
pub async fn require_admin(auth: AuthUser, req: Request, next: Next) -> Result<Response, AppError> {
    auth.require(ADMIN_ROLES)?;
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(bearer_token(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn test_require_maps_to_forbidden() {
        let user = AuthUser {
            id: Uuid::new_v4(),
            role: Role::User,
        };
        assert!(matches!(user.require(ADMIN_ROLES), Err(AppError::Forbidden)));
        assert!(user.require(crate::auth::roles::ANY_ROLE).is_ok());
    }
}
