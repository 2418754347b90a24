//! Request authorization gate.
//!
//! For each request the gate, in order:
//! 1. resolves the session (401 when required and missing or invalid)
//! 2. checks the route's permission, if any (403 on denial)
//! 3. applies the rate limiter, if any (429 when exceeded)
//! 4. runs the handler with an [`AuthorizationContext`] in the request
//!    extensions
//!
//! A panic anywhere past this point is turned into a 500 response.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use futures::FutureExt;

use super::rate_limit::{extract_client_ip, RateLimiter};
use crate::error::{AppError, Result};
use crate::models::permission::{AuthorizationContext, Permission};
use crate::models::role::Role;
use crate::services::permission_service::RoleHierarchy;
use crate::services::session_service::SessionProvider;

/// Per-route gate configuration.
#[derive(Clone)]
pub struct ApiGuard {
    sessions: Arc<dyn SessionProvider>,
    hierarchy: Arc<RoleHierarchy>,
    require_auth: bool,
    permission: Option<Permission>,
    rate_limiter: Option<Arc<RateLimiter>>,
}

impl ApiGuard {
    /// A guard that requires an authenticated session and nothing else.
    pub fn new(sessions: Arc<dyn SessionProvider>, hierarchy: Arc<RoleHierarchy>) -> Self {
        Self {
            sessions,
            hierarchy,
            require_auth: true,
            permission: None,
            rate_limiter: None,
        }
    }

    /// Let anonymous callers through.
    pub fn optional(mut self) -> Self {
        self.require_auth = false;
        self
    }

    /// Require `resource:action`.
    pub fn require(mut self, resource: &str, action: &str) -> Self {
        self.permission = Some(Permission::new(resource, action));
        self
    }

    pub fn rate_limited(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Run the gate without invoking any handler. `anonymous_key` is the
    /// rate limit key used when no session is present.
    pub async fn authorize(
        &self,
        headers: &HeaderMap,
        anonymous_key: &str,
    ) -> Result<Option<AuthorizationContext>> {
        let session = match self.sessions.resolve(headers).await {
            Ok(session) => session,
            Err(e) if self.require_auth || self.permission.is_some() => return Err(e),
            Err(e) => {
                tracing::debug!(error = %e, "Ignoring invalid credentials on optional route");
                None
            }
        };

        let Some(session) = session else {
            if self.require_auth || self.permission.is_some() {
                return Err(AppError::Unauthorized("Authentication required".into()));
            }
            self.apply_rate_limit(anonymous_key).await?;
            return Ok(None);
        };

        let role: Role = session.role.parse().map_err(|_| {
            tracing::warn!(user_id = %session.user_id, role = %session.role, "Session carries unknown role");
            AppError::Forbidden("Access denied".into())
        })?;

        let context = AuthorizationContext {
            user_id: session.user_id,
            role,
            attributes: session.attributes,
        };

        if let Some(permission) = &self.permission {
            if !self
                .hierarchy
                .has_permission(role, permission, Some(&context.attributes))
            {
                tracing::info!(
                    user_id = %context.user_id,
                    role = %role,
                    permission = %permission,
                    "Permission denied"
                );
                return Err(AppError::Forbidden(format!("Missing permission {}", permission)));
            }
        }

        self.apply_rate_limit(&format!("user:{}", context.user_id))
            .await?;

        Ok(Some(context))
    }

    async fn apply_rate_limit(&self, key: &str) -> Result<()> {
        if let Some(limiter) = &self.rate_limiter {
            limiter
                .check_rate_limit(key)
                .await
                .map_err(|retry_after| AppError::RateLimitExceeded { retry_after })?;
        }
        Ok(())
    }
}

/// Gate middleware; attach with [`with_api_auth`] or
/// `middleware::from_fn_with_state(guard, api_auth_middleware)`.
pub async fn api_auth_middleware(
    State(guard): State<ApiGuard>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();

    match AssertUnwindSafe(authorize_and_run(guard, request, next))
        .catch_unwind()
        .await
    {
        Ok(response) => response,
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!(%method, %uri, %reason, "Handler panicked");
            AppError::Internal(reason).into_response()
        }
    }
}

async fn authorize_and_run(guard: ApiGuard, mut request: Request, next: Next) -> Response {
    let anonymous_key = extract_client_ip(&request);
    let outcome = guard.authorize(request.headers(), &anonymous_key).await;
    match outcome {
        Ok(context) => {
            if let Some(context) = context {
                request.extensions_mut().insert(context);
            }
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Wrap every route of `router` in the gate.
pub fn with_api_auth<S>(router: Router<S>, guard: ApiGuard) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.route_layer(middleware::from_fn_with_state(guard, api_auth_middleware))
}
