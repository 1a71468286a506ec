//! AuthUser and Identity extractors for Axum handlers.
//!
//! Both read the `Identity` placed into request extensions by the
//! `resolve_identity` middleware. `Identity` never rejects (anonymous
//! endpoints use it to attribute audit events when a user happens to be
//! present); `AuthUser` answers 401 when the request carries no valid
//! identity.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::api::handlers::AppError;
use crate::auth::capability::{Capability, CapabilitySet};
use crate::AppState;

/// What identity resolution concluded for this request.
///
/// `Invalid` means a token was presented but did not check out. Handlers
/// that merely attribute actions treat it like `Anonymous`; handlers that
/// require a user answer 401 so the client knows its token is stale.
#[derive(Debug, Clone)]
pub enum Identity {
    Anonymous,
    Invalid,
    User(AuthUser),
}

impl Identity {
    pub fn user(&self) -> Option<&AuthUser> {
        match self {
            Identity::User(user) => Some(user),
            _ => None,
        }
    }
}

/// Authenticated user identity with its flattened capability set.
///
/// Use this as a handler parameter to require authentication:
///
/// ```rust,ignore
/// async fn my_handler(user: AuthUser) -> Result<Json<Value>, AppError> {
///     user.require(Capability::Contributor)?;
///     // ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub email: String,
    pub capabilities: CapabilitySet,
}

impl AuthUser {
    /// 403 unless this user holds `capability`.
    pub fn require(&self, capability: Capability) -> Result<(), AppError> {
        if self.capabilities.contains(capability) {
            Ok(())
        } else {
            Err(AppError::Forbidden(
                "Vous n'avez pas les droits nécessaires pour effectuer cette action.".to_string(),
            ))
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async {
            match parts.extensions.get::<Identity>() {
                Some(Identity::User(user)) => Ok(user.clone()),
                Some(Identity::Invalid) => Err(AppError::Unauthorized(
                    "Jeton d'authentification invalide ou expiré.".to_string(),
                )),
                _ => Err(AppError::Unauthorized(
                    "Authentification requise.".to_string(),
                )),
            }
        }
    }
}

impl FromRequestParts<AppState> for Identity {
    type Rejection = std::convert::Infallible;

    fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        let identity = parts
            .extensions
            .get::<Identity>()
            .cloned()
            .unwrap_or(Identity::Anonymous);
        async move { Ok(identity) }
    }
}

// ============================================================================
// Tests
// ============================================================================
