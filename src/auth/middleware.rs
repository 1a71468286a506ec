//! Identity resolution middleware for Axum routes.
//!
//! Looks for a token in the `x-access-token` header, the `token` query
//! parameter, or the top-level `token` field of a small JSON body, then
//! validates it and injects the resulting `Identity` into request
//! extensions. Resolution never rejects a request by itself; each handler
//! decides what its endpoint requires.

use anyhow::Result;
use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::header::{CONTENT_LENGTH, CONTENT_TYPE},
    middleware::Next,
    response::Response,
};

use crate::auth::capability::CapabilitySet;
use crate::auth::extractor::{AuthUser, Identity};
use crate::auth::jwt::decode_token;
use crate::auth::ROOT_USER_ID;
use crate::AppState;

/// Bodies beyond this size are never buffered for token extraction; the
/// JSON carrier is for small bodies like the edit form, not uploads.
const MAX_PEEK_BYTES: u64 = 256 * 1024;

/// Middleware resolving the request identity exactly once.
///
/// # Behavior
/// 1. Search the three token carriers in order: header, query, JSON body
///    (the body is buffered and restored, see [`MAX_PEEK_BYTES`])
/// 2. No token → `Identity::Anonymous`
/// 3. Token present but signature/expiry/account checks fail →
///    `Identity::Invalid` (store errors also land here, denying rather
///    than granting access on outage)
/// 4. Otherwise → `Identity::User` with the flattened capability set
pub async fn resolve_identity(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let (mut req, token) = find_token(req).await;

    let identity = match token {
        None => Identity::Anonymous,
        Some(token) => match authenticate(&state, &token).await {
            Ok(Some(user)) => Identity::User(user),
            Ok(None) => Identity::Invalid,
            Err(e) => {
                tracing::warn!("Identity resolution failed: {}", e);
                Identity::Invalid
            }
        },
    };

    req.extensions_mut().insert(identity);
    next.run(req).await
}

/// Locate a token in the request, returning the request (with its body
/// intact) alongside it.
async fn find_token(req: Request) -> (Request, Option<String>) {
    if let Some(token) = req
        .headers()
        .get("x-access-token")
        .and_then(|v| v.to_str().ok())
    {
        let token = token.trim().to_string();
        if !token.is_empty() {
            return (req, Some(token));
        }
    }

    if let Some(token) = req.uri().query().and_then(token_from_query) {
        return (req, Some(token));
    }

    peek_json_body(req).await
}

/// Hand-split of the raw query string. JWTs contain no percent-encoded
/// characters, so no decoding pass is needed.
fn token_from_query(query: &str) -> Option<String> {
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == "token" && !value.is_empty()).then(|| value.to_string())
    })
}

/// Buffer a small JSON body, read its top-level `token` field, and rebuild
/// the request so downstream extractors still see the body. Requests
/// without a Content-Length, with a non-JSON content type, or larger than
/// [`MAX_PEEK_BYTES`] are passed through untouched.
async fn peek_json_body(req: Request) -> (Request, Option<String>) {
    let is_json = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/json"))
        .unwrap_or(false);
    let length = req
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let Some(length) = length else {
        return (req, None);
    };
    if !is_json || length == 0 || length > MAX_PEEK_BYTES {
        return (req, None);
    }

    let (parts, body) = req.into_parts();
    let bytes = match to_bytes(body, MAX_PEEK_BYTES as usize).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Failed to buffer JSON body for token lookup: {}", e);
            return (Request::from_parts(parts, Body::empty()), None);
        }
    };

    let token = serde_json::from_slice::<serde_json::Value>(&bytes)
        .ok()
        .and_then(|value| {
            value
                .get("token")
                .and_then(|t| t.as_str())
                .map(str::to_string)
        });
    (Request::from_parts(parts, Body::from(bytes)), token)
}

/// Validate a token against the configured secret and the account it
/// names. Store users must be confirmed and not deleted at every
/// validation, not just at login.
async fn authenticate(state: &AppState, token: &str) -> Result<Option<AuthUser>> {
    let Ok(claims) = decode_token(token, &state.config.auth.jwt_secret) else {
        return Ok(None);
    };

    if claims.sub == ROOT_USER_ID {
        if state.config.auth.root_account.is_some() {
            return Ok(Some(AuthUser {
                id: ROOT_USER_ID,
                email: claims.email,
                capabilities: CapabilitySet::all(),
            }));
        }
        return Ok(None);
    }

    let Some(user) = state.store.get_user(claims.sub).await? else {
        return Ok(None);
    };
    if user.confirmed.is_none() || user.deleted.is_some() {
        return Ok(None);
    }

    let all_roles = state.store.list_roles().await?;
    let assigned = state.store.user_roles(user.id).await?;
    Ok(Some(AuthUser {
        id: user.id,
        email: user.email,
        capabilities: CapabilitySet::from_roles(&all_roles, &assigned),
    }))
}

// ============================================================================
// Tests
// ============================================================================
