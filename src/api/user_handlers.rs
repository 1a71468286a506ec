//! Account endpoints: registration, login, token revival, and the
//! administrator's user management.
//!
//! Login errors never reveal whether the email exists; every failure path
//! answers with the same message. The root account is checked first, in
//! memory, and never touches the users table.

use axum::{
    extract::{Path, State},
    response::Response,
    Json,
};
use serde::Deserialize;

use crate::api::handlers::{created, message, ok, AppError};
use crate::auth::{encode_token, AuthUser, Capability, ROOT_USER_ID};
use crate::store::NewUser;
use crate::AppState;

// ============================================================================
// Request bodies
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterBody {
    pub email: String,
    pub password: String,
    pub password_confirm: String,
    pub firstname: String,
    pub lastname: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

// ============================================================================
// Registration
// ============================================================================

/// Validate registration request fields.
fn validate_registration(body: &RegisterBody) -> Result<(), AppError> {
    // Names must not be empty
    if body.firstname.trim().is_empty() {
        return Err(AppError::BadRequest("Le prénom est requis.".into()));
    }
    if body.lastname.trim().is_empty() {
        return Err(AppError::BadRequest("Le nom est requis.".into()));
    }

    // Email basic validation (contains @ and a dot after @)
    let email = body.email.trim().to_lowercase();
    if !email.contains('@') || !email.split('@').nth(1).map_or(false, |d| d.contains('.')) {
        return Err(AppError::BadRequest(
            "L'adresse e-mail est invalide.".into(),
        ));
    }

    // Password minimum length
    if body.password.len() < 8 {
        return Err(AppError::BadRequest(
            "Le mot de passe doit contenir au moins 8 caractères.".into(),
        ));
    }

    // Confirmation must match
    if body.password != body.password_confirm {
        return Err(AppError::BadRequest(
            "Les mots de passe ne correspondent pas.".into(),
        ));
    }

    Ok(())
}

/// POST /register/ — create an unconfirmed account with the `contributor`
/// role. An administrator has to confirm it before login works.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterBody>,
) -> Result<Response, AppError> {
    // 1. Validate input fields
    validate_registration(&body)?;
    let email = body.email.trim();

    // 2. Check email uniqueness (case-insensitive)
    if state.store.find_user_by_email(email).await?.is_some() {
        return Err(AppError::Conflict(
            "Un compte existe déjà avec cette adresse e-mail.".into(),
        ));
    }

    // 3. Hash password with bcrypt
    let password_hash = bcrypt::hash(&body.password, 12)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to hash password: {}", e)))?;

    // 4. Create the user and grant the default role
    let user = state
        .store
        .create_user(&NewUser {
            email: email.to_string(),
            password_hash,
            firstname: body.firstname.trim().to_string(),
            lastname: body.lastname.trim().to_string(),
        })
        .await?;
    state.store.assign_role(user.id, "contributor").await?;

    Ok(created(user))
}

// ============================================================================
// Login and tokens
// ============================================================================

/// POST /login/ — email/password authentication.
///
/// Flow:
/// 1. Try the root account first (in-memory, no DB hit)
/// 2. Otherwise look the user up by email
/// 3. Require confirmed, not deleted, and a matching bcrypt password
/// 4. Return JWT + user info
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> Result<Response, AppError> {
    // Generic error to prevent user enumeration
    let invalid_credentials =
        || AppError::Unauthorized("Adresse e-mail ou mot de passe invalide.".to_string());

    let email = body.email.trim();

    // 1. Root account first
    if let Some(root) = &state.config.auth.root_account {
        if root.email.eq_ignore_ascii_case(email) {
            let password_ok = bcrypt::verify(&body.password, &root.password_hash).unwrap_or(false);
            if !password_ok {
                return Err(invalid_credentials());
            }
            let token = encode_token(
                ROOT_USER_ID,
                &root.email,
                &state.config.auth.jwt_secret,
                state.config.auth.jwt_expiry_secs,
            )?;
            return Ok(ok(serde_json::json!({
                "token": token,
                "user": { "id": ROOT_USER_ID, "email": root.email },
            })));
        }
    }

    // 2. Look the user up by email
    let user = state
        .store
        .find_user_by_email(email)
        .await?
        .ok_or_else(invalid_credentials)?;

    // 3. Confirmed, not deleted, matching password
    if user.confirmed.is_none() || user.deleted.is_some() {
        return Err(invalid_credentials());
    }
    let password_ok = bcrypt::verify(&body.password, &user.password).unwrap_or(false);
    if !password_ok {
        return Err(invalid_credentials());
    }

    // 4. Generate JWT
    let token = encode_token(
        user.id,
        &user.email,
        &state.config.auth.jwt_secret,
        state.config.auth.jwt_expiry_secs,
    )?;

    Ok(ok(serde_json::json!({ "token": token, "user": user })))
}

/// POST /user/revive/ — a fresh token for a caller whose current token is
/// still valid.
pub async fn revive(State(state): State<AppState>, user: AuthUser) -> Result<Response, AppError> {
    let token = encode_token(
        user.id,
        &user.email,
        &state.config.auth.jwt_secret,
        state.config.auth.jwt_expiry_secs,
    )?;
    Ok(ok(serde_json::json!({ "token": token })))
}

/// GET /user/roles/ — the caller's assigned roles and the flattened
/// capability set they resolve to. The root account has every capability
/// but no role rows.
pub async fn my_roles(State(state): State<AppState>, user: AuthUser) -> Result<Response, AppError> {
    let roles = if user.id == ROOT_USER_ID {
        Vec::new()
    } else {
        state.store.user_roles(user.id).await?
    };
    Ok(ok(serde_json::json!({
        "roles": roles,
        "capabilities": user.capabilities.names(),
    })))
}

// ============================================================================
// User administration
// ============================================================================

/// GET /users/list/ — every account with its roles. Password hashes never
/// serialize.
pub async fn list_users(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, AppError> {
    user.require(Capability::Administrator)?;
    let users = state.store.list_users().await?;
    Ok(ok(users))
}

/// POST /users/{id}/confirm/ — activate an account. Idempotent; confirming
/// twice keeps the original timestamp.
pub async fn confirm_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    user.require(Capability::Administrator)?;
    let confirmed = state
        .store
        .confirm_user(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Utilisateur introuvable.".into()))?;
    Ok(ok(confirmed))
}

/// DELETE /users/{id}/delete/ — hard delete. Self-deletion is refused,
/// root included.
pub async fn delete_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Response, AppError> {
    user.require(Capability::Administrator)?;
    if id == user.id {
        return Err(AppError::Forbidden(
            "Vous ne pouvez pas supprimer votre propre compte.".into(),
        ));
    }

    let deleted = state.store.delete_user(id).await?;
    if !deleted {
        return Err(AppError::NotFound("Utilisateur introuvable.".into()));
    }
    Ok(message("Compte supprimé."))
}

// ============================================================================
// Tests
// ============================================================================
