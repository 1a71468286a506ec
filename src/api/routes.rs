//! API route definitions

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use super::{category_handlers, handlers, mesh_handlers, user_handlers};
use crate::auth::resolve_identity;
use crate::AppState;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // ====================================================================
        // Taxonomy
        // ====================================================================
        .route("/categories/list/", get(category_handlers::list_categories))
        .route("/categories/alltags/", get(category_handlers::all_tags))
        .route("/categories/new/", put(category_handlers::create_category))
        .route(
            "/categories/{id}/edit/",
            post(category_handlers::edit_category),
        )
        .route(
            "/categories/{id}/delete/",
            delete(category_handlers::delete_category),
        )
        .route("/tags/new/", put(category_handlers::create_tag))
        .route("/tags/{id}/edit/", post(category_handlers::edit_tag))
        .route("/tags/{id}/delete/", delete(category_handlers::delete_tag))
        // ====================================================================
        // Meshes
        // ====================================================================
        .route("/meshes/search/", get(mesh_handlers::search_meshes))
        .route("/meshes/sorts/", get(mesh_handlers::list_sorts))
        .route("/mesh/{id}/view/", get(mesh_handlers::view_mesh))
        .route("/mesh/{id}/download/", get(mesh_handlers::download_mesh))
        // Multipart upload gets its own body limit
        .route(
            "/mesh/new/",
            put(mesh_handlers::upload_mesh)
                .layer(DefaultBodyLimit::max(state.config.max_upload_bytes)),
        )
        .route("/mesh/{id}/edit/", post(mesh_handlers::edit_mesh))
        .route("/mesh/{id}/delete/", delete(mesh_handlers::delete_mesh))
        // ====================================================================
        // Accounts
        // ====================================================================
        .route("/register/", post(user_handlers::register))
        .route("/login/", post(user_handlers::login))
        .route("/user/revive/", post(user_handlers::revive))
        .route("/user/roles/", get(user_handlers::my_roles))
        .route("/users/list/", get(user_handlers::list_users))
        .route("/users/{id}/confirm/", post(user_handlers::confirm_user))
        .route("/users/{id}/delete/", delete(user_handlers::delete_user))
        // Public images and thumbnails, straight off disk
        .nest_service("/files", ServeDir::new(state.files.public_root()))
        // Middleware
        .layer(from_fn_with_state(state.clone(), resolve_identity))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
