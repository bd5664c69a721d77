use axum::Router;
use axum::middleware::from_fn;
use axum::routing::{delete, get, post};
use grantwell_core::AppError;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{handlers, middleware};

mod cors;

pub fn build_router(app_state: AppState, frontend_url: &str) -> Result<Router, AppError> {
    let protected_routes = Router::new()
        .route(
            "/api/resources",
            post(handlers::resources::register_resource_handler),
        )
        .route(
            "/api/resources/{resource_id}",
            get(handlers::resources::get_resource_handler),
        )
        .route(
            "/api/resources/{resource_id}/grants",
            get(handlers::resources::list_resource_grants_handler),
        )
        .route(
            "/api/resources/{resource_id}/audit",
            get(handlers::resources::resource_audit_trail_handler),
        )
        .route("/api/grants", post(handlers::grants::create_grant_handler))
        .route(
            "/api/grants/{grant_id}",
            get(handlers::grants::get_grant_handler),
        )
        .route(
            "/api/grants/{grant_id}/revoke",
            post(handlers::grants::revoke_grant_handler),
        )
        .route(
            "/api/subjects/{subject_id}/grants",
            get(handlers::grants::list_subject_grants_handler),
        )
        .route(
            "/api/access/check",
            post(handlers::access::check_access_handler),
        )
        .route(
            "/api/emergency-access",
            post(handlers::emergency::grant_emergency_access_handler),
        )
        .route(
            "/api/emergency-access/{subject_id}/{resource_id}",
            delete(handlers::emergency::revoke_emergency_access_handler),
        )
        .route("/api/audit", get(handlers::audit::audit_window_handler))
        .route_layer(from_fn(middleware::require_principal));

    Ok(Router::new()
        .route("/health", get(handlers::health::health_handler))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors::build_cors_layer(frontend_url)?)
        .with_state(app_state))
}
