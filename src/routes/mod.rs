use axum::http::HeaderValue;
use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::{identity::Actor, state::AppState};

pub mod assignments;
pub mod documents;
pub mod health;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return None;
                }
                match trimmed.parse::<HeaderValue>() {
                    Ok(header) => Some(header),
                    Err(err) => {
                        tracing::warn!(origin = trimmed, error = %err, "ignoring invalid CORS origin");
                        None
                    }
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::mirror_request())
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    let land_routes = Router::new()
        .route(
            "/:land_id/documents/:document_type/slots/:slot/versions",
            get(documents::list_versions).post(documents::upload_version),
        )
        .route(
            "/:land_id/documents/:document_type/slots/:slot/latest",
            get(documents::latest_version),
        )
        .route(
            "/:land_id/documents/:document_type/slots/:slot/role-statuses",
            get(documents::role_statuses),
        )
        .route(
            "/:land_id/documents/:document_type/summary",
            get(documents::slot_summary),
        )
        .route(
            "/:land_id/assignments",
            get(assignments::list_land_assignments),
        );

    let documents_routes = Router::new()
        .route("/:id/lock", post(documents::lock_document))
        .route("/:id/unlock", post(documents::unlock_document))
        .route("/:id/decision", post(documents::decide_document))
        .route("/:id/assignments", post(documents::assign_reviewer));

    let assignments_routes =
        Router::new().route("/:id", patch(assignments::update_assignment));

    let protected_routes = Router::new()
        .nest("/api/lands", land_routes)
        .nest("/api/documents", documents_routes)
        .nest("/api/assignments", assignments_routes)
        .layer(middleware::from_extractor::<Actor>());

    Router::new()
        .merge(protected_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
