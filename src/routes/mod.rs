use axum::http::HeaderValue;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod health;
pub mod steps;
pub mod time_studies;
pub mod users;

pub fn create_router(state: AppState) -> Router<()> {
    let cors = if let Some(origins) = state.config.cors_allowed_origin.as_ref() {
        let headers: Vec<HeaderValue> = origins
            .split(',')
            .filter_map(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| {
                    trimmed
                        .parse::<HeaderValue>()
                        .expect("invalid CORS allowed origin")
                })
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(headers))
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    } else {
        // Open policy so any frontend origin can reach the API.
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let users_routes =
        Router::new().route("/", get(users::list_users).post(users::create_user));

    let time_studies_routes = Router::new()
        .route(
            "/",
            get(time_studies::list_time_studies).post(time_studies::create_time_study),
        )
        .route(
            "/:id",
            get(time_studies::get_time_study)
                .put(time_studies::update_time_study)
                .delete(time_studies::delete_time_study),
        )
        .route("/:id/steps", post(steps::add_step));

    let steps_routes =
        Router::new().route("/:id", put(steps::update_step).delete(steps::delete_step));

    Router::new()
        .nest("/api/users", users_routes)
        .nest("/api/time_studies", time_studies_routes)
        .nest("/api/steps", steps_routes)
        .route("/api/health", get(health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
