use axum::{
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::{apply_security_headers, create_cors_layer, Config};
use crate::handlers::{booking, event, health_check};
use crate::state::AppState;

pub fn create_routes(state: AppState, config: &Config) -> Router {
    let api = Router::new()
        .route("/bookings", post(booking::create_booking))
        .route("/bookings/:id", get(booking::get_booking))
        .route("/bookings/:id/confirm", put(booking::confirm_booking))
        .route("/bookings/:id/cancel", put(booking::cancel_booking))
        .route("/events", post(event::create_event))
        .route(
            "/events/:id",
            get(event::get_event).put(event::update_event_status),
        )
        .route("/events/:id/availability", get(event::get_availability))
        .route("/search/events", post(event::search_events));

    let router = Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api)
        .with_state(state);

    apply_security_headers(router, config.production).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(create_cors_layer(config.cors_allowed_origins.as_deref())),
    )
}
