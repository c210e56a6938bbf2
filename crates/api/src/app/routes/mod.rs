use axum::{
    Router,
    routing::{get, post},
};

pub mod events;
pub mod processors;
pub mod system;

/// Router for the processor management and dispatch endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/processors", get(processors::list_processors).put(processors::register_processor))
        .route("/processors/:tenant", get(processors::get_processor))
        .route("/events", post(events::dispatch_event))
}
