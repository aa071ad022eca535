use axum::{
    routing::{get, patch, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

pub mod db;
pub mod error;
pub mod handlers;
pub mod models;

use db::Database;
use handlers::AppState;

/// Build the application router around an explicitly constructed store.
/// Requests outside `/api/todos` fall through to the static assets.
pub fn router(db: Database) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/api/todos",
            post(handlers::create_todo)
                .get(handlers::list_todos)
                .delete(handlers::delete_all_todos),
        )
        .route(
            "/api/todos/:id",
            get(handlers::get_todo)
                .put(handlers::update_todo)
                .delete(handlers::delete_todo),
        )
        .route("/api/todos/:id/toggle", patch(handlers::toggle_todo))
        .fallback_service(ServeDir::new("public"))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState { db })
}
