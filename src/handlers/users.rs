use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::router::AppState;

#[derive(Debug, Serialize)]
pub struct Greeting {
    pub data: &'static str,
}

/// The `users` resource. Only the index is served so far.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(index))
        .route("/users/", get(index))
}

pub async fn index() -> Json<Greeting> {
    Json(Greeting {
        data: "HELLO WORLD HONO",
    })
}
