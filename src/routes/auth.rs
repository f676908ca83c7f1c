use axum::routing::post;
use axum::Router;

use crate::auth::handlers;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/join", post(handlers::join))
        .route("/login", post(handlers::login))
        .route("/logout", post(handlers::logout))
}
