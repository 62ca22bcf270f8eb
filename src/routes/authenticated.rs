use crate::{
    AppState,
    handlers::{clubs, comments, events, users},
};
use axum::{
    Router,
    routing::{get, post},
};

/// Authenticated Router Module
///
/// Routes open to any signed-in user regardless of role. The authentication layer in
/// `create_router` rejects requests without a valid token before they get here.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /users/me
        // The caller's profile, including joined clubs.
        .route("/users/me", get(users::get_me))
        // POST /clubs/{id}/join
        // Idempotent: membership is a set keyed by (club, user).
        .route("/clubs/{id}/join", post(clubs::join_club))
        // --- Engagement ---
        .route("/events/{id}/like", post(events::like_event))
        .route("/events/{id}/unlike", post(events::unlike_event))
        .route("/events/{id}/svp", post(events::svp_event))
        // POST /comments/{eventId}
        .route("/comments/{id}", post(comments::add_comment))
}
