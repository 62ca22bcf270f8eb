use crate::{
    AppState,
    handlers::{clubs, comments, events, users},
};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a credential. Event reads still accept an optional
/// token: callers holding a moderating role see pending and rejected events too.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // --- Identity ---
        // POST /users (multipart, optional profilePicture) and /users/register (JSON).
        // Both sign the new account in and set the `jwt` cookie.
        .route("/users", post(users::create_user))
        .route("/users/register", post(users::register_user))
        // `/users/login` is kept as an alias of `/users/auth`.
        .route("/users/auth", post(users::login_user))
        .route("/users/login", post(users::login_user))
        .route("/users/logout", post(users::logout_user))
        // --- Clubs ---
        .route("/clubs", get(clubs::list_clubs))
        .route("/clubs/{id}", get(clubs::get_club))
        .route("/clubs/{id}/leaders", get(clubs::club_leaders))
        // --- Events ---
        // GET /events?club=<id>
        // Anonymous, student and staff callers only get approved events.
        .route("/events", get(events::list_events))
        .route("/events/{id}", get(events::get_event))
        // --- Comments ---
        .route("/comments/event/{id}", get(comments::list_comments))
}
