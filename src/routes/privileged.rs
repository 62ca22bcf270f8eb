use crate::{
    AppState,
    handlers::{clubs, comments, events, users},
};
use axum::{
    Router,
    routing::{delete, get, post, put},
};

/// Privileged Router Module
///
/// Role-gated routes. They sit behind the same authentication layer as
/// `authenticated_routes`; each handler then asks `authz` for a verdict against the
/// caller's current role set and answers 403 on denial.
pub fn privileged_routes() -> Router<AppState> {
    Router::new()
        // --- Users (admin, sto, patron) ---
        .route("/users", get(users::list_users))
        // Role management. The grant rules live in `authz::granting_roles`;
        // `/promote` and `/demote` are aliases kept for older clients.
        .route("/users/assign-role", post(users::assign_role))
        .route("/users/promote", post(users::assign_role))
        .route("/users/remove-role", post(users::remove_role))
        .route("/users/demote", post(users::remove_role))
        // --- Clubs ---
        .route("/clubs", post(clubs::create_club))
        .route(
            "/clubs/{id}",
            put(clubs::update_club).delete(clubs::delete_club),
        )
        .route("/clubs/{id}/members", get(clubs::club_members))
        // --- Events ---
        // POST /events (club_leader). New events start pending.
        .route("/events", post(events::create_event))
        .route(
            "/events/{id}",
            put(events::update_event).delete(events::delete_event),
        )
        // Review (sto, patron). Overwrites the status unconditionally.
        .route("/events/{id}/approve", post(events::approve_event))
        .route("/events/{id}/reject", post(events::reject_event))
        // GET /events/{id}/svp: attendance list with count.
        .route("/events/{id}/svp", get(events::attendance))
        // --- Comments (moderation) ---
        .route("/comments/{id}", delete(comments::delete_comment))
}
