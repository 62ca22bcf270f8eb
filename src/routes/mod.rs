//! Routing, split by access tier. Access control is attached per tier in
//! `create_router`, so a handler cannot end up exposed by being listed in the wrong
//! place: every route outside `public` sits behind the authentication layer.
//!
//! Paths are relative to the `/api` prefix.

/// Anonymous access. Reads honour event visibility inside the handlers.
pub mod public;

/// Any signed-in user: profile, joining clubs, likes, attendance, comments.
pub mod authenticated;

/// Signed-in users whose role passes the permission table in `authz`.
pub mod privileged;
