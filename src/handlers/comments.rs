use axum::{Json, extract::State, http::StatusCode};
use uuid::Uuid;

use super::{ApiJson, ApiPath, events::visible_event, optional};
use crate::{
    AppState,
    auth::AuthUser,
    authz::{self, Action},
    error::{ApiError, ApiResult},
    models::{Comment, CreateCommentRequest, MessageResponse},
};

/// add_comment
///
/// [Authenticated Route] Any signed-in user may comment on an event they can see.
#[utoipa::path(
    post,
    path = "/api/comments/{id}",
    tag = "comments",
    params(("id" = Uuid, Path, description = "Event id")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment added", body = Comment),
        (status = 400, description = "Empty content", body = MessageResponse),
        (status = 404, description = "Event not found or not visible", body = MessageResponse)
    )
)]
pub async fn add_comment(
    actor: AuthUser,
    State(state): State<AppState>,
    ApiPath(event_id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<CreateCommentRequest>,
) -> ApiResult<(StatusCode, Json<Comment>)> {
    let content =
        optional(payload.content).ok_or_else(|| ApiError::validation("Content required"))?;
    visible_event(&state, Some(&actor), event_id).await?;

    let comment = state
        .repo
        .add_comment(event_id, actor.id, content)
        .await?
        .ok_or_else(|| ApiError::not_found("Event not found"))?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// delete_comment
///
/// [Authenticated Route] Moderation. The comment disappears from its event's comment
/// list in the same write.
#[utoipa::path(
    delete,
    path = "/api/comments/{id}",
    tag = "comments",
    params(("id" = Uuid, Path, description = "Comment id")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Requires club_leader, patron or sto", body = MessageResponse),
        (status = 404, description = "Comment not found", body = MessageResponse)
    )
)]
pub async fn delete_comment(
    actor: AuthUser,
    State(state): State<AppState>,
    ApiPath(comment_id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    authz::authorize(&actor.roles, Action::DeleteComment)?;

    if !state.repo.delete_comment(comment_id).await? {
        return Err(ApiError::not_found("Comment not found"));
    }
    tracing::info!(comment_id = %comment_id, actor = %actor.id, "comment deleted");
    Ok(Json(MessageResponse::new("Comment deleted")))
}

/// list_comments
///
/// [Public Route] Newest first, each with its author summary. The event must be
/// visible to the caller.
#[utoipa::path(
    get,
    path = "/api/comments/event/{id}",
    tag = "comments",
    params(("id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 200, description = "Comments", body = [Comment]),
        (status = 404, description = "Event not found or not visible", body = MessageResponse)
    )
)]
pub async fn list_comments(
    actor: Option<AuthUser>,
    State(state): State<AppState>,
    ApiPath(event_id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<Comment>>> {
    visible_event(&state, actor.as_ref(), event_id).await?;
    Ok(Json(state.repo.list_comments(event_id).await?))
}
