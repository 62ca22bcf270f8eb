use axum::{
    Json,
    extract::{FromRequest, Multipart, Request, State},
    http::{StatusCode, header::CONTENT_TYPE},
};
use serde::{Deserialize, de::DeserializeOwned};
use uuid::Uuid;

use super::{
    ApiJson, ApiPath, ApiQuery, FormData, UploadedFile, discard_upload, optional,
    parse_datetime, parse_uuid,
};
use crate::{
    AppState,
    auth::AuthUser,
    authz::{self, Action, EventVisibility},
    error::{ApiError, ApiResult},
    models::{
        AttendanceList, CreateEventRequest, Event, EventChanges, EventReviewResponse,
        EventStatus, MessageResponse, NewEvent, ReviewDecision, UpdateEventRequest,
    },
    repository::EventQuery,
    storage::UploadCategory,
};

const EVENT_NOT_FOUND: &str = "Event not found.";

/// Event fields as they arrive in a multipart form.
pub trait EventFields: DeserializeOwned + Send {
    fn from_form(form: &FormData) -> ApiResult<Self>;
}

fn club_field(form: &FormData) -> ApiResult<Option<Uuid>> {
    form.text("club")
        .map(|raw| parse_uuid(&raw, "club"))
        .transpose()
}

impl EventFields for CreateEventRequest {
    fn from_form(form: &FormData) -> ApiResult<Self> {
        Ok(CreateEventRequest {
            title: form.text("title"),
            description: form.text("description"),
            date: form.text("date"),
            club: club_field(form)?,
        })
    }
}

impl EventFields for UpdateEventRequest {
    fn from_form(form: &FormData) -> ApiResult<Self> {
        Ok(UpdateEventRequest {
            title: form.text("title"),
            description: form.text("description"),
            date: form.text("date"),
            club: club_field(form)?,
        })
    }
}

/// EventBody
///
/// Body of event create and update. A JSON document, or a multipart form carrying the
/// same fields plus an optional `poster` file.
#[derive(Debug)]
pub struct EventBody<T> {
    pub fields: T,
    pub poster: Option<UploadedFile>,
}

impl<T> From<T> for EventBody<T> {
    fn from(fields: T) -> Self {
        Self {
            fields,
            poster: None,
        }
    }
}

impl<S, T> FromRequest<S> for EventBody<T>
where
    S: Send + Sync,
    T: EventFields,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.starts_with("multipart/form-data"));

        if !is_multipart {
            let ApiJson(fields) = ApiJson::<T>::from_request(req, state).await?;
            return Ok(fields.into());
        }

        let multipart = Multipart::from_request(req, state).await?;
        let mut form = FormData::read(multipart).await?;
        Ok(Self {
            fields: T::from_form(&form)?,
            poster: form.take_file("poster"),
        })
    }
}

/// The multipart variant of event create and update, for the OpenAPI document.
#[allow(dead_code)]
#[derive(Deserialize, utoipa::ToSchema)]
pub struct EventForm {
    title: Option<String>,
    description: Option<String>,
    date: Option<String>,
    club: Option<Uuid>,
    /// Poster file part.
    poster: Option<String>,
}

async fn store_poster(state: &AppState, poster: Option<UploadedFile>) -> ApiResult<Option<String>> {
    match poster {
        Some(file) => Ok(Some(
            state
                .storage
                .store(UploadCategory::EventPosters, &file.file_name, file.data)
                .await?,
        )),
        None => Ok(None),
    }
}

/// EventFilter
///
/// Query parameters of the event listing (`GET /api/events?club=<id>`).
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EventFilter {
    /// Only events of this club.
    pub club: Option<Uuid>,
}

fn visibility_of(actor: Option<&AuthUser>) -> EventVisibility {
    authz::event_visibility(actor.map(|a| &a.roles))
}

/// visible_event
///
/// Loads an event the actor is allowed to see. A restricted actor asking for an
/// unapproved event gets the same 404 as for a missing one.
pub(crate) async fn visible_event(
    state: &AppState,
    actor: Option<&AuthUser>,
    id: Uuid,
) -> ApiResult<Event> {
    let event = state
        .repo
        .get_event(id)
        .await?
        .ok_or_else(|| ApiError::not_found(EVENT_NOT_FOUND))?;

    match visibility_of(actor) {
        EventVisibility::ApprovedOnly if event.status != EventStatus::Approved => {
            Err(ApiError::not_found(EVENT_NOT_FOUND))
        }
        _ => Ok(event),
    }
}

/// list_events
///
/// [Public Route] Anonymous callers and plain students/staff only see approved events;
/// any other role sees every status.
#[utoipa::path(
    get,
    path = "/api/events",
    tag = "events",
    params(EventFilter),
    responses((status = 200, description = "Events ordered by date", body = [Event]))
)]
pub async fn list_events(
    actor: Option<AuthUser>,
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<EventFilter>,
) -> ApiResult<Json<Vec<Event>>> {
    let query = EventQuery {
        club: filter.club,
        visibility: visibility_of(actor.as_ref()),
    };
    Ok(Json(state.repo.list_events(query).await?))
}

#[utoipa::path(
    get,
    path = "/api/events/{id}",
    tag = "events",
    params(("id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 200, description = "Event", body = Event),
        (status = 404, description = "Not found or not visible", body = MessageResponse)
    )
)]
pub async fn get_event(
    actor: Option<AuthUser>,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Event>> {
    Ok(Json(visible_event(&state, actor.as_ref(), id).await?))
}

/// create_event
///
/// [Authenticated Route] Club leaders propose events; every new event starts `pending`.
/// Accepts JSON, or a multipart form with an optional `poster` image.
#[utoipa::path(
    post,
    path = "/api/events",
    tag = "events",
    request_body(content(
        (CreateEventRequest = "application/json"),
        (EventForm = "multipart/form-data")
    )),
    responses(
        (status = 201, description = "Created, pending review", body = Event),
        (status = 400, description = "Missing field", body = MessageResponse),
        (status = 403, description = "Requires club_leader", body = MessageResponse),
        (status = 404, description = "Club not found", body = MessageResponse)
    )
)]
pub async fn create_event(
    actor: AuthUser,
    State(state): State<AppState>,
    body: EventBody<CreateEventRequest>,
) -> ApiResult<(StatusCode, Json<Event>)> {
    authz::authorize(&actor.roles, Action::CreateEvent)?;

    let EventBody {
        fields: payload,
        poster,
    } = body;
    let (Some(title), Some(description), Some(date), Some(club)) = (
        optional(payload.title),
        optional(payload.description),
        optional(payload.date),
        payload.club,
    ) else {
        return Err(ApiError::validation("All fields are required."));
    };
    let date = parse_datetime(&date, "date")?;

    let poster = store_poster(&state, poster).await?;
    let created = state
        .repo
        .create_event(NewEvent {
            title,
            description,
            date,
            club,
            created_by: actor.id,
            poster: poster.clone(),
        })
        .await;
    if created.is_err() {
        discard_upload(&state, poster.as_deref()).await;
    }
    let event = created?;

    tracing::info!(event_id = %event.id, club_id = %club, actor = %actor.id, "event proposed");
    Ok((StatusCode::CREATED, Json(event)))
}

/// update_event
///
/// [Authenticated Route] Partial update of the descriptive fields and the poster. The
/// status only moves through approve/reject.
#[utoipa::path(
    put,
    path = "/api/events/{id}",
    tag = "events",
    params(("id" = Uuid, Path, description = "Event id")),
    request_body(content(
        (UpdateEventRequest = "application/json"),
        (EventForm = "multipart/form-data")
    )),
    responses(
        (status = 200, description = "Updated", body = Event),
        (status = 403, description = "Not permitted", body = MessageResponse),
        (status = 404, description = "Event or club not found", body = MessageResponse)
    )
)]
pub async fn update_event(
    actor: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    body: EventBody<UpdateEventRequest>,
) -> ApiResult<Json<Event>> {
    authz::authorize(&actor.roles, Action::UpdateEvent)?;

    let EventBody {
        fields: payload,
        poster,
    } = body;
    let date = optional(payload.date)
        .map(|raw| parse_datetime(&raw, "date"))
        .transpose()?;
    let Some(existing) = state.repo.get_event(id).await? else {
        return Err(ApiError::not_found(EVENT_NOT_FOUND));
    };

    let poster = store_poster(&state, poster).await?;
    let changes = EventChanges {
        title: optional(payload.title),
        description: optional(payload.description),
        date,
        club: payload.club,
        poster: poster.clone(),
    };
    let updated = state.repo.update_event(id, changes).await;
    if !matches!(updated, Ok(Some(_))) {
        discard_upload(&state, poster.as_deref()).await;
    }
    let event = updated?.ok_or_else(|| ApiError::not_found(EVENT_NOT_FOUND))?;
    if poster.is_some() {
        discard_upload(&state, existing.poster.as_deref()).await;
    }
    Ok(Json(event))
}

#[utoipa::path(
    delete,
    path = "/api/events/{id}",
    tag = "events",
    params(("id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Not permitted", body = MessageResponse),
        (status = 404, description = "Not found", body = MessageResponse)
    )
)]
pub async fn delete_event(
    actor: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    authz::authorize(&actor.roles, Action::DeleteEvent)?;

    if !state.repo.delete_event(id).await? {
        return Err(ApiError::not_found(EVENT_NOT_FOUND));
    }
    tracing::info!(event_id = %id, actor = %actor.id, "event deleted");
    Ok(Json(MessageResponse::new("Event deleted.")))
}

/// review
///
/// Applies a review decision. The status is overwritten unconditionally, so a
/// reviewed event can be re-approved or flipped.
async fn review(
    state: &AppState,
    actor: &AuthUser,
    id: Uuid,
    decision: ReviewDecision,
) -> ApiResult<EventReviewResponse> {
    authz::authorize(&actor.roles, Action::ReviewEvent)?;

    let event = state
        .repo
        .set_event_status(id, decision.status())
        .await?
        .ok_or_else(|| ApiError::not_found(EVENT_NOT_FOUND))?;

    tracing::info!(event_id = %id, actor = %actor.id, status = %event.status, "event reviewed");
    Ok(EventReviewResponse {
        message: format!("Event {}.", decision.past_tense()),
        event,
    })
}

#[utoipa::path(
    post,
    path = "/api/events/{id}/approve",
    tag = "events",
    params(("id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 200, description = "Approved", body = EventReviewResponse),
        (status = 403, description = "Requires sto or patron", body = MessageResponse),
        (status = 404, description = "Not found", body = MessageResponse)
    )
)]
pub async fn approve_event(
    actor: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<EventReviewResponse>> {
    Ok(Json(review(&state, &actor, id, ReviewDecision::Approve).await?))
}

#[utoipa::path(
    post,
    path = "/api/events/{id}/reject",
    tag = "events",
    params(("id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 200, description = "Rejected", body = EventReviewResponse),
        (status = 403, description = "Requires sto or patron", body = MessageResponse),
        (status = 404, description = "Not found", body = MessageResponse)
    )
)]
pub async fn reject_event(
    actor: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<EventReviewResponse>> {
    Ok(Json(review(&state, &actor, id, ReviewDecision::Reject).await?))
}

/// like_event
///
/// [Authenticated Route] Idempotent; liking twice leaves a single like.
#[utoipa::path(
    post,
    path = "/api/events/{id}/like",
    tag = "events",
    params(("id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 200, description = "Liked", body = Event),
        (status = 404, description = "Not found", body = MessageResponse)
    )
)]
pub async fn like_event(
    actor: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Event>> {
    visible_event(&state, Some(&actor), id).await?;
    state
        .repo
        .add_like(id, actor.id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(EVENT_NOT_FOUND))
}

#[utoipa::path(
    post,
    path = "/api/events/{id}/unlike",
    tag = "events",
    params(("id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 200, description = "Like removed", body = Event),
        (status = 404, description = "Not found", body = MessageResponse)
    )
)]
pub async fn unlike_event(
    actor: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Event>> {
    visible_event(&state, Some(&actor), id).await?;
    state
        .repo
        .remove_like(id, actor.id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(EVENT_NOT_FOUND))
}

/// svp_event
///
/// [Authenticated Route] Marks the caller as attending. Idempotent.
#[utoipa::path(
    post,
    path = "/api/events/{id}/svp",
    tag = "events",
    params(("id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 200, description = "Attendance recorded", body = Event),
        (status = 404, description = "Not found", body = MessageResponse)
    )
)]
pub async fn svp_event(
    actor: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Event>> {
    visible_event(&state, Some(&actor), id).await?;
    state
        .repo
        .add_svp(id, actor.id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(EVENT_NOT_FOUND))
}

#[utoipa::path(
    get,
    path = "/api/events/{id}/svp",
    tag = "events",
    params(("id" = Uuid, Path, description = "Event id")),
    responses(
        (status = 200, description = "Attendance list", body = AttendanceList),
        (status = 403, description = "Requires club_leader, patron or sto", body = MessageResponse),
        (status = 404, description = "Not found", body = MessageResponse)
    )
)]
pub async fn attendance(
    actor: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<AttendanceList>> {
    authz::authorize(&actor.roles, Action::ViewAttendance)?;

    let members = state
        .repo
        .attendance(id)
        .await?
        .ok_or_else(|| ApiError::not_found(EVENT_NOT_FOUND))?;
    Ok(Json(AttendanceList {
        count: members.len(),
        members,
    }))
}

