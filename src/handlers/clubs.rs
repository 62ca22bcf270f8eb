use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
};
use chrono::NaiveDate;
use uuid::Uuid;

use super::{ApiPath, FormData, UploadedFile, discard_upload, parse_date, parse_uuid};
use crate::{
    AppState,
    auth::AuthUser,
    authz::{self, Action},
    error::{ApiError, ApiResult},
    models::{Club, ClubChanges, ClubDetails, MessageResponse, NewClub, UserSummary},
    storage::UploadCategory,
};

const CLUB_NOT_FOUND: &str = "Club not found";

/// The multipart fields of club create and update, for the OpenAPI document.
#[allow(dead_code)]
#[derive(serde::Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClubForm {
    name: Option<String>,
    description: Option<String>,
    introduced_at: Option<NaiveDate>,
    patron: Option<Uuid>,
    club_leaders: Vec<Uuid>,
    /// Picture file part.
    profile_pic: Option<String>,
}

async fn store_picture(
    state: &AppState,
    picture: Option<UploadedFile>,
) -> ApiResult<Option<String>> {
    match picture {
        Some(file) => Ok(Some(
            state
                .storage
                .store(UploadCategory::ClubPictures, &file.file_name, file.data)
                .await?,
        )),
        None => Ok(None),
    }
}

/// create_club
///
/// [Authenticated Route] Multipart form: `name`, `description`, `introducedAt`
/// required; optional `patron`, repeated `clubLeaders`, optional `profilePic` file.
#[utoipa::path(
    post,
    path = "/api/clubs",
    tag = "clubs",
    request_body(content = ClubForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Club created", body = Club),
        (status = 400, description = "Missing field", body = MessageResponse),
        (status = 403, description = "Requires admin or sto", body = MessageResponse),
        (status = 409, description = "Name taken", body = MessageResponse)
    )
)]
pub async fn create_club(
    actor: AuthUser,
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Club>)> {
    authz::authorize(&actor.roles, Action::CreateClub)?;

    let mut form = FormData::read(multipart).await?;
    let (Some(name), Some(description), Some(introduced_at)) = (
        form.text("name"),
        form.text("description"),
        form.text("introducedAt"),
    ) else {
        return Err(ApiError::validation(
            "Name, description, and introducedAt are required",
        ));
    };
    let introduced_at = parse_date(&introduced_at, "introducedAt")?;
    let patron = form
        .text("patron")
        .map(|raw| parse_uuid(&raw, "patron"))
        .transpose()?;
    let club_leaders = form
        .all("clubLeaders")
        .iter()
        .map(|raw| parse_uuid(raw, "clubLeaders"))
        .collect::<ApiResult<Vec<Uuid>>>()?;

    let profile_pic = store_picture(&state, form.take_file("profilePic")).await?;

    let created = state
        .repo
        .create_club(NewClub {
            name,
            description,
            introduced_at,
            profile_pic: profile_pic.clone(),
            patron,
            club_leaders,
        })
        .await;
    if created.is_err() {
        discard_upload(&state, profile_pic.as_deref()).await;
    }
    let club = created?;

    tracing::info!(club_id = %club.id, actor = %actor.id, "club created");
    Ok((StatusCode::CREATED, Json(club)))
}

/// list_clubs
///
/// [Public Route] Every club with patron, leaders and members populated.
#[utoipa::path(
    get,
    path = "/api/clubs",
    tag = "clubs",
    responses((status = 200, description = "Clubs", body = [ClubDetails]))
)]
pub async fn list_clubs(State(state): State<AppState>) -> ApiResult<Json<Vec<ClubDetails>>> {
    Ok(Json(state.repo.list_clubs().await?))
}

#[utoipa::path(
    get,
    path = "/api/clubs/{id}",
    tag = "clubs",
    params(("id" = Uuid, Path, description = "Club id")),
    responses(
        (status = 200, description = "Club", body = ClubDetails),
        (status = 404, description = "Not found", body = MessageResponse)
    )
)]
pub async fn get_club(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<ClubDetails>> {
    state
        .repo
        .get_club(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(CLUB_NOT_FOUND))
}

/// update_club
///
/// [Authenticated Route] Partial multipart update; absent or blank fields are kept. A
/// new picture replaces the old file. A picture stored for an update that then fails
/// (name taken) is removed again.
#[utoipa::path(
    put,
    path = "/api/clubs/{id}",
    tag = "clubs",
    params(("id" = Uuid, Path, description = "Club id")),
    request_body(content = ClubForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Updated", body = Club),
        (status = 403, description = "Not permitted", body = MessageResponse),
        (status = 404, description = "Not found", body = MessageResponse),
        (status = 409, description = "Name taken", body = MessageResponse)
    )
)]
pub async fn update_club(
    actor: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    multipart: Multipart,
) -> ApiResult<Json<Club>> {
    authz::authorize(&actor.roles, Action::UpdateClub)?;

    let mut form = FormData::read(multipart).await?;
    let introduced_at = form
        .text("introducedAt")
        .map(|raw| parse_date(&raw, "introducedAt"))
        .transpose()?;

    let Some(existing) = state.repo.get_club(id).await? else {
        return Err(ApiError::not_found(CLUB_NOT_FOUND));
    };
    let profile_pic = store_picture(&state, form.take_file("profilePic")).await?;

    let changes = ClubChanges {
        name: form.text("name"),
        description: form.text("description"),
        introduced_at,
        profile_pic: profile_pic.clone(),
    };
    let updated = state.repo.update_club(id, changes).await;
    if !matches!(updated, Ok(Some(_))) {
        discard_upload(&state, profile_pic.as_deref()).await;
    }
    let club = updated?.ok_or_else(|| ApiError::not_found(CLUB_NOT_FOUND))?;
    if profile_pic.is_some() {
        discard_upload(&state, existing.profile_pic.as_deref()).await;
    }
    tracing::info!(club_id = %club.id, actor = %actor.id, "club updated");
    Ok(Json(club))
}

#[utoipa::path(
    delete,
    path = "/api/clubs/{id}",
    tag = "clubs",
    params(("id" = Uuid, Path, description = "Club id")),
    responses(
        (status = 200, description = "Deleted", body = MessageResponse),
        (status = 403, description = "Not permitted", body = MessageResponse),
        (status = 404, description = "Not found", body = MessageResponse)
    )
)]
pub async fn delete_club(
    actor: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    authz::authorize(&actor.roles, Action::DeleteClub)?;

    if !state.repo.delete_club(id).await? {
        return Err(ApiError::not_found(CLUB_NOT_FOUND));
    }
    tracing::info!(club_id = %id, actor = %actor.id, "club deleted");
    Ok(Json(MessageResponse::new("Club deleted")))
}

/// join_club
///
/// [Authenticated Route] Adds the caller to the club's members. Joining twice is a no-op.
#[utoipa::path(
    post,
    path = "/api/clubs/{id}/join",
    tag = "clubs",
    params(("id" = Uuid, Path, description = "Club id")),
    responses(
        (status = 200, description = "Joined", body = Club),
        (status = 404, description = "Not found", body = MessageResponse)
    )
)]
pub async fn join_club(
    actor: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Club>> {
    state
        .repo
        .add_member(id, actor.id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(CLUB_NOT_FOUND))
}

#[utoipa::path(
    get,
    path = "/api/clubs/{id}/leaders",
    tag = "clubs",
    params(("id" = Uuid, Path, description = "Club id")),
    responses(
        (status = 200, description = "Leaders", body = [UserSummary]),
        (status = 404, description = "Not found", body = MessageResponse)
    )
)]
pub async fn club_leaders(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<UserSummary>>> {
    state
        .repo
        .club_leaders(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(CLUB_NOT_FOUND))
}

#[utoipa::path(
    get,
    path = "/api/clubs/{id}/members",
    tag = "clubs",
    params(("id" = Uuid, Path, description = "Club id")),
    responses(
        (status = 200, description = "Members", body = [UserSummary]),
        (status = 403, description = "Requires club_leader, patron or sto", body = MessageResponse),
        (status = 404, description = "Not found", body = MessageResponse)
    )
)]
pub async fn club_members(
    actor: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> ApiResult<Json<Vec<UserSummary>>> {
    authz::authorize(&actor.roles, Action::ViewClubMembers)?;

    state
        .repo
        .club_members(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(CLUB_NOT_FOUND))
}
