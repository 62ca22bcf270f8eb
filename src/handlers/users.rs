use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
};
use axum_extra::extract::cookie::CookieJar;

use super::{ApiJson, FormData, UploadedFile, discard_upload, parse_date, required};
use crate::{
    AppState,
    auth::{self, AuthUser},
    authz::{self, Action, RoleChange},
    error::{ApiError, ApiResult},
    models::{
        AuthResponse, LoginRequest, MessageResponse, NewUser, RegisterUserRequest,
        RoleChangeRequest, RoleChangeResponse, User,
    },
    password,
    roles::{Role, RoleSet},
    storage::UploadCategory,
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

type AuthReply = (StatusCode, CookieJar, Json<AuthResponse>);

/// register
///
/// Shared by both registration routes: validates the payload, derives the initial role
/// from the registration number, hashes the password, stores the optional picture and
/// persists the account. Duplicates surface as 409 from the repository, and the picture
/// is removed again.
async fn register(
    state: &AppState,
    payload: RegisterUserRequest,
    picture: Option<UploadedFile>,
) -> ApiResult<User> {
    let reg_number = required(payload.reg_number, "regNumber")?;
    let email = required(payload.email, "email")?.to_lowercase();
    let name = required(payload.name, "name")?;
    let surname = required(payload.surname, "surname")?;
    let date_of_birth = required(payload.date_of_birth, "dateOfBirth")?;
    let date_of_birth = parse_date(&date_of_birth, "dateOfBirth")?;
    let password = payload
        .password
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ApiError::validation("password is required."))?;

    if !email.contains('@') {
        return Err(ApiError::validation("email must be a valid email address."));
    }

    let roles: RoleSet = Role::for_registration_number(&reg_number).into_iter().collect();
    let password_hash = password::hash_password(password).await?;

    let profile_picture = match picture {
        Some(file) => Some(
            state
                .storage
                .store(UploadCategory::ProfilePictures, &file.file_name, file.data)
                .await?,
        ),
        None => None,
    };

    let created = state
        .repo
        .create_user(NewUser {
            reg_number,
            email,
            name,
            surname,
            date_of_birth,
            password_hash,
            roles,
            profile_picture: profile_picture.clone(),
        })
        .await;
    if created.is_err() {
        discard_upload(state, profile_picture.as_deref()).await;
    }
    let user = created?;

    tracing::info!(user_id = %user.id, roles = ?user.roles, "user registered");
    Ok(user)
}

fn signed_in(
    state: &AppState,
    jar: CookieJar,
    status: StatusCode,
    user: User,
) -> ApiResult<AuthReply> {
    let token = auth::issue_token(&state.config, &user)?;
    let jar = jar.add(auth::token_cookie(&state.config, token.clone()));
    Ok((status, jar, Json(AuthResponse { user, token })))
}

/// create_user
///
/// [Public Route] Multipart registration with an optional `profilePicture` file.
#[utoipa::path(
    post,
    path = "/api/users",
    tag = "users",
    request_body(content = RegisterUserRequest, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Registered and signed in", body = AuthResponse),
        (status = 400, description = "Missing or invalid field", body = MessageResponse),
        (status = 409, description = "Email or registration number taken", body = MessageResponse)
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    jar: CookieJar,
    multipart: Multipart,
) -> ApiResult<AuthReply> {
    let mut form = FormData::read(multipart).await?;
    let payload = RegisterUserRequest {
        reg_number: form.text("regNumber"),
        email: form.text("email"),
        name: form.text("name"),
        surname: form.text("surname"),
        date_of_birth: form.text("dateOfBirth").or_else(|| form.text("dob")),
        password: form.text("password"),
    };
    let picture = form.take_file("profilePicture");

    let user = register(&state, payload, picture).await?;
    signed_in(&state, jar, StatusCode::CREATED, user)
}

/// register_user
///
/// [Public Route] JSON registration (no picture).
#[utoipa::path(
    post,
    path = "/api/users/register",
    tag = "users",
    request_body = RegisterUserRequest,
    responses(
        (status = 201, description = "Registered and signed in", body = AuthResponse),
        (status = 400, description = "Missing or invalid field", body = MessageResponse),
        (status = 409, description = "Email or registration number taken", body = MessageResponse)
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(payload): ApiJson<RegisterUserRequest>,
) -> ApiResult<AuthReply> {
    let user = register(&state, payload, None).await?;
    signed_in(&state, jar, StatusCode::CREATED, user)
}

/// login_user
///
/// [Public Route] Verifies email and password. Unknown email and wrong password give
/// the same 401 so the response does not reveal which accounts exist.
#[utoipa::path(
    post,
    path = "/api/users/auth",
    tag = "users",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = MessageResponse)
    )
)]
pub async fn login_user(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> ApiResult<AuthReply> {
    let email = required(payload.email, "email")?.to_lowercase();
    let password = payload
        .password
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::validation("password is required."))?;

    let Some(credentials) = state.repo.get_credentials(&email).await? else {
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    };
    if !password::verify_password(password, credentials.password_hash).await? {
        tracing::debug!(user_id = %credentials.user.id, "login rejected: wrong password");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    signed_in(&state, jar, StatusCode::OK, credentials.user)
}

#[utoipa::path(
    post,
    path = "/api/users/logout",
    tag = "users",
    responses((status = 200, description = "Cookie cleared", body = MessageResponse))
)]
pub async fn logout_user(jar: CookieJar) -> (CookieJar, Json<MessageResponse>) {
    (
        auth::clear_token_cookie(jar),
        Json(MessageResponse::new("Logged out successfully")),
    )
}

/// get_me
///
/// [Authenticated Route] The caller's profile, including the clubs they joined.
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "users",
    responses(
        (status = 200, description = "Profile", body = User),
        (status = 401, description = "Not signed in", body = MessageResponse)
    )
)]
pub async fn get_me(actor: AuthUser, State(state): State<AppState>) -> ApiResult<Json<User>> {
    let user = state
        .repo
        .get_user(actor.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found."))?;
    Ok(Json(user))
}

#[utoipa::path(
    get,
    path = "/api/users",
    tag = "users",
    responses(
        (status = 200, description = "All users", body = [User]),
        (status = 403, description = "Requires admin, sto or patron", body = MessageResponse)
    )
)]
pub async fn list_users(
    actor: AuthUser,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<User>>> {
    authz::authorize(&actor.roles, Action::ListUsers)?;
    Ok(Json(state.repo.list_users().await?))
}

/// change_role
///
/// Check order: self-change and rule (403), target existence (404), redundancy (409).
async fn change_role(
    state: &AppState,
    actor: &AuthUser,
    request: RoleChangeRequest,
    change: RoleChange,
) -> ApiResult<RoleChangeResponse> {
    let RoleChangeRequest { user_id, role } = request;
    authz::authorize_role_change(actor.id, &actor.roles, user_id, role, change)?;

    if state.repo.get_user(user_id).await?.is_none() {
        return Err(ApiError::not_found("User not found."));
    }

    let applied = match change {
        RoleChange::Grant => state.repo.add_role(user_id, role).await?,
        RoleChange::Revoke => state.repo.remove_role(user_id, role).await?,
    };
    if !applied {
        return Err(ApiError::Conflict(match change {
            RoleChange::Grant => format!("User already has role {role}."),
            RoleChange::Revoke => format!("User does not have role {role}."),
        }));
    }

    let user = state
        .repo
        .get_user(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found."))?;

    tracing::info!(actor = %actor.id, target = %user_id, %role, %change, "role changed");
    Ok(RoleChangeResponse {
        message: format!("Role {role} {change}."),
        user,
    })
}

/// assign_role
///
/// [Authenticated Route] Grants a role. Also served as `/api/users/promote`.
#[utoipa::path(
    post,
    path = "/api/users/assign-role",
    tag = "users",
    request_body = RoleChangeRequest,
    responses(
        (status = 200, description = "Role granted", body = RoleChangeResponse),
        (status = 403, description = "Not permitted", body = MessageResponse),
        (status = 404, description = "Target not found", body = MessageResponse),
        (status = 409, description = "Role already held", body = MessageResponse)
    )
)]
pub async fn assign_role(
    actor: AuthUser,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RoleChangeRequest>,
) -> ApiResult<Json<RoleChangeResponse>> {
    Ok(Json(change_role(&state, &actor, request, RoleChange::Grant).await?))
}

/// remove_role
///
/// [Authenticated Route] Revokes a role. Also served as `/api/users/demote`.
#[utoipa::path(
    post,
    path = "/api/users/remove-role",
    tag = "users",
    request_body = RoleChangeRequest,
    responses(
        (status = 200, description = "Role revoked", body = RoleChangeResponse),
        (status = 403, description = "Not permitted", body = MessageResponse),
        (status = 404, description = "Target not found", body = MessageResponse),
        (status = 409, description = "Role not held", body = MessageResponse)
    )
)]
pub async fn remove_role(
    actor: AuthUser,
    State(state): State<AppState>,
    ApiJson(request): ApiJson<RoleChangeRequest>,
) -> ApiResult<Json<RoleChangeResponse>> {
    Ok(Json(change_role(&state, &actor, request, RoleChange::Revoke).await?))
}

