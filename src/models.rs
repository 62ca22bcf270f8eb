use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, str::FromStr};
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::roles::{Role, RoleSet};

// --- Identity ---

/// User
///
/// A registered account as exposed by the API. The password hash never leaves the
/// repository layer except inside `UserCredentials`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub reg_number: String,
    pub email: String,
    pub name: String,
    pub surname: String,
    pub date_of_birth: NaiveDate,
    #[schema(value_type = Vec<Role>)]
    #[ts(as = "Vec<Role>")]
    pub roles: RoleSet,
    pub profile_picture: Option<String>,
    /// Derived from club membership; never written directly.
    pub clubs_joined: Vec<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.name.clone(),
            surname: self.surname.clone(),
            reg_number: self.reg_number.clone(),
            roles: self.roles.clone(),
        }
    }
}

/// UserSummary
///
/// The populated form of a user reference (club leadership, members, comment authors,
/// attendance lists).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub surname: String,
    pub reg_number: String,
    #[schema(value_type = Vec<Role>)]
    #[ts(as = "Vec<Role>")]
    pub roles: RoleSet,
}

/// Internal: a user together with the stored password hash, used only by login.
#[derive(Debug, Clone)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: String,
}

/// Internal: a validated registration ready to be persisted.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub reg_number: String,
    pub email: String,
    pub name: String,
    pub surname: String,
    pub date_of_birth: NaiveDate,
    pub password_hash: String,
    pub roles: RoleSet,
    pub profile_picture: Option<String>,
}

/// RegisterUserRequest
///
/// Registration payload (JSON variant; the multipart variant carries the same fields
/// as form parts). Fields are optional at the type level so that missing values
/// produce a 400 with a readable message instead of a deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RegisterUserRequest {
    pub reg_number: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub surname: Option<String>,
    /// ISO date (`2001-04-13`). Also accepted as `dob`.
    #[serde(alias = "dob")]
    pub date_of_birth: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// AuthResponse
///
/// Returned by registration and login. The same token is also set as the `jwt` cookie.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

/// RoleChangeRequest
///
/// Body of the assign/remove role endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RoleChangeRequest {
    pub user_id: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RoleChangeResponse {
    pub message: String,
    pub user: User,
}

/// Generic `{"message": ...}` body used for confirmations and all error responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// --- Clubs ---

/// Club
///
/// A club row with its references as plain ids. `members` is derived from the single
/// membership relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Club {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub introduced_at: NaiveDate,
    pub profile_pic: Option<String>,
    pub patron: Option<Uuid>,
    pub club_leaders: Vec<Uuid>,
    pub members: Vec<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// ClubDetails
///
/// A club with patron, leaders and members populated, as returned by the read
/// endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ClubDetails {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub introduced_at: NaiveDate,
    pub profile_pic: Option<String>,
    pub patron: Option<UserSummary>,
    pub club_leaders: Vec<UserSummary>,
    pub members: Vec<UserSummary>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Internal: a validated club creation.
#[derive(Debug, Clone)]
pub struct NewClub {
    pub name: String,
    pub description: String,
    pub introduced_at: NaiveDate,
    pub profile_pic: Option<String>,
    pub patron: Option<Uuid>,
    pub club_leaders: Vec<Uuid>,
}

/// Internal: a partial club update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct ClubChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub introduced_at: Option<NaiveDate>,
    pub profile_pic: Option<String>,
}

// --- Events ---

/// EventStatus
///
/// The approval lifecycle. Events start `Pending`; a review decision overwrites the
/// status unconditionally, so re-approving or flipping a reviewed event is allowed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, Default,
)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum EventStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl EventStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            EventStatus::Pending => "pending",
            EventStatus::Approved => "approved",
            EventStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(EventStatus::Pending),
            "approved" => Ok(EventStatus::Approved),
            "rejected" => Ok(EventStatus::Rejected),
            other => Err(format!("unknown event status `{other}`")),
        }
    }
}

/// The outcome of an approve/reject request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewDecision {
    Approve,
    Reject,
}

impl ReviewDecision {
    pub const fn status(self) -> EventStatus {
        match self {
            ReviewDecision::Approve => EventStatus::Approved,
            ReviewDecision::Reject => EventStatus::Rejected,
        }
    }

    pub const fn past_tense(self) -> &'static str {
        match self {
            ReviewDecision::Approve => "approved",
            ReviewDecision::Reject => "rejected",
        }
    }
}

/// Event
///
/// An event with its engagement sets. `comments` is derived from the comment relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[ts(type = "string")]
    pub date: DateTime<Utc>,
    pub club: Uuid,
    pub created_by: Uuid,
    pub status: EventStatus,
    /// Stored poster reference (`uploads/event_posters/...`).
    pub poster: Option<String>,
    pub likes: Vec<Uuid>,
    pub svp_list: Vec<Uuid>,
    pub comments: Vec<Uuid>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// CreateEventRequest
///
/// `date` accepts RFC 3339 timestamps or plain ISO dates (midnight UTC).
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CreateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub club: Option<Uuid>,
}

/// UpdateEventRequest
///
/// Partial update. Status is not editable here; it only moves through review.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpdateEventRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub club: Option<Uuid>,
}

/// Internal: a validated event creation.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub description: String,
    pub date: DateTime<Utc>,
    pub club: Uuid,
    pub created_by: Uuid,
    pub poster: Option<String>,
}

/// Internal: a validated partial event update.
#[derive(Debug, Clone, Default)]
pub struct EventChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub club: Option<Uuid>,
    pub poster: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct EventReviewResponse {
    pub message: String,
    pub event: Event,
}

/// AttendanceList
///
/// Everyone who marked attendance ("svp") on an event.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct AttendanceList {
    pub count: usize,
    pub members: Vec<UserSummary>,
}

// --- Comments ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Comment {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub content: String,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    /// Populated author; loaded via a join in the repository.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<UserSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateCommentRequest {
    pub content: Option<String>,
}
