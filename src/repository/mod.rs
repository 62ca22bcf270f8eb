use crate::{
    authz::EventVisibility,
    models::{
        Club, ClubChanges, ClubDetails, Comment, Event, EventChanges, EventStatus, NewClub,
        NewEvent, NewUser, User, UserCredentials, UserSummary,
    },
    roles::Role,
};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// RepositoryError
///
/// Store failures that carry meaning for the caller (`Conflict`, `MissingReference`)
/// are separated from opaque backend failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// A unique constraint was violated (duplicate email, registration number, club name).
    #[error("{0}")]
    Conflict(String),
    /// A referenced record (club, user) does not exist.
    #[error("{0}")]
    MissingReference(String),
    /// A stored value could not be mapped back into the domain model.
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// EventQuery
///
/// Filters for the event listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventQuery {
    pub club: Option<Uuid>,
    pub visibility: EventVisibility,
}

/// Repository Trait
///
/// The persistence contract shared by the Postgres store and the in-memory store.
///
/// Set-valued relations (roles, memberships, likes, attendance) are mutated through
/// idempotent add/remove operations rather than read-modify-write, and derived lists
/// (`User::clubs_joined`, `Club::members`, `Event::comments`) are computed from a single
/// owning relation.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Identity ---
    /// Fails with `Conflict` when the email or registration number is taken.
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn get_credentials(&self, email: &str) -> RepoResult<Option<UserCredentials>>;
    async fn list_users(&self) -> RepoResult<Vec<User>>;
    /// Returns false if the user already held the role.
    async fn add_role(&self, user_id: Uuid, role: Role) -> RepoResult<bool>;
    /// Returns false if the user did not hold the role.
    async fn remove_role(&self, user_id: Uuid, role: Role) -> RepoResult<bool>;

    // --- Clubs ---
    async fn create_club(&self, club: NewClub) -> RepoResult<Club>;
    async fn list_clubs(&self) -> RepoResult<Vec<ClubDetails>>;
    async fn get_club(&self, id: Uuid) -> RepoResult<Option<ClubDetails>>;
    async fn update_club(&self, id: Uuid, changes: ClubChanges) -> RepoResult<Option<Club>>;
    async fn delete_club(&self, id: Uuid) -> RepoResult<bool>;
    /// Idempotent membership add. `None` when the club does not exist.
    async fn add_member(&self, club_id: Uuid, user_id: Uuid) -> RepoResult<Option<Club>>;
    async fn club_leaders(&self, club_id: Uuid) -> RepoResult<Option<Vec<UserSummary>>>;
    async fn club_members(&self, club_id: Uuid) -> RepoResult<Option<Vec<UserSummary>>>;

    // --- Events ---
    /// Fails with `MissingReference` when the club does not exist.
    async fn create_event(&self, event: NewEvent) -> RepoResult<Event>;
    async fn list_events(&self, query: EventQuery) -> RepoResult<Vec<Event>>;
    async fn get_event(&self, id: Uuid) -> RepoResult<Option<Event>>;
    async fn update_event(&self, id: Uuid, changes: EventChanges) -> RepoResult<Option<Event>>;
    async fn delete_event(&self, id: Uuid) -> RepoResult<bool>;
    async fn set_event_status(&self, id: Uuid, status: EventStatus) -> RepoResult<Option<Event>>;
    /// Idempotent like. `None` when the event does not exist.
    async fn add_like(&self, event_id: Uuid, user_id: Uuid) -> RepoResult<Option<Event>>;
    async fn remove_like(&self, event_id: Uuid, user_id: Uuid) -> RepoResult<Option<Event>>;
    /// Idempotent attendance mark. `None` when the event does not exist.
    async fn add_svp(&self, event_id: Uuid, user_id: Uuid) -> RepoResult<Option<Event>>;
    async fn attendance(&self, event_id: Uuid) -> RepoResult<Option<Vec<UserSummary>>>;

    // --- Comments ---
    /// `None` when the event does not exist.
    async fn add_comment(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        content: String,
    ) -> RepoResult<Option<Comment>>;
    async fn delete_comment(&self, id: Uuid) -> RepoResult<bool>;
    /// Newest first.
    async fn list_comments(&self, event_id: Uuid) -> RepoResult<Vec<Comment>>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
