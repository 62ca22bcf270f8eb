use super::{EventQuery, RepoResult, Repository, RepositoryError};
use crate::{
    authz::EventVisibility,
    models::{
        Club, ClubChanges, ClubDetails, Comment, Event, EventChanges, EventStatus, NewClub,
        NewEvent, NewUser, User, UserCredentials, UserSummary,
    },
    roles::{Role, RoleSet},
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

struct StoredUser {
    id: Uuid,
    reg_number: String,
    email: String,
    name: String,
    surname: String,
    date_of_birth: NaiveDate,
    password_hash: String,
    roles: RoleSet,
    profile_picture: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

struct StoredClub {
    id: Uuid,
    name: String,
    description: String,
    introduced_at: NaiveDate,
    profile_pic: Option<String>,
    patron: Option<Uuid>,
    club_leaders: Vec<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

struct StoredEvent {
    id: Uuid,
    title: String,
    description: String,
    date: DateTime<Utc>,
    club: Uuid,
    created_by: Uuid,
    status: EventStatus,
    poster: Option<String>,
    likes: Vec<Uuid>,
    svp_list: Vec<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

struct StoredComment {
    id: Uuid,
    event_id: Uuid,
    user_id: Uuid,
    content: String,
    created_at: DateTime<Utc>,
    /// Insertion counter; breaks ties between comments created in the same instant.
    seq: u64,
}

#[derive(Default)]
struct Store {
    users: HashMap<Uuid, StoredUser>,
    clubs: HashMap<Uuid, StoredClub>,
    /// (club, user) pairs in join order. The only record of membership.
    memberships: Vec<(Uuid, Uuid)>,
    events: HashMap<Uuid, StoredEvent>,
    comments: HashMap<Uuid, StoredComment>,
    comment_seq: u64,
}

impl Store {
    fn user(&self, stored: &StoredUser) -> User {
        User {
            id: stored.id,
            reg_number: stored.reg_number.clone(),
            email: stored.email.clone(),
            name: stored.name.clone(),
            surname: stored.surname.clone(),
            date_of_birth: stored.date_of_birth,
            roles: stored.roles.clone(),
            profile_picture: stored.profile_picture.clone(),
            clubs_joined: self
                .memberships
                .iter()
                .filter(|(_, user)| *user == stored.id)
                .map(|(club, _)| *club)
                .collect(),
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        }
    }

    fn summary(&self, id: Uuid) -> Option<UserSummary> {
        self.users.get(&id).map(|stored| UserSummary {
            id: stored.id,
            name: stored.name.clone(),
            surname: stored.surname.clone(),
            reg_number: stored.reg_number.clone(),
            roles: stored.roles.clone(),
        })
    }

    fn summaries(&self, ids: &[Uuid]) -> Vec<UserSummary> {
        ids.iter().filter_map(|id| self.summary(*id)).collect()
    }

    fn members_of(&self, club_id: Uuid) -> Vec<Uuid> {
        self.memberships
            .iter()
            .filter(|(club, _)| *club == club_id)
            .map(|(_, user)| *user)
            .collect()
    }

    fn club(&self, stored: &StoredClub) -> Club {
        Club {
            id: stored.id,
            name: stored.name.clone(),
            description: stored.description.clone(),
            introduced_at: stored.introduced_at,
            profile_pic: stored.profile_pic.clone(),
            patron: stored.patron,
            club_leaders: stored.club_leaders.clone(),
            members: self.members_of(stored.id),
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        }
    }

    fn club_details(&self, stored: &StoredClub) -> ClubDetails {
        ClubDetails {
            id: stored.id,
            name: stored.name.clone(),
            description: stored.description.clone(),
            introduced_at: stored.introduced_at,
            profile_pic: stored.profile_pic.clone(),
            patron: stored.patron.and_then(|id| self.summary(id)),
            club_leaders: self.summaries(&stored.club_leaders),
            members: self.summaries(&self.members_of(stored.id)),
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        }
    }

    fn event(&self, stored: &StoredEvent) -> Event {
        let mut comments: Vec<&StoredComment> = self
            .comments
            .values()
            .filter(|c| c.event_id == stored.id)
            .collect();
        comments.sort_by_key(|c| c.seq);

        Event {
            id: stored.id,
            title: stored.title.clone(),
            description: stored.description.clone(),
            date: stored.date,
            club: stored.club,
            created_by: stored.created_by,
            status: stored.status,
            poster: stored.poster.clone(),
            likes: stored.likes.clone(),
            svp_list: stored.svp_list.clone(),
            comments: comments.into_iter().map(|c| c.id).collect(),
            created_at: stored.created_at,
            updated_at: stored.updated_at,
        }
    }

    fn comment(&self, stored: &StoredComment) -> Comment {
        Comment {
            id: stored.id,
            event_id: stored.event_id,
            user_id: stored.user_id,
            content: stored.content.clone(),
            created_at: stored.created_at,
            author: self.summary(stored.user_id),
        }
    }

    fn name_taken(&self, name: &str, except: Option<Uuid>) -> bool {
        self.clubs
            .values()
            .any(|club| club.name == name && Some(club.id) != except)
    }

    fn require_user(&self, id: Uuid, missing: &str) -> RepoResult<()> {
        if self.users.contains_key(&id) {
            Ok(())
        } else {
            Err(RepositoryError::MissingReference(missing.to_string()))
        }
    }
}

/// InMemoryRepository
///
/// A `Repository` kept entirely in process memory. Enforces the same uniqueness and
/// reference rules as the Postgres schema. Used when no `DATABASE_URL` is configured in
/// local mode, and by the test suite.
#[derive(Default)]
pub struct InMemoryRepository {
    store: RwLock<Store>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let mut store = self.store.write().await;
        let taken = store
            .users
            .values()
            .any(|u| u.email == user.email || u.reg_number == user.reg_number);
        if taken {
            return Err(RepositoryError::Conflict("User already exists".to_string()));
        }

        let now = Utc::now();
        let stored = StoredUser {
            id: Uuid::new_v4(),
            reg_number: user.reg_number,
            email: user.email,
            name: user.name,
            surname: user.surname,
            date_of_birth: user.date_of_birth,
            password_hash: user.password_hash,
            roles: user.roles,
            profile_picture: user.profile_picture,
            created_at: now,
            updated_at: now,
        };
        let created = store.user(&stored);
        store.users.insert(stored.id, stored);
        Ok(created)
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let store = self.store.read().await;
        Ok(store.users.get(&id).map(|u| store.user(u)))
    }

    async fn get_credentials(&self, email: &str) -> RepoResult<Option<UserCredentials>> {
        let store = self.store.read().await;
        Ok(store
            .users
            .values()
            .find(|u| u.email == email)
            .map(|u| UserCredentials {
                user: store.user(u),
                password_hash: u.password_hash.clone(),
            }))
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let store = self.store.read().await;
        let mut users: Vec<User> = store.users.values().map(|u| store.user(u)).collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn add_role(&self, user_id: Uuid, role: Role) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        let user = store
            .users
            .get_mut(&user_id)
            .ok_or_else(|| RepositoryError::MissingReference("User not found.".to_string()))?;
        let added = user.roles.insert(role);
        if added {
            user.updated_at = Utc::now();
        }
        Ok(added)
    }

    async fn remove_role(&self, user_id: Uuid, role: Role) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        let Some(user) = store.users.get_mut(&user_id) else {
            return Ok(false);
        };
        let removed = user.roles.remove(role);
        if removed {
            user.updated_at = Utc::now();
        }
        Ok(removed)
    }

    async fn create_club(&self, club: NewClub) -> RepoResult<Club> {
        let mut store = self.store.write().await;
        if store.name_taken(&club.name, None) {
            return Err(RepositoryError::Conflict(
                "A club with this name already exists".to_string(),
            ));
        }
        for user in club.patron.iter().chain(club.club_leaders.iter()) {
            store.require_user(*user, "Patron or club leader not found")?;
        }

        let mut leaders = Vec::new();
        for leader in club.club_leaders {
            if !leaders.contains(&leader) {
                leaders.push(leader);
            }
        }

        let now = Utc::now();
        let stored = StoredClub {
            id: Uuid::new_v4(),
            name: club.name,
            description: club.description,
            introduced_at: club.introduced_at,
            profile_pic: club.profile_pic,
            patron: club.patron,
            club_leaders: leaders,
            created_at: now,
            updated_at: now,
        };
        let created = store.club(&stored);
        store.clubs.insert(stored.id, stored);
        Ok(created)
    }

    async fn list_clubs(&self) -> RepoResult<Vec<ClubDetails>> {
        let store = self.store.read().await;
        let mut clubs: Vec<ClubDetails> =
            store.clubs.values().map(|c| store.club_details(c)).collect();
        clubs.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(clubs)
    }

    async fn get_club(&self, id: Uuid) -> RepoResult<Option<ClubDetails>> {
        let store = self.store.read().await;
        Ok(store.clubs.get(&id).map(|c| store.club_details(c)))
    }

    async fn update_club(&self, id: Uuid, changes: ClubChanges) -> RepoResult<Option<Club>> {
        let mut store = self.store.write().await;
        if let Some(name) = &changes.name {
            if store.name_taken(name, Some(id)) {
                return Err(RepositoryError::Conflict(
                    "A club with this name already exists".to_string(),
                ));
            }
        }
        let Some(club) = store.clubs.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = changes.name {
            club.name = name;
        }
        if let Some(description) = changes.description {
            club.description = description;
        }
        if let Some(introduced_at) = changes.introduced_at {
            club.introduced_at = introduced_at;
        }
        if let Some(profile_pic) = changes.profile_pic {
            club.profile_pic = Some(profile_pic);
        }
        club.updated_at = Utc::now();

        Ok(store.clubs.get(&id).map(|c| store.club(c)))
    }

    /// delete_club
    ///
    /// Cascades like the Postgres schema: memberships, events and their comments go too.
    async fn delete_club(&self, id: Uuid) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        if store.clubs.remove(&id).is_none() {
            return Ok(false);
        }
        store.memberships.retain(|(club, _)| *club != id);
        store.events.retain(|_, event| event.club != id);
        let events = &store.events;
        let orphaned: Vec<Uuid> = store
            .comments
            .values()
            .filter(|c| !events.contains_key(&c.event_id))
            .map(|c| c.id)
            .collect();
        for comment in orphaned {
            store.comments.remove(&comment);
        }
        Ok(true)
    }

    async fn add_member(&self, club_id: Uuid, user_id: Uuid) -> RepoResult<Option<Club>> {
        let mut store = self.store.write().await;
        if !store.clubs.contains_key(&club_id) {
            return Ok(None);
        }
        store.require_user(user_id, "User not found.")?;
        if !store.memberships.contains(&(club_id, user_id)) {
            store.memberships.push((club_id, user_id));
        }
        Ok(store.clubs.get(&club_id).map(|c| store.club(c)))
    }

    async fn club_leaders(&self, club_id: Uuid) -> RepoResult<Option<Vec<UserSummary>>> {
        let store = self.store.read().await;
        Ok(store
            .clubs
            .get(&club_id)
            .map(|c| store.summaries(&c.club_leaders)))
    }

    async fn club_members(&self, club_id: Uuid) -> RepoResult<Option<Vec<UserSummary>>> {
        let store = self.store.read().await;
        if !store.clubs.contains_key(&club_id) {
            return Ok(None);
        }
        Ok(Some(store.summaries(&store.members_of(club_id))))
    }

    async fn create_event(&self, event: NewEvent) -> RepoResult<Event> {
        let mut store = self.store.write().await;
        if !store.clubs.contains_key(&event.club) {
            return Err(RepositoryError::MissingReference("Club not found.".to_string()));
        }
        store.require_user(event.created_by, "User not found.")?;

        let now = Utc::now();
        let stored = StoredEvent {
            id: Uuid::new_v4(),
            title: event.title,
            description: event.description,
            date: event.date,
            club: event.club,
            created_by: event.created_by,
            status: EventStatus::Pending,
            poster: event.poster,
            likes: Vec::new(),
            svp_list: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        let created = store.event(&stored);
        store.events.insert(stored.id, stored);
        Ok(created)
    }

    async fn list_events(&self, query: EventQuery) -> RepoResult<Vec<Event>> {
        let store = self.store.read().await;
        let mut events: Vec<&StoredEvent> = store
            .events
            .values()
            .filter(|e| {
                query.visibility == EventVisibility::All || e.status == EventStatus::Approved
            })
            .filter(|e| query.club.is_none_or(|club| e.club == club))
            .collect();
        events.sort_by_key(|e| (e.date, e.created_at));
        Ok(events.into_iter().map(|e| store.event(e)).collect())
    }

    async fn get_event(&self, id: Uuid) -> RepoResult<Option<Event>> {
        let store = self.store.read().await;
        Ok(store.events.get(&id).map(|e| store.event(e)))
    }

    async fn update_event(&self, id: Uuid, changes: EventChanges) -> RepoResult<Option<Event>> {
        let mut store = self.store.write().await;
        if let Some(club) = changes.club {
            if !store.clubs.contains_key(&club) {
                return Err(RepositoryError::MissingReference("Club not found.".to_string()));
            }
        }
        let Some(event) = store.events.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = changes.title {
            event.title = title;
        }
        if let Some(description) = changes.description {
            event.description = description;
        }
        if let Some(date) = changes.date {
            event.date = date;
        }
        if let Some(club) = changes.club {
            event.club = club;
        }
        if let Some(poster) = changes.poster {
            event.poster = Some(poster);
        }
        event.updated_at = Utc::now();

        Ok(store.events.get(&id).map(|e| store.event(e)))
    }

    async fn delete_event(&self, id: Uuid) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        if store.events.remove(&id).is_none() {
            return Ok(false);
        }
        store.comments.retain(|_, c| c.event_id != id);
        Ok(true)
    }

    async fn set_event_status(&self, id: Uuid, status: EventStatus) -> RepoResult<Option<Event>> {
        let mut store = self.store.write().await;
        let Some(event) = store.events.get_mut(&id) else {
            return Ok(None);
        };
        event.status = status;
        event.updated_at = Utc::now();
        Ok(store.events.get(&id).map(|e| store.event(e)))
    }

    async fn add_like(&self, event_id: Uuid, user_id: Uuid) -> RepoResult<Option<Event>> {
        let mut store = self.store.write().await;
        let Some(event) = store.events.get_mut(&event_id) else {
            return Ok(None);
        };
        if !event.likes.contains(&user_id) {
            event.likes.push(user_id);
        }
        Ok(store.events.get(&event_id).map(|e| store.event(e)))
    }

    async fn remove_like(&self, event_id: Uuid, user_id: Uuid) -> RepoResult<Option<Event>> {
        let mut store = self.store.write().await;
        let Some(event) = store.events.get_mut(&event_id) else {
            return Ok(None);
        };
        event.likes.retain(|id| *id != user_id);
        Ok(store.events.get(&event_id).map(|e| store.event(e)))
    }

    async fn add_svp(&self, event_id: Uuid, user_id: Uuid) -> RepoResult<Option<Event>> {
        let mut store = self.store.write().await;
        let Some(event) = store.events.get_mut(&event_id) else {
            return Ok(None);
        };
        if !event.svp_list.contains(&user_id) {
            event.svp_list.push(user_id);
        }
        Ok(store.events.get(&event_id).map(|e| store.event(e)))
    }

    async fn attendance(&self, event_id: Uuid) -> RepoResult<Option<Vec<UserSummary>>> {
        let store = self.store.read().await;
        Ok(store
            .events
            .get(&event_id)
            .map(|e| store.summaries(&e.svp_list)))
    }

    async fn add_comment(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        content: String,
    ) -> RepoResult<Option<Comment>> {
        let mut store = self.store.write().await;
        if !store.events.contains_key(&event_id) {
            return Ok(None);
        }
        store.require_user(user_id, "User not found.")?;

        store.comment_seq += 1;
        let stored = StoredComment {
            id: Uuid::new_v4(),
            event_id,
            user_id,
            content,
            created_at: Utc::now(),
            seq: store.comment_seq,
        };
        let created = store.comment(&stored);
        store.comments.insert(stored.id, stored);
        Ok(Some(created))
    }

    async fn delete_comment(&self, id: Uuid) -> RepoResult<bool> {
        let mut store = self.store.write().await;
        Ok(store.comments.remove(&id).is_some())
    }

    async fn list_comments(&self, event_id: Uuid) -> RepoResult<Vec<Comment>> {
        let store = self.store.read().await;
        let mut comments: Vec<&StoredComment> = store
            .comments
            .values()
            .filter(|c| c.event_id == event_id)
            .collect();
        comments.sort_by_key(|c| std::cmp::Reverse(c.seq));
        Ok(comments.into_iter().map(|c| store.comment(c)).collect())
    }
}
