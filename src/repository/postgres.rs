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
use sqlx::{FromRow, PgPool, query_builder::QueryBuilder};
use std::collections::HashMap;
use uuid::Uuid;

// --- Column lists ---
// Derived lists are computed with ARRAY(subquery) so every read reflects the single
// owning relation.

const USER_COLUMNS: &str = r#"
    u.id, u.reg_number, u.email, u.name, u.surname, u.date_of_birth, u.password_hash,
    u.profile_picture,
    ARRAY(SELECT r.role FROM user_roles r WHERE r.user_id = u.id ORDER BY r.role) AS roles,
    ARRAY(SELECT m.club_id FROM club_members m WHERE m.user_id = u.id ORDER BY m.joined_at) AS clubs_joined,
    u.created_at, u.updated_at
"#;

const SUMMARY_COLUMNS: &str = r#"
    u.id, u.name, u.surname, u.reg_number,
    ARRAY(SELECT r.role FROM user_roles r WHERE r.user_id = u.id ORDER BY r.role) AS roles
"#;

const CLUB_COLUMNS: &str = r#"
    c.id, c.name, c.description, c.introduced_at, c.profile_pic, c.patron_id AS patron,
    ARRAY(SELECT l.user_id FROM club_leaders l WHERE l.club_id = c.id ORDER BY l.user_id) AS club_leaders,
    ARRAY(SELECT m.user_id FROM club_members m WHERE m.club_id = c.id ORDER BY m.joined_at) AS members,
    c.created_at, c.updated_at
"#;

const EVENT_COLUMNS: &str = r#"
    e.id, e.title, e.description, e.date, e.club_id, e.created_by, e.status, e.poster,
    ARRAY(SELECT l.user_id FROM event_likes l WHERE l.event_id = e.id ORDER BY l.created_at) AS likes,
    ARRAY(SELECT s.user_id FROM event_svps s WHERE s.event_id = e.id ORDER BY s.created_at) AS svp_list,
    ARRAY(SELECT c.id FROM comments c WHERE c.event_id = e.id ORDER BY c.created_at) AS comments,
    e.created_at, e.updated_at
"#;

const COMMENT_COLUMNS: &str = r#"
    c.id, c.event_id, c.user_id, c.content, c.created_at,
    u.name AS author_name, u.surname AS author_surname, u.reg_number AS author_reg_number,
    ARRAY(SELECT r.role FROM user_roles r WHERE r.user_id = u.id ORDER BY r.role) AS author_roles
"#;

// --- Row types ---

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    reg_number: String,
    email: String,
    name: String,
    surname: String,
    date_of_birth: NaiveDate,
    password_hash: String,
    profile_picture: Option<String>,
    roles: Vec<String>,
    clubs_joined: Vec<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_credentials(self) -> RepoResult<UserCredentials> {
        let roles = parse_roles(&self.roles)?;
        Ok(UserCredentials {
            user: User {
                id: self.id,
                reg_number: self.reg_number,
                email: self.email,
                name: self.name,
                surname: self.surname,
                date_of_birth: self.date_of_birth,
                roles,
                profile_picture: self.profile_picture,
                clubs_joined: self.clubs_joined,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            password_hash: self.password_hash,
        })
    }

    fn into_user(self) -> RepoResult<User> {
        self.into_credentials().map(|credentials| credentials.user)
    }
}

#[derive(FromRow)]
struct SummaryRow {
    id: Uuid,
    name: String,
    surname: String,
    reg_number: String,
    roles: Vec<String>,
}

impl TryFrom<SummaryRow> for UserSummary {
    type Error = RepositoryError;

    fn try_from(row: SummaryRow) -> RepoResult<Self> {
        Ok(UserSummary {
            id: row.id,
            name: row.name,
            surname: row.surname,
            reg_number: row.reg_number,
            roles: parse_roles(&row.roles)?,
        })
    }
}

/// A user summary tagged with the club it belongs to, for batched population.
#[derive(FromRow)]
struct ClubUserRow {
    club_id: Uuid,
    #[sqlx(flatten)]
    user: SummaryRow,
}

#[derive(FromRow)]
struct EventRow {
    id: Uuid,
    title: String,
    description: String,
    date: DateTime<Utc>,
    club_id: Uuid,
    created_by: Uuid,
    status: String,
    poster: Option<String>,
    likes: Vec<Uuid>,
    svp_list: Vec<Uuid>,
    comments: Vec<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for Event {
    type Error = RepositoryError;

    fn try_from(row: EventRow) -> RepoResult<Self> {
        let status = row
            .status
            .parse::<EventStatus>()
            .map_err(RepositoryError::Corrupt)?;
        Ok(Event {
            id: row.id,
            title: row.title,
            description: row.description,
            date: row.date,
            club: row.club_id,
            created_by: row.created_by,
            status,
            poster: row.poster,
            likes: row.likes,
            svp_list: row.svp_list,
            comments: row.comments,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct CommentRow {
    id: Uuid,
    event_id: Uuid,
    user_id: Uuid,
    content: String,
    created_at: DateTime<Utc>,
    author_name: String,
    author_surname: String,
    author_reg_number: String,
    author_roles: Vec<String>,
}

impl TryFrom<CommentRow> for Comment {
    type Error = RepositoryError;

    fn try_from(row: CommentRow) -> RepoResult<Self> {
        let author = UserSummary {
            id: row.user_id,
            name: row.author_name,
            surname: row.author_surname,
            reg_number: row.author_reg_number,
            roles: parse_roles(&row.author_roles)?,
        };
        Ok(Comment {
            id: row.id,
            event_id: row.event_id,
            user_id: row.user_id,
            content: row.content,
            created_at: row.created_at,
            author: Some(author),
        })
    }
}

fn parse_roles(raw: &[String]) -> RepoResult<RoleSet> {
    raw.iter()
        .map(|role| {
            role.parse::<Role>()
                .map_err(|e| RepositoryError::Corrupt(e.to_string()))
        })
        .collect()
}

/// classify
///
/// Maps constraint violations onto the domain errors: unique violations (23505) become
/// `Conflict`, foreign key violations (23503) become `MissingReference`.
fn classify(err: sqlx::Error, conflict: &str, missing: &str) -> RepositoryError {
    if let Some(db_err) = err.as_database_error() {
        match db_err.code().as_deref() {
            Some("23505") => return RepositoryError::Conflict(conflict.to_string()),
            Some("23503") => return RepositoryError::MissingReference(missing.to_string()),
            _ => {}
        }
    }
    RepositoryError::Database(err)
}

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL. Schema lives in `migrations/`.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the embedded migrations against the pool.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    async fn fetch_club(&self, id: Uuid) -> RepoResult<Option<Club>> {
        let sql = format!("SELECT {CLUB_COLUMNS} FROM clubs c WHERE c.id = $1");
        Ok(sqlx::query_as::<_, Club>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    /// Loads user summaries for a club relation (`club_leaders` or `club_members`) for
    /// many clubs in one query, grouped by club id.
    async fn summaries_by_club(
        &self,
        relation: ClubRelation,
        club_ids: &[Uuid],
    ) -> RepoResult<HashMap<Uuid, Vec<UserSummary>>> {
        let sql = format!(
            "SELECT x.club_id, {SUMMARY_COLUMNS} FROM {} x JOIN users u ON u.id = x.user_id \
             WHERE x.club_id = ANY($1) ORDER BY {}",
            relation.table(),
            relation.order(),
        );
        let rows = sqlx::query_as::<_, ClubUserRow>(&sql)
            .bind(club_ids)
            .fetch_all(&self.pool)
            .await?;

        let mut grouped: HashMap<Uuid, Vec<UserSummary>> = HashMap::new();
        for row in rows {
            grouped
                .entry(row.club_id)
                .or_default()
                .push(UserSummary::try_from(row.user)?);
        }
        Ok(grouped)
    }

    async fn summaries_by_id(&self, ids: &[Uuid]) -> RepoResult<HashMap<Uuid, UserSummary>> {
        let sql = format!("SELECT {SUMMARY_COLUMNS} FROM users u WHERE u.id = ANY($1)");
        let rows = sqlx::query_as::<_, SummaryRow>(&sql)
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| UserSummary::try_from(row).map(|summary| (summary.id, summary)))
            .collect()
    }

    /// Populates patron, leaders and members for a batch of clubs.
    async fn populate(&self, clubs: Vec<Club>) -> RepoResult<Vec<ClubDetails>> {
        let ids: Vec<Uuid> = clubs.iter().map(|c| c.id).collect();
        let patron_ids: Vec<Uuid> = clubs.iter().filter_map(|c| c.patron).collect();

        let mut leaders = self.summaries_by_club(ClubRelation::Leaders, &ids).await?;
        let mut members = self.summaries_by_club(ClubRelation::Members, &ids).await?;
        let patrons = self.summaries_by_id(&patron_ids).await?;

        Ok(clubs
            .into_iter()
            .map(|club| ClubDetails {
                patron: club.patron.and_then(|id| patrons.get(&id).cloned()),
                club_leaders: leaders.remove(&club.id).unwrap_or_default(),
                members: members.remove(&club.id).unwrap_or_default(),
                id: club.id,
                name: club.name,
                description: club.description,
                introduced_at: club.introduced_at,
                profile_pic: club.profile_pic,
                created_at: club.created_at,
                updated_at: club.updated_at,
            })
            .collect())
    }

    async fn club_relation(
        &self,
        relation: ClubRelation,
        club_id: Uuid,
    ) -> RepoResult<Option<Vec<UserSummary>>> {
        if self.fetch_club(club_id).await?.is_none() {
            return Ok(None);
        }
        let mut grouped = self.summaries_by_club(relation, &[club_id]).await?;
        Ok(Some(grouped.remove(&club_id).unwrap_or_default()))
    }
}

#[derive(Clone, Copy)]
enum ClubRelation {
    Leaders,
    Members,
}

impl ClubRelation {
    fn table(self) -> &'static str {
        match self {
            ClubRelation::Leaders => "club_leaders",
            ClubRelation::Members => "club_members",
        }
    }

    fn order(self) -> &'static str {
        match self {
            ClubRelation::Leaders => "u.surname, u.name",
            ClubRelation::Members => "x.joined_at",
        }
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// create_user
    ///
    /// Inserts the user and the initial role set in one transaction.
    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        const CONFLICT: &str = "User already exists";
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO users (id, reg_number, email, name, surname, date_of_birth, password_hash, profile_picture)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(id)
        .bind(&user.reg_number)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.surname)
        .bind(user.date_of_birth)
        .bind(&user.password_hash)
        .bind(&user.profile_picture)
        .execute(&mut *tx)
        .await
        .map_err(|e| classify(e, CONFLICT, CONFLICT))?;

        for role in user.roles.iter() {
            sqlx::query(
                "INSERT INTO user_roles (user_id, role) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(id)
            .bind(role.as_str())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        self.get_user(id)
            .await?
            .ok_or_else(|| RepositoryError::Corrupt(format!("user {id} vanished after insert")))
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.id = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(UserRow::into_user)
            .transpose()
    }

    async fn get_credentials(&self, email: &str) -> RepoResult<Option<UserCredentials>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.email = $1");
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .map(UserRow::into_credentials)
            .transpose()
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users u ORDER BY u.created_at");
        sqlx::query_as::<_, UserRow>(&sql)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(UserRow::into_user)
            .collect()
    }

    /// add_role
    ///
    /// `ON CONFLICT DO NOTHING` on the (user_id, role) key keeps the role set a set;
    /// the affected row count tells whether anything changed.
    async fn add_role(&self, user_id: Uuid, role: Role) -> RepoResult<bool> {
        let result = sqlx::query(
            "INSERT INTO user_roles (user_id, role) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(role.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| classify(e, "Role already assigned", "User not found."))?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_role(&self, user_id: Uuid, role: Role) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role = $2")
            .bind(user_id)
            .bind(role.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// create_club
    ///
    /// Inserts the club and its initial leaders in one transaction.
    async fn create_club(&self, club: NewClub) -> RepoResult<Club> {
        const CONFLICT: &str = "A club with this name already exists";
        const MISSING: &str = "Patron or club leader not found";
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"INSERT INTO clubs (id, name, description, introduced_at, profile_pic, patron_id)
               VALUES ($1, $2, $3, $4, $5, $6)"#,
        )
        .bind(id)
        .bind(&club.name)
        .bind(&club.description)
        .bind(club.introduced_at)
        .bind(&club.profile_pic)
        .bind(club.patron)
        .execute(&mut *tx)
        .await
        .map_err(|e| classify(e, CONFLICT, MISSING))?;

        for leader in &club.club_leaders {
            sqlx::query(
                "INSERT INTO club_leaders (club_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(id)
            .bind(leader)
            .execute(&mut *tx)
            .await
            .map_err(|e| classify(e, CONFLICT, MISSING))?;
        }
        tx.commit().await?;

        self.fetch_club(id)
            .await?
            .ok_or_else(|| RepositoryError::Corrupt(format!("club {id} vanished after insert")))
    }

    async fn list_clubs(&self) -> RepoResult<Vec<ClubDetails>> {
        let sql = format!("SELECT {CLUB_COLUMNS} FROM clubs c ORDER BY c.name");
        let clubs = sqlx::query_as::<_, Club>(&sql)
            .fetch_all(&self.pool)
            .await?;
        self.populate(clubs).await
    }

    async fn get_club(&self, id: Uuid) -> RepoResult<Option<ClubDetails>> {
        match self.fetch_club(id).await? {
            Some(club) => Ok(self.populate(vec![club]).await?.pop()),
            None => Ok(None),
        }
    }

    /// update_club
    ///
    /// Uses `COALESCE` so that only the provided fields change.
    async fn update_club(&self, id: Uuid, changes: ClubChanges) -> RepoResult<Option<Club>> {
        let updated = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE clubs
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                introduced_at = COALESCE($4, introduced_at),
                profile_pic = COALESCE($5, profile_pic),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(changes.name)
        .bind(changes.description)
        .bind(changes.introduced_at)
        .bind(changes.profile_pic)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| classify(e, "A club with this name already exists", "Club not found"))?;

        match updated {
            Some(id) => self.fetch_club(id).await,
            None => Ok(None),
        }
    }

    async fn delete_club(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM clubs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// add_member
    ///
    /// Membership is owned by `club_members` alone, so joining is a single idempotent
    /// insert; the user's joined-club list is derived from the same rows.
    async fn add_member(&self, club_id: Uuid, user_id: Uuid) -> RepoResult<Option<Club>> {
        sqlx::query(
            r#"INSERT INTO club_members (club_id, user_id)
               SELECT c.id, $2 FROM clubs c WHERE c.id = $1
               ON CONFLICT DO NOTHING"#,
        )
        .bind(club_id)
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| classify(e, "Already a member", "User not found."))?;
        self.fetch_club(club_id).await
    }

    async fn club_leaders(&self, club_id: Uuid) -> RepoResult<Option<Vec<UserSummary>>> {
        self.club_relation(ClubRelation::Leaders, club_id).await
    }

    async fn club_members(&self, club_id: Uuid) -> RepoResult<Option<Vec<UserSummary>>> {
        self.club_relation(ClubRelation::Members, club_id).await
    }

    /// create_event
    ///
    /// New events always start as `pending`.
    async fn create_event(&self, event: NewEvent) -> RepoResult<Event> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"INSERT INTO events
                   (id, title, description, date, club_id, created_by, status, poster)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"#,
        )
        .bind(id)
        .bind(&event.title)
        .bind(&event.description)
        .bind(event.date)
        .bind(event.club)
        .bind(event.created_by)
        .bind(EventStatus::Pending.as_str())
        .bind(&event.poster)
        .execute(&self.pool)
        .await
        .map_err(|e| classify(e, "Event already exists", "Club not found."))?;

        self.get_event(id)
            .await?
            .ok_or_else(|| RepositoryError::Corrupt(format!("event {id} vanished after insert")))
    }

    /// list_events
    ///
    /// Builds the filter with `QueryBuilder` so the club id stays a bound parameter.
    /// `ApprovedOnly` visibility is applied in SQL, never after the fact.
    async fn list_events(&self, query: EventQuery) -> RepoResult<Vec<Event>> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {EVENT_COLUMNS} FROM events e WHERE TRUE"));

        if query.visibility == EventVisibility::ApprovedOnly {
            builder.push(" AND e.status = ");
            builder.push_bind(EventStatus::Approved.as_str());
        }
        if let Some(club) = query.club {
            builder.push(" AND e.club_id = ");
            builder.push_bind(club);
        }
        builder.push(" ORDER BY e.date ASC, e.created_at ASC");

        builder
            .build_query_as::<EventRow>()
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Event::try_from)
            .collect()
    }

    async fn get_event(&self, id: Uuid) -> RepoResult<Option<Event>> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events e WHERE e.id = $1");
        sqlx::query_as::<_, EventRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(Event::try_from)
            .transpose()
    }

    async fn update_event(&self, id: Uuid, changes: EventChanges) -> RepoResult<Option<Event>> {
        let updated = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE events
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                date = COALESCE($4, date),
                club_id = COALESCE($5, club_id),
                poster = COALESCE($6, poster),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(changes.title)
        .bind(changes.description)
        .bind(changes.date)
        .bind(changes.club)
        .bind(changes.poster)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| classify(e, "Event already exists", "Club not found."))?;

        match updated {
            Some(id) => self.get_event(id).await,
            None => Ok(None),
        }
    }

    async fn delete_event(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_event_status(&self, id: Uuid, status: EventStatus) -> RepoResult<Option<Event>> {
        let updated = sqlx::query_scalar::<_, Uuid>(
            "UPDATE events SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING id",
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(id) => self.get_event(id).await,
            None => Ok(None),
        }
    }

    async fn add_like(&self, event_id: Uuid, user_id: Uuid) -> RepoResult<Option<Event>> {
        sqlx::query(
            r#"INSERT INTO event_likes (event_id, user_id)
               SELECT e.id, $2 FROM events e WHERE e.id = $1
               ON CONFLICT DO NOTHING"#,
        )
        .bind(event_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        self.get_event(event_id).await
    }

    async fn remove_like(&self, event_id: Uuid, user_id: Uuid) -> RepoResult<Option<Event>> {
        sqlx::query("DELETE FROM event_likes WHERE event_id = $1 AND user_id = $2")
            .bind(event_id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        self.get_event(event_id).await
    }

    async fn add_svp(&self, event_id: Uuid, user_id: Uuid) -> RepoResult<Option<Event>> {
        sqlx::query(
            r#"INSERT INTO event_svps (event_id, user_id)
               SELECT e.id, $2 FROM events e WHERE e.id = $1
               ON CONFLICT DO NOTHING"#,
        )
        .bind(event_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        self.get_event(event_id).await
    }

    async fn attendance(&self, event_id: Uuid) -> RepoResult<Option<Vec<UserSummary>>> {
        if self.get_event(event_id).await?.is_none() {
            return Ok(None);
        }
        let sql = format!(
            "SELECT {SUMMARY_COLUMNS} FROM event_svps s JOIN users u ON u.id = s.user_id \
             WHERE s.event_id = $1 ORDER BY s.created_at"
        );
        let members = sqlx::query_as::<_, SummaryRow>(&sql)
            .bind(event_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(UserSummary::try_from)
            .collect::<RepoResult<Vec<_>>>()?;
        Ok(Some(members))
    }

    /// add_comment
    ///
    /// Uses a CTE to insert (only if the event exists) and join the author in one query.
    async fn add_comment(
        &self,
        event_id: Uuid,
        user_id: Uuid,
        content: String,
    ) -> RepoResult<Option<Comment>> {
        let sql = format!(
            r#"
            WITH c AS (
                INSERT INTO comments (id, event_id, user_id, content)
                SELECT $1, e.id, $3, $4 FROM events e WHERE e.id = $2
                RETURNING id, event_id, user_id, content, created_at
            )
            SELECT {COMMENT_COLUMNS} FROM c JOIN users u ON u.id = c.user_id
            "#
        );
        sqlx::query_as::<_, CommentRow>(&sql)
            .bind(Uuid::new_v4())
            .bind(event_id)
            .bind(user_id)
            .bind(content)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| classify(e, "Comment already exists", "User not found."))?
            .map(Comment::try_from)
            .transpose()
    }

    /// delete_comment
    ///
    /// The event's comment list is derived from this table, so one delete removes both.
    async fn delete_comment(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_comments(&self, event_id: Uuid) -> RepoResult<Vec<Comment>> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments c JOIN users u ON u.id = c.user_id \
             WHERE c.event_id = $1 ORDER BY c.created_at DESC"
        );
        sqlx::query_as::<_, CommentRow>(&sql)
            .bind(event_id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(Comment::try_from)
            .collect()
    }
}
