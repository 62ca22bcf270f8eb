use campus_clubs::{
    authz::EventVisibility,
    models::{ClubChanges, EventChanges, EventStatus, NewClub, NewEvent, NewUser, User},
    repository::{
        EventQuery, InMemoryRepository, PostgresRepository, Repository, RepositoryError,
    },
    roles::{Role, RoleSet},
};
use chrono::{NaiveDate, TimeZone, Utc};
use sqlx::PgPool;
use uuid::Uuid;

// --- Test Context and Setup ---

/// Connects to the database named by `DATABASE_URL` and applies the migrations.
async fn postgres() -> PostgresRepository {
    dotenv::dotenv().ok();

    let db_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set to run the Postgres repository tests");
    let pool = PgPool::connect(&db_url)
        .await
        .expect("Failed to connect to database for integration tests.");

    let repo = PostgresRepository::new(pool);
    repo.migrate().await.expect("Failed to run database migrations.");
    repo
}

// --- Test Data Helpers ---

/// Unique suffix so the scenarios can run repeatedly against a persistent database.
fn unique() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

async fn create_test_user(repo: &dyn Repository, prefix: char, roles: &[Role]) -> User {
    let tag = unique();
    repo.create_user(NewUser {
        reg_number: format!("{prefix}{tag}"),
        email: format!("{tag}@campus.test"),
        name: "Test".to_string(),
        surname: tag,
        date_of_birth: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
        password_hash: "hash".to_string(),
        roles: roles.iter().copied().collect(),
        profile_picture: None,
    })
    .await
    .expect("create user")
}

fn new_club(name: &str, patron: Option<Uuid>, club_leaders: Vec<Uuid>) -> NewClub {
    NewClub {
        name: name.to_string(),
        description: "Test club".to_string(),
        introduced_at: NaiveDate::from_ymd_opt(2018, 1, 15).unwrap(),
        profile_pic: None,
        patron,
        club_leaders,
    }
}

fn new_event(club: Uuid, created_by: Uuid, title: &str, day: u32) -> NewEvent {
    NewEvent {
        title: title.to_string(),
        description: "Test event".to_string(),
        date: Utc.with_ymd_and_hms(2026, 11, day, 18, 0, 0).unwrap(),
        club,
        created_by,
        poster: None,
    }
}

// --- Scenarios ---
//
// Each scenario runs against any `Repository`; the in-memory store runs them by default
// and the Postgres store runs the same ones when invoked with `--ignored`.

async fn users_and_roles(repo: &dyn Repository) {
    let user = create_test_user(repo, 'R', &[Role::Student]).await;
    assert_eq!(user.roles, RoleSet::from([Role::Student]));
    assert!(user.clubs_joined.is_empty());

    // Same email with a different registration number still conflicts.
    let duplicate = repo
        .create_user(NewUser {
            reg_number: format!("R{}", unique()),
            email: user.email.clone(),
            name: "Dup".to_string(),
            surname: "Dup".to_string(),
            date_of_birth: user.date_of_birth,
            password_hash: "hash".to_string(),
            roles: RoleSet::new(),
            profile_picture: None,
        })
        .await;
    assert!(matches!(duplicate, Err(RepositoryError::Conflict(_))));

    let credentials = repo.get_credentials(&user.email).await.unwrap().unwrap();
    assert_eq!(credentials.user.id, user.id);
    assert_eq!(credentials.password_hash, "hash");
    assert!(repo.get_credentials("nobody@campus.test").await.unwrap().is_none());

    assert!(repo.add_role(user.id, Role::ClubLeader).await.unwrap());
    assert!(!repo.add_role(user.id, Role::ClubLeader).await.unwrap());
    let stored = repo.get_user(user.id).await.unwrap().unwrap();
    assert_eq!(stored.roles, RoleSet::from([Role::Student, Role::ClubLeader]));

    assert!(repo.remove_role(user.id, Role::ClubLeader).await.unwrap());
    assert!(!repo.remove_role(user.id, Role::ClubLeader).await.unwrap());
    assert!(!repo.remove_role(Uuid::new_v4(), Role::Student).await.unwrap());

    assert!(matches!(
        repo.add_role(Uuid::new_v4(), Role::Patron).await,
        Err(RepositoryError::MissingReference(_))
    ));

    let all = repo.list_users().await.unwrap();
    assert!(all.iter().any(|u| u.id == user.id));
}

async fn clubs_and_memberships(repo: &dyn Repository) {
    let patron = create_test_user(repo, 'S', &[Role::Staff, Role::Patron]).await;
    let leader = create_test_user(repo, 'R', &[Role::Student, Role::ClubLeader]).await;
    let member = create_test_user(repo, 'R', &[Role::Student]).await;
    let name = format!("Chess {}", unique());

    let club = repo
        .create_club(new_club(&name, Some(patron.id), vec![leader.id, leader.id]))
        .await
        .unwrap();
    assert_eq!(club.club_leaders, vec![leader.id]);
    assert!(club.members.is_empty());

    assert!(matches!(
        repo.create_club(new_club(&name, None, vec![])).await,
        Err(RepositoryError::Conflict(_))
    ));
    assert!(matches!(
        repo.create_club(new_club(&format!("Ghost {}", unique()), Some(Uuid::new_v4()), vec![]))
            .await,
        Err(RepositoryError::MissingReference(_))
    ));

    // Joining twice keeps a single membership.
    repo.add_member(club.id, member.id).await.unwrap().unwrap();
    let joined = repo.add_member(club.id, member.id).await.unwrap().unwrap();
    assert_eq!(joined.members, vec![member.id]);
    assert!(repo.add_member(Uuid::new_v4(), member.id).await.unwrap().is_none());

    // clubsJoined is derived from the same relation.
    let reloaded = repo.get_user(member.id).await.unwrap().unwrap();
    assert_eq!(reloaded.clubs_joined, vec![club.id]);

    let details = repo.get_club(club.id).await.unwrap().unwrap();
    assert_eq!(details.patron.map(|p| p.id), Some(patron.id));
    assert_eq!(details.club_leaders.len(), 1);
    assert_eq!(details.members[0].id, member.id);

    let leaders = repo.club_leaders(club.id).await.unwrap().unwrap();
    assert_eq!(leaders[0].id, leader.id);
    let members = repo.club_members(club.id).await.unwrap().unwrap();
    assert_eq!(members.len(), 1);
    assert!(repo.club_members(Uuid::new_v4()).await.unwrap().is_none());

    let renamed = format!("Chess Society {}", unique());
    let updated = repo
        .update_club(
            club.id,
            ClubChanges {
                name: Some(renamed.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.name, renamed);
    assert_eq!(updated.description, club.description);
    assert!(repo
        .update_club(Uuid::new_v4(), ClubChanges::default())
        .await
        .unwrap()
        .is_none());
}

async fn event_lifecycle(repo: &dyn Repository) {
    let leader = create_test_user(repo, 'R', &[Role::ClubLeader]).await;
    let fan = create_test_user(repo, 'R', &[Role::Student]).await;
    let club = repo
        .create_club(new_club(&format!("Film {}", unique()), None, vec![leader.id]))
        .await
        .unwrap();

    let late = repo.create_event(new_event(club.id, leader.id, "Late", 20)).await.unwrap();
    let early = repo.create_event(new_event(club.id, leader.id, "Early", 5)).await.unwrap();
    assert_eq!(late.status, EventStatus::Pending);

    assert!(matches!(
        repo.create_event(new_event(Uuid::new_v4(), leader.id, "Orphan", 1)).await,
        Err(RepositoryError::MissingReference(_))
    ));

    let everything = repo
        .list_events(EventQuery {
            club: Some(club.id),
            visibility: EventVisibility::All,
        })
        .await
        .unwrap();
    let titles: Vec<&str> = everything.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, vec!["Early", "Late"]);

    let approved_only = EventQuery {
        club: Some(club.id),
        visibility: EventVisibility::ApprovedOnly,
    };
    assert!(repo.list_events(approved_only).await.unwrap().is_empty());

    let reviewed = repo
        .set_event_status(late.id, EventStatus::Approved)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reviewed.status, EventStatus::Approved);
    let visible = repo.list_events(approved_only).await.unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, late.id);

    let updated = repo
        .update_event(
            early.id,
            EventChanges {
                title: Some("Earlier".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.title, "Earlier");
    assert_eq!(updated.status, EventStatus::Pending);
    assert_eq!(updated.poster, None);

    let with_poster = repo
        .update_event(
            early.id,
            EventChanges {
                poster: Some("uploads/event_posters/early.png".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(with_poster.title, "Earlier");
    assert_eq!(with_poster.poster.as_deref(), Some("uploads/event_posters/early.png"));

    // Likes and attendance are sets.
    repo.add_like(late.id, fan.id).await.unwrap();
    let liked = repo.add_like(late.id, fan.id).await.unwrap().unwrap();
    assert_eq!(liked.likes, vec![fan.id]);
    let unliked = repo.remove_like(late.id, fan.id).await.unwrap().unwrap();
    assert!(unliked.likes.is_empty());

    repo.add_svp(late.id, fan.id).await.unwrap();
    let attending = repo.add_svp(late.id, fan.id).await.unwrap().unwrap();
    assert_eq!(attending.svp_list, vec![fan.id]);
    let attendance = repo.attendance(late.id).await.unwrap().unwrap();
    assert_eq!(attendance.len(), 1);
    assert!(repo.attendance(Uuid::new_v4()).await.unwrap().is_none());
    assert!(repo.add_like(Uuid::new_v4(), fan.id).await.unwrap().is_none());

    assert!(repo.delete_event(early.id).await.unwrap());
    assert!(!repo.delete_event(early.id).await.unwrap());
}

async fn comments_and_cascade(repo: &dyn Repository) {
    let leader = create_test_user(repo, 'R', &[Role::ClubLeader]).await;
    let author = create_test_user(repo, 'R', &[Role::Student]).await;
    let club = repo
        .create_club(new_club(&format!("Choir {}", unique()), None, vec![]))
        .await
        .unwrap();
    repo.add_member(club.id, author.id).await.unwrap();
    let event = repo.create_event(new_event(club.id, leader.id, "Concert", 12)).await.unwrap();

    let first = repo
        .add_comment(event.id, author.id, "first".to_string())
        .await
        .unwrap()
        .unwrap();
    let second = repo
        .add_comment(event.id, author.id, "second".to_string())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.author.as_ref().map(|a| a.id), Some(author.id));
    assert!(repo
        .add_comment(Uuid::new_v4(), author.id, "lost".to_string())
        .await
        .unwrap()
        .is_none());

    let listed = repo.list_comments(event.id).await.unwrap();
    let ids: Vec<Uuid> = listed.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);

    let with_comments = repo.get_event(event.id).await.unwrap().unwrap();
    assert_eq!(with_comments.comments.len(), 2);

    assert!(repo.delete_comment(first.id).await.unwrap());
    let remaining: Vec<Uuid> = repo
        .list_comments(event.id)
        .await
        .unwrap()
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(remaining, vec![second.id]);
    assert!(!repo.delete_comment(first.id).await.unwrap());

    // Deleting the club removes its events, their comments and its memberships.
    assert!(repo.delete_club(club.id).await.unwrap());
    assert!(repo.get_event(event.id).await.unwrap().is_none());
    assert!(repo.list_comments(event.id).await.unwrap().is_empty());
    let author = repo.get_user(author.id).await.unwrap().unwrap();
    assert!(author.clubs_joined.is_empty());
    assert!(!repo.delete_club(club.id).await.unwrap());
}

// --- In-memory store ---

#[tokio::test]
async fn test_memory_users_and_roles() {
    users_and_roles(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_clubs_and_memberships() {
    clubs_and_memberships(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_event_lifecycle() {
    event_lifecycle(&InMemoryRepository::new()).await;
}

#[tokio::test]
async fn test_memory_comments_and_cascade() {
    comments_and_cascade(&InMemoryRepository::new()).await;
}

// --- Postgres store ---

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a Postgres instance"]
async fn test_postgres_users_and_roles() {
    users_and_roles(&postgres().await).await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a Postgres instance"]
async fn test_postgres_clubs_and_memberships() {
    clubs_and_memberships(&postgres().await).await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a Postgres instance"]
async fn test_postgres_event_lifecycle() {
    event_lifecycle(&postgres().await).await;
}

#[tokio::test]
#[ignore = "requires DATABASE_URL pointing at a Postgres instance"]
async fn test_postgres_comments_and_cascade() {
    comments_and_cascade(&postgres().await).await;
}
