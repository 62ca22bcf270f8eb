use axum::{Json, body::Bytes, extract::State, http::StatusCode};
use axum_extra::extract::cookie::CookieJar;
use campus_clubs::{
    AppState, InMemoryRepository, MockStorageService,
    auth::AuthUser,
    config::AppConfig,
    error::{ApiError, ApiResult},
    handlers::{
        ApiJson, ApiPath, ApiQuery, UploadedFile, clubs, comments,
        events::{self, EventBody, EventFilter},
        users,
    },
    models::{
        Club, Comment, CreateCommentRequest, CreateEventRequest, Event, EventStatus, LoginRequest,
        NewClub, NewUser, RegisterUserRequest, RoleChangeRequest, UpdateEventRequest, User,
    },
    repository::{Repository, RepositoryState},
    roles::{Role, RoleSet},
    storage::StorageState,
};
use chrono::NaiveDate;
use std::sync::Arc;
use uuid::Uuid;

// --- Fixtures ---

fn test_state() -> AppState {
    test_state_with_storage().0
}

/// Also hands back the mock so tests can inspect what was uploaded.
fn test_state_with_storage() -> (AppState, Arc<MockStorageService>) {
    let storage = Arc::new(MockStorageService::new());
    let state = AppState {
        repo: Arc::new(InMemoryRepository::new()) as RepositoryState,
        storage: storage.clone() as StorageState,
        config: AppConfig::default(),
    };
    (state, storage)
}

fn poster_file(file_name: &str) -> Option<UploadedFile> {
    Some(UploadedFile {
        file_name: file_name.to_string(),
        data: Bytes::from_static(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A]),
    })
}

fn expect_err<T>(result: ApiResult<T>) -> ApiError {
    match result {
        Ok(_) => panic!("expected the handler to fail"),
        Err(err) => err,
    }
}

fn registration(reg_number: &str, email: &str) -> RegisterUserRequest {
    RegisterUserRequest {
        reg_number: Some(reg_number.to_string()),
        email: Some(email.to_string()),
        name: Some("Test".to_string()),
        surname: Some(reg_number.to_string()),
        date_of_birth: Some("2001-04-13".to_string()),
        password: Some("correct horse".to_string()),
    }
}

/// Seeds an account directly in the store, bypassing registration rules.
async fn seed(state: &AppState, reg_number: &str, roles: &[Role]) -> AuthUser {
    let user = state
        .repo
        .create_user(NewUser {
            reg_number: reg_number.to_string(),
            email: format!("{}@campus.test", reg_number.to_lowercase()),
            name: "Seed".to_string(),
            surname: reg_number.to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1999, 9, 9).unwrap(),
            password_hash: "unused".to_string(),
            roles: roles.iter().copied().collect(),
            profile_picture: None,
        })
        .await
        .unwrap();
    AuthUser {
        id: user.id,
        roles: user.roles,
    }
}

async fn seed_club(state: &AppState, name: &str) -> Club {
    state
        .repo
        .create_club(NewClub {
            name: name.to_string(),
            description: "A club".to_string(),
            introduced_at: NaiveDate::from_ymd_opt(2015, 3, 1).unwrap(),
            profile_pic: None,
            patron: None,
            club_leaders: vec![],
        })
        .await
        .unwrap()
}

fn event_request(club: Uuid, title: &str) -> CreateEventRequest {
    CreateEventRequest {
        title: Some(title.to_string()),
        description: Some("Bring a friend".to_string()),
        date: Some("2026-11-20T18:00:00Z".to_string()),
        club: Some(club),
    }
}

async fn propose(state: &AppState, leader: &AuthUser, club: Uuid, title: &str) -> Event {
    let (status, Json(event)) = events::create_event(
        leader.clone(),
        State(state.clone()),
        EventBody::from(event_request(club, title)),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    event
}

async fn list_as(state: &AppState, actor: Option<&AuthUser>) -> Vec<Event> {
    let Json(events) = events::list_events(
        actor.cloned(),
        State(state.clone()),
        ApiQuery(EventFilter::default()),
    )
    .await
    .unwrap();
    events
}

async fn assign(state: &AppState, actor: &AuthUser, user_id: Uuid, role: Role) -> ApiResult<User> {
    users::assign_role(
        actor.clone(),
        State(state.clone()),
        ApiJson(RoleChangeRequest { user_id, role }),
    )
    .await
    .map(|Json(response)| response.user)
}

// --- Registration & login ---

#[tokio::test]
async fn test_register_derives_role_from_registration_number() {
    let state = test_state();

    let (status, _jar, Json(student)) = users::register_user(
        State(state.clone()),
        CookieJar::new(),
        ApiJson(registration("R12345", "student@campus.test")),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(student.user.roles, RoleSet::from([Role::Student]));
    assert!(!student.token.is_empty());

    let (_, _, Json(staff)) = users::register_user(
        State(state.clone()),
        CookieJar::new(),
        ApiJson(registration("S98765", "staff@campus.test")),
    )
    .await
    .unwrap();
    assert_eq!(staff.user.roles, RoleSet::from([Role::Staff]));

    let (_, _, Json(other)) = users::register_user(
        State(state.clone()),
        CookieJar::new(),
        ApiJson(registration("X555", "other@campus.test")),
    )
    .await
    .unwrap();
    assert_eq!(other.user.roles, RoleSet::new());
}

#[tokio::test]
async fn test_register_sets_jwt_cookie() {
    let state = test_state();
    let (_, jar, Json(response)) = users::register_user(
        State(state.clone()),
        CookieJar::new(),
        ApiJson(registration("R1", "cookie@campus.test")),
    )
    .await
    .unwrap();

    let cookie = jar.get("jwt").expect("jwt cookie set");
    assert_eq!(cookie.value(), response.token);
    assert_eq!(cookie.http_only(), Some(true));
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_missing_fields() {
    let state = test_state();
    users::register_user(
        State(state.clone()),
        CookieJar::new(),
        ApiJson(registration("R1", "dup@campus.test")),
    )
    .await
    .unwrap();

    // Same email, different registration number.
    let err = expect_err(
        users::register_user(
            State(state.clone()),
            CookieJar::new(),
            ApiJson(registration("R2", "dup@campus.test")),
        )
        .await,
    );
    assert!(matches!(err, ApiError::Conflict(_)));

    // Same registration number, different email.
    let err = expect_err(
        users::register_user(
            State(state.clone()),
            CookieJar::new(),
            ApiJson(registration("R1", "other@campus.test")),
        )
        .await,
    );
    assert!(matches!(err, ApiError::Conflict(_)));

    let mut missing = registration("R3", "missing@campus.test");
    missing.surname = Some("   ".to_string());
    let err = expect_err(
        users::register_user(State(state.clone()), CookieJar::new(), ApiJson(missing)).await,
    );
    assert!(matches!(err, ApiError::Validation(message) if message.contains("surname")));

    let mut bad_date = registration("R4", "date@campus.test");
    bad_date.date_of_birth = Some("13/04/2001".to_string());
    let err = expect_err(
        users::register_user(State(state.clone()), CookieJar::new(), ApiJson(bad_date)).await,
    );
    assert!(matches!(err, ApiError::Validation(_)));
}

#[tokio::test]
async fn test_login_checks_password() {
    let state = test_state();
    users::register_user(
        State(state.clone()),
        CookieJar::new(),
        ApiJson(registration("R7", "login@campus.test")),
    )
    .await
    .unwrap();

    let (status, jar, Json(response)) = users::login_user(
        State(state.clone()),
        CookieJar::new(),
        ApiJson(LoginRequest {
            email: Some("Login@Campus.test".to_string()),
            password: Some("correct horse".to_string()),
        }),
    )
    .await
    .unwrap();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response.user.reg_number, "R7");
    assert!(jar.get("jwt").is_some());

    let wrong_password = expect_err(
        users::login_user(
            State(state.clone()),
            CookieJar::new(),
            ApiJson(LoginRequest {
                email: Some("login@campus.test".to_string()),
                password: Some("battery staple".to_string()),
            }),
        )
        .await,
    );
    let unknown_email = expect_err(
        users::login_user(
            State(state.clone()),
            CookieJar::new(),
            ApiJson(LoginRequest {
                email: Some("nobody@campus.test".to_string()),
                password: Some("correct horse".to_string()),
            }),
        )
        .await,
    );

    // Both failures look identical to the client.
    assert!(matches!(&wrong_password, ApiError::Unauthorized(_)));
    assert_eq!(wrong_password.to_string(), unknown_email.to_string());
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let jar = CookieJar::new().add(axum_extra::extract::cookie::Cookie::new("jwt", "token"));
    let (jar, Json(message)) = users::logout_user(jar).await;
    assert!(jar.get("jwt").is_none());
    assert_eq!(message.message, "Logged out successfully");
}

// --- Role management ---

#[tokio::test]
async fn test_sto_assigns_club_leader_to_student() {
    let state = test_state();
    let sto = seed(&state, "S1", &[Role::Staff, Role::Sto]).await;
    let student = seed(&state, "R1", &[Role::Student]).await;

    let user = assign(&state, &sto, student.id, Role::ClubLeader).await.unwrap();
    assert_eq!(user.roles, RoleSet::from([Role::Student, Role::ClubLeader]));

    // Assigning again is redundant and leaves the set unchanged.
    let err = expect_err(assign(&state, &sto, student.id, Role::ClubLeader).await);
    assert!(matches!(err, ApiError::Conflict(_)));
    let stored = state.repo.get_user(student.id).await.unwrap().unwrap();
    assert_eq!(stored.roles, RoleSet::from([Role::Student, Role::ClubLeader]));
}

#[tokio::test]
async fn test_sto_cannot_assign_admin_or_sto() {
    let state = test_state();
    let sto = seed(&state, "S1", &[Role::Sto]).await;
    let target = seed(&state, "S2", &[Role::Staff]).await;

    for role in [Role::Admin, Role::Sto] {
        let err = expect_err(assign(&state, &sto, target.id, role).await);
        assert!(matches!(err, ApiError::Forbidden(_)));
    }
    let stored = state.repo.get_user(target.id).await.unwrap().unwrap();
    assert_eq!(stored.roles, RoleSet::from([Role::Staff]));
}

#[tokio::test]
async fn test_admin_assigns_sto() {
    let state = test_state();
    let admin = seed(&state, "S0", &[Role::Admin]).await;
    let staff = seed(&state, "S2", &[Role::Staff]).await;

    let user = assign(&state, &admin, staff.id, Role::Sto).await.unwrap();
    assert!(user.roles.contains(Role::Sto));
}

#[tokio::test]
async fn test_self_change_is_forbidden_before_redundancy() {
    let state = test_state();
    let admin = seed(&state, "S0", &[Role::Admin, Role::Sto]).await;

    // Already holds sto, but the self check wins over the 409.
    let err = expect_err(assign(&state, &admin, admin.id, Role::Sto).await);
    assert!(matches!(err, ApiError::Forbidden(message) if message.contains("your own roles")));
}

#[tokio::test]
async fn test_role_change_on_unknown_user_is_not_found() {
    let state = test_state();
    let patron = seed(&state, "S3", &[Role::Patron]).await;

    let err = expect_err(assign(&state, &patron, Uuid::new_v4(), Role::ClubLeader).await);
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_remove_role() {
    let state = test_state();
    let patron = seed(&state, "S3", &[Role::Patron]).await;
    let leader = seed(&state, "R9", &[Role::Student, Role::ClubLeader]).await;

    let Json(response) = users::remove_role(
        patron.clone(),
        State(state.clone()),
        ApiJson(RoleChangeRequest {
            user_id: leader.id,
            role: Role::ClubLeader,
        }),
    )
    .await
    .unwrap();
    assert_eq!(response.message, "Role club_leader removed.");
    assert_eq!(response.user.roles, RoleSet::from([Role::Student]));

    let err = expect_err(
        users::remove_role(
            patron,
            State(state.clone()),
            ApiJson(RoleChangeRequest {
                user_id: leader.id,
                role: Role::ClubLeader,
            }),
        )
        .await,
    );
    assert!(matches!(err, ApiError::Conflict(message) if message.contains("does not have")));
}

#[tokio::test]
async fn test_list_users_requires_role() {
    let state = test_state();
    let student = seed(&state, "R1", &[Role::Student]).await;
    let patron = seed(&state, "S3", &[Role::Patron]).await;

    let err = expect_err(users::list_users(student, State(state.clone())).await);
    assert!(matches!(err, ApiError::Forbidden(_)));

    let Json(all) = users::list_users(patron, State(state.clone())).await.unwrap();
    assert_eq!(all.len(), 2);
}

// --- Event workflow ---

#[tokio::test]
async fn test_event_approval_makes_it_visible_to_students() {
    let state = test_state();
    let leader = seed(&state, "R2", &[Role::Student, Role::ClubLeader]).await;
    let sto = seed(&state, "S1", &[Role::Sto]).await;
    let student = seed(&state, "R3", &[Role::Student]).await;
    let club = seed_club(&state, "Chess").await;

    let event = propose(&state, &leader, club.id, "Blitz night").await;
    assert_eq!(event.status, EventStatus::Pending);
    assert_eq!(event.created_by, leader.id);

    // Pending: hidden from students and anonymous callers, visible to moderators.
    assert!(list_as(&state, Some(&student)).await.is_empty());
    assert!(list_as(&state, None).await.is_empty());
    assert_eq!(list_as(&state, Some(&sto)).await.len(), 1);
    assert_eq!(list_as(&state, Some(&leader)).await.len(), 1);
    let err = expect_err(
        events::get_event(Some(student.clone()), State(state.clone()), ApiPath(event.id)).await,
    );
    assert!(matches!(err, ApiError::NotFound(_)));

    let Json(review) = events::approve_event(sto.clone(), State(state.clone()), ApiPath(event.id))
        .await
        .unwrap();
    assert_eq!(review.message, "Event approved.");
    assert_eq!(review.event.status, EventStatus::Approved);

    let visible = list_as(&state, Some(&student)).await;
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, event.id);
    assert_eq!(list_as(&state, None).await.len(), 1);
}

#[tokio::test]
async fn test_review_overwrites_status() {
    let state = test_state();
    let leader = seed(&state, "R2", &[Role::ClubLeader]).await;
    let patron = seed(&state, "S3", &[Role::Patron]).await;
    let club = seed_club(&state, "Drama").await;
    let event = propose(&state, &leader, club.id, "Rehearsal").await;

    events::approve_event(patron.clone(), State(state.clone()), ApiPath(event.id))
        .await
        .unwrap();
    // Re-approval is allowed.
    events::approve_event(patron.clone(), State(state.clone()), ApiPath(event.id))
        .await
        .unwrap();
    let Json(review) = events::reject_event(patron.clone(), State(state.clone()), ApiPath(event.id))
        .await
        .unwrap();
    assert_eq!(review.event.status, EventStatus::Rejected);
    assert!(list_as(&state, None).await.is_empty());
}

#[tokio::test]
async fn test_review_requires_sto_or_patron() {
    let state = test_state();
    let leader = seed(&state, "R2", &[Role::ClubLeader]).await;
    let admin = seed(&state, "S0", &[Role::Admin]).await;
    let sto = seed(&state, "S1", &[Role::Sto]).await;
    let club = seed_club(&state, "Robotics").await;
    let event = propose(&state, &leader, club.id, "Build day").await;

    for actor in [leader, admin] {
        let err = expect_err(
            events::approve_event(actor, State(state.clone()), ApiPath(event.id)).await,
        );
        assert!(matches!(err, ApiError::Forbidden(_)));
    }

    let err = expect_err(
        events::approve_event(sto, State(state.clone()), ApiPath(Uuid::new_v4())).await,
    );
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_create_event_validation() {
    let state = test_state();
    let leader = seed(&state, "R2", &[Role::ClubLeader]).await;
    let sto = seed(&state, "S1", &[Role::Sto]).await;
    let club = seed_club(&state, "Film").await;

    // Only club leaders propose events.
    let err = expect_err(
        events::create_event(
            sto,
            State(state.clone()),
            EventBody::from(event_request(club.id, "X")),
        )
        .await,
    );
    assert!(matches!(err, ApiError::Forbidden(_)));

    let mut blank = event_request(club.id, "X");
    blank.title = Some("  ".to_string());
    let err = expect_err(
        events::create_event(leader.clone(), State(state.clone()), EventBody::from(blank)).await,
    );
    assert!(matches!(err, ApiError::Validation(_)));

    let mut no_club = event_request(club.id, "X");
    no_club.club = None;
    let err = expect_err(
        events::create_event(leader.clone(), State(state.clone()), EventBody::from(no_club)).await,
    );
    assert!(matches!(err, ApiError::Validation(_)));

    let err = expect_err(
        events::create_event(
            leader.clone(),
            State(state.clone()),
            EventBody::from(event_request(Uuid::new_v4(), "X")),
        )
        .await,
    );
    assert!(matches!(err, ApiError::NotFound(_)));

    // A bare date is accepted as midnight UTC.
    let mut date_only = event_request(club.id, "Screening");
    date_only.date = Some("2026-12-01".to_string());
    let (_, Json(event)) =
        events::create_event(leader, State(state.clone()), EventBody::from(date_only))
            .await
            .unwrap();
    assert_eq!(event.date.to_rfc3339(), "2026-12-01T00:00:00+00:00");
}

#[tokio::test]
async fn test_update_event_keeps_status() {
    let state = test_state();
    let leader = seed(&state, "R2", &[Role::ClubLeader]).await;
    let student = seed(&state, "R3", &[Role::Student]).await;
    let club = seed_club(&state, "Debate").await;
    let event = propose(&state, &leader, club.id, "Motion").await;

    let update = UpdateEventRequest {
        title: Some("Final motion".to_string()),
        ..Default::default()
    };
    let err = expect_err(
        events::update_event(
            student,
            State(state.clone()),
            ApiPath(event.id),
            EventBody::from(update.clone()),
        )
        .await,
    );
    assert!(matches!(err, ApiError::Forbidden(_)));

    let Json(updated) = events::update_event(
        leader.clone(),
        State(state.clone()),
        ApiPath(event.id),
        EventBody::from(update),
    )
    .await
    .unwrap();
    assert_eq!(updated.title, "Final motion");
    assert_eq!(updated.description, event.description);
    assert_eq!(updated.status, EventStatus::Pending);

    let Json(deleted) =
        events::delete_event(leader.clone(), State(state.clone()), ApiPath(event.id))
            .await
            .unwrap();
    assert_eq!(deleted.message, "Event deleted.");
    let err = expect_err(
        events::delete_event(leader, State(state.clone()), ApiPath(event.id)).await,
    );
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_event_list_filters_by_club() {
    let state = test_state();
    let leader = seed(&state, "R2", &[Role::ClubLeader]).await;
    let chess = seed_club(&state, "Chess").await;
    let drama = seed_club(&state, "Drama").await;
    propose(&state, &leader, chess.id, "Blitz").await;
    propose(&state, &leader, drama.id, "Rehearsal").await;

    let Json(chess_events) = events::list_events(
        Some(leader.clone()),
        State(state.clone()),
        ApiQuery(EventFilter { club: Some(chess.id) }),
    )
    .await
    .unwrap();
    assert_eq!(chess_events.len(), 1);
    assert_eq!(chess_events[0].title, "Blitz");
}

#[tokio::test]
async fn test_event_poster_is_stored_and_replaced() {
    let (state, storage) = test_state_with_storage();
    let leader = seed(&state, "R2", &[Role::ClubLeader]).await;
    let club = seed_club(&state, "Jazz").await;

    let (_, Json(event)) = events::create_event(
        leader.clone(),
        State(state.clone()),
        EventBody {
            fields: event_request(club.id, "Late set"),
            poster: poster_file("late-set.PNG"),
        },
    )
    .await
    .unwrap();
    let first = event.poster.clone().expect("poster reference");
    assert!(first.starts_with("uploads/event_posters/"));
    assert!(first.ends_with(".png"));

    // A poster-only update keeps the other fields and drops the old file.
    let Json(updated) = events::update_event(
        leader.clone(),
        State(state.clone()),
        ApiPath(event.id),
        EventBody {
            fields: UpdateEventRequest::default(),
            poster: poster_file("late-set-v2.webp"),
        },
    )
    .await
    .unwrap();
    let second = updated.poster.clone().expect("replacement poster");
    assert_ne!(second, first);
    assert_eq!(updated.title, "Late set");
    let stored: Vec<String> = storage.stored().into_iter().map(|(r, _)| r).collect();
    assert_eq!(stored, vec![second.clone()]);

    // Without a file the poster is left alone.
    let Json(renamed) = events::update_event(
        leader,
        State(state.clone()),
        ApiPath(event.id),
        EventBody::from(UpdateEventRequest {
            title: Some("Later set".to_string()),
            ..Default::default()
        }),
    )
    .await
    .unwrap();
    assert_eq!(renamed.poster, Some(second));
}

#[tokio::test]
async fn test_failed_event_writes_leave_no_poster_behind() {
    let (state, storage) = test_state_with_storage();
    let leader = seed(&state, "R2", &[Role::ClubLeader]).await;
    let student = seed(&state, "R3", &[Role::Student]).await;
    let club = seed_club(&state, "Cinema").await;
    let event = propose(&state, &leader, club.id, "Matinee").await;

    let with_poster = |fields: CreateEventRequest| EventBody {
        fields,
        poster: poster_file("poster.jpg"),
    };

    // Unknown club: the poster was written, then removed again.
    let err = expect_err(
        events::create_event(
            leader.clone(),
            State(state.clone()),
            with_poster(event_request(Uuid::new_v4(), "Lost")),
        )
        .await,
    );
    assert!(matches!(err, ApiError::NotFound(_)));

    let err = expect_err(
        events::create_event(
            student,
            State(state.clone()),
            with_poster(event_request(club.id, "Not mine")),
        )
        .await,
    );
    assert!(matches!(err, ApiError::Forbidden(_)));

    let err = expect_err(
        events::update_event(
            leader.clone(),
            State(state.clone()),
            ApiPath(event.id),
            EventBody {
                fields: UpdateEventRequest {
                    club: Some(Uuid::new_v4()),
                    ..Default::default()
                },
                poster: poster_file("poster.gif"),
            },
        )
        .await,
    );
    assert!(matches!(err, ApiError::NotFound(_)));

    let err = expect_err(
        events::create_event(
            leader,
            State(state.clone()),
            EventBody {
                fields: event_request(club.id, "Slides"),
                poster: poster_file("slides.pdf"),
            },
        )
        .await,
    );
    assert!(matches!(err, ApiError::Validation(_)));

    assert!(storage.stored().is_empty());
    let unchanged = state.repo.get_event(event.id).await.unwrap().unwrap();
    assert_eq!(unchanged.poster, None);
}

// --- Likes & attendance ---

#[tokio::test]
async fn test_like_and_svp_are_idempotent() {
    let state = test_state();
    let leader = seed(&state, "R2", &[Role::ClubLeader]).await;
    let sto = seed(&state, "S1", &[Role::Sto]).await;
    let student = seed(&state, "R3", &[Role::Student]).await;
    let club = seed_club(&state, "Hiking").await;
    let event = propose(&state, &leader, club.id, "Ridge walk").await;
    events::approve_event(sto, State(state.clone()), ApiPath(event.id))
        .await
        .unwrap();

    for _ in 0..2 {
        let Json(liked) =
            events::like_event(student.clone(), State(state.clone()), ApiPath(event.id))
                .await
                .unwrap();
        assert_eq!(liked.likes, vec![student.id]);
    }
    let Json(unliked) =
        events::unlike_event(student.clone(), State(state.clone()), ApiPath(event.id))
            .await
            .unwrap();
    assert!(unliked.likes.is_empty());

    for _ in 0..2 {
        let Json(attending) =
            events::svp_event(student.clone(), State(state.clone()), ApiPath(event.id))
                .await
                .unwrap();
        assert_eq!(attending.svp_list, vec![student.id]);
    }

    let err = expect_err(
        events::attendance(student.clone(), State(state.clone()), ApiPath(event.id)).await,
    );
    assert!(matches!(err, ApiError::Forbidden(_)));

    let Json(list) = events::attendance(leader, State(state.clone()), ApiPath(event.id))
        .await
        .unwrap();
    assert_eq!(list.count, 1);
    assert_eq!(list.members[0].id, student.id);
}

#[tokio::test]
async fn test_student_cannot_like_pending_event() {
    let state = test_state();
    let leader = seed(&state, "R2", &[Role::ClubLeader]).await;
    let student = seed(&state, "R3", &[Role::Student]).await;
    let club = seed_club(&state, "Poetry").await;
    let event = propose(&state, &leader, club.id, "Open mic").await;

    let err = expect_err(
        events::like_event(student, State(state.clone()), ApiPath(event.id)).await,
    );
    assert!(matches!(err, ApiError::NotFound(_)));
}

// --- Clubs ---

#[tokio::test]
async fn test_join_club_is_idempotent_and_shows_on_profile() {
    let state = test_state();
    let student = seed(&state, "R3", &[Role::Student]).await;
    let club = seed_club(&state, "Astronomy").await;

    for _ in 0..2 {
        let Json(joined) = clubs::join_club(student.clone(), State(state.clone()), ApiPath(club.id))
            .await
            .unwrap();
        assert_eq!(joined.members, vec![student.id]);
    }

    let Json(me) = users::get_me(student.clone(), State(state.clone())).await.unwrap();
    assert_eq!(me.clubs_joined, vec![club.id]);

    let err = expect_err(
        clubs::join_club(student, State(state.clone()), ApiPath(Uuid::new_v4())).await,
    );
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_club_members_are_restricted_and_leaders_public() {
    let state = test_state();
    let student = seed(&state, "R3", &[Role::Student]).await;
    let patron = seed(&state, "S3", &[Role::Patron]).await;
    let leader = seed(&state, "R2", &[Role::ClubLeader]).await;
    let club = state
        .repo
        .create_club(NewClub {
            name: "Photography".to_string(),
            description: "Cameras".to_string(),
            introduced_at: NaiveDate::from_ymd_opt(2010, 1, 1).unwrap(),
            profile_pic: None,
            patron: Some(patron.id),
            club_leaders: vec![leader.id],
        })
        .await
        .unwrap();
    clubs::join_club(student.clone(), State(state.clone()), ApiPath(club.id))
        .await
        .unwrap();

    let Json(leaders) = clubs::club_leaders(State(state.clone()), ApiPath(club.id)).await.unwrap();
    assert_eq!(leaders.len(), 1);
    assert_eq!(leaders[0].id, leader.id);

    let err = expect_err(
        clubs::club_members(student, State(state.clone()), ApiPath(club.id)).await,
    );
    assert!(matches!(err, ApiError::Forbidden(_)));

    let Json(members) = clubs::club_members(patron.clone(), State(state.clone()), ApiPath(club.id))
        .await
        .unwrap();
    assert_eq!(members.len(), 1);

    let Json(details) = clubs::get_club(State(state.clone()), ApiPath(club.id)).await.unwrap();
    assert_eq!(details.patron.map(|p| p.id), Some(patron.id));
    assert_eq!(details.members.len(), 1);
}

#[tokio::test]
async fn test_delete_club_requires_role() {
    let state = test_state();
    let leader = seed(&state, "R2", &[Role::ClubLeader]).await;
    let admin = seed(&state, "S0", &[Role::Admin]).await;
    let club = seed_club(&state, "Gaming").await;

    let err = expect_err(clubs::delete_club(leader, State(state.clone()), ApiPath(club.id)).await);
    assert!(matches!(err, ApiError::Forbidden(_)));

    let Json(message) = clubs::delete_club(admin.clone(), State(state.clone()), ApiPath(club.id))
        .await
        .unwrap();
    assert_eq!(message.message, "Club deleted");

    let err = expect_err(clubs::get_club(State(state.clone()), ApiPath(club.id)).await);
    assert!(matches!(err, ApiError::NotFound(_)));
}

// --- Comments ---

async fn comment(
    state: &AppState,
    actor: &AuthUser,
    event_id: Uuid,
    content: &str,
) -> ApiResult<Comment> {
    comments::add_comment(
        actor.clone(),
        State(state.clone()),
        ApiPath(event_id),
        ApiJson(CreateCommentRequest {
            content: Some(content.to_string()),
        }),
    )
    .await
    .map(|(status, Json(comment))| {
        assert_eq!(status, StatusCode::CREATED);
        comment
    })
}

#[tokio::test]
async fn test_comment_lifecycle() {
    let state = test_state();
    let leader = seed(&state, "R2", &[Role::ClubLeader]).await;
    let student = seed(&state, "R3", &[Role::Student]).await;
    let patron = seed(&state, "S3", &[Role::Patron]).await;
    let club = seed_club(&state, "Choir").await;
    let event = propose(&state, &leader, club.id, "Concert").await;
    events::approve_event(patron.clone(), State(state.clone()), ApiPath(event.id))
        .await
        .unwrap();

    let err = expect_err(comment(&state, &student, event.id, " ").await);
    assert!(matches!(err, ApiError::Validation(_)));

    let mut posted = Vec::new();
    for content in ["first", "second"] {
        posted.push(comment(&state, &student, event.id, content).await.unwrap());
    }

    let Json(listed) = comments::list_comments(None, State(state.clone()), ApiPath(event.id))
        .await
        .unwrap();
    let contents: Vec<&str> = listed.iter().map(|c| c.content.as_str()).collect();
    assert_eq!(contents, vec!["second", "first"]);
    assert_eq!(listed[0].author.as_ref().map(|a| a.id), Some(student.id));

    let err = expect_err(
        comments::delete_comment(student.clone(), State(state.clone()), ApiPath(posted[0].id))
            .await,
    );
    assert!(matches!(err, ApiError::Forbidden(_)));

    comments::delete_comment(patron.clone(), State(state.clone()), ApiPath(posted[0].id))
        .await
        .unwrap();
    let stored = state.repo.get_event(event.id).await.unwrap().unwrap();
    assert_eq!(stored.comments, vec![posted[1].id]);

    let err = expect_err(
        comments::delete_comment(patron, State(state.clone()), ApiPath(posted[0].id)).await,
    );
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_comment_on_unknown_event_is_not_found() {
    let state = test_state();
    let student = seed(&state, "R3", &[Role::Student]).await;

    let err = expect_err(comment(&state, &student, Uuid::new_v4(), "hello").await);
    assert!(matches!(err, ApiError::NotFound(_)));

    let err = expect_err(
        comments::list_comments(None, State(state.clone()), ApiPath(Uuid::new_v4())).await,
    );
    assert!(matches!(err, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_comments_follow_event_visibility() {
    let state = test_state();
    let leader = seed(&state, "R2", &[Role::ClubLeader]).await;
    let student = seed(&state, "R3", &[Role::Student]).await;
    let sto = seed(&state, "S1", &[Role::Sto]).await;
    let club = seed_club(&state, "Poetry").await;
    let event = propose(&state, &leader, club.id, "Open mic").await;

    // Pending: a student cannot comment on it, and nobody without a moderating role can
    // read its thread.
    let err = expect_err(comment(&state, &student, event.id, "first!").await);
    assert!(matches!(err, ApiError::NotFound(_)));

    let note = comment(&state, &leader, event.id, "Sign-up sheet is ready").await.unwrap();
    for viewer in [None, Some(student.clone())] {
        let err = expect_err(
            comments::list_comments(viewer, State(state.clone()), ApiPath(event.id)).await,
        );
        assert!(matches!(err, ApiError::NotFound(_)));
    }
    let Json(thread) =
        comments::list_comments(Some(sto.clone()), State(state.clone()), ApiPath(event.id))
            .await
            .unwrap();
    assert_eq!(thread.len(), 1);
    assert_eq!(thread[0].id, note.id);

    // Rejected events stay hidden as well.
    events::reject_event(sto.clone(), State(state.clone()), ApiPath(event.id))
        .await
        .unwrap();
    let err = expect_err(comment(&state, &student, event.id, "still here?").await);
    assert!(matches!(err, ApiError::NotFound(_)));

    events::approve_event(sto, State(state.clone()), ApiPath(event.id))
        .await
        .unwrap();
    comment(&state, &student, event.id, "See you there").await.unwrap();
    let Json(thread) = comments::list_comments(None, State(state.clone()), ApiPath(event.id))
        .await
        .unwrap();
    assert_eq!(thread.len(), 2);
}
