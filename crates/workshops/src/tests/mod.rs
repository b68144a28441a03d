//! Database-backed tests. Each test gets its own SQLite file (in a temporary
//! directory) with the migrations applied.

use chrono::{Duration, NaiveDateTime, Utc};
use db::event::{Event, EventSession, Location};
use db::rsvp::{Role, Rsvp};
use db::schema::{locations, rsvp_sessions, rsvps, users};
use db::user::User;
use diesel::prelude::*;
use diesel::SqliteConnection;
use tempfile::TempDir;

use crate::events::{create_event, EventDraft, SessionDraft};
use crate::util::gen_public_id;


pub struct TestDb {
    pub conn: SqliteConnection,
    pub path: String,
    // dropped last, so that the connection is closed before the file goes
    _dir: TempDir,
}

pub fn test_db() -> TestDb {
    let dir = tempfile::tempdir().expect("failed to create temporary directory");
    let path = dir.path().join("workshops.db").to_str().unwrap().to_string();
    let mut conn = db::establish(&path).expect("Database connection failed");
    db::run_migrations(&mut conn).expect("Failed to run migrations");
    TestDb {
        conn,
        path,
        _dir: dir,
    }
}

pub fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

pub fn make_user(conn: &mut SqliteConnection) -> User {
    let public_id = gen_public_id();
    diesel::insert_into(users::table)
        .values((
            users::public_id.eq(&public_id),
            users::name.eq(format!("Person {public_id}")),
            users::email.eq(format!("{public_id}@example.com")),
            users::is_admin.eq(false),
            users::created_at.eq(now()),
        ))
        .get_result::<User>(conn)
        .unwrap()
}

pub fn make_admin(conn: &mut SqliteConnection) -> User {
    let user = make_user(conn);
    diesel::update(users::table.find(user.id))
        .set(users::is_admin.eq(true))
        .get_result::<User>(conn)
        .unwrap()
}

pub fn make_location(conn: &mut SqliteConnection, name: &str) -> Location {
    diesel::insert_into(locations::table)
        .values((
            locations::public_id.eq(gen_public_id()),
            locations::name.eq(name),
            locations::address.eq(Some("1 Main Street")),
        ))
        .get_result::<Location>(conn)
        .unwrap()
}

pub fn session_draft(starts_at: NaiveDateTime, ends_at: NaiveDateTime) -> SessionDraft {
    SessionDraft {
        name: "Installfest".to_string(),
        starts_at,
        ends_at,
        required_for_students: true,
    }
}

/// A valid event with a single session starting tomorrow.
pub fn event_draft(student_rsvp_limit: Option<i64>) -> EventDraft {
    let starts_at = now() + Duration::days(1);
    EventDraft {
        title: "Intro to Rust".to_string(),
        time_zone: Some("Pacific/Honolulu".to_string()),
        student_rsvp_limit,
        published: true,
        sessions: vec![session_draft(starts_at, starts_at + Duration::hours(3))],
        ..EventDraft::default()
    }
}

pub fn make_event(conn: &mut SqliteConnection, student_rsvp_limit: Option<i64>) -> Event {
    create_event(conn, &event_draft(student_rsvp_limit)).unwrap()
}

/// Inserts an RSVP directly, without any capacity checks.
pub fn make_rsvp(
    conn: &mut SqliteConnection,
    event: &Event,
    role: Role,
    waitlist_position: Option<i64>,
) -> Rsvp {
    let user = make_user(conn);
    make_rsvp_for(conn, event, &user, role, waitlist_position)
}

pub fn make_rsvp_for(
    conn: &mut SqliteConnection,
    event: &Event,
    user: &User,
    role: Role,
    waitlist_position: Option<i64>,
) -> Rsvp {
    diesel::insert_into(rsvps::table)
        .values((
            rsvps::public_id.eq(gen_public_id()),
            rsvps::user_id.eq(user.id),
            rsvps::event_id.eq(event.id),
            rsvps::role_id.eq(role.id()),
            rsvps::waitlist_position.eq(waitlist_position),
            rsvps::dietary_info.eq(Some("Paleo")),
            rsvps::needs_childcare.eq(false),
            rsvps::created_at.eq(now()),
        ))
        .get_result::<Rsvp>(conn)
        .unwrap()
}

pub fn make_student_rsvp(
    conn: &mut SqliteConnection,
    event: &Event,
    waitlist_position: Option<i64>,
) -> Rsvp {
    make_rsvp(conn, event, Role::Student, waitlist_position)
}

pub fn make_rsvp_session(
    conn: &mut SqliteConnection,
    rsvp: &Rsvp,
    session: &EventSession,
    checked_in: bool,
) {
    let n = diesel::insert_into(rsvp_sessions::table)
        .values((
            rsvp_sessions::rsvp_id.eq(rsvp.id),
            rsvp_sessions::event_session_id.eq(session.id),
            rsvp_sessions::checked_in.eq(checked_in),
        ))
        .execute(conn)
        .unwrap();
    assert_eq!(n, 1);
}

pub fn reload(conn: &mut SqliteConnection, rsvp: &Rsvp) -> Rsvp {
    rsvps::table.find(rsvp.id).first::<Rsvp>(conn).unwrap()
}
