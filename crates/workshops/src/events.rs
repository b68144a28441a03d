//! Creating, updating and querying events and their sessions.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use db::event::{events_organized_by, Event, EventSession, Location};
use db::schema::{event_organizers, event_sessions, events, locations, rsvp_sessions};
use db::user::User;
use diesel::dsl::{max, min};
use diesel::prelude::*;
use diesel::SqliteConnection;

use crate::capacity::validate_limit_change;
use crate::clock::Clock;
use crate::error::{Result, WorkshopError};
use crate::rsvps::confirmed_student_count;
use crate::util::gen_public_id;
use crate::validation::{is_blank, ValidationErrors};
use crate::waitlist::{reorder_waitlist_in, ReorderOutcome};

/// What a new event's details say until the organizers write something.
pub const DEFAULT_DETAILS: &str = "\
## Workshop Description

## Location

## Transportation and Parking

## Food and drinks

## Childcare

## Afterparty
";

#[derive(Debug, Clone)]
pub struct SessionDraft {
    pub name: String,
    /// UTC.
    pub starts_at: NaiveDateTime,
    /// UTC.
    pub ends_at: NaiveDateTime,
    pub required_for_students: bool,
}

#[derive(Debug, Clone)]
pub struct EventDraft {
    pub title: String,
    pub details: String,
    pub time_zone: Option<String>,
    pub student_rsvp_limit: Option<i64>,
    pub published: bool,
    pub location_id: Option<i64>,
    pub student_details: Option<String>,
    pub volunteer_details: Option<String>,
    pub sessions: Vec<SessionDraft>,
}

impl Default for EventDraft {
    fn default() -> Self {
        Self {
            title: String::new(),
            details: DEFAULT_DETAILS.to_string(),
            time_zone: None,
            student_rsvp_limit: None,
            published: false,
            location_id: None,
            student_details: None,
            volunteer_details: None,
            sessions: Vec::new(),
        }
    }
}

fn validate_title(title: &str, errors: &mut ValidationErrors) {
    if is_blank(title) {
        errors.add("title", "can't be blank");
    }
}

fn validate_time_zone(time_zone: Option<&str>, errors: &mut ValidationErrors) {
    match time_zone {
        None => errors.add("time_zone", "can't be blank"),
        Some(tz) if is_blank(tz) => errors.add("time_zone", "can't be blank"),
        Some(tz) => {
            if tz.parse::<Tz>().is_err() {
                errors.add("time_zone", format!("{tz:?} is not a known time zone"));
            }
        }
    }
}

fn validate_limit(limit: Option<i64>, errors: &mut ValidationErrors) {
    if limit.is_some_and(|limit| limit < 0) {
        errors.add("student_rsvp_limit", "must be greater than or equal to 0");
    }
}

pub fn validate_session(session: &SessionDraft) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if is_blank(&session.name) {
        errors.add("name", "can't be blank");
    }
    if session.ends_at <= session.starts_at {
        errors.add("ends_at", "must be after the session starts");
    }
    errors.into_result()
}

pub fn validate_draft(draft: &EventDraft) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    validate_title(&draft.title, &mut errors);
    validate_time_zone(draft.time_zone.as_deref(), &mut errors);
    validate_limit(draft.student_rsvp_limit, &mut errors);

    if draft.sessions.is_empty() {
        errors.add("event_sessions", "must have at least one session");
    }
    for session in &draft.sessions {
        if let Err(e) = validate_session(session) {
            errors.extend(e);
        }
    }

    errors.into_result()
}

fn insert_session(
    conn: &mut SqliteConnection,
    event_id: i64,
    session: &SessionDraft,
) -> Result<EventSession> {
    Ok(diesel::insert_into(event_sessions::table)
        .values((
            event_sessions::public_id.eq(gen_public_id()),
            event_sessions::event_id.eq(event_id),
            event_sessions::name.eq(&session.name),
            event_sessions::starts_at.eq(session.starts_at),
            event_sessions::ends_at.eq(session.ends_at),
            event_sessions::required_for_students.eq(session.required_for_students),
        ))
        .get_result::<EventSession>(conn)?)
}

/// Creates an event together with its sessions.
#[tracing::instrument(skip(conn, draft), fields(title = %draft.title))]
pub fn create_event(
    conn: &mut SqliteConnection,
    draft: &EventDraft,
) -> Result<Event> {
    validate_draft(draft)?;

    conn.immediate_transaction(|conn| -> Result<Event> {
        let event = diesel::insert_into(events::table)
            .values((
                events::public_id.eq(gen_public_id()),
                events::title.eq(&draft.title),
                events::details.eq(&draft.details),
                events::time_zone.eq(draft.time_zone.as_deref().unwrap_or_default()),
                events::student_rsvp_limit.eq(draft.student_rsvp_limit),
                events::published.eq(draft.published),
                events::location_id.eq(draft.location_id),
                events::student_details.eq(draft.student_details.as_deref()),
                events::volunteer_details.eq(draft.volunteer_details.as_deref()),
                events::created_at.eq(Utc::now().naive_utc()),
            ))
            .get_result::<Event>(conn)?;

        for session in &draft.sessions {
            insert_session(conn, event.id, session)?;
        }

        tracing::info!(event_id = event.id, "created event");
        Ok(event)
    })
}

/// A partial update. `None` leaves a field as it is.
#[derive(Debug, Clone, Default)]
pub struct EventUpdate {
    pub title: Option<String>,
    pub details: Option<String>,
    pub time_zone: Option<String>,
    pub student_rsvp_limit: Option<Option<i64>>,
    pub published: Option<bool>,
    pub location_id: Option<Option<i64>>,
    pub student_details: Option<Option<String>>,
    pub volunteer_details: Option<Option<String>>,
}

#[derive(Debug, Clone)]
pub struct UpdateOutcome {
    pub event: Event,
    /// Present if the student RSVP limit changed (which always causes the
    /// waitlist to be reordered).
    pub reorder: Option<ReorderOutcome>,
}

/// Updates an event. If the student RSVP limit changes, the waitlist is
/// reordered in the same transaction as the new limit is written, so no
/// registration can take a freed place ahead of the waitlist.
///
/// Nothing is written if validation fails (or the reorder does); in
/// particular the limit cannot be lowered below the number of students who
/// are already confirmed.
#[tracing::instrument(skip(conn, update))]
pub fn update_event(
    conn: &mut SqliteConnection,
    event_id: i64,
    update: EventUpdate,
) -> Result<UpdateOutcome> {
    conn.immediate_transaction(|conn| -> Result<UpdateOutcome> {
        let old = find_event(conn, event_id)?;

        let title = update.title.clone().unwrap_or(old.title.clone());
        let details = update.details.clone().unwrap_or(old.details.clone());
        let time_zone =
            update.time_zone.clone().unwrap_or(old.time_zone.clone());
        let limit = update
            .student_rsvp_limit
            .unwrap_or(old.student_rsvp_limit);
        let published = update.published.unwrap_or(old.published);
        let location_id = update.location_id.unwrap_or(old.location_id);
        let student_details = update
            .student_details
            .clone()
            .unwrap_or(old.student_details.clone());
        let volunteer_details = update
            .volunteer_details
            .clone()
            .unwrap_or(old.volunteer_details.clone());

        let limit_changed = limit != old.student_rsvp_limit;

        let mut errors = ValidationErrors::new();
        validate_title(&title, &mut errors);
        validate_time_zone(Some(&time_zone), &mut errors);
        if limit_changed {
            let confirmed = confirmed_student_count(conn, old.id)?;
            if let Err(e) =
                validate_limit_change(old.student_rsvp_limit, limit, confirmed)
            {
                tracing::warn!(
                    event_id = old.id,
                    old = ?old.student_rsvp_limit,
                    new = ?limit,
                    confirmed,
                    "rejected student RSVP limit change"
                );
                errors.extend(e);
            }
        }
        errors.into_result()?;

        let event = diesel::update(events::table.find(old.id))
            .set((
                events::title.eq(&title),
                events::details.eq(&details),
                events::time_zone.eq(&time_zone),
                events::student_rsvp_limit.eq(limit),
                events::published.eq(published),
                events::location_id.eq(location_id),
                events::student_details.eq(student_details.as_deref()),
                events::volunteer_details.eq(volunteer_details.as_deref()),
            ))
            .get_result::<Event>(conn)?;

        let reorder = if limit_changed {
            Some(reorder_waitlist_in(conn, event.id)?)
        } else {
            None
        };

        Ok(UpdateOutcome { event, reorder })
    })
}

pub fn find_event(conn: &mut SqliteConnection, event_id: i64) -> Result<Event> {
    events::table
        .find(event_id)
        .first::<Event>(conn)
        .optional()?
        .ok_or_else(|| WorkshopError::not_found("event", event_id))
}

pub fn find_event_by_public_id(
    conn: &mut SqliteConnection,
    public_id: &str,
) -> Result<Event> {
    events::table
        .filter(Event::with_public_id(public_id))
        .first::<Event>(conn)
        .optional()?
        .ok_or_else(|| WorkshopError::not_found("event", public_id))
}

/// The sessions of an event, ordered by when they end.
#[tracing::instrument(skip(conn))]
pub fn sessions(
    conn: &mut SqliteConnection,
    event_id: i64,
) -> Result<Vec<EventSession>> {
    Ok(event_sessions::table
        .filter(event_sessions::event_id.eq(event_id))
        .order_by((event_sessions::ends_at.asc(), event_sessions::id.asc()))
        .load::<EventSession>(conn)?)
}

#[tracing::instrument(skip(conn, session))]
pub fn add_session(
    conn: &mut SqliteConnection,
    event_id: i64,
    session: &SessionDraft,
) -> Result<EventSession> {
    validate_session(session)?;
    let event = find_event(conn, event_id)?;
    insert_session(conn, event.id, session)
}

#[tracing::instrument(skip(conn, session))]
pub fn update_session(
    conn: &mut SqliteConnection,
    session_id: i64,
    session: &SessionDraft,
) -> Result<EventSession> {
    validate_session(session)?;
    diesel::update(event_sessions::table.find(session_id))
        .set((
            event_sessions::name.eq(&session.name),
            event_sessions::starts_at.eq(session.starts_at),
            event_sessions::ends_at.eq(session.ends_at),
            event_sessions::required_for_students.eq(session.required_for_students),
        ))
        .get_result::<EventSession>(conn)
        .optional()?
        .ok_or_else(|| WorkshopError::not_found("event session", session_id))
}

/// Removes a session. An event must always keep at least one.
#[tracing::instrument(skip(conn))]
pub fn remove_session(
    conn: &mut SqliteConnection,
    session_id: i64,
) -> Result<()> {
    conn.immediate_transaction(|conn| -> Result<()> {
        let session = event_sessions::table
            .find(session_id)
            .first::<EventSession>(conn)
            .optional()?
            .ok_or_else(|| WorkshopError::not_found("event session", session_id))?;

        let remaining = event_sessions::table
            .filter(event_sessions::event_id.eq(session.event_id))
            .count()
            .get_result::<i64>(conn)?;
        if remaining <= 1 {
            let mut errors = ValidationErrors::new();
            errors.add("event_sessions", "must have at least one session");
            return Err(errors.into());
        }

        diesel::delete(
            rsvp_sessions::table
                .filter(rsvp_sessions::event_session_id.eq(session.id)),
        )
        .execute(conn)?;
        let n = diesel::delete(event_sessions::table.find(session.id))
            .execute(conn)?;
        assert_eq!(n, 1);
        Ok(())
    })
}

/// When the first session starts and the last one ends.
#[tracing::instrument(skip(conn))]
pub fn bounds(
    conn: &mut SqliteConnection,
    event_id: i64,
) -> Result<Option<(NaiveDateTime, NaiveDateTime)>> {
    let (starts_at, ends_at) = event_sessions::table
        .filter(event_sessions::event_id.eq(event_id))
        .select((min(event_sessions::starts_at), max(event_sessions::ends_at)))
        .first::<(Option<NaiveDateTime>, Option<NaiveDateTime>)>(conn)?;
    Ok(starts_at.zip(ends_at))
}

#[tracing::instrument(skip(conn))]
pub fn add_organizer(
    conn: &mut SqliteConnection,
    event_id: i64,
    user_id: i64,
) -> Result<()> {
    diesel::insert_or_ignore_into(event_organizers::table)
        .values((
            event_organizers::event_id.eq(event_id),
            event_organizers::user_id.eq(user_id),
        ))
        .execute(conn)?;
    Ok(())
}

/// Events which have not ended yet, soonest first.
#[tracing::instrument(skip(conn, clock))]
pub fn upcoming(
    conn: &mut SqliteConnection,
    clock: &impl Clock,
) -> Result<Vec<Event>> {
    let now = clock.now();

    let ids = event_sessions::table
        .filter(event_sessions::ends_at.gt(now))
        .select(event_sessions::event_id)
        .distinct()
        .load::<i64>(conn)?;

    let mut starts_at: HashMap<i64, NaiveDateTime> = HashMap::new();
    for (event_id, start) in event_sessions::table
        .filter(event_sessions::event_id.eq_any(&ids))
        .select((event_sessions::event_id, event_sessions::starts_at))
        .load::<(i64, NaiveDateTime)>(conn)?
    {
        starts_at
            .entry(event_id)
            .and_modify(|earliest| *earliest = (*earliest).min(start))
            .or_insert(start);
    }

    let mut ret = events::table
        .filter(events::id.eq_any(&ids))
        .load::<Event>(conn)?;
    ret.sort_by_key(|event| (starts_at[&event.id], event.id));
    Ok(ret)
}

/// The events a user may see. Admins see everything; everybody else sees
/// published events and the events they organize.
#[tracing::instrument(skip(conn, user), fields(user_id = user.map(|u| u.id)))]
pub fn published_or_organized_by(
    conn: &mut SqliteConnection,
    user: Option<&User>,
) -> Result<Vec<Event>> {
    let query = events::table.order_by(events::id.asc());
    Ok(match user {
        Some(user) if user.is_admin => query.load::<Event>(conn)?,
        Some(user) => query
            .filter(
                events::published
                    .eq(true)
                    .or(events::id.eq_any(events_organized_by(user.id))),
            )
            .load::<Event>(conn)?,
        None => query.filter(events::published.eq(true)).load::<Event>(conn)?,
    })
}

/// The name of the event's location, or an empty string if it has none.
pub fn location_name(conn: &mut SqliteConnection, event: &Event) -> Result<String> {
    let location_id = match event.location_id {
        Some(id) => id,
        None => return Ok(String::new()),
    };
    Ok(locations::table
        .find(location_id)
        .first::<Location>(conn)
        .optional()?
        .map(|location| location.name)
        .unwrap_or_default())
}

/// Converts a UTC timestamp into the event's local time.
pub fn localize(event: &Event, instant: NaiveDateTime) -> Result<DateTime<Tz>> {
    let tz = event.time_zone.parse::<Tz>().map_err(|_| {
        let mut errors = ValidationErrors::new();
        errors.add("time_zone", format!("{:?} is not a known time zone", event.time_zone));
        WorkshopError::from(errors)
    })?;
    Ok(tz.from_utc_datetime(&instant))
}

pub fn all_event_ids(conn: &mut SqliteConnection) -> Result<Vec<i64>> {
    Ok(events::table
        .select(events::id)
        .order_by(events::id.asc())
        .load::<i64>(conn)?)
}
