//! Registration records for an event.
//!
//! Waitlist positions are only ever written by [`register`] (which appends to
//! the end of the waitlist) and by the waitlist engine.

use chrono::Utc;
use db::event::{Event, EventSession};
use db::rsvp::{student_rsvps_of_event, Role, Rsvp};
use db::schema::{
    dietary_restrictions, event_sessions, events, rsvp_sessions, rsvps, users,
};
use db::user::User;
use diesel::prelude::*;
use diesel::SqliteConnection;
use itertools::Itertools;

use crate::capacity::placement_for_new_rsvp;
use crate::error::{Result, WorkshopError};
use crate::util::gen_public_id;
use crate::validation::ValidationErrors;
use crate::waitlist::{reorder_waitlist_in, ReorderOutcome};

#[tracing::instrument(skip(conn))]
pub fn confirmed_student_count(
    conn: &mut SqliteConnection,
    event_id: i64,
) -> Result<i64> {
    Ok(student_rsvps_of_event(event_id)
        .filter(rsvps::waitlist_position.is_null())
        .count()
        .get_result::<i64>(conn)?)
}

/// Confirmed student RSVPs, in the order they were made.
#[tracing::instrument(skip(conn))]
pub fn confirmed_student_rsvps(
    conn: &mut SqliteConnection,
    event_id: i64,
) -> Result<Vec<Rsvp>> {
    Ok(student_rsvps_of_event(event_id)
        .filter(rsvps::waitlist_position.is_null())
        .order_by(rsvps::id.asc())
        .load::<Rsvp>(conn)?)
}

/// Waitlisted student RSVPs, first in line first.
#[tracing::instrument(skip(conn))]
pub fn waitlisted_student_rsvps(
    conn: &mut SqliteConnection,
    event_id: i64,
) -> Result<Vec<Rsvp>> {
    Ok(student_rsvps_of_event(event_id)
        .filter(rsvps::waitlist_position.is_not_null())
        .order_by((rsvps::waitlist_position.asc(), rsvps::id.asc()))
        .load::<Rsvp>(conn)?)
}

#[tracing::instrument(skip(conn))]
pub fn volunteer_rsvps(
    conn: &mut SqliteConnection,
    event_id: i64,
) -> Result<Vec<Rsvp>> {
    Ok(rsvps::table
        .filter(rsvps::event_id.eq(event_id))
        .filter(rsvps::role_id.eq(Role::Volunteer.id()))
        .order_by(rsvps::id.asc())
        .load::<Rsvp>(conn)?)
}

#[tracing::instrument(skip(conn))]
pub fn rsvp_for_user(
    conn: &mut SqliteConnection,
    event_id: i64,
    user_id: i64,
) -> Result<Option<Rsvp>> {
    Ok(rsvps::table
        .filter(rsvps::event_id.eq(event_id))
        .filter(rsvps::user_id.eq(user_id))
        .first::<Rsvp>(conn)
        .optional()?)
}

/// The users who hold a confirmed place as a student.
#[tracing::instrument(skip(conn))]
pub fn students(
    conn: &mut SqliteConnection,
    event_id: i64,
) -> Result<Vec<User>> {
    Ok(student_rsvps_of_event(event_id)
        .filter(rsvps::waitlist_position.is_null())
        .inner_join(users::table)
        .order_by(rsvps::id.asc())
        .select(users::all_columns)
        .load::<User>(conn)?)
}

pub fn is_volunteer(
    conn: &mut SqliteConnection,
    event_id: i64,
    user_id: i64,
) -> Result<bool> {
    Ok(rsvp_for_user(conn, event_id, user_id)?
        .is_some_and(|rsvp| rsvp.role() == Role::Volunteer))
}

pub fn is_waitlisted_student(
    conn: &mut SqliteConnection,
    event_id: i64,
    user_id: i64,
) -> Result<bool> {
    Ok(rsvp_for_user(conn, event_id, user_id)?
        .is_some_and(|rsvp| rsvp.role() == Role::Student && rsvp.is_waitlisted()))
}

/// Confirmed students, then volunteers, who asked for childcare.
#[tracing::instrument(skip(conn))]
pub fn rsvps_with_childcare(
    conn: &mut SqliteConnection,
    event_id: i64,
) -> Result<Vec<Rsvp>> {
    let mut ret = confirmed_student_rsvps(conn, event_id)?;
    ret.extend(volunteer_rsvps(conn, event_id)?);
    ret.retain(|rsvp| rsvp.needs_childcare);
    Ok(ret)
}

/// Everything about an RSVP which the attendee chooses themselves.
#[derive(Debug, Clone, Default)]
pub struct RsvpDetails {
    pub dietary_info: Option<String>,
    pub dietary_restrictions: Vec<String>,
    pub needs_childcare: bool,
    pub childcare_info: Option<String>,
    /// Sessions the attendee plans to come to. If empty they are signed up
    /// for every session of the event. Repeats are ignored.
    pub session_ids: Vec<i64>,
}

/// Registers a user for an event. Students who arrive when the event is
/// full are put at the end of the waitlist.
#[tracing::instrument(skip(conn, details))]
pub fn register(
    conn: &mut SqliteConnection,
    event_id: i64,
    user_id: i64,
    role: Role,
    details: RsvpDetails,
) -> Result<Rsvp> {
    conn.immediate_transaction(|conn| -> Result<Rsvp> {
        let event = events::table
            .find(event_id)
            .first::<Event>(conn)
            .optional()?
            .ok_or_else(|| WorkshopError::not_found("event", event_id))?;

        if !Role::ATTENDEE_ROLES.contains(&role) {
            let mut errors = ValidationErrors::new();
            errors.add("role", format!("{} can't RSVP", role.name()));
            return Err(errors.into());
        }

        if rsvp_for_user(conn, event.id, user_id)?.is_some() {
            tracing::warn!(event_id, user_id, "rejected duplicate RSVP");
            return Err(WorkshopError::AlreadyRegistered { event_id, user_id });
        }

        let sessions = event_sessions::table
            .filter(event_sessions::event_id.eq(event.id))
            .load::<EventSession>(conn)?;
        let session_ids = if details.session_ids.is_empty() {
            sessions.iter().map(|session| session.id).collect::<Vec<_>>()
        } else {
            let mut errors = ValidationErrors::new();
            for id in &details.session_ids {
                if !sessions.iter().any(|session| session.id == *id) {
                    errors.add(
                        "rsvp_sessions",
                        format!("session {id} does not belong to this event"),
                    );
                }
            }
            errors.into_result()?;
            details.session_ids.iter().copied().unique().collect()
        };

        let confirmed = confirmed_student_count(conn, event.id)?;
        let waitlisted = student_rsvps_of_event(event.id)
            .filter(rsvps::waitlist_position.is_not_null())
            .count()
            .get_result::<i64>(conn)?;
        let placement = placement_for_new_rsvp(
            role,
            event.student_rsvp_limit,
            confirmed,
            waitlisted,
        );

        let rsvp = diesel::insert_into(rsvps::table)
            .values((
                rsvps::public_id.eq(gen_public_id()),
                rsvps::user_id.eq(user_id),
                rsvps::event_id.eq(event.id),
                rsvps::role_id.eq(role.id()),
                rsvps::waitlist_position.eq(placement.waitlist_position()),
                rsvps::dietary_info.eq(details.dietary_info.as_deref()),
                rsvps::needs_childcare.eq(details.needs_childcare),
                rsvps::childcare_info.eq(details.childcare_info.as_deref()),
                rsvps::created_at.eq(Utc::now().naive_utc()),
            ))
            .get_result::<Rsvp>(conn)?;

        for session_id in session_ids {
            let n = diesel::insert_into(rsvp_sessions::table)
                .values((
                    rsvp_sessions::rsvp_id.eq(rsvp.id),
                    rsvp_sessions::event_session_id.eq(session_id),
                    rsvp_sessions::checked_in.eq(false),
                ))
                .execute(conn)?;
            assert_eq!(n, 1);
        }

        for restriction in &details.dietary_restrictions {
            let n = diesel::insert_into(dietary_restrictions::table)
                .values((
                    dietary_restrictions::rsvp_id.eq(rsvp.id),
                    dietary_restrictions::restriction.eq(restriction),
                ))
                .execute(conn)?;
            assert_eq!(n, 1);
        }

        tracing::info!(
            rsvp_id = rsvp.id,
            waitlist_position = ?rsvp.waitlist_position,
            "registered"
        );

        Ok(rsvp)
    })
}

/// Cancels an RSVP and lets the next person on the waitlist in (if there is
/// now a free place).
#[tracing::instrument(skip(conn))]
pub fn cancel(
    conn: &mut SqliteConnection,
    rsvp_id: i64,
) -> Result<ReorderOutcome> {
    conn.immediate_transaction(|conn| -> Result<ReorderOutcome> {
        let rsvp = rsvps::table
            .find(rsvp_id)
            .first::<Rsvp>(conn)
            .optional()?
            .ok_or_else(|| WorkshopError::not_found("rsvp", rsvp_id))?;

        diesel::delete(
            rsvp_sessions::table.filter(rsvp_sessions::rsvp_id.eq(rsvp.id)),
        )
        .execute(conn)?;
        diesel::delete(
            dietary_restrictions::table
                .filter(dietary_restrictions::rsvp_id.eq(rsvp.id)),
        )
        .execute(conn)?;
        let n = diesel::delete(rsvps::table.find(rsvp.id)).execute(conn)?;
        assert_eq!(n, 1);

        reorder_waitlist_in(conn, rsvp.event_id)
    })
}

/// Marks an attendee as present (or not) at one session.
#[tracing::instrument(skip(conn))]
pub fn set_checked_in(
    conn: &mut SqliteConnection,
    rsvp_id: i64,
    event_session_id: i64,
    checked_in: bool,
) -> Result<()> {
    let n = diesel::update(
        rsvp_sessions::table
            .filter(rsvp_sessions::rsvp_id.eq(rsvp_id))
            .filter(rsvp_sessions::event_session_id.eq(event_session_id)),
    )
    .set(rsvp_sessions::checked_in.eq(checked_in))
    .execute(conn)?;

    if n == 0 {
        return Err(WorkshopError::not_found(
            "rsvp session",
            format!("{rsvp_id}/{event_session_id}"),
        ));
    }
    assert_eq!(n, 1);
    Ok(())
}
