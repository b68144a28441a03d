//! Read-only summaries of an event's attendees, for the organizers.

use std::collections::{BTreeMap, HashMap};

use db::rsvp::{Role, Rsvp};
use db::schema::{dietary_restrictions, event_sessions, rsvp_sessions, rsvps};
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel::SqliteConnection;
use itertools::Itertools;
use serde::Serialize;

use crate::error::Result;
use crate::validation::is_blank;

/// Per-session attendance for one role. Both maps are keyed by session id
/// and contain every session of the event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionCounts {
    /// How many confirmed attendees said they would come.
    pub rsvp: BTreeMap<i64, i64>,
    /// How many of those have been checked in.
    pub checkin: BTreeMap<i64, i64>,
}

/// Attendance per role and session. Waitlisted students are not counted.
#[tracing::instrument(skip(conn))]
pub fn checkin_counts(
    conn: &mut SqliteConnection,
    event_id: i64,
) -> Result<BTreeMap<Role, SessionCounts>> {
    let session_ids = event_sessions::table
        .filter(event_sessions::event_id.eq(event_id))
        .select(event_sessions::id)
        .load::<i64>(conn)?;

    let mut ret = Role::ATTENDEE_ROLES
        .into_iter()
        .map(|role| {
            let zeroes = session_ids
                .iter()
                .map(|id| (*id, 0))
                .collect::<BTreeMap<_, _>>();
            (
                role,
                SessionCounts {
                    rsvp: zeroes.clone(),
                    checkin: zeroes,
                },
            )
        })
        .collect::<BTreeMap<_, _>>();

    let rows = rsvp_sessions::table
        .inner_join(rsvps::table)
        .filter(rsvps::event_id.eq(event_id))
        .filter(rsvps::waitlist_position.is_null())
        .select((
            rsvps::role_id,
            rsvp_sessions::event_session_id,
            rsvp_sessions::checked_in,
        ))
        .load::<(i64, i64, bool)>(conn)?;

    for (role_id, session_id, checked_in) in rows {
        let Some(counts) = Role::of_id(role_id).and_then(|r| ret.get_mut(&r))
        else {
            continue;
        };
        *counts.rsvp.entry(session_id).or_default() += 1;
        if checked_in {
            *counts.checkin.entry(session_id).or_default() += 1;
        }
    }

    Ok(ret)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RsvpCheckins {
    pub rsvp: Rsvp,
    pub checked_in_session_ids: Vec<i64>,
}

/// Every RSVP for the event along with the sessions it has checked in to.
#[tracing::instrument(skip(conn))]
pub fn rsvps_with_checkins(
    conn: &mut SqliteConnection,
    event_id: i64,
) -> Result<Vec<RsvpCheckins>> {
    let all = rsvps::table
        .filter(rsvps::event_id.eq(event_id))
        .order_by(rsvps::id.asc())
        .load::<Rsvp>(conn)?;

    let mut checkins: HashMap<i64, Vec<i64>> = rsvp_sessions::table
        .inner_join(rsvps::table)
        .filter(rsvps::event_id.eq(event_id))
        .filter(rsvp_sessions::checked_in.eq(true))
        .order_by(rsvp_sessions::event_session_id.asc())
        .select((rsvp_sessions::rsvp_id, rsvp_sessions::event_session_id))
        .load::<(i64, i64)>(conn)?
        .into_iter()
        .into_group_map();

    Ok(all
        .into_iter()
        .map(|rsvp| RsvpCheckins {
            checked_in_session_ids: checkins.remove(&rsvp.id).unwrap_or_default(),
            rsvp,
        })
        .collect())
}

/// How many attendees have each of the listed dietary restrictions.
#[tracing::instrument(skip(conn))]
pub fn dietary_restrictions_totals(
    conn: &mut SqliteConnection,
    event_id: i64,
) -> Result<BTreeMap<String, i64>> {
    Ok(dietary_restrictions::table
        .inner_join(rsvps::table)
        .filter(rsvps::event_id.eq(event_id))
        .group_by(dietary_restrictions::restriction)
        .select((dietary_restrictions::restriction, count_star()))
        .load::<(String, i64)>(conn)?
        .into_iter()
        .collect())
}

/// The free-text dietary notes attendees left, in the order they registered.
#[tracing::instrument(skip(conn))]
pub fn other_dietary_restrictions(
    conn: &mut SqliteConnection,
    event_id: i64,
) -> Result<Vec<String>> {
    Ok(rsvps::table
        .filter(rsvps::event_id.eq(event_id))
        .order_by(rsvps::id.asc())
        .select(rsvps::dietary_info)
        .load::<Option<String>>(conn)?
        .into_iter()
        .flatten()
        .filter(|info| !is_blank(info))
        .collect())
}
