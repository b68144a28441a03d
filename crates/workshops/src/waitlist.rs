//! Keeps the student waitlist of an event consistent with its RSVP limit.
//!
//! Reordering is computed by [`plan_reorder`] (a pure function of the current
//! state) and then written back by [`reorder_waitlist`]. Running it twice in
//! a row is the same as running it once.
//!
//! After a reorder the waitlist positions of an event are exactly `1..=n`.
//! Anything else is a bug, so we panic rather than return an error.

use db::event::Event;
use db::schema::{events, rsvps};
use diesel::prelude::*;
use diesel::SqliteConnection;
use serde::Serialize;

use crate::error::{Result, WorkshopError};
use crate::rsvps::{confirmed_student_count, waitlisted_student_rsvps};

/// The changes needed to bring an event's waitlist back in line.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ReorderPlan {
    /// RSVPs leaving the waitlist, earliest position first.
    pub promoted: Vec<i64>,
    /// Every RSVP still on the waitlist, with its new position, in order.
    pub waitlist: Vec<(i64, i64)>,
    /// How many more students are confirmed than the limit allows. This only
    /// happens if the limit was lowered without going through validation; we
    /// never demote anybody to fix it.
    pub over_capacity: i64,
}

/// Computes the reorder for an event with the given `limit`, `confirmed`
/// student count and waitlisted RSVP ids (ordered by current position).
///
/// With no limit nobody is promoted, but positions are still renumbered.
pub fn plan_reorder(
    limit: Option<i64>,
    confirmed: i64,
    waitlisted: &[i64],
) -> ReorderPlan {
    let (available, over_capacity) = match limit {
        Some(limit) => {
            let available = limit - confirmed;
            (available.max(0), (-available).max(0))
        }
        None => (0, 0),
    };

    let promote = usize::try_from(available)
        .unwrap_or(usize::MAX)
        .min(waitlisted.len());
    let (promoted, remaining) = waitlisted.split_at(promote);

    let plan = ReorderPlan {
        promoted: promoted.to_vec(),
        waitlist: remaining
            .iter()
            .zip(1..)
            .map(|(id, position)| (*id, position))
            .collect(),
        over_capacity,
    };

    assert_contiguous(plan.waitlist.iter().map(|(_, position)| *position));

    plan
}

/// Panics unless `positions` (in order) are exactly `1, 2, ..., n`.
pub fn assert_contiguous(positions: impl IntoIterator<Item = i64>) {
    for (expected, position) in (1..).zip(positions) {
        assert_eq!(
            position, expected,
            "waitlist positions must be contiguous and start at 1"
        );
    }
}

/// What a call to [`reorder_waitlist`] changed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ReorderOutcome {
    pub promoted: Vec<i64>,
    /// Number of RSVPs which stayed on the waitlist but moved position.
    pub renumbered: usize,
    pub still_waitlisted: usize,
    pub over_capacity: i64,
}

impl ReorderOutcome {
    pub fn changed_anything(&self) -> bool {
        !self.promoted.is_empty() || self.renumbered > 0
    }
}

/// Promotes waitlisted students into any free places and renumbers whoever
/// is left. Takes the database write lock for the duration, so concurrent
/// cancellations cannot both promote the same student.
#[tracing::instrument(skip(conn))]
pub fn reorder_waitlist(
    conn: &mut SqliteConnection,
    event_id: i64,
) -> Result<ReorderOutcome> {
    conn.immediate_transaction(|conn| reorder_waitlist_in(conn, event_id))
}

/// As [`reorder_waitlist`], for callers which already hold a write
/// transaction.
pub(crate) fn reorder_waitlist_in(
    conn: &mut SqliteConnection,
    event_id: i64,
) -> Result<ReorderOutcome> {
    let event = events::table
        .find(event_id)
        .first::<Event>(conn)
        .optional()?
        .ok_or_else(|| WorkshopError::not_found("event", event_id))?;

    let confirmed = confirmed_student_count(conn, event.id)?;
    let waitlisted = waitlisted_student_rsvps(conn, event.id)?;
    let ids = waitlisted.iter().map(|rsvp| rsvp.id).collect::<Vec<_>>();

    let plan = plan_reorder(event.student_rsvp_limit, confirmed, &ids);

    if plan.over_capacity > 0 {
        tracing::warn!(
            event_id = event.id,
            limit = ?event.student_rsvp_limit,
            confirmed,
            "more students are confirmed than the limit allows; not \
             promoting anybody"
        );
    }

    for id in &plan.promoted {
        let n = diesel::update(rsvps::table.find(*id))
            .set(rsvps::waitlist_position.eq(None::<i64>))
            .execute(conn)?;
        assert_eq!(n, 1);
    }

    let mut renumbered = 0;
    for ((id, position), rsvp) in
        plan.waitlist.iter().zip(&waitlisted[plan.promoted.len()..])
    {
        debug_assert_eq!(*id, rsvp.id);
        if rsvp.waitlist_position == Some(*position) {
            continue;
        }
        let n = diesel::update(rsvps::table.find(*id))
            .set(rsvps::waitlist_position.eq(Some(*position)))
            .execute(conn)?;
        assert_eq!(n, 1);
        renumbered += 1;
    }

    assert_contiguous(
        waitlisted_student_rsvps(conn, event.id)?
            .into_iter()
            .filter_map(|rsvp| rsvp.waitlist_position),
    );

    let outcome = ReorderOutcome {
        promoted: plan.promoted,
        renumbered,
        still_waitlisted: plan.waitlist.len(),
        over_capacity: plan.over_capacity,
    };

    if outcome.changed_anything() {
        tracing::info!(
            event_id = event.id,
            promoted = outcome.promoted.len(),
            renumbered = outcome.renumbered,
            "reordered waitlist"
        );
    }

    Ok(outcome)
}
