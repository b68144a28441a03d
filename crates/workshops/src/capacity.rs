//! Capacity rules for student RSVPs.
//!
//! Volunteers are never limited. Students beyond the event's limit are placed
//! on the waitlist, and the limit can only be lowered as far as the number of
//! students who have already been confirmed.

use db::event::Event;
use db::rsvp::Role;
use diesel::SqliteConnection;

use crate::error::Result;
use crate::rsvps;
use crate::validation::ValidationErrors;

/// Checks whether the student RSVP limit may change from `old` to `new`
/// given that `confirmed` students currently hold a place.
///
/// Going from no limit to some limit counts as a decrease.
pub fn validate_limit_change(
    old: Option<i64>,
    new: Option<i64>,
    confirmed: i64,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let new = match new {
        Some(new) => new,
        None => return Ok(()),
    };

    if new < 0 {
        errors.add("student_rsvp_limit", "must be greater than or equal to 0");
        return Err(errors);
    }

    let decreased = match old {
        Some(old) => new < old,
        None => true,
    };

    if decreased && new < confirmed {
        errors.add(
            "student_rsvp_limit",
            format!(
                "can't go below {confirmed} (the number of students already \
                 confirmed)"
            ),
        );
    }

    errors.into_result()
}

/// Whether no more students can be confirmed.
pub fn at_limit(limit: Option<i64>, confirmed: i64) -> bool {
    match limit {
        Some(limit) => confirmed >= limit,
        None => false,
    }
}

/// Where a new RSVP goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Confirmed,
    Waitlisted { position: i64 },
}

impl Placement {
    pub fn waitlist_position(self) -> Option<i64> {
        match self {
            Placement::Confirmed => None,
            Placement::Waitlisted { position } => Some(position),
        }
    }
}

/// Decides the placement of a new RSVP. Students who arrive once the event
/// is full join the end of the waitlist.
pub fn placement_for_new_rsvp(
    role: Role,
    limit: Option<i64>,
    confirmed: i64,
    waitlisted: i64,
) -> Placement {
    if role == Role::Student && at_limit(limit, confirmed) {
        Placement::Waitlisted {
            position: waitlisted + 1,
        }
    } else {
        Placement::Confirmed
    }
}

/// Whether the event has no room left for another confirmed student.
#[tracing::instrument(skip(conn, event), fields(event_id = event.id))]
pub fn event_at_limit(conn: &mut SqliteConnection, event: &Event) -> Result<bool> {
    if event.student_rsvp_limit.is_none() {
        return Ok(false);
    }
    let confirmed = rsvps::confirmed_student_count(conn, event.id)?;
    Ok(at_limit(event.student_rsvp_limit, confirmed))
}
