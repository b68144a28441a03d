use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::rsvps;

/// The capacity in which somebody attends an event.
///
/// Stored in the database by [`Role::id`]. Only students are subject to the
/// RSVP limit (and therefore to the waitlist).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Role {
    Volunteer,
    Student,
    Organizer,
}

impl Role {
    pub const ATTENDEE_ROLES: [Role; 2] = [Role::Volunteer, Role::Student];

    pub const fn id(self) -> i64 {
        match self {
            Role::Volunteer => 1,
            Role::Student => 2,
            Role::Organizer => 3,
        }
    }

    pub const fn of_id(id: i64) -> Option<Role> {
        match id {
            1 => Some(Role::Volunteer),
            2 => Some(Role::Student),
            3 => Some(Role::Organizer),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Role::Volunteer => "Volunteer",
            Role::Student => "Student",
            Role::Organizer => "Organizer",
        }
    }
}

#[derive(Debug, Queryable, Serialize, Clone, PartialEq, Eq, Hash)]
pub struct Rsvp {
    pub id: i64,
    pub public_id: String,
    pub user_id: i64,
    pub event_id: i64,
    pub role_id: i64,
    /// `None` if this RSVP counts against the event's capacity.
    pub waitlist_position: Option<i64>,
    pub dietary_info: Option<String>,
    pub needs_childcare: bool,
    pub childcare_info: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Rsvp {
    /// Panics if the row holds a role id we do not know about (the only
    /// writer is this crate, so that would be a bug).
    pub fn role(&self) -> Role {
        Role::of_id(self.role_id)
            .unwrap_or_else(|| panic!("unknown role id {}", self.role_id))
    }

    pub fn is_waitlisted(&self) -> bool {
        self.waitlist_position.is_some()
    }
}

#[diesel::dsl::auto_type]
/// All the student RSVPs for an event (confirmed and waitlisted).
pub fn student_rsvps_of_event(event_id: i64) -> _ {
    let student: i64 = Role::Student.id();
    rsvps::table
        .filter(rsvps::event_id.eq(event_id))
        .filter(rsvps::role_id.eq(student))
}
