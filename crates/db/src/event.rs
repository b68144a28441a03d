use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::{event_organizers, events};

#[derive(Queryable, Serialize, Debug, Clone, Hash, PartialEq, Eq)]
pub struct Event {
    pub id: i64,
    pub public_id: String,
    pub title: String,
    pub details: String,
    /// An IANA time zone name, e.g. `Pacific/Honolulu`.
    pub time_zone: String,
    /// Maximum number of confirmed students. `None` means there is no limit
    /// (this is the case for events imported from elsewhere).
    pub student_rsvp_limit: Option<i64>,
    pub published: bool,
    pub location_id: Option<i64>,
    pub student_details: Option<String>,
    pub volunteer_details: Option<String>,
    pub created_at: NaiveDateTime,
}

type WithPublicId<'a> = diesel::dsl::Eq<events::public_id, &'a str>;

impl Event {
    pub fn with_public_id(pid: &str) -> WithPublicId {
        events::public_id.eq(pid)
    }
}

#[diesel::dsl::auto_type]
/// Ids of the events which the given user organizes.
pub fn events_organized_by(user_id: i64) -> _ {
    event_organizers::table
        .filter(event_organizers::user_id.eq(user_id))
        .select(event_organizers::event_id)
}

#[derive(Queryable, Serialize, Debug, Clone, Hash, PartialEq, Eq)]
pub struct EventSession {
    pub id: i64,
    pub public_id: String,
    pub event_id: i64,
    pub name: String,
    /// Stored in UTC.
    pub starts_at: NaiveDateTime,
    /// Stored in UTC.
    pub ends_at: NaiveDateTime,
    pub required_for_students: bool,
}

#[derive(Queryable, Serialize, Debug, Clone, Hash, PartialEq, Eq)]
pub struct Location {
    pub id: i64,
    pub public_id: String,
    pub name: String,
    pub address: Option<String>,
}
