use arbitrary::Arbitrary;
use db::rsvp::Role;
use diesel::SqliteConnection;
use serde::{Deserialize, Serialize};

use crate::error::WorkshopError;
use crate::events::{update_event, EventUpdate};
use crate::rsvps::{
    cancel, confirmed_student_rsvps, register, volunteer_rsvps,
    waitlisted_student_rsvps, RsvpDetails,
};
use crate::tests::{make_event, make_user};
use crate::waitlist::reorder_waitlist;

/// The model's view of a single event. RSVPs are stored by their database id.
#[derive(Debug, Clone, Default)]
struct ModelEvent {
    id: i64,
    limit: Option<i64>,
    confirmed: Vec<i64>,
    /// First in line first.
    waitlist: Vec<i64>,
    volunteers: Vec<i64>,
}

impl ModelEvent {
    fn at_limit(&self) -> bool {
        self.limit
            .is_some_and(|limit| self.confirmed.len() as i64 >= limit)
    }

    fn reorder(&mut self) {
        let Some(limit) = self.limit else {
            return;
        };
        let free = (limit - self.confirmed.len() as i64).max(0) as usize;
        let n = free.min(self.waitlist.len());
        self.confirmed.extend(self.waitlist.drain(..n));
    }

    fn accepts_limit(&self, new: Option<i64>) -> bool {
        let Some(new) = new else {
            return true;
        };
        let decreased = self.limit.map_or(true, |old| new < old);
        !(decreased && new < self.confirmed.len() as i64)
    }

    fn forget(&mut self, rsvp_id: i64) {
        self.confirmed.retain(|id| *id != rsvp_id);
        self.waitlist.retain(|id| *id != rsvp_id);
        self.volunteers.retain(|id| *id != rsvp_id);
    }
}

#[derive(Debug, Clone)]
struct ModelRsvp {
    id: i64,
    event_idx: usize,
    user_id: i64,
}

/// The state of the model.
#[derive(Debug, Default)]
pub struct State {
    users: Vec<i64>,
    events: Vec<ModelEvent>,
    rsvps: Vec<ModelRsvp>,
}

/// Indices are taken modulo the number of things of that kind which exist;
/// if there are none the action does nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Arbitrary)]
pub enum Action {
    AddUser,
    CreateEvent {
        limit: Option<u8>,
    },
    /// Registers the nth user for the nth event, as a student or as a
    /// volunteer.
    Register {
        user_idx: u8,
        event_idx: u8,
        as_student: bool,
    },
    Cancel {
        rsvp_idx: u8,
    },
    /// Changes the student RSVP limit through the normal event update.
    SetLimit {
        event_idx: u8,
        limit: Option<u8>,
    },
    Reorder {
        event_idx: u8,
    },
}

/// What the application did in response to an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Effect {
    Nothing,
    Created(i64),
    Rejected,
}

fn pick(idx: u8, len: usize) -> Option<usize> {
    (len > 0).then(|| idx as usize % len)
}

/// Limits are kept small, otherwise hardly anybody ends up on a waitlist.
fn small_limit(limit: Option<u8>) -> Option<i64> {
    limit.map(|limit| i64::from(limit % 5))
}

impl State {
    /// Steps through the provided actions. The application is always run
    /// first, as the model takes the ids of new rows from it.
    pub fn run(&mut self, actions: &[Action], conn: &mut SqliteConnection) {
        for action in actions {
            let effect = self.step_app(action, conn);
            self.step_model(action, effect);
            self.assert_matches_database(conn);
        }
    }

    fn step_app(&self, action: &Action, conn: &mut SqliteConnection) -> Effect {
        match action {
            Action::AddUser => Effect::Created(make_user(conn).id),
            Action::CreateEvent { limit } => {
                Effect::Created(make_event(conn, small_limit(*limit)).id)
            }
            Action::Register {
                user_idx,
                event_idx,
                as_student,
            } => {
                let (Some(user), Some(event)) = (
                    pick(*user_idx, self.users.len()),
                    pick(*event_idx, self.events.len()),
                ) else {
                    return Effect::Nothing;
                };
                let role = if *as_student {
                    Role::Student
                } else {
                    Role::Volunteer
                };
                match register(
                    conn,
                    self.events[event].id,
                    self.users[user],
                    role,
                    RsvpDetails::default(),
                ) {
                    Ok(rsvp) => Effect::Created(rsvp.id),
                    Err(WorkshopError::AlreadyRegistered { .. }) => {
                        Effect::Rejected
                    }
                    Err(e) => panic!("registration failed: {e}"),
                }
            }
            Action::Cancel { rsvp_idx } => {
                let Some(idx) = pick(*rsvp_idx, self.rsvps.len()) else {
                    return Effect::Nothing;
                };
                cancel(conn, self.rsvps[idx].id).unwrap();
                Effect::Nothing
            }
            Action::SetLimit { event_idx, limit } => {
                let Some(idx) = pick(*event_idx, self.events.len()) else {
                    return Effect::Nothing;
                };
                match update_event(
                    conn,
                    self.events[idx].id,
                    EventUpdate {
                        student_rsvp_limit: Some(small_limit(*limit)),
                        ..Default::default()
                    },
                ) {
                    Ok(_) => Effect::Nothing,
                    Err(WorkshopError::Invalid(_)) => Effect::Rejected,
                    Err(e) => panic!("update failed: {e}"),
                }
            }
            Action::Reorder { event_idx } => {
                let Some(idx) = pick(*event_idx, self.events.len()) else {
                    return Effect::Nothing;
                };
                reorder_waitlist(conn, self.events[idx].id).unwrap();
                Effect::Nothing
            }
        }
    }

    fn step_model(&mut self, action: &Action, effect: Effect) {
        match action {
            Action::AddUser => {
                let Effect::Created(id) = effect else {
                    panic!("expected a user to be created, got {effect:?}");
                };
                self.users.push(id);
            }
            Action::CreateEvent { limit } => {
                let Effect::Created(id) = effect else {
                    panic!("expected an event to be created, got {effect:?}");
                };
                self.events.push(ModelEvent {
                    id,
                    limit: small_limit(*limit),
                    ..Default::default()
                });
            }
            Action::Register {
                user_idx,
                event_idx,
                as_student,
            } => {
                let (Some(user), Some(event_idx)) = (
                    pick(*user_idx, self.users.len()),
                    pick(*event_idx, self.events.len()),
                ) else {
                    assert_eq!(effect, Effect::Nothing);
                    return;
                };
                let user_id = self.users[user];
                let already = self
                    .rsvps
                    .iter()
                    .any(|r| r.event_idx == event_idx && r.user_id == user_id);
                if already {
                    assert_eq!(effect, Effect::Rejected);
                    return;
                }
                let Effect::Created(id) = effect else {
                    panic!("expected an RSVP to be created, got {effect:?}");
                };

                let event = &mut self.events[event_idx];
                if !*as_student {
                    event.volunteers.push(id);
                } else if event.at_limit() {
                    event.waitlist.push(id);
                } else {
                    event.confirmed.push(id);
                }
                self.rsvps.push(ModelRsvp {
                    id,
                    event_idx,
                    user_id,
                });
            }
            Action::Cancel { rsvp_idx } => {
                let Some(idx) = pick(*rsvp_idx, self.rsvps.len()) else {
                    return;
                };
                let rsvp = self.rsvps.remove(idx);
                let event = &mut self.events[rsvp.event_idx];
                event.forget(rsvp.id);
                event.reorder();
            }
            Action::SetLimit { event_idx, limit } => {
                let Some(idx) = pick(*event_idx, self.events.len()) else {
                    return;
                };
                let event = &mut self.events[idx];
                let new = small_limit(*limit);
                let accepted = event.accepts_limit(new);
                assert_eq!(
                    effect == Effect::Rejected,
                    !accepted,
                    "limit change {:?} -> {:?} with {} confirmed",
                    event.limit,
                    new,
                    event.confirmed.len()
                );
                if accepted && new != event.limit {
                    event.limit = new;
                    event.reorder();
                }
            }
            Action::Reorder { event_idx } => {
                if let Some(idx) = pick(*event_idx, self.events.len()) {
                    self.events[idx].reorder();
                }
            }
        }
    }

    /// Checks whether the state of the application matches the state of the
    /// model.
    pub fn assert_matches_database(&self, conn: &mut SqliteConnection) {
        for event in &self.events {
            let mut confirmed = confirmed_student_rsvps(conn, event.id)
                .unwrap()
                .into_iter()
                .map(|rsvp| rsvp.id)
                .collect::<Vec<_>>();
            confirmed.sort();
            let mut expected = event.confirmed.clone();
            expected.sort();
            assert_eq!(confirmed, expected, "confirmed students of {event:?}");

            let waitlist = waitlisted_student_rsvps(conn, event.id).unwrap();
            assert_eq!(
                waitlist.iter().map(|rsvp| rsvp.id).collect::<Vec<_>>(),
                event.waitlist,
                "waitlist of {event:?}"
            );
            for (expected, rsvp) in (1..).zip(&waitlist) {
                assert_eq!(rsvp.waitlist_position, Some(expected));
            }

            let volunteers = volunteer_rsvps(conn, event.id)
                .unwrap()
                .into_iter()
                .map(|rsvp| rsvp.id)
                .collect::<Vec<_>>();
            assert_eq!(volunteers, event.volunteers);
        }
    }
}
