//! Workshop events: sessions, RSVPs, capacity limits and the student
//! waitlist.
//!
//! Every function that writes takes the SQLite write lock up front (an
//! `IMMEDIATE` transaction), so operations on the same event are serialized.

pub mod capacity;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod reports;
pub mod rsvps;
pub mod telemetry;
pub mod util;
pub mod validation;
pub mod waitlist;

#[cfg(test)]
mod tests;

pub use error::{Result, WorkshopError};
