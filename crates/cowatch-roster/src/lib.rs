//! Participant roster for cowatch.
//!
//! Tracks who is connected to the server, which room they are in, what
//! file they have open, and whether they are ready. The roster is fully
//! replaced by List snapshots and patched by Set updates; every change
//! is reported as a list of [`RosterEvent`]s for the session layer to
//! publish.
//!
//! # Key types
//!
//! - [`RosterTracker`] applies snapshots and diffs
//! - [`UserRecord`] is one participant
//! - [`Roster`] is the ordered username → record map
//! - [`RosterEvent`] describes what changed

mod error;
mod record;
mod tracker;

pub use error::RosterError;
pub use record::{Roster, UserRecord};
pub use tracker::{RosterEvent, RosterTracker};
