//! Judge allocation.
//!
//! Judges are handed out round-robin in the order they were supplied. No
//! attempt is made to avoid judges adjudicating teams from their own
//! institution.

use crate::tournaments::participants::Judge;

/// Returns the judge for the room at `room_index`, or `None` if there are no
/// judges at all.
pub fn assign_judge(judges: &[Judge], room_index: usize) -> Option<&Judge> {
    if judges.is_empty() {
        None
    } else {
        judges.get(room_index % judges.len())
    }
}
