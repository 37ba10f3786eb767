//! Which changes may be made to a round's draw, given the state it is in.
//!
//! The checks are pure functions of a [`RoundState`]. The store evaluates
//! them inside the same transaction that makes the change, so the state
//! cannot move between the check and the write.

use std::collections::HashMap;

use crate::{
    state::PersistenceFailure,
    tournaments::rounds::{
        Round,
        ballots::{Ballot, BallotStatus},
        draws::{DrawRepr, DrawStatus},
    },
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleViolation {
    #[error("there is no pending draw to release")]
    NothingToAccept,
    #[error(
        "the draw has already been released, so it can no longer be \
         regenerated"
    )]
    AlreadyAccepted,
    #[error("the round has already been completed")]
    RoundCompleted,
    #[error("the round does not have a draw")]
    NoDraw,
    #[error("the draw for room `{room}` has not been released")]
    NotAccepted { room: String },
    #[error("room `{room}` does not have a confirmed ballot")]
    UnconfirmedBallot { room: String },
    #[error("a draw cannot move from {from} to {to}")]
    InvalidTransition { from: DrawStatus, to: DrawStatus },
}

impl DrawStatus {
    /// Statuses only move forward, one step at a time.
    pub fn can_transition_to(&self, next: DrawStatus) -> bool {
        matches!(
            (self, next),
            (DrawStatus::Pending, DrawStatus::InProgress)
                | (DrawStatus::InProgress, DrawStatus::Completed)
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoomState {
    pub draw_id: String,
    pub room: String,
    pub status: DrawStatus,
    pub ballots: Vec<BallotStatus>,
}

/// The parts of a round the lifecycle checks look at.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundState {
    pub round_id: String,
    pub completed: bool,
    pub rooms: Vec<RoomState>,
}

impl RoundState {
    pub fn new(
        round: &Round,
        draws: &[DrawRepr],
        ballots: &[Ballot],
    ) -> Result<RoundState, PersistenceFailure> {
        let mut by_draw: HashMap<&str, Vec<BallotStatus>> = HashMap::new();
        for ballot in ballots {
            by_draw
                .entry(ballot.draw_id.as_str())
                .or_default()
                .push(ballot.status()?);
        }

        Ok(RoundState {
            round_id: round.id.clone(),
            completed: round.completed,
            rooms: draws
                .iter()
                .map(|repr| RoomState {
                    draw_id: repr.draw.id.clone(),
                    room: repr.draw.room.clone(),
                    status: repr.status(),
                    ballots: by_draw
                        .remove(repr.draw.id.as_str())
                        .unwrap_or_default(),
                })
                .collect(),
        })
    }

    fn any_with(&self, status: DrawStatus) -> bool {
        self.rooms.iter().any(|room| room.status == status)
    }
}

/// A new draw may replace the current one only while nothing has been
/// released.
pub fn check_regenerate(state: &RoundState) -> Result<(), LifecycleViolation> {
    if state.completed || state.any_with(DrawStatus::Completed) {
        return Err(LifecycleViolation::RoundCompleted);
    }
    if state.any_with(DrawStatus::InProgress) {
        return Err(LifecycleViolation::AlreadyAccepted);
    }
    Ok(())
}

/// Rollback replaces released draws too, but never completed ones.
pub fn check_rollback(state: &RoundState) -> Result<(), LifecycleViolation> {
    if state.completed || state.any_with(DrawStatus::Completed) {
        return Err(LifecycleViolation::RoundCompleted);
    }
    Ok(())
}

pub fn check_accept(state: &RoundState) -> Result<(), LifecycleViolation> {
    if state.completed || state.any_with(DrawStatus::Completed) {
        return Err(LifecycleViolation::RoundCompleted);
    }
    if !state.any_with(DrawStatus::Pending) {
        return Err(LifecycleViolation::NothingToAccept);
    }
    Ok(())
}

/// Every room must have been released and must have at least one confirmed
/// ballot.
pub fn check_complete(state: &RoundState) -> Result<(), LifecycleViolation> {
    if state.completed {
        return Err(LifecycleViolation::RoundCompleted);
    }
    if state.rooms.is_empty() {
        return Err(LifecycleViolation::NoDraw);
    }

    for room in &state.rooms {
        if room.status != DrawStatus::InProgress {
            return Err(LifecycleViolation::NotAccepted {
                room: room.room.clone(),
            });
        }
        if !room.ballots.contains(&BallotStatus::Confirmed) {
            return Err(LifecycleViolation::UnconfirmedBallot {
                room: room.room.clone(),
            });
        }
    }

    Ok(())
}
