//! Random partitioning of the team pool.

use rand::{RngCore, seq::SliceRandom};

use crate::tournaments::teams::Team;

/// Shuffles the team pool. Every permutation is equally likely.
pub fn shuffle(mut teams: Vec<Team>, rng: &mut dyn RngCore) -> Vec<Team> {
    teams.shuffle(rng);
    teams
}

/// Splits `teams` into the teams which will be placed in a room and those at
/// the end which do not fit into the available rooms.
pub fn bench(
    mut teams: Vec<Team>,
    capacity: usize,
) -> (Vec<Team>, Vec<Team>) {
    let benched = if teams.len() > capacity {
        teams.split_off(capacity)
    } else {
        Vec::new()
    };

    (teams, benched)
}
