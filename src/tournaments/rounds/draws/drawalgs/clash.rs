//! Institution clash avoidance.
//!
//! A clash is two teams from the same institution debating in the same room.
//! Clashes are a soft cost: the optimizer always returns an ordering, even
//! if it could not remove every clash.
//!
//! The search is deliberately local. Starting from the original order, every
//! pair of positions is swapped exactly once (each swap is applied to the
//! original order, not to the best order found so far) and the cheapest
//! arrangement is kept. This is not guaranteed to find the minimum for pools
//! with more than one clashing pair. Replacing it with an optimal solver
//! would change which draws tournaments see, so it must not be done
//! silently.

use itertools::Itertools;

use crate::tournaments::teams::Team;

/// The cost of a single pair of clashing teams in a room.
pub const DEFAULT_CLASH_PENALTY: u32 = 100;

#[derive(Debug, Clone, Copy)]
pub struct ClashOptimizer {
    penalty: u32,
}

impl Default for ClashOptimizer {
    fn default() -> Self {
        Self::new(DEFAULT_CLASH_PENALTY)
    }
}

impl ClashOptimizer {
    pub fn new(penalty: u32) -> Self {
        Self { penalty }
    }

    /// Scores `group` as consecutive rooms of `room_size` teams: every pair
    /// of teams in the same room which share an institution costs the
    /// penalty. A `room_size` of zero treats the whole group as one room.
    pub fn clash_score(&self, group: &[Team], room_size: usize) -> u64 {
        let room_size = effective_room_size(group, room_size);
        let keys = group
            .iter()
            .map(Team::institution_key)
            .collect::<Vec<_>>();

        keys.chunks(room_size)
            .map(|room| {
                room.iter()
                    .tuple_combinations()
                    .filter(|(a, b)| a.is_some() && a == b)
                    .count() as u64
            })
            .sum::<u64>()
            * u64::from(self.penalty)
    }

    /// Returns `group` reordered to reduce institution clashes. Swing teams
    /// are never moved, so each room keeps the number of real teams it was
    /// given.
    pub fn optimize(&self, group: &[Team], room_size: usize) -> Vec<Team> {
        let room_size = effective_room_size(group, room_size);

        let mut best = group.to_vec();
        let mut best_score = self.clash_score(group, room_size);
        if best_score == 0 {
            return best;
        }

        for (i, j) in (0..group.len()).tuple_combinations() {
            if group[i].is_swing() || group[j].is_swing() {
                continue;
            }
            // swapping within a room cannot change who debates whom
            if i / room_size == j / room_size {
                continue;
            }

            let mut candidate = group.to_vec();
            candidate.swap(i, j);
            let score = self.clash_score(&candidate, room_size);
            if score < best_score {
                best = candidate;
                best_score = score;
            }
        }

        best
    }
}

fn effective_room_size(group: &[Team], room_size: usize) -> usize {
    if room_size == 0 {
        group.len().max(1)
    } else {
        room_size
    }
}
