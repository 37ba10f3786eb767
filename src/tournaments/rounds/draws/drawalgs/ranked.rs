//! Draws which take team strength into account.
//!
//! Strengths (for example team points from previous rounds) are computed by
//! the caller. Each function here takes an already shuffled team list and
//! returns it reordered so that consecutive groups of `teams_per_room` teams
//! form the rooms, with any partial room last. Ties keep the shuffled order,
//! so teams of equal strength are placed randomly.

use std::collections::HashMap;

use crate::tournaments::teams::Team;

fn strength(strengths: &HashMap<String, f64>, team: &Team) -> f64 {
    strengths.get(&team.id).copied().unwrap_or(0.0)
}

/// Sorts strongest first. The sort is stable.
fn sort_by_strength(teams: &mut [Team], strengths: &HashMap<String, f64>) {
    teams.sort_by(|a, b| {
        strength(strengths, b).total_cmp(&strength(strengths, a))
    });
}

/// Power pairing: the strongest teams debate each other, then the next
/// strongest, and so on.
pub fn power_pair(
    mut teams: Vec<Team>,
    strengths: &HashMap<String, f64>,
) -> Vec<Team> {
    sort_by_strength(&mut teams, strengths);
    teams
}

/// Swiss "slide" pairing: with `R` rooms, room `r` receives the teams ranked
/// `r`, `r + R`, `r + 2R`, ... so that the top half of the field meets the
/// bottom half.
pub fn slide(
    mut teams: Vec<Team>,
    strengths: &HashMap<String, f64>,
    teams_per_room: usize,
) -> Vec<Team> {
    sort_by_strength(&mut teams, strengths);
    let rooms = teams.len().div_ceil(teams_per_room);
    distribute(teams, teams_per_room, (0..rooms).cycle())
}

/// Snake distribution: rooms are filled 0, 1, ..., R-1, R-1, ..., 1, 0, 0,
/// 1, ... in ranked order, which evens out the total strength of each room.
pub fn snake(
    mut teams: Vec<Team>,
    strengths: &HashMap<String, f64>,
    teams_per_room: usize,
) -> Vec<Team> {
    sort_by_strength(&mut teams, strengths);
    let rooms = teams.len().div_ceil(teams_per_room);
    distribute(
        teams,
        teams_per_room,
        (0..rooms).chain((0..rooms).rev()).cycle(),
    )
}

/// Deals `teams` into rooms following `order`, skipping rooms which are
/// already full. Every room but the last holds `teams_per_room` teams.
fn distribute(
    teams: Vec<Team>,
    teams_per_room: usize,
    mut order: impl Iterator<Item = usize>,
) -> Vec<Team> {
    if teams.is_empty() || teams_per_room == 0 {
        return teams;
    }

    let room_count = teams.len().div_ceil(teams_per_room);
    let last_room_size = teams.len() - (room_count - 1) * teams_per_room;
    let capacity = |room: usize| {
        if room + 1 == room_count {
            last_room_size
        } else {
            teams_per_room
        }
    };

    let mut rooms: Vec<Vec<Team>> = vec![Vec::new(); room_count];
    for team in teams {
        // total capacity equals the number of teams, so a free room exists
        let free = order.find(|room| rooms[*room].len() < capacity(*room));
        if let Some(room) = free {
            rooms[room].push(team);
        }
    }

    rooms.into_iter().flatten().collect()
}
