use crate::tournaments::teams::{SWING_INSTITUTION, Team};

/// Creates the placeholder team for position `slot_index_in_room` of a room
/// which does not have enough real teams. Slot 0 is "Swing Team A", slot 1
/// "Swing Team B", and so on.
pub fn make_swing_team(slot_index_in_room: usize) -> Team {
    let letter = slot_letter(slot_index_in_room);
    Team {
        id: format!("swing-{}", letter.to_ascii_lowercase()),
        tournament_id: String::new(),
        name: format!("Swing Team {letter}"),
        institution: Some(SWING_INSTITUTION.to_string()),
        speakers: Vec::new(),
        number: 0,
    }
}

fn slot_letter(slot_index_in_room: usize) -> char {
    // rooms hold at most four teams in every supported format
    char::from(b'A' + (slot_index_in_room % 26) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swing_teams_are_named_by_slot() {
        let team = make_swing_team(2);
        assert_eq!(team.name, "Swing Team C");
        assert_eq!(team.id, "swing-c");
        assert!(team.is_swing());
        assert_eq!(team.institution_key(), None);
    }

    #[test]
    fn different_slots_give_different_teams() {
        assert_ne!(make_swing_team(0).id, make_swing_team(1).id);
    }
}
