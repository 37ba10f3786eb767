//! The catalogue of debate formats supported by the draw engine.
//!
//! Formats are static configuration: the number of teams which debate in
//! each room, how many speakers each team fields, and the names of the
//! positions teams are drawn into.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::tournaments::rounds::draws::drawalgs::ValidationError;

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    arbitrary::Arbitrary,
)]
pub enum FormatCode {
    #[serde(rename = "bp")]
    BritishParliamentary,
    #[serde(rename = "ap")]
    AsianParliamentary,
    #[serde(rename = "wsdc")]
    Wsdc,
    #[serde(rename = "australs")]
    Australs,
}

impl FormatCode {
    pub const ALL: [FormatCode; 4] = [
        FormatCode::BritishParliamentary,
        FormatCode::AsianParliamentary,
        FormatCode::Wsdc,
        FormatCode::Australs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FormatCode::BritishParliamentary => "bp",
            FormatCode::AsianParliamentary => "ap",
            FormatCode::Wsdc => "wsdc",
            FormatCode::Australs => "australs",
        }
    }

    /// Looks up the static specification for this format.
    pub fn spec(&self) -> FormatSpec {
        match self {
            FormatCode::BritishParliamentary => FormatSpec {
                code: *self,
                speakers_per_team: 2,
                roles: vec![
                    RoleSlot::new("OG", "Opening Government"),
                    RoleSlot::new("OO", "Opening Opposition"),
                    RoleSlot::new("CG", "Closing Government"),
                    RoleSlot::new("CO", "Closing Opposition"),
                ],
                min_teams: 2,
            },
            FormatCode::AsianParliamentary => FormatSpec {
                code: *self,
                speakers_per_team: 3,
                roles: vec![
                    RoleSlot::new("Gov", "Government"),
                    RoleSlot::new("Opp", "Opposition"),
                ],
                min_teams: 2,
            },
            FormatCode::Wsdc => FormatSpec {
                code: *self,
                speakers_per_team: 3,
                roles: vec![
                    RoleSlot::new("Prop", "Proposition"),
                    RoleSlot::new("Opp", "Opposition"),
                ],
                min_teams: 2,
            },
            FormatCode::Australs => FormatSpec {
                code: *self,
                speakers_per_team: 3,
                roles: vec![
                    RoleSlot::new("Aff", "Affirmative"),
                    RoleSlot::new("Neg", "Negative"),
                ],
                min_teams: 2,
            },
        }
    }
}

impl fmt::Display for FormatCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormatCode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FormatCode::ALL
            .into_iter()
            .find(|code| code.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownFormat(s.to_string()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSlot {
    /// e.g. "OG"
    pub short: String,
    /// e.g. "Opening Government"
    pub long: String,
}

impl RoleSlot {
    fn new(short: &str, long: &str) -> Self {
        Self {
            short: short.to_string(),
            long: long.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatSpec {
    pub code: FormatCode,
    pub speakers_per_team: usize,
    /// Positions in a room, in speaking order. The length of this list is the
    /// number of teams per room.
    pub roles: Vec<RoleSlot>,
    /// The smallest team pool a draw can be generated for.
    pub min_teams: usize,
}

impl FormatSpec {
    pub fn teams_per_room(&self) -> usize {
        self.roles.len()
    }

    pub fn role_names(&self) -> impl Iterator<Item = &str> {
        self.roles.iter().map(|role| role.short.as_str())
    }

    /// The full name of the position abbreviated `short`.
    pub fn role_title(&self, short: &str) -> Option<&str> {
        self.roles
            .iter()
            .find(|role| role.short == short)
            .map(|role| role.long.as_str())
    }
}
