//! Draw generation: assigns teams to rooms and positions, and a judge to
//! each room.
//!
//! Everything in this module is a pure function of its input and the random
//! number generator it is handed. Persisting the result is the job of
//! [`crate::tournaments::rounds::draws::manage`].

use std::{
    collections::{HashMap, HashSet},
    fmt,
    str::FromStr,
};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::{
    formats::{FormatCode, FormatSpec},
    tournaments::{
        participants::Judge,
        rounds::draws::drawalgs::{
            clash::{ClashOptimizer, DEFAULT_CLASH_PENALTY},
            judges::assign_judge,
            swing::make_swing_team,
        },
        teams::Team,
    },
};

pub mod clash;
pub mod judges;
pub mod random;
pub mod ranked;
pub mod swing;

/// The error messages will be shown to whoever requested the draw, and
/// therefore should be readable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("there are no available teams")]
    NoTeams,
    #[error(
        "the {format} format needs at least {required} teams, but only \
         {available} are available"
    )]
    InsufficientTeams {
        format: FormatCode,
        required: usize,
        available: usize,
    },
    #[error("unknown debate format `{0}`")]
    UnknownFormat(String),
    #[error("unknown draw method `{0}`")]
    UnknownMethod(String),
    #[error("no rooms are available for this round")]
    NoRooms,
    #[error("room labels must not be blank")]
    BlankRoomLabel,
    #[error("room `{0}` is listed more than once")]
    DuplicateRoom(String),
    #[error("team `{0}` appears more than once in the team pool")]
    DuplicateTeam(String),
    #[error(
        "team `{team}` has {speakers} speakers, but the {format} format \
         allows {allowed}"
    )]
    TooManySpeakers {
        team: String,
        format: FormatCode,
        speakers: usize,
        allowed: usize,
    },
}

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Default,
    arbitrary::Arbitrary,
)]
pub enum DrawMethod {
    #[default]
    #[serde(rename = "random")]
    Random,
    #[serde(rename = "power_pairing")]
    PowerPairing,
    #[serde(rename = "swiss")]
    Swiss,
    #[serde(rename = "balanced")]
    Balanced,
}

impl DrawMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DrawMethod::Random => "random",
            DrawMethod::PowerPairing => "power_pairing",
            DrawMethod::Swiss => "swiss",
            DrawMethod::Balanced => "balanced",
        }
    }
}

impl fmt::Display for DrawMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DrawMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "random" => Ok(DrawMethod::Random),
            "power_pairing" | "power" => Ok(DrawMethod::PowerPairing),
            "swiss" => Ok(DrawMethod::Swiss),
            "balanced" => Ok(DrawMethod::Balanced),
            other => Err(ValidationError::UnknownMethod(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DrawOptions {
    pub method: DrawMethod,
    pub avoid_institution_clashes: bool,
    /// Spread strong and weak teams evenly over the rooms, rather than
    /// grouping teams of similar strength together.
    pub balance_experience: bool,
    /// Team id → strength (e.g. team points so far). Supplied by the caller;
    /// ranked methods fall back to a random draw without it.
    pub strengths: Option<HashMap<String, f64>>,
    pub clash_penalty: u32,
}

impl Default for DrawOptions {
    fn default() -> Self {
        Self {
            method: DrawMethod::Random,
            avoid_institution_clashes: true,
            balance_experience: false,
            strengths: None,
            clash_penalty: DEFAULT_CLASH_PENALTY,
        }
    }
}

/// Everything needed to draw a round. The slices are treated as a snapshot:
/// the engine copies what it needs and never modifies them.
#[derive(Clone, Copy, Debug)]
pub struct DrawInput<'a> {
    pub teams: &'a [Team],
    pub judges: &'a [Judge],
    pub rooms: &'a [String],
    pub options: &'a DrawOptions,
}

/// A single room of a generated draw.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoomAssignment {
    pub room: String,
    /// Role name (e.g. "OG") → team, in speaking order.
    pub teams: IndexMap<String, Team>,
    pub judge: Option<Judge>,
}

impl RoomAssignment {
    pub fn real_teams(&self) -> impl Iterator<Item = &Team> {
        self.teams.values().filter(|team| !team.is_swing())
    }

    pub fn swing_teams(&self) -> impl Iterator<Item = &Team> {
        self.teams.values().filter(|team| team.is_swing())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneratedDraw {
    /// Rooms in the order their labels were supplied.
    pub rooms: Vec<RoomAssignment>,
    /// Teams which could not be placed because there were not enough rooms.
    pub benched: Vec<Team>,
}

/// Draws rounds for a single format. Strategies only differ in the format
/// they are built for; see [`strategy_for`].
pub trait PairingStrategy: Send + Sync {
    fn format(&self) -> &FormatSpec;

    fn generate(
        &self,
        input: DrawInput<'_>,
        rng: &mut dyn RngCore,
    ) -> Result<GeneratedDraw, ValidationError> {
        draw_rooms(self.format(), input, rng)
    }
}

/// Fills the role slots of a format in order.
pub struct RoleSlotStrategy {
    format: FormatSpec,
}

impl PairingStrategy for RoleSlotStrategy {
    fn format(&self) -> &FormatSpec {
        &self.format
    }
}

static STRATEGIES: Lazy<HashMap<FormatCode, Box<dyn PairingStrategy>>> =
    Lazy::new(|| {
        FormatCode::ALL
            .into_iter()
            .map(|code| {
                let strategy: Box<dyn PairingStrategy> =
                    Box::new(RoleSlotStrategy {
                        format: code.spec(),
                    });
                (code, strategy)
            })
            .collect()
    });

pub fn strategy_for(
    code: FormatCode,
) -> Result<&'static dyn PairingStrategy, ValidationError> {
    STRATEGIES
        .get(&code)
        .map(|strategy| strategy.as_ref())
        .ok_or_else(|| ValidationError::UnknownFormat(code.to_string()))
}

/// Generates a draw for `format`.
pub fn generate(
    format: FormatCode,
    input: DrawInput<'_>,
    rng: &mut dyn RngCore,
) -> Result<GeneratedDraw, ValidationError> {
    strategy_for(format)?.generate(input, rng)
}

fn validate(
    format: &FormatSpec,
    input: &DrawInput<'_>,
) -> Result<(), ValidationError> {
    if input.teams.is_empty() {
        return Err(ValidationError::NoTeams);
    }
    if input.teams.len() < format.min_teams {
        return Err(ValidationError::InsufficientTeams {
            format: format.code,
            required: format.min_teams,
            available: input.teams.len(),
        });
    }
    if input.rooms.is_empty() {
        return Err(ValidationError::NoRooms);
    }

    let mut seen_rooms = HashSet::new();
    for room in input.rooms {
        if room.trim().is_empty() {
            return Err(ValidationError::BlankRoomLabel);
        }
        if !seen_rooms.insert(room.as_str()) {
            return Err(ValidationError::DuplicateRoom(room.clone()));
        }
    }

    let mut seen_teams = HashSet::new();
    for team in input.teams {
        if !seen_teams.insert(team.id.as_str()) {
            return Err(ValidationError::DuplicateTeam(team.id.clone()));
        }
        if team.speakers.len() > format.speakers_per_team {
            return Err(ValidationError::TooManySpeakers {
                team: team.id.clone(),
                format: format.code,
                speakers: team.speakers.len(),
                allowed: format.speakers_per_team,
            });
        }
    }

    Ok(())
}

#[tracing::instrument(skip_all, fields(
    format = %format.code,
    method = %input.options.method,
    teams = input.teams.len(),
    rooms = input.rooms.len(),
))]
fn draw_rooms(
    format: &FormatSpec,
    input: DrawInput<'_>,
    rng: &mut dyn RngCore,
) -> Result<GeneratedDraw, ValidationError> {
    validate(format, &input)?;

    let teams_per_room = format.teams_per_room();
    let room_count = input
        .teams
        .len()
        .div_ceil(teams_per_room)
        .min(input.rooms.len());

    let mut pool = random::shuffle(input.teams.to_vec(), rng);
    let strengths = ranking_strengths(&pool, input.options);
    if let Some(strengths) = strengths {
        // the weakest teams are the ones left without a room
        pool = ranked::power_pair(pool, strengths);
    }

    let (placed, benched) = random::bench(pool, room_count * teams_per_room);
    if !benched.is_empty() {
        tracing::warn!(
            benched = benched.len(),
            "not enough rooms for every team; some teams were benched"
        );
    }

    let mut placed = match strengths {
        Some(strengths) => order_by_strength(
            placed,
            strengths,
            teams_per_room,
            input.options,
        ),
        None => placed,
    };

    let real_in_last_room = placed.len() % teams_per_room;
    if real_in_last_room != 0 {
        placed.extend(
            (real_in_last_room..teams_per_room).map(make_swing_team),
        );
    }

    if input.options.avoid_institution_clashes {
        let optimizer = ClashOptimizer::new(input.options.clash_penalty);
        let before = optimizer.clash_score(&placed, teams_per_room);
        placed = optimizer.optimize(&placed, teams_per_room);
        tracing::debug!(
            before,
            after = optimizer.clash_score(&placed, teams_per_room),
            "optimised institution clashes"
        );
    }

    let rooms = placed
        .chunks(teams_per_room)
        .zip(input.rooms)
        .enumerate()
        .map(|(index, (group, label))| RoomAssignment {
            room: label.clone(),
            teams: format
                .role_names()
                .map(str::to_string)
                .zip(group.iter().cloned())
                .collect(),
            judge: assign_judge(input.judges, index).cloned(),
        })
        .collect();

    Ok(GeneratedDraw { rooms, benched })
}

/// The strengths to rank the team pool by, or `None` for a random draw.
fn ranking_strengths<'o>(
    teams: &[Team],
    options: &'o DrawOptions,
) -> Option<&'o HashMap<String, f64>> {
    match (options.method, &options.strengths) {
        (DrawMethod::Random, None) => None,
        (DrawMethod::Random, Some(_)) if !options.balance_experience => None,
        (_, Some(strengths)) => {
            let missing = teams
                .iter()
                .filter(|team| !strengths.contains_key(&team.id))
                .count();
            if missing == 0 {
                Some(strengths)
            } else {
                tracing::warn!(
                    missing,
                    method = %options.method,
                    "strengths are missing for some teams, falling back to a \
                     random draw"
                );
                None
            }
        }
        (method, None) => {
            tracing::warn!(
                %method,
                "no team strengths supplied, falling back to a random draw"
            );
            None
        }
    }
}

/// Orders the teams to be placed so that consecutive groups of
/// `teams_per_room` form the rooms.
fn order_by_strength(
    teams: Vec<Team>,
    strengths: &HashMap<String, f64>,
    teams_per_room: usize,
    options: &DrawOptions,
) -> Vec<Team> {
    match options.method {
        _ if options.balance_experience => {
            ranked::snake(teams, strengths, teams_per_room)
        }
        DrawMethod::PowerPairing => ranked::power_pair(teams, strengths),
        DrawMethod::Swiss => ranked::slide(teams, strengths, teams_per_room),
        DrawMethod::Balanced | DrawMethod::Random => {
            ranked::snake(teams, strengths, teams_per_room)
        }
    }
}
