use std::{fmt, str::FromStr};

use chrono::NaiveDateTime;
use diesel::{prelude::*, sqlite::Sqlite};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    schema::{tournament_draw_slots, tournament_draws},
    state::PersistenceFailure,
};

pub mod drawalgs;
pub mod history;
pub mod lifecycle;
pub mod manage;
pub mod store;

/// The status of a single room of a draw. Statuses only ever move forward:
/// `pending` → `in_progress` → `completed`.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
)]
pub enum DrawStatus {
    /// Generated, but not yet accepted. The room may still be regenerated.
    #[serde(rename = "pending")]
    Pending,
    /// Accepted and released to participants.
    #[serde(rename = "in_progress")]
    InProgress,
    /// Results are final.
    #[serde(rename = "completed")]
    Completed,
}

impl DrawStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DrawStatus::Pending => "pending",
            DrawStatus::InProgress => "in_progress",
            DrawStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for DrawStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DrawStatus {
    type Err = PersistenceFailure;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DrawStatus::Pending),
            "in_progress" => Ok(DrawStatus::InProgress),
            "completed" => Ok(DrawStatus::Completed),
            other => Err(PersistenceFailure::InvalidColumn {
                column: "tournament_draws.status",
                value: other.to_string(),
            }),
        }
    }
}

/// A single room of a round's draw, as stored.
#[derive(Queryable, Selectable, Serialize, Deserialize, Clone, Debug)]
#[diesel(check_for_backend(Sqlite))]
#[diesel(table_name = tournament_draws)]
pub struct Draw {
    pub id: String,
    pub tournament_id: String,
    pub round_id: String,
    pub room: String,
    /// Position of this room in the round's room order.
    pub number: i64,
    pub judge_id: Option<String>,
    status: String,
    pub generation_id: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Draw {
    pub fn status(&self) -> Result<DrawStatus, PersistenceFailure> {
        self.status.parse()
    }
}

#[derive(Queryable, Selectable, Serialize, Deserialize, Clone, Debug)]
#[diesel(check_for_backend(Sqlite))]
#[diesel(table_name = tournament_draw_slots)]
/// This struct represents a single row in the `tournament_draw_slots` table:
/// one team in one position of a room. Swing teams are stored by name only.
pub struct DrawSlot {
    pub id: String,
    pub draw_id: String,
    pub seq: i64,
    pub role: String,
    pub team_id: Option<String>,
    pub swing_name: Option<String>,
}

/// A room together with its teams.
#[derive(Serialize, Clone, Debug)]
pub struct DrawRepr {
    pub draw: Draw,
    /// The slots of the room, ordered by position.
    pub slots: Vec<DrawSlot>,
    #[serde(skip)]
    status: DrawStatus,
}

impl DrawRepr {
    pub fn status(&self) -> DrawStatus {
        self.status
    }

    /// Loads every room of a round, ordered by room number.
    pub fn of_round(
        round_id: &str,
        conn: &mut SqliteConnection,
    ) -> Result<Vec<DrawRepr>, PersistenceFailure> {
        let draws = tournament_draws::table
            .filter(tournament_draws::round_id.eq(round_id))
            .order_by((
                tournament_draws::number.asc(),
                tournament_draws::id.asc(),
            ))
            .select(Draw::as_select())
            .load::<Draw>(conn)?;

        let draw_ids = draws.iter().map(|draw| &draw.id).collect::<Vec<_>>();
        let mut slots = tournament_draw_slots::table
            .filter(tournament_draw_slots::draw_id.eq_any(draw_ids))
            .order_by(tournament_draw_slots::seq.asc())
            .select(DrawSlot::as_select())
            .load::<DrawSlot>(conn)?
            .into_iter()
            .into_group_map_by(|slot| slot.draw_id.clone());

        draws
            .into_iter()
            .map(|draw| {
                Ok(DrawRepr {
                    status: draw.status()?,
                    slots: slots.remove(&draw.id).unwrap_or_default(),
                    draw,
                })
            })
            .collect()
    }
}
