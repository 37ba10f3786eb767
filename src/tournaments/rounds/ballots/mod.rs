//! Ballots are entered and confirmed elsewhere; the draw only needs to know
//! how far each room's ballots have progressed.

use std::{fmt, str::FromStr};

use chrono::NaiveDateTime;
use diesel::{prelude::*, sqlite::Sqlite};
use serde::{Deserialize, Serialize};

use crate::{
    schema::{tournament_ballots, tournament_draws},
    state::PersistenceFailure,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BallotStatus {
    Draft,
    Submitted,
    Confirmed,
}

impl BallotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BallotStatus::Draft => "draft",
            BallotStatus::Submitted => "submitted",
            BallotStatus::Confirmed => "confirmed",
        }
    }
}

impl fmt::Display for BallotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BallotStatus {
    type Err = PersistenceFailure;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(BallotStatus::Draft),
            "submitted" => Ok(BallotStatus::Submitted),
            "confirmed" => Ok(BallotStatus::Confirmed),
            other => Err(PersistenceFailure::InvalidColumn {
                column: "tournament_ballots.status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Queryable, Selectable, Clone, Debug)]
#[diesel(check_for_backend(Sqlite))]
#[diesel(table_name = tournament_ballots)]
pub struct Ballot {
    pub id: String,
    pub draw_id: String,
    pub judge_id: Option<String>,
    status: String,
    pub submitted_at: NaiveDateTime,
}

impl Ballot {
    pub fn status(&self) -> Result<BallotStatus, PersistenceFailure> {
        self.status.parse()
    }

    /// All ballots submitted for any room of the given round.
    pub fn of_round(
        round_id: &str,
        conn: &mut SqliteConnection,
    ) -> Result<Vec<Ballot>, PersistenceFailure> {
        Ok(tournament_ballots::table
            .filter(
                tournament_ballots::draw_id.eq_any(
                    tournament_draws::table
                        .filter(tournament_draws::round_id.eq(round_id))
                        .select(tournament_draws::id),
                ),
            )
            .select(Ballot::as_select())
            .load::<Ballot>(conn)?)
    }
}
