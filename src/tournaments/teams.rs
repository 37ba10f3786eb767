use diesel::{prelude::*, sqlite::Sqlite};
use serde::{Deserialize, Serialize};

use crate::{schema::tournament_teams, state::PersistenceFailure};

/// The institution recorded against synthetic swing teams.
pub const SWING_INSTITUTION: &str = "Swing";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Team {
    pub id: String,
    pub tournament_id: String,
    pub name: String,
    pub institution: Option<String>,
    pub speakers: Vec<String>,
    pub number: i64,
}

#[derive(Queryable, Selectable)]
#[diesel(table_name = tournament_teams)]
#[diesel(check_for_backend(Sqlite))]
struct TeamRow {
    id: String,
    tournament_id: String,
    name: String,
    institution: Option<String>,
    speakers: String,
    number: i64,
}

impl TryFrom<TeamRow> for Team {
    type Error = PersistenceFailure;

    fn try_from(row: TeamRow) -> Result<Self, Self::Error> {
        Ok(Team {
            id: row.id,
            tournament_id: row.tournament_id,
            name: row.name,
            institution: row.institution,
            speakers: serde_json::from_str(&row.speakers)?,
            number: row.number,
        })
    }
}

impl Team {
    /// Swing teams are placeholders created by the draw engine. They carry
    /// the swing institution marker and have no speakers.
    pub fn is_swing(&self) -> bool {
        self.institution.as_deref() == Some(SWING_INSTITUTION)
            && self.speakers.is_empty()
            && self.id.starts_with("swing-")
    }

    /// The normalised institution name used for clash detection, if the team
    /// has one.
    pub fn institution_key(&self) -> Option<String> {
        if self.is_swing() {
            return None;
        }
        self.institution
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_lowercase)
    }

    #[tracing::instrument(skip(conn))]
    pub fn of_tournament(
        tournament_id: &str,
        conn: &mut SqliteConnection,
    ) -> Result<Vec<Team>, PersistenceFailure> {
        tournament_teams::table
            .filter(tournament_teams::tournament_id.eq(tournament_id))
            .order_by(tournament_teams::number.asc())
            .select(TeamRow::as_select())
            .load::<TeamRow>(conn)?
            .into_iter()
            .map(Team::try_from)
            .collect()
    }
}
