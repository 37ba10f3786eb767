use diesel::{prelude::*, sqlite::Sqlite};
use serde::{Deserialize, Serialize};

use crate::{
    formats::FormatCode,
    schema::tournament_rounds,
    state::PersistenceFailure,
    tournaments::rounds::draws::drawalgs::ValidationError,
};

pub mod ballots;
pub mod draws;

#[derive(
    Serialize, Deserialize, Queryable, Selectable, Clone, Debug, PartialEq,
)]
#[diesel(check_for_backend(Sqlite))]
#[diesel(table_name = tournament_rounds)]
pub struct Round {
    pub id: String,
    pub tournament_id: String,
    pub seq: i64,
    pub name: String,
    pub motion: Option<String>,
    format: String,
    /// A JSON list of room labels.
    rooms: String,
    pub completed: bool,
}

impl Round {
    pub fn fetch(
        round_id: &str,
        conn: &mut SqliteConnection,
    ) -> Result<Option<Round>, PersistenceFailure> {
        Ok(tournament_rounds::table
            .find(round_id)
            .select(Round::as_select())
            .first::<Round>(conn)
            .optional()?)
    }

    pub fn format_code(&self) -> Result<FormatCode, ValidationError> {
        self.format.parse()
    }

    /// The room labels available to this round, in the order rooms should
    /// be filled.
    pub fn room_labels(&self) -> Result<Vec<String>, PersistenceFailure> {
        Ok(serde_json::from_str(&self.rooms)?)
    }
}
