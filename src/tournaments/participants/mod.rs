use diesel::{prelude::*, sqlite::Sqlite};
use serde::{Deserialize, Serialize};

use crate::{schema::tournament_judges, state::PersistenceFailure};

#[derive(
    Queryable, Selectable, Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
)]
#[diesel(check_for_backend(Sqlite))]
#[diesel(table_name = tournament_judges)]
pub struct Judge {
    pub id: String,
    pub tournament_id: String,
    pub name: String,
    pub institution: Option<String>,
    pub number: i64,
}

impl Judge {
    /// Loads the judge pool of a tournament, in registration order.
    pub fn of_tournament(
        tournament_id: &str,
        conn: &mut SqliteConnection,
    ) -> Result<Vec<Judge>, PersistenceFailure> {
        Ok(tournament_judges::table
            .filter(tournament_judges::tournament_id.eq(tournament_id))
            .order_by(tournament_judges::number.asc())
            .select(Judge::as_select())
            .load::<Judge>(conn)?)
    }
}
