//! A record of every draw generated for a round.
//!
//! Each generation stores the parameters it was made with (including the
//! random seed) and a snapshot of the rooms it produced, so that an earlier
//! draw can be restored exactly. At most one generation per round is
//! current: the one whose rooms are (or were last) in the draw tables.

use chrono::{NaiveDateTime, Utc};
use diesel::{prelude::*, sqlite::Sqlite};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    formats::FormatCode,
    schema::tournament_generations,
    state::PersistenceFailure,
    tournaments::rounds::draws::drawalgs::{DrawMethod, GeneratedDraw},
};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct GenerationParams {
    pub format: FormatCode,
    pub team_count: usize,
    pub judge_count: usize,
    pub room_count: usize,
    pub benched_count: usize,
    pub avoid_institution_clashes: bool,
    pub balance_experience: bool,
    pub seed: u64,
}

#[derive(Clone, Debug)]
pub struct NewGeneration {
    pub tournament_id: String,
    pub round_id: String,
    pub method: DrawMethod,
    pub params: GenerationParams,
    pub snapshot: GeneratedDraw,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct GenerationRecord {
    pub id: String,
    pub tournament_id: String,
    pub round_id: String,
    pub method: DrawMethod,
    pub params: GenerationParams,
    pub snapshot: GeneratedDraw,
    pub created_at: NaiveDateTime,
    pub is_current: bool,
}

#[derive(Queryable, Selectable)]
#[diesel(check_for_backend(Sqlite))]
#[diesel(table_name = tournament_generations)]
struct GenerationRow {
    id: String,
    tournament_id: String,
    round_id: String,
    method: String,
    params: String,
    snapshot: String,
    created_at: NaiveDateTime,
    is_current: bool,
}

impl TryFrom<GenerationRow> for GenerationRecord {
    type Error = PersistenceFailure;

    fn try_from(row: GenerationRow) -> Result<Self, Self::Error> {
        let method = row.method.parse::<DrawMethod>().map_err(|_| {
            PersistenceFailure::InvalidColumn {
                column: "tournament_generations.method",
                value: row.method.clone(),
            }
        })?;

        Ok(GenerationRecord {
            method,
            params: serde_json::from_str(&row.params)?,
            snapshot: serde_json::from_str(&row.snapshot)?,
            id: row.id,
            tournament_id: row.tournament_id,
            round_id: row.round_id,
            created_at: row.created_at,
            is_current: row.is_current,
        })
    }
}

/// Storage for generation history.
///
/// `record_generation` and `mark_current` must leave exactly one current
/// record for the round they touch.
pub trait GenerationHistoryStore {
    /// Stores a new generation as the round's current one and returns its
    /// id.
    fn record_generation(
        &mut self,
        generation: &NewGeneration,
    ) -> Result<String, PersistenceFailure>;

    /// Every generation of a tournament, newest first.
    fn list_for_tournament(
        &mut self,
        tournament_id: &str,
    ) -> Result<Vec<GenerationRecord>, PersistenceFailure>;

    fn generation(
        &mut self,
        id: &str,
    ) -> Result<Option<GenerationRecord>, PersistenceFailure>;

    /// Makes `id` the current generation of its round. Returns `false` if
    /// there is no such generation.
    fn mark_current(&mut self, id: &str) -> Result<bool, PersistenceFailure>;
}

/// Inserts `generation` and makes it current. Callers are responsible for
/// running this inside a transaction.
pub(crate) fn insert_generation(
    generation: &NewGeneration,
    conn: &mut SqliteConnection,
) -> Result<String, PersistenceFailure> {
    let id = Uuid::now_v7().to_string();
    let params = serde_json::to_string(&generation.params)?;
    let snapshot = serde_json::to_string(&generation.snapshot)?;

    diesel::update(
        tournament_generations::table
            .filter(tournament_generations::round_id.eq(&generation.round_id)),
    )
    .set(tournament_generations::is_current.eq(false))
    .execute(conn)?;

    diesel::insert_into(tournament_generations::table)
        .values((
            tournament_generations::id.eq(&id),
            tournament_generations::tournament_id.eq(&generation.tournament_id),
            tournament_generations::round_id.eq(&generation.round_id),
            tournament_generations::method.eq(generation.method.as_str()),
            tournament_generations::params.eq(params),
            tournament_generations::snapshot.eq(snapshot),
            tournament_generations::created_at.eq(Utc::now().naive_utc()),
            tournament_generations::is_current.eq(true),
        ))
        .execute(conn)?;

    Ok(id)
}

/// Makes `id` the only current generation of its round. Callers are
/// responsible for running this inside a transaction.
pub(crate) fn set_current(
    id: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, PersistenceFailure> {
    let round_id = match tournament_generations::table
        .find(id)
        .select(tournament_generations::round_id)
        .first::<String>(conn)
        .optional()?
    {
        Some(round_id) => round_id,
        None => return Ok(false),
    };

    diesel::update(
        tournament_generations::table
            .filter(tournament_generations::round_id.eq(&round_id)),
    )
    .set(tournament_generations::is_current.eq(false))
    .execute(conn)?;

    diesel::update(tournament_generations::table.find(id))
        .set(tournament_generations::is_current.eq(true))
        .execute(conn)?;

    Ok(true)
}

pub(crate) fn fetch_generation(
    id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<GenerationRecord>, PersistenceFailure> {
    tournament_generations::table
        .find(id)
        .select(GenerationRow::as_select())
        .first::<GenerationRow>(conn)
        .optional()?
        .map(GenerationRecord::try_from)
        .transpose()
}

pub(crate) fn list_generations(
    tournament_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<GenerationRecord>, PersistenceFailure> {
    tournament_generations::table
        .filter(tournament_generations::tournament_id.eq(tournament_id))
        .order_by((
            tournament_generations::created_at.desc(),
            tournament_generations::id.desc(),
        ))
        .select(GenerationRow::as_select())
        .load::<GenerationRow>(conn)?
        .into_iter()
        .map(GenerationRecord::try_from)
        .collect()
}
