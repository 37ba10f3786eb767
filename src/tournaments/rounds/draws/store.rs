//! Persistence for draws.
//!
//! Operations which can be refused return nested results: the outer
//! `Result` carries storage failures, the inner value carries the refusal.
//! Every write happens inside a single immediate transaction, and lifecycle
//! checks are evaluated inside that same transaction.

use chrono::Utc;
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    schema::{
        tournament_draw_slots, tournament_draws, tournament_round_tickets,
        tournament_rounds,
    },
    state::PersistenceFailure,
    tournaments::{
        participants::Judge,
        rounds::{
            Round,
            ballots::Ballot,
            draws::{
                DrawRepr, DrawStatus,
                drawalgs::RoomAssignment,
                history::{
                    GenerationHistoryStore, GenerationRecord, NewGeneration,
                    fetch_generation, insert_generation, list_generations,
                    set_current,
                },
                lifecycle::{LifecycleViolation, RoundState},
            },
        },
        teams::Team,
    },
};

const DRAW_TICKET: &str = "draw";
const SUPERSEDED: &str = "superseded";

/// A lifecycle check, evaluated against the state of the round at the time
/// of the write.
pub type LifecycleCheck<'a> =
    &'a dyn Fn(&RoundState) -> Result<(), LifecycleViolation>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TicketOutcome {
    Acquired(String),
    /// Another draw is being generated for the round.
    AlreadyHeld,
}

#[derive(Debug, Clone, Copy)]
pub enum GenerationChange<'a> {
    /// Record a newly generated draw.
    Record(&'a NewGeneration),
    /// Make an existing generation current again.
    Restore(&'a str),
}

#[derive(Debug, Clone, Copy)]
pub struct DrawCommit<'a> {
    pub round: &'a Round,
    pub generation: GenerationChange<'a>,
    pub rooms: &'a [RoomAssignment],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed {
        generation_id: String,
        draw_ids: Vec<String>,
    },
    /// The ticket was overridden (or already released); nothing was
    /// written.
    TicketExpired,
    Rejected(LifecycleViolation),
}

pub trait DrawStore: GenerationHistoryStore {
    fn round(
        &mut self,
        round_id: &str,
    ) -> Result<Option<Round>, PersistenceFailure>;

    fn teams(
        &mut self,
        tournament_id: &str,
    ) -> Result<Vec<Team>, PersistenceFailure>;

    fn judges(
        &mut self,
        tournament_id: &str,
    ) -> Result<Vec<Judge>, PersistenceFailure>;

    fn draws_of_round(
        &mut self,
        round_id: &str,
    ) -> Result<Vec<DrawRepr>, PersistenceFailure>;

    fn round_state(
        &mut self,
        round_id: &str,
    ) -> Result<Option<RoundState>, PersistenceFailure>;

    /// Takes the round's draw ticket. Fails if an unreleased ticket exists,
    /// unless `override_prior` is set, in which case the earlier ticket is
    /// released as superseded and can no longer commit.
    fn acquire_ticket(
        &mut self,
        round_id: &str,
        override_prior: bool,
    ) -> Result<TicketOutcome, PersistenceFailure>;

    fn release_ticket(
        &mut self,
        ticket_id: &str,
        error: Option<&str>,
    ) -> Result<(), PersistenceFailure>;

    /// Replaces the round's draw with `commit.rooms`, as pending draws.
    /// Completed draws are never removed.
    fn commit_draws(
        &mut self,
        ticket_id: &str,
        commit: DrawCommit<'_>,
        check: LifecycleCheck<'_>,
    ) -> Result<CommitOutcome, PersistenceFailure>;

    /// Releases every pending draw of the round, after removing any draw
    /// which had been released before. Returns the number released.
    fn accept_round(
        &mut self,
        round_id: &str,
        check: LifecycleCheck<'_>,
    ) -> Result<Result<usize, LifecycleViolation>, PersistenceFailure>;

    /// Marks every draw of the round, and the round itself, completed.
    fn complete_round(
        &mut self,
        round_id: &str,
        check: LifecycleCheck<'_>,
    ) -> Result<Result<usize, LifecycleViolation>, PersistenceFailure>;
}

/// A [`DrawStore`] over a single SQLite connection.
pub struct SqliteStore<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> SqliteStore<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }
}

fn load_state(
    round_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<RoundState>, PersistenceFailure> {
    let Some(round) = Round::fetch(round_id, conn)? else {
        return Ok(None);
    };
    let draws = DrawRepr::of_round(round_id, conn)?;
    let ballots = Ballot::of_round(round_id, conn)?;
    RoundState::new(&round, &draws, &ballots).map(Some)
}

/// Like [`load_state`], but for use inside a write, where the round is
/// known to exist.
fn require_state(
    round_id: &str,
    conn: &mut SqliteConnection,
) -> Result<RoundState, PersistenceFailure> {
    load_state(round_id, conn)?
        .ok_or(PersistenceFailure::Database(diesel::result::Error::NotFound))
}

/// Removes the round's draws with one of the given statuses, together with
/// their slots. Returns the number of draws removed.
fn delete_draws(
    round_id: &str,
    statuses: &[DrawStatus],
    conn: &mut SqliteConnection,
) -> Result<usize, PersistenceFailure> {
    let statuses = statuses.iter().map(DrawStatus::as_str).collect::<Vec<_>>();
    let doomed = tournament_draws::table
        .filter(tournament_draws::round_id.eq(round_id))
        .filter(tournament_draws::status.eq_any(statuses))
        .select(tournament_draws::id)
        .load::<String>(conn)?;

    diesel::delete(
        tournament_draw_slots::table
            .filter(tournament_draw_slots::draw_id.eq_any(&doomed)),
    )
    .execute(conn)?;

    Ok(diesel::delete(
        tournament_draws::table.filter(tournament_draws::id.eq_any(&doomed)),
    )
    .execute(conn)?)
}

fn insert_draws(
    round: &Round,
    generation_id: &str,
    rooms: &[RoomAssignment],
    conn: &mut SqliteConnection,
) -> Result<Vec<String>, PersistenceFailure> {
    let created_at = Utc::now().naive_utc();
    let mut draws = Vec::new();
    let mut slots = Vec::new();
    let mut draw_ids = Vec::new();

    for (number, room) in rooms.iter().enumerate() {
        let draw_id = Uuid::now_v7().to_string();
        draws.push((
            tournament_draws::id.eq(draw_id.clone()),
            tournament_draws::tournament_id.eq(&round.tournament_id),
            tournament_draws::round_id.eq(&round.id),
            tournament_draws::room.eq(&room.room),
            tournament_draws::number.eq(number as i64),
            tournament_draws::judge_id
                .eq(room.judge.as_ref().map(|judge| judge.id.clone())),
            tournament_draws::status.eq(DrawStatus::Pending.as_str()),
            tournament_draws::generation_id.eq(Some(generation_id)),
            tournament_draws::created_at.eq(created_at),
        ));

        for (seq, (role, team)) in room.teams.iter().enumerate() {
            let (team_id, swing_name) = if team.is_swing() {
                (None, Some(team.name.clone()))
            } else {
                (Some(team.id.clone()), None)
            };
            slots.push((
                tournament_draw_slots::id.eq(Uuid::now_v7().to_string()),
                tournament_draw_slots::draw_id.eq(draw_id.clone()),
                tournament_draw_slots::seq.eq(seq as i64),
                tournament_draw_slots::role.eq(role.clone()),
                tournament_draw_slots::team_id.eq(team_id),
                tournament_draw_slots::swing_name.eq(swing_name),
            ));
        }

        draw_ids.push(draw_id);
    }

    if !draws.is_empty() {
        diesel::insert_into(tournament_draws::table)
            .values(&draws)
            .execute(conn)?;
        diesel::insert_into(tournament_draw_slots::table)
            .values(&slots)
            .execute(conn)?;
    }

    Ok(draw_ids)
}

/// A ticket may commit only while it is unreleased and no later ticket has
/// been issued for its round.
fn ticket_is_valid(
    ticket_id: &str,
    round_id: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, PersistenceFailure> {
    let ticket = tournament_round_tickets::table
        .find(ticket_id)
        .select((
            tournament_round_tickets::round_id,
            tournament_round_tickets::seq,
            tournament_round_tickets::released,
        ))
        .first::<(String, i64, bool)>(conn)
        .optional()?;

    let Some((ticket_round, seq, released)) = ticket else {
        return Ok(false);
    };
    if released || ticket_round != round_id {
        return Ok(false);
    }

    let newest = tournament_round_tickets::table
        .filter(tournament_round_tickets::round_id.eq(round_id))
        .filter(tournament_round_tickets::kind.eq(DRAW_TICKET))
        .select(diesel::dsl::max(tournament_round_tickets::seq))
        .get_result::<Option<i64>>(conn)?;

    Ok(newest == Some(seq))
}

/// Moves the round's draws with status `from` to `to`. Returns the number of
/// draws moved.
fn advance(
    round_id: &str,
    from: DrawStatus,
    to: DrawStatus,
    conn: &mut SqliteConnection,
) -> Result<Result<usize, LifecycleViolation>, PersistenceFailure> {
    if !from.can_transition_to(to) {
        return Ok(Err(LifecycleViolation::InvalidTransition { from, to }));
    }

    let moved = diesel::update(
        tournament_draws::table
            .filter(tournament_draws::round_id.eq(round_id))
            .filter(tournament_draws::status.eq(from.as_str())),
    )
    .set(tournament_draws::status.eq(to.as_str()))
    .execute(conn)?;
    Ok(Ok(moved))
}

fn mark_released(
    ticket_id: &str,
    error: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<(), PersistenceFailure> {
    diesel::update(tournament_round_tickets::table.find(ticket_id))
        .set((
            tournament_round_tickets::released.eq(true),
            tournament_round_tickets::error.eq(error),
        ))
        .execute(conn)?;
    Ok(())
}

impl GenerationHistoryStore for SqliteStore<'_> {
    #[tracing::instrument(skip_all, fields(round = %generation.round_id))]
    fn record_generation(
        &mut self,
        generation: &NewGeneration,
    ) -> Result<String, PersistenceFailure> {
        self.conn
            .immediate_transaction(|conn| insert_generation(generation, conn))
    }

    fn list_for_tournament(
        &mut self,
        tournament_id: &str,
    ) -> Result<Vec<GenerationRecord>, PersistenceFailure> {
        list_generations(tournament_id, self.conn)
    }

    fn generation(
        &mut self,
        id: &str,
    ) -> Result<Option<GenerationRecord>, PersistenceFailure> {
        fetch_generation(id, self.conn)
    }

    #[tracing::instrument(skip(self))]
    fn mark_current(&mut self, id: &str) -> Result<bool, PersistenceFailure> {
        self.conn.immediate_transaction(|conn| set_current(id, conn))
    }
}

impl DrawStore for SqliteStore<'_> {
    fn round(
        &mut self,
        round_id: &str,
    ) -> Result<Option<Round>, PersistenceFailure> {
        Round::fetch(round_id, self.conn)
    }

    fn teams(
        &mut self,
        tournament_id: &str,
    ) -> Result<Vec<Team>, PersistenceFailure> {
        Team::of_tournament(tournament_id, self.conn)
    }

    fn judges(
        &mut self,
        tournament_id: &str,
    ) -> Result<Vec<Judge>, PersistenceFailure> {
        Judge::of_tournament(tournament_id, self.conn)
    }

    fn draws_of_round(
        &mut self,
        round_id: &str,
    ) -> Result<Vec<DrawRepr>, PersistenceFailure> {
        DrawRepr::of_round(round_id, self.conn)
    }

    fn round_state(
        &mut self,
        round_id: &str,
    ) -> Result<Option<RoundState>, PersistenceFailure> {
        load_state(round_id, self.conn)
    }

    #[tracing::instrument(skip(self))]
    fn acquire_ticket(
        &mut self,
        round_id: &str,
        override_prior: bool,
    ) -> Result<TicketOutcome, PersistenceFailure> {
        self.conn.immediate_transaction(|conn| {
            let held = tournament_round_tickets::table
                .filter(tournament_round_tickets::round_id.eq(round_id))
                .filter(tournament_round_tickets::kind.eq(DRAW_TICKET))
                .filter(tournament_round_tickets::released.eq(false))
                .count()
                .get_result::<i64>(conn)?;
            if held > 0 && !override_prior {
                return Ok(TicketOutcome::AlreadyHeld);
            }
            if held > 0 {
                tracing::warn!(held, "overriding an unreleased draw ticket");
                let unreleased = tournament_round_tickets::table
                    .filter(tournament_round_tickets::round_id.eq(round_id))
                    .filter(tournament_round_tickets::kind.eq(DRAW_TICKET))
                    .filter(tournament_round_tickets::released.eq(false));
                diesel::update(unreleased)
                    .set((
                        tournament_round_tickets::released.eq(true),
                        tournament_round_tickets::error.eq(SUPERSEDED),
                    ))
                    .execute(conn)?;
            }

            let previous_seq = tournament_round_tickets::table
                .filter(tournament_round_tickets::round_id.eq(round_id))
                .filter(tournament_round_tickets::kind.eq(DRAW_TICKET))
                .select(diesel::dsl::max(tournament_round_tickets::seq))
                .get_result::<Option<i64>>(conn)?;

            let id = Uuid::now_v7().to_string();
            diesel::insert_into(tournament_round_tickets::table)
                .values((
                    tournament_round_tickets::id.eq(&id),
                    tournament_round_tickets::round_id.eq(round_id),
                    tournament_round_tickets::seq
                        .eq(previous_seq.map_or(0, |seq| seq + 1)),
                    tournament_round_tickets::kind.eq(DRAW_TICKET),
                    tournament_round_tickets::acquired
                        .eq(Utc::now().naive_utc()),
                    tournament_round_tickets::released.eq(false),
                    tournament_round_tickets::error.eq(None::<String>),
                ))
                .execute(conn)?;

            Ok(TicketOutcome::Acquired(id))
        })
    }

    fn release_ticket(
        &mut self,
        ticket_id: &str,
        error: Option<&str>,
    ) -> Result<(), PersistenceFailure> {
        mark_released(ticket_id, error, self.conn)
    }

    #[tracing::instrument(skip(self, commit, check), fields(
        round = %commit.round.id,
        rooms = commit.rooms.len(),
    ))]
    fn commit_draws(
        &mut self,
        ticket_id: &str,
        commit: DrawCommit<'_>,
        check: LifecycleCheck<'_>,
    ) -> Result<CommitOutcome, PersistenceFailure> {
        let round_id = commit.round.id.as_str();
        self.conn.immediate_transaction(|conn| {
            if !ticket_is_valid(ticket_id, round_id, conn)? {
                mark_released(ticket_id, Some("ticket expired"), conn)?;
                return Ok(CommitOutcome::TicketExpired);
            }
            mark_released(ticket_id, None, conn)?;

            let state = require_state(round_id, conn)?;
            if let Err(violation) = check(&state) {
                return Ok(CommitOutcome::Rejected(violation));
            }

            let removed = delete_draws(
                round_id,
                &[DrawStatus::Pending, DrawStatus::InProgress],
                conn,
            )?;

            let generation_id = match commit.generation {
                GenerationChange::Record(generation) => {
                    insert_generation(generation, conn)?
                }
                GenerationChange::Restore(id) => {
                    if !set_current(id, conn)? {
                        return Err(PersistenceFailure::Database(
                            diesel::result::Error::NotFound,
                        ));
                    }
                    id.to_string()
                }
            };

            let draw_ids =
                insert_draws(commit.round, &generation_id, commit.rooms, conn)?;
            tracing::debug!(
                removed,
                inserted = draw_ids.len(),
                "replaced draw"
            );

            Ok(CommitOutcome::Committed {
                generation_id,
                draw_ids,
            })
        })
    }

    #[tracing::instrument(skip(self, check))]
    fn accept_round(
        &mut self,
        round_id: &str,
        check: LifecycleCheck<'_>,
    ) -> Result<Result<usize, LifecycleViolation>, PersistenceFailure> {
        self.conn.immediate_transaction(|conn| {
            let state = require_state(round_id, conn)?;
            if let Err(violation) = check(&state) {
                return Ok(Err(violation));
            }

            let stale =
                delete_draws(round_id, &[DrawStatus::InProgress], conn)?;
            if stale > 0 {
                tracing::info!(stale, "removed previously released draws");
            }

            let accepted = match advance(
                round_id,
                DrawStatus::Pending,
                DrawStatus::InProgress,
                conn,
            )? {
                Ok(accepted) => accepted,
                Err(violation) => return Ok(Err(violation)),
            };

            Ok(Ok(accepted))
        })
    }

    #[tracing::instrument(skip(self, check))]
    fn complete_round(
        &mut self,
        round_id: &str,
        check: LifecycleCheck<'_>,
    ) -> Result<Result<usize, LifecycleViolation>, PersistenceFailure> {
        self.conn.immediate_transaction(|conn| {
            let state = require_state(round_id, conn)?;
            if let Err(violation) = check(&state) {
                return Ok(Err(violation));
            }

            let completed = match advance(
                round_id,
                DrawStatus::InProgress,
                DrawStatus::Completed,
                conn,
            )? {
                Ok(completed) => completed,
                Err(violation) => return Ok(Err(violation)),
            };

            diesel::update(tournament_rounds::table.find(round_id))
                .set(tournament_rounds::completed.eq(true))
                .execute(conn)?;

            Ok(Ok(completed))
        })
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;
    use crate::{
        formats::FormatCode,
        test::fixtures::{
            TOURNAMENT, insert_ballot, insert_judge, insert_round,
            insert_teams, memory_pool,
        },
        tournaments::rounds::{
            ballots::BallotStatus,
            draws::{
                drawalgs::{
                    DrawInput, DrawMethod, DrawOptions, GeneratedDraw, generate,
                },
                history::GenerationParams,
                lifecycle::{check_accept, check_complete, check_regenerate},
            },
        },
    };

    fn draw_for(
        store: &mut SqliteStore<'_>,
        round: &Round,
        seed: u64,
    ) -> (NewGeneration, GeneratedDraw) {
        let teams = store.teams(TOURNAMENT).unwrap();
        let judges = store.judges(TOURNAMENT).unwrap();
        let rooms = round.room_labels().unwrap();
        let options = DrawOptions::default();
        let draw = generate(
            round.format_code().unwrap(),
            DrawInput {
                teams: &teams,
                judges: &judges,
                rooms: &rooms,
                options: &options,
            },
            &mut ChaCha20Rng::seed_from_u64(seed),
        )
        .unwrap();

        let generation = NewGeneration {
            tournament_id: round.tournament_id.clone(),
            round_id: round.id.clone(),
            method: DrawMethod::Random,
            params: GenerationParams {
                format: FormatCode::BritishParliamentary,
                team_count: teams.len(),
                judge_count: judges.len(),
                room_count: draw.rooms.len(),
                benched_count: draw.benched.len(),
                avoid_institution_clashes: true,
                balance_experience: false,
                seed,
            },
            snapshot: draw.clone(),
        };
        (generation, draw)
    }

    fn acquired(outcome: TicketOutcome) -> String {
        match outcome {
            TicketOutcome::Acquired(id) => id,
            TicketOutcome::AlreadyHeld => panic!("ticket was already held"),
        }
    }

    fn commit(
        store: &mut SqliteStore<'_>,
        round: &Round,
        seed: u64,
    ) -> CommitOutcome {
        let ticket = acquired(store.acquire_ticket(&round.id, false).unwrap());
        let (generation, draw) = draw_for(store, round, seed);
        store
            .commit_draws(
                &ticket,
                DrawCommit {
                    round,
                    generation: GenerationChange::Record(&generation),
                    rooms: &draw.rooms,
                },
                &check_regenerate,
            )
            .unwrap()
    }

    #[test]
    fn committing_stores_draws_slots_and_history() {
        let pool = memory_pool();
        let mut conn = pool.get().unwrap();
        insert_teams(&mut conn, 7);
        insert_judge(&mut conn, "Judge");
        let round_id = insert_round(&mut conn, "bp", &["A", "B"]);
        let mut store = SqliteStore::new(&mut conn);
        let round = store.round(&round_id).unwrap().unwrap();

        let CommitOutcome::Committed {
            generation_id,
            draw_ids,
        } = commit(&mut store, &round, 1)
        else {
            panic!("draw was not committed");
        };

        let draws = store.draws_of_round(&round_id).unwrap();
        assert_eq!(
            draws.iter().map(|d| d.draw.id.clone()).collect::<Vec<_>>(),
            draw_ids
        );
        assert_eq!(draws[0].draw.room, "A");
        assert_eq!(draws[1].draw.room, "B");
        for repr in &draws {
            assert_eq!(repr.status(), DrawStatus::Pending);
            assert_eq!(repr.slots.len(), 4);
            assert_eq!(
                repr.draw.generation_id.as_deref(),
                Some(generation_id.as_str())
            );
        }
        let swings = draws[1]
            .slots
            .iter()
            .filter(|slot| slot.swing_name.is_some())
            .count();
        assert_eq!(swings, 1);

        let record = store.generation(&generation_id).unwrap().unwrap();
        assert!(record.is_current);
        assert_eq!(record.params.seed, 1);
    }

    #[test]
    fn a_second_ticket_is_refused_unless_overridden() {
        let pool = memory_pool();
        let mut conn = pool.get().unwrap();
        let round_id = insert_round(&mut conn, "bp", &["A"]);
        let mut store = SqliteStore::new(&mut conn);

        let first = acquired(store.acquire_ticket(&round_id, false).unwrap());
        assert_eq!(
            store.acquire_ticket(&round_id, false).unwrap(),
            TicketOutcome::AlreadyHeld
        );
        let second = acquired(store.acquire_ticket(&round_id, true).unwrap());
        assert_ne!(first, second);
        assert_eq!(
            store.acquire_ticket(&round_id, false).unwrap(),
            TicketOutcome::AlreadyHeld
        );

        store.release_ticket(&second, None).unwrap();
        acquired(store.acquire_ticket(&round_id, false).unwrap());
    }

    #[test]
    fn overriding_releases_the_superseded_ticket() {
        let pool = memory_pool();
        let mut conn = pool.get().unwrap();
        let round_id = insert_round(&mut conn, "bp", &["A"]);

        let (first, second) = {
            let mut store = SqliteStore::new(&mut conn);
            let first =
                acquired(store.acquire_ticket(&round_id, false).unwrap());
            let second =
                acquired(store.acquire_ticket(&round_id, true).unwrap());
            (first, second)
        };

        let released = tournament_round_tickets::table
            .find(&first)
            .select((
                tournament_round_tickets::released,
                tournament_round_tickets::error,
            ))
            .first::<(bool, Option<String>)>(&mut conn)
            .unwrap();
        assert_eq!(released, (true, Some(SUPERSEDED.to_string())));

        // only the newest ticket is left to release
        let mut store = SqliteStore::new(&mut conn);
        store.release_ticket(&second, None).unwrap();
        acquired(store.acquire_ticket(&round_id, false).unwrap());
    }

    #[test]
    fn recording_and_marking_keep_one_current_generation() {
        let pool = memory_pool();
        let mut conn = pool.get().unwrap();
        insert_teams(&mut conn, 8);
        let round_id = insert_round(&mut conn, "bp", &["A", "B"]);
        let mut store = SqliteStore::new(&mut conn);
        let round = store.round(&round_id).unwrap().unwrap();

        let ids = (0..3)
            .map(|seed| {
                let (generation, _) = draw_for(&mut store, &round, seed);
                store.record_generation(&generation).unwrap()
            })
            .collect::<Vec<_>>();

        let current = |store: &mut SqliteStore<'_>| {
            store
                .list_for_tournament(TOURNAMENT)
                .unwrap()
                .into_iter()
                .filter(|record| record.is_current)
                .map(|record| record.id)
                .collect::<Vec<_>>()
        };
        assert_eq!(current(&mut store), vec![ids[2].clone()]);

        assert!(store.mark_current(&ids[0]).unwrap());
        assert_eq!(current(&mut store), vec![ids[0].clone()]);

        assert!(!store.mark_current("missing").unwrap());
        assert_eq!(current(&mut store), vec![ids[0].clone()]);
    }

    #[test]
    fn an_overridden_ticket_cannot_commit() {
        let pool = memory_pool();
        let mut conn = pool.get().unwrap();
        insert_teams(&mut conn, 8);
        let round_id = insert_round(&mut conn, "bp", &["A", "B"]);
        let mut store = SqliteStore::new(&mut conn);
        let round = store.round(&round_id).unwrap().unwrap();

        let CommitOutcome::Committed { draw_ids, .. } =
            commit(&mut store, &round, 1)
        else {
            panic!("draw was not committed");
        };

        let stale = acquired(store.acquire_ticket(&round_id, false).unwrap());
        let fresh = acquired(store.acquire_ticket(&round_id, true).unwrap());
        let (generation, draw) = draw_for(&mut store, &round, 2);
        let outcome = store
            .commit_draws(
                &stale,
                DrawCommit {
                    round: &round,
                    generation: GenerationChange::Record(&generation),
                    rooms: &draw.rooms,
                },
                &check_regenerate,
            )
            .unwrap();
        assert_eq!(outcome, CommitOutcome::TicketExpired);

        // the earlier draw is untouched
        let ids = store
            .draws_of_round(&round_id)
            .unwrap()
            .into_iter()
            .map(|repr| repr.draw.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, draw_ids);
        assert_eq!(store.list_for_tournament(TOURNAMENT).unwrap().len(), 1);

        store.release_ticket(&fresh, None).unwrap();
    }

    #[test]
    fn a_rejected_commit_writes_nothing() {
        let pool = memory_pool();
        let mut conn = pool.get().unwrap();
        insert_teams(&mut conn, 4);
        let round_id = insert_round(&mut conn, "bp", &["A"]);
        let mut store = SqliteStore::new(&mut conn);
        let round = store.round(&round_id).unwrap().unwrap();

        assert!(matches!(
            commit(&mut store, &round, 1),
            CommitOutcome::Committed { .. }
        ));
        store.accept_round(&round_id, &check_accept).unwrap().unwrap();

        assert_eq!(
            commit(&mut store, &round, 2),
            CommitOutcome::Rejected(LifecycleViolation::AlreadyAccepted)
        );
        let draws = store.draws_of_round(&round_id).unwrap();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].status(), DrawStatus::InProgress);
        assert_eq!(store.list_for_tournament(TOURNAMENT).unwrap().len(), 1);
    }

    #[test]
    fn accepting_replaces_previously_released_draws() {
        let pool = memory_pool();
        let mut conn = pool.get().unwrap();
        insert_teams(&mut conn, 8);
        let round_id = insert_round(&mut conn, "bp", &["A", "B"]);
        {
            let mut store = SqliteStore::new(&mut conn);
            let round = store.round(&round_id).unwrap().unwrap();
            commit(&mut store, &round, 1);
        }

        // leave a released draw behind next to a pending one
        diesel::update(
            tournament_draws::table
                .filter(tournament_draws::round_id.eq(&round_id))
                .filter(tournament_draws::room.eq("A")),
        )
        .set(tournament_draws::status.eq(DrawStatus::InProgress.as_str()))
        .execute(&mut conn)
        .unwrap();

        let mut store = SqliteStore::new(&mut conn);
        assert_eq!(
            store.accept_round(&round_id, &check_accept).unwrap(),
            Ok(1)
        );
        let draws = store.draws_of_round(&round_id).unwrap();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].draw.room, "B");
        assert_eq!(draws[0].status(), DrawStatus::InProgress);

        assert_eq!(
            store.accept_round(&round_id, &check_accept).unwrap(),
            Err(LifecycleViolation::NothingToAccept)
        );
    }

    #[test]
    fn draws_never_move_backwards() {
        let pool = memory_pool();
        let mut conn = pool.get().unwrap();
        insert_teams(&mut conn, 4);
        let round_id = insert_round(&mut conn, "bp", &["A"]);
        {
            let mut store = SqliteStore::new(&mut conn);
            let round = store.round(&round_id).unwrap().unwrap();
            commit(&mut store, &round, 1);
            store.accept_round(&round_id, &check_accept).unwrap().unwrap();
        }

        assert_eq!(
            advance(
                &round_id,
                DrawStatus::InProgress,
                DrawStatus::Pending,
                &mut conn
            )
            .unwrap(),
            Err(LifecycleViolation::InvalidTransition {
                from: DrawStatus::InProgress,
                to: DrawStatus::Pending,
            })
        );
        let draws = DrawRepr::of_round(&round_id, &mut conn).unwrap();
        assert_eq!(draws[0].status(), DrawStatus::InProgress);
    }

    #[test]
    fn completing_marks_the_round_completed() {
        let pool = memory_pool();
        let mut conn = pool.get().unwrap();
        insert_teams(&mut conn, 4);
        let round_id = insert_round(&mut conn, "bp", &["A"]);
        let draw_id = {
            let mut store = SqliteStore::new(&mut conn);
            let round = store.round(&round_id).unwrap().unwrap();
            commit(&mut store, &round, 1);
            store.accept_round(&round_id, &check_accept).unwrap().unwrap();
            assert_eq!(
                store.complete_round(&round_id, &check_complete).unwrap(),
                Err(LifecycleViolation::UnconfirmedBallot {
                    room: "A".to_string()
                })
            );
            store.draws_of_round(&round_id).unwrap()[0].draw.id.clone()
        };

        insert_ballot(&mut conn, &draw_id, BallotStatus::Confirmed);
        let mut store = SqliteStore::new(&mut conn);
        assert_eq!(
            store.complete_round(&round_id, &check_complete).unwrap(),
            Ok(1)
        );
        let state = store.round_state(&round_id).unwrap().unwrap();
        assert!(state.completed);
        assert_eq!(state.rooms[0].status, DrawStatus::Completed);
        assert_eq!(state.rooms[0].ballots, vec![BallotStatus::Confirmed]);
    }
}
