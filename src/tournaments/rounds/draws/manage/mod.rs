//! Commands which change a round's draw: generating (and regenerating) it,
//! releasing it, completing the round and restoring an earlier generation.
//!
//! The commands are synchronous and generic over a [`DrawStore`]. They may
//! run for a while (draw generation is not free), so async callers should go
//! through [`service::DrawService`], which runs them on the blocking pool.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::Serialize;

use crate::{
    state::PersistenceFailure,
    tournaments::{
        rounds::{
            Round,
            draws::{
                DrawRepr,
                drawalgs::{DrawInput, DrawOptions, ValidationError, generate},
                history::{GenerationParams, GenerationRecord, NewGeneration},
                lifecycle::{
                    LifecycleViolation, check_accept, check_complete,
                    check_regenerate, check_rollback,
                },
                store::{
                    CommitOutcome, DrawCommit, DrawStore, GenerationChange,
                    LifecycleCheck, TicketOutcome,
                },
            },
        },
        teams::Team,
    },
};

pub mod service;

#[derive(Debug, thiserror::Error)]
pub enum DrawError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleViolation),
    #[error(transparent)]
    Persistence(#[from] PersistenceFailure),
    #[error("round `{0}` does not exist")]
    RoundNotFound(String),
    #[error("generation `{0}` does not exist")]
    GenerationNotFound(String),
    #[error("a draw is already being generated for this round")]
    AlreadyInProgress,
    #[error("draw generation was cancelled by a newer request")]
    TicketExpired,
}

impl DrawError {
    /// Whether trying the same command again might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DrawError::Persistence(_)
                | DrawError::AlreadyInProgress
                | DrawError::TicketExpired
        )
    }
}

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub round_id: String,
    pub options: DrawOptions,
    /// Seed for the draw's random number generator. A fresh seed is chosen
    /// (and recorded) if none is given.
    pub seed: Option<u64>,
    /// Supersede a generation which is already running for the round.
    pub override_prior: bool,
}

impl GenerateRequest {
    pub fn new(round_id: impl Into<String>, options: DrawOptions) -> Self {
        Self {
            round_id: round_id.into(),
            options,
            seed: None,
            override_prior: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationSummary {
    pub generation_id: String,
    pub tournament_id: String,
    pub round_id: String,
    pub draw_ids: Vec<String>,
    /// Teams left out because the round ran out of rooms.
    pub benched: Vec<Team>,
    pub seed: u64,
}

fn fetch_round<S: DrawStore>(
    store: &mut S,
    round_id: &str,
) -> Result<Round, DrawError> {
    store
        .round(round_id)?
        .ok_or_else(|| DrawError::RoundNotFound(round_id.to_string()))
}

/// Fails early if `check` already refuses the round. The check is repeated
/// when the change is written.
fn precheck<S: DrawStore>(
    store: &mut S,
    round_id: &str,
    check: LifecycleCheck<'_>,
) -> Result<(), DrawError> {
    let state = store
        .round_state(round_id)?
        .ok_or_else(|| DrawError::RoundNotFound(round_id.to_string()))?;
    Ok(check(&state)?)
}

fn acquire<S: DrawStore>(
    store: &mut S,
    round_id: &str,
    override_prior: bool,
) -> Result<String, DrawError> {
    match store.acquire_ticket(round_id, override_prior)? {
        TicketOutcome::Acquired(ticket) => Ok(ticket),
        TicketOutcome::AlreadyHeld => Err(DrawError::AlreadyInProgress),
    }
}

/// Runs `f` while holding `ticket`, releasing the ticket if `f` fails.
/// Committing releases the ticket itself.
fn with_ticket<S: DrawStore, T>(
    store: &mut S,
    ticket: &str,
    f: impl FnOnce(&mut S) -> Result<T, DrawError>,
) -> Result<T, DrawError> {
    let result = f(store);
    if let Err(e) = &result
        && let Err(release) = store.release_ticket(ticket, Some(&e.to_string()))
    {
        tracing::error!(%release, ticket, "could not release draw ticket");
    }
    result
}

fn committed(
    outcome: CommitOutcome,
) -> Result<(String, Vec<String>), DrawError> {
    match outcome {
        CommitOutcome::Committed {
            generation_id,
            draw_ids,
        } => Ok((generation_id, draw_ids)),
        CommitOutcome::TicketExpired => Err(DrawError::TicketExpired),
        CommitOutcome::Rejected(violation) => Err(violation.into()),
    }
}

/// Generates a new draw for a round, replacing its pending draw.
///
/// Refused once any room of the round has been released.
#[tracing::instrument(skip_all, fields(round = %request.round_id))]
pub fn regenerate<S: DrawStore>(
    store: &mut S,
    request: &GenerateRequest,
) -> Result<GenerationSummary, DrawError> {
    let round = fetch_round(store, &request.round_id)?;
    let format = round.format_code()?;
    let rooms = round.room_labels()?;
    precheck(store, &round.id, &check_regenerate)?;

    let ticket = acquire(store, &round.id, request.override_prior)?;
    with_ticket(store, &ticket, |store| {
        let teams = store.teams(&round.tournament_id)?;
        let judges = store.judges(&round.tournament_id)?;

        let seed = request.seed.unwrap_or_else(|| rand::rng().random());
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let draw = generate(
            format,
            DrawInput {
                teams: &teams,
                judges: &judges,
                rooms: &rooms,
                options: &request.options,
            },
            &mut rng,
        )?;

        let generation = NewGeneration {
            tournament_id: round.tournament_id.clone(),
            round_id: round.id.clone(),
            method: request.options.method,
            params: GenerationParams {
                format,
                team_count: teams.len(),
                judge_count: judges.len(),
                room_count: draw.rooms.len(),
                benched_count: draw.benched.len(),
                avoid_institution_clashes: request
                    .options
                    .avoid_institution_clashes,
                balance_experience: request.options.balance_experience,
                seed,
            },
            snapshot: draw,
        };

        let (generation_id, draw_ids) = committed(store.commit_draws(
            &ticket,
            DrawCommit {
                round: &round,
                generation: GenerationChange::Record(&generation),
                rooms: &generation.snapshot.rooms,
            },
            &check_regenerate,
        )?)?;
        tracing::info!(%generation_id, seed, "generated draw");

        Ok(GenerationSummary {
            generation_id,
            tournament_id: round.tournament_id.clone(),
            round_id: round.id.clone(),
            draw_ids,
            benched: generation.snapshot.benched,
            seed,
        })
    })
}

/// Restores the rooms of an earlier generation as the round's pending draw
/// and makes that generation current.
///
/// Refused once any room of the round has been completed.
#[tracing::instrument(skip(store))]
pub fn rollback<S: DrawStore>(
    store: &mut S,
    generation_id: &str,
    override_prior: bool,
) -> Result<GenerationSummary, DrawError> {
    let record = store.generation(generation_id)?.ok_or_else(|| {
        DrawError::GenerationNotFound(generation_id.to_string())
    })?;
    let round = fetch_round(store, &record.round_id)?;
    precheck(store, &round.id, &check_rollback)?;

    let ticket = acquire(store, &round.id, override_prior)?;
    with_ticket(store, &ticket, |store| {
        let (generation_id, draw_ids) = committed(store.commit_draws(
            &ticket,
            DrawCommit {
                round: &round,
                generation: GenerationChange::Restore(&record.id),
                rooms: &record.snapshot.rooms,
            },
            &check_rollback,
        )?)?;
        tracing::info!(%generation_id, "restored draw");

        Ok(GenerationSummary {
            generation_id,
            tournament_id: round.tournament_id.clone(),
            round_id: round.id.clone(),
            draw_ids,
            benched: record.snapshot.benched.clone(),
            seed: record.params.seed,
        })
    })
}

/// Releases the round's pending draw. Returns the number of rooms released.
#[tracing::instrument(skip(store))]
pub fn accept<S: DrawStore>(
    store: &mut S,
    round_id: &str,
) -> Result<usize, DrawError> {
    fetch_round(store, round_id)?;
    Ok(store.accept_round(round_id, &check_accept)??)
}

/// Completes the round, once every room has a confirmed ballot.
#[tracing::instrument(skip(store))]
pub fn complete<S: DrawStore>(
    store: &mut S,
    round_id: &str,
) -> Result<usize, DrawError> {
    fetch_round(store, round_id)?;
    Ok(store.complete_round(round_id, &check_complete)??)
}

pub fn history<S: DrawStore>(
    store: &mut S,
    tournament_id: &str,
) -> Result<Vec<GenerationRecord>, DrawError> {
    Ok(store.list_for_tournament(tournament_id)?)
}

pub fn draws<S: DrawStore>(
    store: &mut S,
    round_id: &str,
) -> Result<Vec<DrawRepr>, DrawError> {
    fetch_round(store, round_id)?;
    Ok(store.draws_of_round(round_id)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test::fixtures::{
            TOURNAMENT, insert_ballot, insert_judge, insert_round,
            insert_teams, memory_pool,
        },
        tournaments::rounds::{
            ballots::BallotStatus,
            draws::{
                DrawStatus, history::GenerationHistoryStore,
                store::SqliteStore,
            },
        },
    };

    fn request(round_id: &str, seed: u64) -> GenerateRequest {
        GenerateRequest {
            seed: Some(seed),
            ..GenerateRequest::new(round_id, DrawOptions::default())
        }
    }

    fn team_ids(draws: &[DrawRepr]) -> Vec<Vec<Option<String>>> {
        draws
            .iter()
            .map(|repr| {
                repr.slots
                    .iter()
                    .map(|slot| {
                        slot.team_id.clone().or(slot.swing_name.clone())
                    })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn regenerating_replaces_the_pending_draw() {
        let pool = memory_pool();
        let mut conn = pool.get().unwrap();
        insert_teams(&mut conn, 10);
        insert_judge(&mut conn, "Judge 1");
        let round_id = insert_round(&mut conn, "bp", &["A", "B", "C"]);
        let mut store = SqliteStore::new(&mut conn);

        let first = regenerate(&mut store, &request(&round_id, 1)).unwrap();
        let second = regenerate(&mut store, &request(&round_id, 2)).unwrap();
        assert_ne!(first.generation_id, second.generation_id);

        let draws = draws(&mut store, &round_id).unwrap();
        assert_eq!(
            draws.iter().map(|d| d.draw.id.clone()).collect::<Vec<_>>(),
            second.draw_ids
        );
        assert!(draws.iter().all(|d| d.status() == DrawStatus::Pending));

        let history = history(&mut store, TOURNAMENT).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, second.generation_id);
        assert!(history[0].is_current);
        assert!(!history[1].is_current);
    }

    #[test]
    fn the_same_seed_draws_the_same_rooms() {
        let pool = memory_pool();
        let mut conn = pool.get().unwrap();
        insert_teams(&mut conn, 12);
        let round_id = insert_round(&mut conn, "australs", &["A", "B", "C"]);
        let mut store = SqliteStore::new(&mut conn);

        regenerate(&mut store, &request(&round_id, 5)).unwrap();
        let a = team_ids(&draws(&mut store, &round_id).unwrap());
        regenerate(&mut store, &request(&round_id, 5)).unwrap();
        let b = team_ids(&draws(&mut store, &round_id).unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn teams_beyond_the_room_supply_are_reported() {
        let pool = memory_pool();
        let mut conn = pool.get().unwrap();
        insert_teams(&mut conn, 5);
        let round_id = insert_round(&mut conn, "bp", &["A"]);
        let mut store = SqliteStore::new(&mut conn);

        let summary = regenerate(&mut store, &request(&round_id, 3)).unwrap();
        assert_eq!(summary.draw_ids.len(), 1);
        assert_eq!(summary.benched.len(), 1);
    }

    #[test]
    fn a_released_draw_cannot_be_regenerated() {
        let pool = memory_pool();
        let mut conn = pool.get().unwrap();
        insert_teams(&mut conn, 4);
        let round_id = insert_round(&mut conn, "bp", &["A"]);
        let mut store = SqliteStore::new(&mut conn);

        regenerate(&mut store, &request(&round_id, 1)).unwrap();
        assert_eq!(accept(&mut store, &round_id).unwrap(), 1);
        assert!(matches!(
            regenerate(&mut store, &request(&round_id, 2)),
            Err(DrawError::Lifecycle(LifecycleViolation::AlreadyAccepted))
        ));
        assert!(matches!(
            accept(&mut store, &round_id),
            Err(DrawError::Lifecycle(LifecycleViolation::NothingToAccept))
        ));
    }

    #[test]
    fn a_running_generation_blocks_another() {
        let pool = memory_pool();
        let mut conn = pool.get().unwrap();
        insert_teams(&mut conn, 4);
        let round_id = insert_round(&mut conn, "bp", &["A"]);
        let mut store = SqliteStore::new(&mut conn);

        acquire(&mut store, &round_id, false).unwrap();
        let err = regenerate(&mut store, &request(&round_id, 1)).unwrap_err();
        assert!(matches!(err, DrawError::AlreadyInProgress));
        assert!(err.is_retryable());

        let overriding = GenerateRequest {
            override_prior: true,
            ..request(&round_id, 1)
        };
        regenerate(&mut store, &overriding).unwrap();
        regenerate(&mut store, &request(&round_id, 2)).unwrap();
    }

    #[test]
    fn a_crashed_generation_is_cleared_by_one_override() {
        let pool = memory_pool();
        let mut conn = pool.get().unwrap();
        insert_teams(&mut conn, 4);
        let round_id = insert_round(&mut conn, "bp", &["A"]);
        let mut store = SqliteStore::new(&mut conn);

        // a ticket whose holder never comes back
        acquire(&mut store, &round_id, false).unwrap();
        let overriding = GenerateRequest {
            override_prior: true,
            ..request(&round_id, 1)
        };
        regenerate(&mut store, &overriding).unwrap();

        for seed in 2..4 {
            regenerate(&mut store, &request(&round_id, seed)).unwrap();
        }
        assert_eq!(store.list_for_tournament(TOURNAMENT).unwrap().len(), 3);
    }

    #[test]
    fn a_failed_generation_releases_its_ticket() {
        let pool = memory_pool();
        let mut conn = pool.get().unwrap();
        insert_teams(&mut conn, 1);
        let round_id = insert_round(&mut conn, "bp", &["A"]);
        let mut store = SqliteStore::new(&mut conn);

        let err = regenerate(&mut store, &request(&round_id, 1)).unwrap_err();
        assert!(matches!(
            err,
            DrawError::Validation(ValidationError::InsufficientTeams { .. })
        ));
        assert!(!err.is_retryable());
        // a second ticket can be taken without overriding
        acquire(&mut store, &round_id, false).unwrap();
    }

    #[test]
    fn unknown_rounds_and_generations_are_reported() {
        let pool = memory_pool();
        let mut conn = pool.get().unwrap();
        let mut store = SqliteStore::new(&mut conn);

        assert!(matches!(
            regenerate(&mut store, &request("missing", 1)),
            Err(DrawError::RoundNotFound(_))
        ));
        assert!(matches!(
            accept(&mut store, "missing"),
            Err(DrawError::RoundNotFound(_))
        ));
        assert!(matches!(
            rollback(&mut store, "missing", false),
            Err(DrawError::GenerationNotFound(_))
        ));
    }

    #[test]
    fn rollback_restores_the_exact_earlier_draw() {
        let pool = memory_pool();
        let mut conn = pool.get().unwrap();
        insert_teams(&mut conn, 9);
        insert_judge(&mut conn, "Judge 1");
        insert_judge(&mut conn, "Judge 2");
        let round_id = insert_round(&mut conn, "wsdc", &["A", "B", "C", "D"]);
        let mut store = SqliteStore::new(&mut conn);

        let first = regenerate(&mut store, &request(&round_id, 1)).unwrap();
        let original = draws(&mut store, &round_id).unwrap();
        regenerate(&mut store, &request(&round_id, 2)).unwrap();
        accept(&mut store, &round_id).unwrap();

        let restored = rollback(&mut store, &first.generation_id, false)
            .unwrap();
        assert_eq!(restored.generation_id, first.generation_id);
        assert_eq!(restored.seed, 1);

        let now = draws(&mut store, &round_id).unwrap();
        assert_eq!(team_ids(&now), team_ids(&original));
        assert_eq!(
            now.iter().map(|d| d.draw.judge_id.clone()).collect::<Vec<_>>(),
            original
                .iter()
                .map(|d| d.draw.judge_id.clone())
                .collect::<Vec<_>>()
        );
        assert!(now.iter().all(|d| d.status() == DrawStatus::Pending));

        let history = history(&mut store, TOURNAMENT).unwrap();
        let current = history
            .iter()
            .filter(|record| record.is_current)
            .map(|record| record.id.clone())
            .collect::<Vec<_>>();
        assert_eq!(current, vec![first.generation_id]);
    }

    #[test]
    fn completed_rounds_are_frozen() {
        let pool = memory_pool();
        let mut conn = pool.get().unwrap();
        insert_teams(&mut conn, 4);
        let round_id = insert_round(&mut conn, "ap", &["A", "B"]);
        let (first, draw_ids) = {
            let mut store = SqliteStore::new(&mut conn);
            let first = regenerate(&mut store, &request(&round_id, 1)).unwrap();
            accept(&mut store, &round_id).unwrap();
            let draw_ids = first.draw_ids.clone();
            (first, draw_ids)
        };

        insert_ballot(&mut conn, &draw_ids[0], BallotStatus::Confirmed);
        insert_ballot(&mut conn, &draw_ids[1], BallotStatus::Submitted);
        {
            let mut store = SqliteStore::new(&mut conn);
            assert!(matches!(
                complete(&mut store, &round_id),
                Err(DrawError::Lifecycle(
                    LifecycleViolation::UnconfirmedBallot { .. }
                ))
            ));
        }

        insert_ballot(&mut conn, &draw_ids[1], BallotStatus::Confirmed);
        let mut store = SqliteStore::new(&mut conn);
        assert_eq!(complete(&mut store, &round_id).unwrap(), 2);
        assert!(matches!(
            rollback(&mut store, &first.generation_id, false),
            Err(DrawError::Lifecycle(LifecycleViolation::RoundCompleted))
        ));
        assert!(matches!(
            regenerate(&mut store, &request(&round_id, 2)),
            Err(DrawError::Lifecycle(LifecycleViolation::RoundCompleted))
        ));
        assert!(
            draws(&mut store, &round_id)
                .unwrap()
                .iter()
                .all(|d| d.status() == DrawStatus::Completed)
        );
    }
}
