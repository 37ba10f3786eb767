use std::time::Duration;

use tokio::{sync::broadcast, task::spawn_blocking};

use crate::{
    config::Config,
    msg::{Msg, MsgContents},
    state::{DbPool, PersistenceFailure, make_pool},
    tournaments::rounds::{
        Round,
        draws::{
            DrawRepr,
            history::GenerationRecord,
            manage::{self, DrawError, GenerateRequest, GenerationSummary},
            store::SqliteStore,
        },
    },
};

/// Runs draw commands against a connection pool.
///
/// Every command runs on the blocking thread pool. If a timeout is set and
/// a command exceeds it, the caller gets [`PersistenceFailure::Timeout`];
/// the command itself is not cancelled, but a generation which loses its
/// ticket in the meantime will not write anything.
#[derive(Clone)]
pub struct DrawService {
    pool: DbPool,
    timeout: Option<Duration>,
    tx: broadcast::Sender<Msg>,
}

impl DrawService {
    pub fn new(pool: DbPool, timeout: Option<Duration>) -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { pool, timeout, tx }
    }

    pub fn from_config(config: &Config) -> Result<Self, PersistenceFailure> {
        let pool = make_pool(&config.database_url, config.pool_size)?;
        Ok(Self::new(pool, config.store_timeout()))
    }

    /// Messages sent after each successful change to a draw.
    pub fn subscribe(&self) -> broadcast::Receiver<Msg> {
        self.tx.subscribe()
    }

    async fn run<T: Send + 'static>(
        &self,
        f: impl FnOnce(&mut SqliteStore<'_>) -> Result<T, DrawError>
        + Send
        + 'static,
    ) -> Result<T, DrawError> {
        let pool = self.pool.clone();
        let task = spawn_blocking(move || {
            let mut conn = pool.get().map_err(PersistenceFailure::from)?;
            let mut store = SqliteStore::new(&mut conn);
            f(&mut store)
        });

        let joined = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, task)
                .await
                .map_err(|_| PersistenceFailure::Timeout(limit))?,
            None => task.await,
        };
        joined.map_err(|e| PersistenceFailure::Task(e.to_string()))?
    }

    fn notify(&self, tournament_id: &str, round_id: &str, inner: MsgContents) {
        // nobody listening is fine
        let _ = self.tx.send(Msg {
            tournament_id: tournament_id.to_string(),
            round_id: round_id.to_string(),
            inner,
        });
    }

    pub async fn generate(
        &self,
        request: GenerateRequest,
    ) -> Result<GenerationSummary, DrawError> {
        let summary = self
            .run(move |store| manage::regenerate(store, &request))
            .await?;
        self.notify(
            &summary.tournament_id,
            &summary.round_id,
            MsgContents::DrawGenerated {
                generation_id: summary.generation_id.clone(),
            },
        );
        Ok(summary)
    }

    pub async fn rollback(
        &self,
        generation_id: String,
        override_prior: bool,
    ) -> Result<GenerationSummary, DrawError> {
        let summary = self
            .run(move |store| {
                manage::rollback(store, &generation_id, override_prior)
            })
            .await?;
        self.notify(
            &summary.tournament_id,
            &summary.round_id,
            MsgContents::DrawRolledBack {
                generation_id: summary.generation_id.clone(),
            },
        );
        Ok(summary)
    }

    pub async fn accept(&self, round_id: String) -> Result<usize, DrawError> {
        let (round, accepted) = self
            .run(move |store| {
                let round = manage::fetch_round(store, &round_id)?;
                let accepted = manage::accept(store, &round_id)?;
                Ok((round, accepted))
            })
            .await?;
        self.notify(&round.tournament_id, &round.id, MsgContents::DrawAccepted);
        Ok(accepted)
    }

    pub async fn complete(&self, round_id: String) -> Result<usize, DrawError> {
        let (round, completed) = self
            .run(move |store| {
                let round = manage::fetch_round(store, &round_id)?;
                let completed = manage::complete(store, &round_id)?;
                Ok((round, completed))
            })
            .await?;
        self.notify(
            &round.tournament_id,
            &round.id,
            MsgContents::RoundCompleted,
        );
        Ok(completed)
    }

    pub async fn history(
        &self,
        tournament_id: String,
    ) -> Result<Vec<GenerationRecord>, DrawError> {
        self.run(move |store| manage::history(store, &tournament_id))
            .await
    }

    pub async fn round(&self, round_id: String) -> Result<Round, DrawError> {
        self.run(move |store| manage::fetch_round(store, &round_id))
            .await
    }

    pub async fn draws(
        &self,
        round_id: String,
    ) -> Result<Vec<DrawRepr>, DrawError> {
        self.run(move |store| manage::draws(store, &round_id)).await
    }
}
