//! Command line access to draw generation.
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::{Parser, Subcommand};
use serde::Serialize;
use tabdraw::{
    config::Config,
    formats::FormatSpec,
    state::make_pool,
    tournaments::rounds::draws::{
        DrawRepr, DrawStatus,
        drawalgs::DrawMethod,
        manage::{DrawError, GenerateRequest, service::DrawService},
    },
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "drawctl", about = "Generate and manage debate draws")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// Overrides the configured database.
    #[arg(long)]
    database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create or upgrade the database schema.
    Migrate,
    /// Generate (or regenerate) the draw for a round.
    Generate {
        #[arg(long)]
        round: String,
        #[arg(long)]
        method: Option<DrawMethod>,
        /// Seed the draw, to reproduce an earlier one.
        #[arg(long)]
        seed: Option<u64>,
        /// Allow teams from the same institution to meet.
        #[arg(long)]
        allow_clashes: bool,
        #[arg(long)]
        balance_experience: bool,
        /// A JSON object mapping team ids to their strength.
        #[arg(long)]
        strengths: Option<PathBuf>,
        /// Take over from a generation which is still running.
        #[arg(long)]
        force: bool,
    },
    /// Release the pending draw of a round.
    Accept {
        #[arg(long)]
        round: String,
    },
    /// Complete a round once all its ballots are confirmed.
    Complete {
        #[arg(long)]
        round: String,
    },
    /// Restore the draw of an earlier generation.
    Rollback {
        #[arg(long)]
        generation: String,
        #[arg(long)]
        force: bool,
    },
    /// List the generations of a tournament, newest first.
    History {
        #[arg(long)]
        tournament: String,
    },
    /// Print the current draw of a round.
    Show {
        #[arg(long)]
        round: String,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Persistence(#[from] tabdraw::state::PersistenceFailure),
    #[error(transparent)]
    Draw(#[from] DrawError),
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A room as printed by `show`, with the full name of each position.
#[derive(Serialize)]
struct RoomView<'a> {
    id: &'a str,
    room: &'a str,
    status: DrawStatus,
    judge_id: Option<&'a str>,
    teams: Vec<SlotView<'a>>,
}

#[derive(Serialize)]
struct SlotView<'a> {
    role: &'a str,
    title: Option<&'a str>,
    team_id: Option<&'a str>,
    swing: Option<&'a str>,
}

impl<'a> RoomView<'a> {
    fn new(repr: &'a DrawRepr, format: &'a FormatSpec) -> Self {
        Self {
            id: &repr.draw.id,
            room: &repr.draw.room,
            status: repr.status(),
            judge_id: repr.draw.judge_id.as_deref(),
            teams: repr
                .slots
                .iter()
                .map(|slot| SlotView {
                    role: &slot.role,
                    title: format.role_title(&slot.role),
                    team_id: slot.team_id.as_deref(),
                    swing: slot.swing_name.as_deref(),
                })
                .collect(),
        }
    }
}

fn print(value: &impl Serialize) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_strengths(path: &Path) -> Result<HashMap<String, f64>, CliError> {
    let text =
        std::fs::read_to_string(path).map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(serde_json::from_str(&text)?)
}

async fn run(cli: Cli, mut config: Config) -> Result<(), CliError> {
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }

    if let Command::Migrate = cli.command {
        make_pool(&config.database_url, Some(1))?;
        tracing::info!(
            database = %config.database_url,
            "database is up to date"
        );
        return Ok(());
    }

    let service = DrawService::from_config(&config)?;
    match cli.command {
        Command::Migrate => {}
        Command::Generate {
            round,
            method,
            seed,
            allow_clashes,
            balance_experience,
            strengths,
            force,
        } => {
            let mut options = config.draw_options();
            if let Some(method) = method {
                options.method = method;
            }
            if allow_clashes {
                options.avoid_institution_clashes = false;
            }
            options.balance_experience |= balance_experience;
            options.strengths =
                strengths.as_deref().map(read_strengths).transpose()?;

            let summary = service
                .generate(GenerateRequest {
                    seed,
                    override_prior: force,
                    ..GenerateRequest::new(round, options)
                })
                .await?;
            print(&summary)?;
        }
        Command::Accept { round } => {
            let accepted = service.accept(round).await?;
            print(&serde_json::json!({ "accepted": accepted }))?;
        }
        Command::Complete { round } => {
            let completed = service.complete(round).await?;
            print(&serde_json::json!({ "completed": completed }))?;
        }
        Command::Rollback { generation, force } => {
            print(&service.rollback(generation, force).await?)?;
        }
        Command::History { tournament } => {
            print(&service.history(tournament).await?)?;
        }
        Command::Show { round } => {
            let format = service
                .round(round.clone())
                .await?
                .format_code()
                .map_err(DrawError::from)?
                .spec();
            let draws = service.draws(round).await?;
            print(
                &draws
                    .iter()
                    .map(|repr| RoomView::new(repr, &format))
                    .collect::<Vec<_>>(),
            )?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
