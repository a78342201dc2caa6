//! drill: adaptive ACT math practice from the command line.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use drill_core::model::{PracticeContext, SettingsUpdate};
use services::{AppServices, Clock, ServiceError, authenticated};

mod commands;
mod db;

#[derive(Parser)]
#[command(name = "drill", version, about = "Spaced-repetition ACT math practice")]
struct Cli {
    /// SQLite database URL or file path
    #[arg(
        long,
        env = "DRILL_DB_URL",
        default_value = "sqlite://drill.sqlite3",
        global = true
    )]
    db: String,

    /// Learner id
    #[arg(long, env = "DRILL_USER", global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load or refresh the question catalog from a JSON file
    Seed {
        /// Path to a JSON array of questions
        #[arg(long)]
        catalog: PathBuf,
    },

    /// Start a session and print today's prioritized questions
    Session {
        /// Number of questions (defaults to the daily limit in settings)
        #[arg(long)]
        limit: Option<u32>,

        /// Fetch without starting a new session (keeps the trend baseline)
        #[arg(long)]
        resume: bool,
    },

    /// Submit an answer
    Answer {
        /// Question id
        #[arg(long)]
        question: String,

        /// Zero-based index of the selected option
        #[arg(long, allow_negative_numbers = true)]
        option: i64,

        /// Seconds spent on the question
        #[arg(long)]
        time: f64,

        /// practice_session, targeted_practice or mock_test
        #[arg(long, default_value = "practice_session")]
        context: PracticeContext,
    },

    /// Shuffled practice questions for one topic
    Targeted {
        #[arg(long)]
        topic: String,
    },

    /// Extra random questions after the daily session
    PracticeMore,

    /// Dashboard, heatmap, priority matrix and performance summary
    Stats,

    /// Show settings, or update them when any option is given
    Settings {
        /// Questions per session (5 to 50)
        #[arg(long)]
        daily_limit: Option<u32>,

        /// ms_student, hs_student, teacher or other
        #[arg(long)]
        role: Option<String>,

        /// Test date as YYYY-MM-DD
        #[arg(long)]
        test_date: Option<String>,
    },

    /// Delete all topic progress for the learner
    Reset,
}

async fn run(cli: Cli) -> anyhow::Result<Value> {
    let db_url = db::normalize_sqlite_url(&cli.db);
    db::prepare_sqlite_file(&db_url)?;
    let app = AppServices::new_sqlite(&db_url, Clock::default_clock()).await?;
    tracing::debug!(db = %db_url, "storage ready");
    let user = || authenticated(cli.user.as_deref());

    let value = match cli.command {
        Commands::Seed { catalog } => commands::seed(&app, &catalog).await?,
        Commands::Session { limit, resume } => {
            commands::session(&app, &user()?, limit, resume).await?
        }
        Commands::Answer {
            question,
            option,
            time,
            context,
        } => commands::answer(&app, &user()?, &question, option, time, context).await?,
        Commands::Targeted { topic } => commands::targeted(&app, &topic).await?,
        Commands::PracticeMore => commands::practice_more(&app).await?,
        Commands::Stats => commands::stats(&app, &user()?).await?,
        Commands::Settings {
            daily_limit,
            role,
            test_date,
        } => {
            let update = SettingsUpdate {
                daily_question_limit: daily_limit,
                role,
                test_date,
            };
            commands::settings(&app, &user()?, update).await?
        }
        Commands::Reset => commands::reset(&app, &user()?).await?,
    };
    Ok(value)
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("app=info,services=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(out) => {
                println!("{out}");
                ExitCode::SUCCESS
            }
            Err(err) => {
                eprintln!("error: {err}");
                ExitCode::from(2)
            }
        },
        Err(err) => match err.downcast_ref::<ServiceError>() {
            Some(service) => {
                match serde_json::to_string(&service.report()) {
                    Ok(out) => eprintln!("{out}"),
                    Err(_) => eprintln!("error: {service}"),
                }
                ExitCode::from(1)
            }
            None => {
                eprintln!("error: {err:#}");
                ExitCode::from(2)
            }
        },
    }
}
