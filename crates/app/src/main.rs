use std::fmt;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

use quiz_core::model::{HistoryRecord, OptionKey};
use services::{
    Clock, HistoryService, QuizLoopService, QuizSession, SessionError, StaticCatalog, TickOutcome,
};
use storage::repository::{Storage, StorageError};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- run     [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- history [--db <sqlite_url>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:quiz.sqlite3");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Run,
    History,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "run" => Some(Self::Run),
            "history" => Some(Self::History),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("QUIZ_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://quiz.sqlite3".into(), normalize_sqlite_url);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self { db_url })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn print_question(session: &QuizSession) {
    if let Some(question) = session.current_question() {
        let progress = session.progress();
        println!(
            "\nQuestion {} of {} ({}s):",
            progress.current + 1,
            progress.total,
            question.time_limit_secs()
        );
        println!("{}", question.prompt());
        for option in question.options() {
            println!("  {}  {}", option.key(), option.text());
        }
    }
}

fn report_finish(record: Option<&HistoryRecord>, persistence_error: Option<&StorageError>) {
    if let Some(record) = record {
        println!(
            "\nQuiz finished: {}/{} correct, credit {} earned in {}s.",
            record.score(),
            record.total(),
            record.credit(),
            record.duration_secs()
        );
    }
    if let Some(err) = persistence_error {
        eprintln!("Results were shown but could not be saved: {err}");
    }
}

async fn run_quiz(storage: &Storage) -> Result<(), Box<dyn std::error::Error>> {
    let service = QuizLoopService::new(
        Clock::default_clock(),
        Arc::new(StaticCatalog::sample()),
        Arc::clone(&storage.history),
    );
    let mut session = service.start_session().await?;

    println!("Answer with the option letter, or q to quit.");
    print_question(&session);

    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // A tokio interval yields its first tick immediately; consume it so the
    // countdown starts a full second after the question is shown.
    interval.tick().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    // One task drives both the countdown and the answers, so ticks and
    // manual submissions never interleave mid-transition.
    while !session.is_finished() {
        tokio::select! {
            _ = interval.tick() => {
                let result = service.tick(&mut session).await?;
                match result.outcome {
                    TickOutcome::Counting { remaining_secs } => {
                        print!("\r{remaining_secs:>2}s ");
                        std::io::stdout().flush()?;
                    }
                    TickOutcome::Expired(outcome) => {
                        println!("\nTime is up.");
                        if outcome.is_finished {
                            report_finish(result.record.as_ref(), result.persistence_error.as_ref());
                        } else {
                            print_question(&session);
                            interval.reset();
                        }
                    }
                    TickOutcome::Ignored => {}
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                if input.eq_ignore_ascii_case("q") {
                    session.abandon();
                    println!("Quiz abandoned; nothing was saved.");
                    break;
                }
                match input.parse::<OptionKey>() {
                    Ok(key) => match service.answer_current(&mut session, Some(key)).await {
                        Ok(result) => {
                            if result.outcome.is_finished {
                                report_finish(result.record.as_ref(), result.persistence_error.as_ref());
                            } else {
                                print_question(&session);
                                interval.reset();
                            }
                        }
                        Err(SessionError::UnknownOption { key }) => {
                            println!("Option {key} is not on this question.");
                        }
                        Err(err) => return Err(err.into()),
                    },
                    Err(_) => println!("Please answer with a single letter."),
                }
            }
        }
    }

    print_history(storage).await
}

async fn print_history(storage: &Storage) -> Result<(), Box<dyn std::error::Error>> {
    let history = HistoryService::new(Arc::clone(&storage.history));
    let items = history.list_history().await?;
    if items.is_empty() {
        println!("No quiz history yet.");
        return Ok(());
    }

    println!("\nHistory (newest first):");
    for item in &items {
        println!(
            "  {}  {}/{} correct  credit {}  {}s",
            item.recorded_at.format("%Y-%m-%d %H:%M"),
            item.score,
            item.total,
            item.credit,
            item.duration_secs
        );
    }
    println!("Total credit: {}", history.total_credit().await?);
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // Default behavior: run a quiz when no subcommand is provided.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Run,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Run,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let args = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so the
    // library crates stay free of filesystem concerns.
    prepare_sqlite_file(&args.db_url)?;
    let storage = Storage::sqlite(&args.db_url).await?;
    tracing::debug!(db_url = %args.db_url, "storage ready");

    match cmd {
        Command::Run => run_quiz(&storage).await,
        Command::History => print_history(&storage).await,
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
