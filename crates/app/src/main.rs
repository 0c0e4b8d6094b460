use std::fmt;
use std::io::{BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

use quiz_core::model::Category;
use services::{AppServices, Clock, GameService, NextQuestion, TaskScope, WatchVideo};
use tracing_subscriber::EnvFilter;

/// Pause before leaving the mode-change announcement.
const MODE_CHANGE_DELAY: Duration = Duration::from_millis(1500);

/// Cache warmed per category pick.
const PREFETCH_COUNT: usize = 3;

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
    eprintln!("  cargo run -p app -- play [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- seed [--db <sqlite_url>] [--max <n>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite:quizreel.sqlite3");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZREEL_DB_URL, QUIZREEL_QUESTION_API_URL,");
    eprintln!("  QUIZREEL_VIDEO_API_KEY, QUIZREEL_VIDEO_REGIONS");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Play,
    Seed,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "play" => Some(Self::Play),
            "seed" => Some(Self::Seed),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    seed_max: usize,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("QUIZREEL_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://quizreel.sqlite3".into(), normalize_sqlite_url);
        let mut seed_max = 50;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--max" => {
                    let value = require_value(args, "--max")?;
                    seed_max = value.parse().unwrap_or(50);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self { db_url, seed_max })
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

fn prompt(message: &str) -> std::io::Result<String> {
    print!("{message}");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

async fn play(services: &AppServices) -> Result<(), Box<dyn std::error::Error>> {
    let game: Arc<GameService> = services.game();
    let mut scope = TaskScope::new();

    println!("Welcome to QuizReel. Answer questions, bank rewards, watch shorts.");
    game.start()?;

    let category = loop {
        let raw = prompt("Pick a category (psychology / funfacts): ")?;
        match raw.parse::<Category>() {
            Ok(category) => break category,
            Err(err) => println!("{err}"),
        }
    };
    game.choose_category(category)?;
    {
        let game = Arc::clone(&game);
        scope.spawn(async move {
            game.prefetch_questions(category, PREFETCH_COUNT).await;
        });
    }

    loop {
        let question = match game.next_question().await? {
            NextQuestion::Ready(question) => question,
            NextQuestion::InFlight => continue,
        };

        let snapshot = game.snapshot();
        println!();
        println!(
            "[score {} | streak {} | rewards {}]",
            snapshot.score, snapshot.streak, snapshot.available_rewards
        );
        println!("{}", question.text());
        for option in question.options() {
            println!("  {}) {}", option.key, option.text);
        }

        let choice = prompt("Answer key, (v)ideo, or (q)uit: ")?;
        match choice.as_str() {
            "q" => break,
            "v" => match game.watch_video().await? {
                WatchVideo::Started(Some(video)) => {
                    println!("Now playing: {} ({})", video.title(), video.url());
                    let _ = prompt("(enter to continue) ")?;
                    game.finish_video()?;
                }
                WatchVideo::Started(None) => {
                    println!("No videos available right now.");
                    game.finish_video()?;
                }
                WatchVideo::NoRewards => {
                    println!("No rewards banked yet. Keep your streak going!");
                }
            },
            key => {
                let feedback = game.answer(key).await?;
                if feedback.outcome.correct {
                    println!("Correct! +{} points.", feedback.outcome.points);
                } else {
                    println!(
                        "Not quite. The answer was {}. {}",
                        feedback.correct_answer, feedback.explanation
                    );
                }

                if feedback.outcome.mode_changed {
                    println!("Tutorial complete! Scoring is live from here on.");
                    tokio::time::sleep(MODE_CHANGE_DELAY).await;
                    game.acknowledge_mode_change().await?;
                } else if feedback.outcome.show_reward_video {
                    if let Some(video) = game.tutorial_video().await {
                        println!("Reward: {} ({})", video.title(), video.url());
                        let _ = prompt("(enter to continue) ")?;
                    }
                    game.finish_video()?;
                }
            }
        }
    }

    scope.cancel_all();
    let snapshot = game.snapshot();
    println!(
        "Thanks for playing. Final score {}, best streak this run {}.",
        snapshot.score, snapshot.streak
    );
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Play,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Play,
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
    let parsed = Args::parse(&mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    // Open + migrate SQLite at startup. Keep this in the binary glue so
    // core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let services = AppServices::new_sqlite(&parsed.db_url, Clock::default_clock()).await?;

    match cmd {
        Command::Play => play(&services).await,
        Command::Seed => {
            let (fetched, total) = services.videos().seed_catalog(parsed.seed_max).await;
            println!("seed: fetched {fetched} shorts, catalog now holds {total}.");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
