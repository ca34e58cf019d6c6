use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use speakwell_review::database::db;
use speakwell_review::export::json::{export_json_to_path, import_json};
use speakwell_review::models::scheduler::compute_next_review_with;
use speakwell_review::{
    Answer, Config, EasePolicy, Lesson, ProgressStore, Question, QuestionFormat, ReviewState,
    SqliteProgressStore,
};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Spaced-repetition review scheduling for SpeakWell lessons
#[derive(Parser)]
#[command(name = "speakwell-review")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// SQLite database path (overrides SPEAKWELL_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Ease factor policy: observed or sm2 (overrides SPEAKWELL_EASE_POLICY)
    #[arg(long, global = true)]
    policy: Option<EasePolicy>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a sample lesson
    Seed,

    /// List lessons with their question counts
    Lessons,

    /// Import a lesson from a JSON file
    Import { file: PathBuf },

    /// Export a lesson to a JSON file
    Export { lesson: String, file: PathBuf },

    /// List questions a student should review now
    Due {
        #[arg(long)]
        student: String,
        #[arg(long)]
        lesson: String,
    },

    /// Record an answer and schedule the next review
    Answer {
        #[arg(long)]
        student: String,
        #[arg(long)]
        question: i64,
        #[command(flatten)]
        response: ResponseArgs,
    },

    /// Show the stored review state for a student and question
    Show {
        #[arg(long)]
        student: String,
        #[arg(long)]
        question: i64,
    },

    /// Move the simulated current date forward by one day
    AdvanceDay,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct ResponseArgs {
    /// Mark the attempt as correct
    #[arg(long)]
    correct: bool,
    /// Mark the attempt as incorrect
    #[arg(long)]
    incorrect: bool,
    /// Chosen option index (multiple choice)
    #[arg(long)]
    choice: Option<usize>,
    /// Typed or transcribed answer
    #[arg(long)]
    text: Option<String>,
}

impl ResponseArgs {
    fn into_answer(self) -> Answer {
        if let Some(index) = self.choice {
            Answer::Choice(index)
        } else if let Some(text) = self.text {
            Answer::Text(text)
        } else {
            Answer::SelfAssessed(self.correct && !self.incorrect)
        }
    }
}

fn format_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M UTC").to_string()
}

fn sample_lesson() -> Lesson {
    Lesson {
        name: "Greetings".to_string(),
        questions: vec![
            Question::new(
                "How do you greet someone in the morning?",
                QuestionFormat::MultipleChoice {
                    options: vec![
                        "Good night".to_string(),
                        "Good morning".to_string(),
                        "See you".to_string(),
                    ],
                    correct_index: 1,
                },
            ),
            Question::new(
                "Nice to ___ you.",
                QuestionFormat::FillInBlank {
                    accepted: vec!["meet".to_string()],
                },
            ),
            Question::new(
                "Introduce yourself in two sentences",
                QuestionFormat::Speaking {
                    prompt_audio_url: None,
                },
            ),
        ],
    }
}

fn print_state(state: &ReviewState) {
    println!("  interval:      {:.2} days", state.interval_days);
    println!("  ease factor:   {:.2}", state.ease_factor);
    println!("  last reviewed: {}", format_time(state.last_reviewed_at));
    println!("  next review:   {}", format_time(state.next_review_at));
}

fn run(command: Commands, config: &Config) -> Result<()> {
    let mut store = SqliteProgressStore::open(&config.db_path)
        .with_context(|| format!("failed to open database {}", config.db_path.display()))?;

    match command {
        Commands::Seed => {
            let lesson = sample_lesson();
            if db::lesson_exists(&lesson.name, store.connection())? {
                println!("Lesson '{}' already exists", lesson.name);
                return Ok(());
            }
            let saved = db::save_lesson(&lesson, store.connection())?;
            println!(
                "Sample lesson '{}' created with {} questions",
                saved.name,
                saved.questions.len()
            );
        }
        Commands::Lessons => {
            for name in db::get_all_lessons(store.connection())? {
                let count = db::get_questions_for_lesson(&name, store.connection())?.len();
                println!("{} ({} questions)", name, count);
            }
        }
        Commands::Import { file } => {
            let lesson = import_json(&file)
                .with_context(|| format!("failed to import {}", file.display()))?;
            let saved = db::save_lesson(&lesson, store.connection())?;
            println!(
                "Imported lesson '{}' ({} questions)",
                saved.name,
                saved.questions.len()
            );
        }
        Commands::Export { lesson, file } => {
            let lesson = db::load_lesson(&lesson, store.connection())?;
            export_json_to_path(&lesson, &file)
                .with_context(|| format!("failed to export to {}", file.display()))?;
            println!("Lesson '{}' exported to {}", lesson.name, file.display());
        }
        Commands::Due { student, lesson } => {
            let now = db::get_current_date(store.connection())?;
            let due = db::get_due_for_lesson(&student, &lesson, now, store.connection())?;
            println!("{} question(s) due on {}", due.len(), format_time(now));
            for (question, state) in due {
                let status = match state {
                    Some(state) => format!("due {}", format_time(state.next_review_at)),
                    None => "new".to_string(),
                };
                println!(
                    "  [{}] {} ({}, {})",
                    question.id.unwrap_or_default(),
                    question.prompt,
                    question.format.name(),
                    status
                );
            }
        }
        Commands::Answer {
            student,
            question,
            response,
        } => {
            let now = db::get_current_date(store.connection())?;
            let item = db::get_question(question, store.connection())?;
            let answer = response.into_answer();
            if matches!(item.format, QuestionFormat::Speaking { .. })
                && !matches!(answer, Answer::SelfAssessed(_))
            {
                bail!("speaking questions must be marked with --correct or --incorrect");
            }

            let was_correct = item.grade(&answer);
            let current = store.load_state(&student, question)?;
            let params = current.as_ref().map(ReviewState::params);
            let review =
                compute_next_review_with(config.ease_policy, params.as_ref(), was_correct, now);
            let state = ReviewState::from_review(&review, now);
            store.save_state(&student, question, &state)?;

            info!(
                student = %student,
                question,
                was_correct,
                policy = %config.ease_policy,
                "Answer recorded"
            );
            println!("{}", if was_correct { "Correct" } else { "Incorrect" });
            print_state(&state);
        }
        Commands::Show { student, question } => match store.load_state(&student, question)? {
            Some(state) => {
                println!("Review state for '{}' on question {}:", student, question);
                print_state(&state);
            }
            None => println!("'{}' has not attempted question {} yet", student, question),
        },
        Commands::AdvanceDay => {
            let date = db::advance_day(store.connection())?;
            println!("Current date is now {}", format_time(date));
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::from_env()?.with_overrides(cli.db, cli.policy);
    info!(db = %config.db_path.display(), policy = %config.ease_policy, "Starting");

    run(cli.command, &config)
}
