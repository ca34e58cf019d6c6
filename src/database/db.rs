//! Database operations for the review store
//!
//! Handles SQLite database initialization, CRUD operations for lessons and questions,
//! and per-student review state for spaced repetition.

use super::error::{Result, StoreError};
use super::store::ProgressStore;
use crate::models::{Lesson, Question, QuestionFormat, ReviewState};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use tracing::{debug, info};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS lessons (
        name TEXT PRIMARY KEY
    );

    CREATE TABLE IF NOT EXISTS questions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        lesson_name TEXT NOT NULL,
        prompt TEXT NOT NULL,
        format TEXT NOT NULL,
        FOREIGN KEY (lesson_name) REFERENCES lessons(name),
        UNIQUE(lesson_name, prompt)
    );

    CREATE TABLE IF NOT EXISTS review_state (
        student_id TEXT NOT NULL,
        question_id INTEGER NOT NULL,
        interval_days REAL NOT NULL DEFAULT 1.0,
        ease_factor REAL NOT NULL DEFAULT 2.5,
        last_reviewed_at INTEGER NOT NULL,
        next_review_at INTEGER NOT NULL,
        PRIMARY KEY (student_id, question_id),
        FOREIGN KEY (question_id) REFERENCES questions(id) ON DELETE CASCADE
    );

    CREATE INDEX IF NOT EXISTS idx_review_state_due
        ON review_state(student_id, next_review_at);

    CREATE TABLE IF NOT EXISTS app_state (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
";

/// Opens (or creates) the database at `path` and makes sure the schema exists.
pub fn open_database(path: impl AsRef<Path>) -> Result<Connection> {
    let conn = Connection::open(path)?;
    init_schema(&conn)?;
    Ok(conn)
}

/// Creates tables for lessons, questions, review state and app state.
/// Sets the current date to now if not already initialized.
pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;

    conn.execute(
        "INSERT OR IGNORE INTO app_state (key, value) VALUES ('current_date', ?1)",
        params![Utc::now().timestamp().to_string()],
    )?;

    Ok(())
}

/// Retrieves the simulated current date
pub fn get_current_date(conn: &Connection) -> Result<DateTime<Utc>> {
    let value: String = conn.query_row(
        "SELECT value FROM app_state WHERE key = 'current_date'",
        [],
        |row| row.get(0),
    )?;

    let secs = value
        .parse::<i64>()
        .map_err(|_| StoreError::InvalidCurrentDate(value.clone()))?;
    DateTime::from_timestamp(secs, 0).ok_or(StoreError::InvalidTimestamp(secs))
}

/// Advances the current date by 24 hours (for exercising spaced repetition)
pub fn advance_day(conn: &Connection) -> Result<DateTime<Utc>> {
    let next_day = get_current_date(conn)? + Duration::days(1);

    conn.execute(
        "UPDATE app_state SET value = ?1 WHERE key = 'current_date'",
        params![next_day.timestamp().to_string()],
    )?;

    debug!(date = %next_day, "Advanced current date");
    Ok(next_day)
}

/// Creates a new lesson
pub fn new_lesson(name: &str, conn: &Connection) -> Result<()> {
    conn.execute("INSERT INTO lessons (name) VALUES (?1)", params![name])?;
    info!(lesson = name, "Lesson created");
    Ok(())
}

pub fn lesson_exists(name: &str, conn: &Connection) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM lessons WHERE name = ?1",
            params![name],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Adds a question to a lesson and returns its id.
///
/// A question with the same prompt already in the lesson keeps its id and
/// takes the new format.
pub fn add_question(
    lesson_name: &str,
    prompt: &str,
    format: &QuestionFormat,
    conn: &Connection,
) -> Result<i64> {
    if !lesson_exists(lesson_name, conn)? {
        return Err(StoreError::LessonNotFound(lesson_name.to_string()));
    }

    let format_json = serde_json::to_string(format)?;
    conn.execute(
        "INSERT INTO questions (lesson_name, prompt, format) VALUES (?1, ?2, ?3)
         ON CONFLICT(lesson_name, prompt) DO UPDATE SET format = excluded.format",
        params![lesson_name, prompt, format_json],
    )?;

    let question_id: i64 = conn.query_row(
        "SELECT id FROM questions WHERE lesson_name = ?1 AND prompt = ?2",
        params![lesson_name, prompt],
        |row| row.get(0),
    )?;

    Ok(question_id)
}

/// Stores a whole lesson, creating it if needed. Returns the stored copy with ids.
pub fn save_lesson(lesson: &Lesson, conn: &Connection) -> Result<Lesson> {
    if !lesson_exists(&lesson.name, conn)? {
        new_lesson(&lesson.name, conn)?;
    }

    let mut questions = Vec::with_capacity(lesson.questions.len());
    for question in &lesson.questions {
        let id = add_question(&lesson.name, &question.prompt, &question.format, conn)?;
        questions.push(Question {
            id: Some(id),
            ..question.clone()
        });
    }

    Ok(Lesson {
        name: lesson.name.clone(),
        questions,
    })
}

fn question_from_row(row: &Row<'_>) -> rusqlite::Result<(i64, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn build_question(id: i64, prompt: String, format_json: &str) -> Result<Question> {
    Ok(Question {
        id: Some(id),
        prompt,
        format: serde_json::from_str(format_json)?,
    })
}

pub fn get_question(question_id: i64, conn: &Connection) -> Result<Question> {
    let (id, prompt, format) = conn
        .query_row(
            "SELECT id, prompt, format FROM questions WHERE id = ?1",
            params![question_id],
            question_from_row,
        )
        .optional()?
        .ok_or(StoreError::QuestionNotFound(question_id))?;

    build_question(id, prompt, &format)
}

/// Retrieves all questions of a lesson, in insertion order
pub fn get_questions_for_lesson(lesson_name: &str, conn: &Connection) -> Result<Vec<Question>> {
    let mut stmt = conn
        .prepare("SELECT id, prompt, format FROM questions WHERE lesson_name = ?1 ORDER BY id")?;

    let rows = stmt
        .query_map(params![lesson_name], question_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(|(id, prompt, format)| build_question(id, prompt, &format))
        .collect()
}

/// Retrieves all lesson names
pub fn get_all_lessons(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM lessons ORDER BY name")?;
    let lessons = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(lessons)
}

pub fn load_lesson(name: &str, conn: &Connection) -> Result<Lesson> {
    if !lesson_exists(name, conn)? {
        return Err(StoreError::LessonNotFound(name.to_string()));
    }

    Ok(Lesson {
        name: name.to_string(),
        questions: get_questions_for_lesson(name, conn)?,
    })
}

fn to_millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or(StoreError::InvalidTimestamp(millis))
}

type StateRow = (f64, f64, i64, i64);

fn state_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<StateRow> {
    Ok((
        row.get(offset)?,
        row.get(offset + 1)?,
        row.get(offset + 2)?,
        row.get(offset + 3)?,
    ))
}

fn build_state((interval_days, ease_factor, last, next): StateRow) -> Result<ReviewState> {
    Ok(ReviewState {
        interval_days,
        ease_factor,
        last_reviewed_at: from_millis(last)?,
        next_review_at: from_millis(next)?,
    })
}

pub fn load_review_state(
    student_id: &str,
    question_id: i64,
    conn: &Connection,
) -> Result<Option<ReviewState>> {
    let row = conn
        .query_row(
            "SELECT interval_days, ease_factor, last_reviewed_at, next_review_at
             FROM review_state WHERE student_id = ?1 AND question_id = ?2",
            params![student_id, question_id],
            |row| state_from_row(row, 0),
        )
        .optional()?;

    row.map(build_state).transpose()
}

/// Inserts or replaces the review state after an attempt
pub fn save_review_state(
    student_id: &str,
    question_id: i64,
    state: &ReviewState,
    conn: &Connection,
) -> Result<()> {
    conn.execute(
        "INSERT INTO review_state
            (student_id, question_id, interval_days, ease_factor, last_reviewed_at, next_review_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(student_id, question_id) DO UPDATE SET
            interval_days = excluded.interval_days,
            ease_factor = excluded.ease_factor,
            last_reviewed_at = excluded.last_reviewed_at,
            next_review_at = excluded.next_review_at",
        params![
            student_id,
            question_id,
            state.interval_days,
            state.ease_factor,
            to_millis(state.last_reviewed_at),
            to_millis(state.next_review_at),
        ],
    )?;

    debug!(
        student = student_id,
        question = question_id,
        interval_days = state.interval_days,
        ease_factor = state.ease_factor,
        next_review_at = %state.next_review_at,
        "Saved review state"
    );
    Ok(())
}

/// Review states due on or before `now`, ordered by due date (oldest first)
pub fn get_due_states(
    student_id: &str,
    now: DateTime<Utc>,
    conn: &Connection,
) -> Result<Vec<(i64, ReviewState)>> {
    let mut stmt = conn.prepare(
        "SELECT question_id, interval_days, ease_factor, last_reviewed_at, next_review_at
         FROM review_state
         WHERE student_id = ?1 AND next_review_at <= ?2
         ORDER BY next_review_at ASC, question_id ASC",
    )?;

    let rows = stmt
        .query_map(params![student_id, to_millis(now)], |row| {
            Ok((row.get::<_, i64>(0)?, state_from_row(row, 1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(|(id, state)| Ok((id, build_state(state)?)))
        .collect()
}

/// Retrieves questions of a lesson the student should review now
///
/// Returns questions never attempted (first) and questions whose
/// next_review_at <= now, ordered by next_review_at (oldest first).
pub fn get_due_for_lesson(
    student_id: &str,
    lesson_name: &str,
    now: DateTime<Utc>,
    conn: &Connection,
) -> Result<Vec<(Question, Option<ReviewState>)>> {
    let mut stmt = conn.prepare(
        "SELECT q.id, q.prompt, q.format,
                r.interval_days, r.ease_factor, r.last_reviewed_at, r.next_review_at
         FROM questions q
         LEFT JOIN review_state r ON r.question_id = q.id AND r.student_id = ?1
         WHERE q.lesson_name = ?2 AND (r.next_review_at IS NULL OR r.next_review_at <= ?3)
         ORDER BY r.next_review_at IS NOT NULL, r.next_review_at ASC, q.id ASC",
    )?;

    let rows = stmt
        .query_map(params![student_id, lesson_name, to_millis(now)], |row| {
            let state = match row.get::<_, Option<f64>>(3)? {
                Some(_) => Some(state_from_row(row, 3)?),
                None => None,
            };
            Ok((question_from_row(row)?, state))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(|((id, prompt, format), state)| {
            Ok((
                build_question(id, prompt, &format)?,
                state.map(build_state).transpose()?,
            ))
        })
        .collect()
}

/// SQLite-backed progress store
pub struct SqliteProgressStore {
    conn: Connection,
}

impl SqliteProgressStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            conn: open_database(path)?,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl ProgressStore for SqliteProgressStore {
    fn load_state(&self, student_id: &str, question_id: i64) -> Result<Option<ReviewState>> {
        load_review_state(student_id, question_id, &self.conn)
    }

    fn save_state(
        &mut self,
        student_id: &str,
        question_id: i64,
        state: &ReviewState,
    ) -> Result<()> {
        save_review_state(student_id, question_id, state, &self.conn)
    }

    fn due_states(&self, student_id: &str, now: DateTime<Utc>) -> Result<Vec<(i64, ReviewState)>> {
        get_due_states(student_id, now, &self.conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::scheduler::compute_next_review;
    use chrono::TimeZone;

    fn store_with_lesson() -> (SqliteProgressStore, Vec<i64>) {
        let store = SqliteProgressStore::open_in_memory().unwrap();
        new_lesson("Greetings", store.connection()).unwrap();

        let ids = ["hello", "goodbye", "thank you"]
            .iter()
            .map(|word| {
                add_question(
                    "Greetings",
                    &format!("Translate '{}'", word),
                    &QuestionFormat::FillInBlank {
                        accepted: vec![word.to_string()],
                    },
                    store.connection(),
                )
                .unwrap()
            })
            .collect();

        (store, ids)
    }

    fn state(next: DateTime<Utc>) -> ReviewState {
        ReviewState {
            interval_days: 1.0,
            ease_factor: 2.5,
            last_reviewed_at: next - Duration::days(1),
            next_review_at: next,
        }
    }

    #[test]
    fn test_add_question_same_prompt_keeps_id() {
        let (store, ids) = store_with_lesson();
        let again = add_question(
            "Greetings",
            "Translate 'hello'",
            &QuestionFormat::Speaking {
                prompt_audio_url: None,
            },
            store.connection(),
        )
        .unwrap();

        assert_eq!(again, ids[0]);
        assert_eq!(
            get_questions_for_lesson("Greetings", store.connection())
                .unwrap()
                .len(),
            3
        );
        assert_eq!(
            get_question(ids[0], store.connection()).unwrap().format,
            QuestionFormat::Speaking {
                prompt_audio_url: None
            }
        );
    }

    #[test]
    fn test_save_lesson_twice_stores_edited_format() {
        let store = SqliteProgressStore::open_in_memory().unwrap();
        let version = |accepted: &str| Lesson {
            name: "Verbs".to_string(),
            questions: vec![Question::new(
                "She ___ to school.",
                QuestionFormat::FillInBlank {
                    accepted: vec![accepted.to_string()],
                },
            )],
        };

        let first = save_lesson(&version("walk"), store.connection()).unwrap();
        let second = save_lesson(&version("walks"), store.connection()).unwrap();
        assert_eq!(first.questions[0].id, second.questions[0].id);

        let loaded = load_lesson("Verbs", store.connection()).unwrap();
        assert_eq!(loaded, second);
        assert_eq!(
            loaded.questions[0].format,
            QuestionFormat::FillInBlank {
                accepted: vec!["walks".to_string()]
            }
        );
    }

    #[test]
    fn test_corrupt_current_date_is_an_error() {
        let store = SqliteProgressStore::open_in_memory().unwrap();
        store
            .connection()
            .execute(
                "UPDATE app_state SET value = 'yesterday' WHERE key = 'current_date'",
                [],
            )
            .unwrap();

        assert!(matches!(
            get_current_date(store.connection()),
            Err(StoreError::InvalidCurrentDate(v)) if v == "yesterday"
        ));
    }

    #[test]
    fn test_add_question_unknown_lesson() {
        let store = SqliteProgressStore::open_in_memory().unwrap();
        let result = add_question(
            "Missing",
            "prompt",
            &QuestionFormat::Speaking {
                prompt_audio_url: None,
            },
            store.connection(),
        );
        assert!(matches!(result, Err(StoreError::LessonNotFound(_))));
    }

    #[test]
    fn test_get_question_roundtrips_format() {
        let (store, ids) = store_with_lesson();
        let question = get_question(ids[1], store.connection()).unwrap();
        assert_eq!(question.id, Some(ids[1]));
        assert_eq!(question.prompt, "Translate 'goodbye'");
        assert_eq!(
            question.format,
            QuestionFormat::FillInBlank {
                accepted: vec!["goodbye".to_string()]
            }
        );

        assert!(matches!(
            get_question(9999, store.connection()),
            Err(StoreError::QuestionNotFound(9999))
        ));
    }

    #[test]
    fn test_save_and_load_state() {
        let (mut store, ids) = store_with_lesson();
        assert!(store.load_state("anna", ids[0]).unwrap().is_none());

        let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let review = compute_next_review(None, true, now);
        let saved = ReviewState::from_review(&review, now);
        store.save_state("anna", ids[0], &saved).unwrap();

        let loaded = store.load_state("anna", ids[0]).unwrap().unwrap();
        assert_eq!(loaded, saved);
        assert_eq!(
            loaded.next_review_at,
            Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap()
        );

        assert!(store.load_state("ben", ids[0]).unwrap().is_none());
    }

    #[test]
    fn test_save_state_last_write_wins() {
        let (mut store, ids) = store_with_lesson();
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        store.save_state("anna", ids[0], &state(t)).unwrap();
        let second = ReviewState {
            ease_factor: 1.95,
            ..state(t + Duration::days(4))
        };
        store.save_state("anna", ids[0], &second).unwrap();

        assert_eq!(store.load_state("anna", ids[0]).unwrap(), Some(second));
    }

    #[test]
    fn test_due_states() {
        let (mut store, ids) = store_with_lesson();
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();

        store.save_state("anna", ids[0], &state(now + Duration::hours(1))).unwrap();
        store.save_state("anna", ids[1], &state(now)).unwrap();
        store.save_state("anna", ids[2], &state(now - Duration::days(2))).unwrap();

        let due: Vec<i64> = store
            .due_states("anna", now)
            .unwrap()
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(due, vec![ids[2], ids[1]]);
    }

    #[test]
    fn test_due_for_lesson_includes_new_questions() {
        let (mut store, ids) = store_with_lesson();
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();

        store.save_state("anna", ids[0], &state(now - Duration::days(1))).unwrap();
        store.save_state("anna", ids[1], &state(now + Duration::days(1))).unwrap();

        let due = get_due_for_lesson("anna", "Greetings", now, store.connection()).unwrap();
        let due_ids: Vec<i64> = due.iter().filter_map(|(q, _)| q.id).collect();
        assert_eq!(due_ids, vec![ids[2], ids[0]]);
        assert!(due[0].1.is_none());
        assert!(due[1].1.is_some());

        let fresh = get_due_for_lesson("ben", "Greetings", now, store.connection()).unwrap();
        assert_eq!(fresh.len(), 3);
    }

    #[test]
    fn test_advance_day() {
        let store = SqliteProgressStore::open_in_memory().unwrap();
        let before = get_current_date(store.connection()).unwrap();
        let after = advance_day(store.connection()).unwrap();

        assert_eq!(after - before, Duration::days(1));
        assert_eq!(get_current_date(store.connection()).unwrap(), after);
    }

    #[test]
    fn test_save_and_load_lesson() {
        let store = SqliteProgressStore::open_in_memory().unwrap();
        let lesson = Lesson {
            name: "Colors".to_string(),
            questions: vec![Question::new(
                "Which one is red?",
                QuestionFormat::MultipleChoice {
                    options: vec!["rojo".to_string(), "azul".to_string()],
                    correct_index: 0,
                },
            )],
        };

        let saved = save_lesson(&lesson, store.connection()).unwrap();
        assert!(saved.questions[0].id.is_some());

        let loaded = load_lesson("Colors", store.connection()).unwrap();
        assert_eq!(loaded, saved);
        assert_eq!(get_all_lessons(store.connection()).unwrap(), vec!["Colors"]);
        assert!(matches!(
            load_lesson("Numbers", store.connection()),
            Err(StoreError::LessonNotFound(_))
        ));
    }

    #[test]
    fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.sqlite3");

        {
            let store = SqliteProgressStore::open(&path).unwrap();
            new_lesson("Persisted", store.connection()).unwrap();
        }

        let reopened = SqliteProgressStore::open(&path).unwrap();
        assert_eq!(
            get_all_lessons(reopened.connection()).unwrap(),
            vec!["Persisted"]
        );
    }
}
