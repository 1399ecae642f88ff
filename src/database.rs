mod attempts;
mod catalog;
mod seed;
mod users;

pub use attempts::*;
pub use catalog::*;
pub use users::*;

use std::fs;
use std::path::{Path, PathBuf};

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

const DATABASE_NAME: &str = "coursebox.sqlite3";

/// Identifier recorded for attempts made without a session
pub const ANONYMOUS_USER_ID: u32 = 0;

pub fn get_db_path() -> PathBuf {
    use directories::ProjectDirs;

    let proj_dirs =
        ProjectDirs::from("", "", "coursebox").expect("Unable to find user directory");
    let data_dir = proj_dirs.data_local_dir();

    fs::create_dir_all(data_dir).expect("Failed to create local data dir");

    data_dir.join(DATABASE_NAME)
}

pub async fn init_db(db_path: impl AsRef<Path>) -> sqlx::Result<SqlitePool> {
    let db_url = format!("sqlite://{}?mode=rwc", db_path.as_ref().display()); // rwc = read/write/create
    let db_pool = SqlitePoolOptions::new()
        .max_connections(4)
        .min_connections(0)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                // Per-connection settings, every pooled connection needs them
                for pragma_sql in &[
                    "PRAGMA foreign_keys = ON;",
                    "PRAGMA busy_timeout = 2000;", // 2 seconds timeout for lock contention
                ] {
                    sqlx::query(pragma_sql).execute(&mut *conn).await?;
                }
                Ok(())
            })
        })
        .connect(&db_url)
        .await?;

    // Database-wide settings, these cannot be run inside a transaction
    for pragma_sql in &["PRAGMA journal_mode = WAL;", "PRAGMA synchronous = NORMAL;"] {
        sqlx::query(pragma_sql).execute(&db_pool).await?;
    }

    let mut tx = db_pool.begin().await?;

    for sql in &[
        r"
        CREATE TABLE IF NOT EXISTS users (
            id            INTEGER PRIMARY KEY,
            username      TEXT    NOT NULL UNIQUE,
            password      TEXT    NOT NULL
        );",
        r"
        CREATE TABLE IF NOT EXISTS sessions (
            token         TEXT    PRIMARY KEY,
            user_id       INTEGER NOT NULL,
            created_time  TEXT    NOT NULL,
            FOREIGN KEY (user_id)  REFERENCES users (id)
        );",
        r"
        CREATE TABLE IF NOT EXISTS courses (
            id               INTEGER PRIMARY KEY,
            title            TEXT    NOT NULL,
            description      TEXT    NOT NULL,
            long_description TEXT,
            category         TEXT    NOT NULL,
            duration         TEXT    NOT NULL,
            level            TEXT    NOT NULL,
            image_path       TEXT    NOT NULL,
            materials_path   TEXT,
            is_popular       INTEGER NOT NULL DEFAULT 0
        );",
        r"
        CREATE TABLE IF NOT EXISTS modules (
            id            INTEGER PRIMARY KEY,
            course_id     INTEGER NOT NULL,
            position      INTEGER NOT NULL,
            title         TEXT    NOT NULL,
            FOREIGN KEY (course_id)  REFERENCES courses (id)
        );",
        r"
        CREATE TABLE IF NOT EXISTS lessons (
            id            INTEGER PRIMARY KEY,
            module_id     INTEGER NOT NULL,
            position      INTEGER NOT NULL,
            title         TEXT    NOT NULL,
            content       TEXT    NOT NULL,
            FOREIGN KEY (module_id)  REFERENCES modules (id)
        );",
        r"
        CREATE TABLE IF NOT EXISTS tasks (
            id            INTEGER PRIMARY KEY,
            lesson_id     INTEGER NOT NULL,
            title         TEXT    NOT NULL,
            description   TEXT    NOT NULL,
            starter_code  TEXT    NOT NULL,
            checker_code  TEXT,
            FOREIGN KEY (lesson_id)  REFERENCES lessons (id)
        );",
        r"
        CREATE TABLE IF NOT EXISTS favorite_courses (
            user_id       INTEGER NOT NULL,
            course_id     INTEGER NOT NULL,
            PRIMARY KEY (user_id, course_id),
            FOREIGN KEY (user_id)    REFERENCES users (id),
            FOREIGN KEY (course_id)  REFERENCES courses (id)
        );",
        r"
        CREATE TABLE IF NOT EXISTS lesson_completions (
            user_id        INTEGER NOT NULL,
            lesson_id      INTEGER NOT NULL,
            completed_time TEXT    NOT NULL,
            PRIMARY KEY (user_id, lesson_id),
            FOREIGN KEY (user_id)    REFERENCES users (id),
            FOREIGN KEY (lesson_id)  REFERENCES lessons (id)
        );",
        r"
        CREATE TABLE IF NOT EXISTS attempts (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            task_id       INTEGER,
            user_id       INTEGER NOT NULL,
            code          TEXT    NOT NULL,
            is_passed     INTEGER NOT NULL,
            output        TEXT    NOT NULL,
            created_time  TEXT    NOT NULL,
            FOREIGN KEY (task_id)  REFERENCES tasks (id),
            FOREIGN KEY (user_id)  REFERENCES users (id)
        );",
        "CREATE INDEX IF NOT EXISTS idx_attempts_task_user ON attempts(task_id, user_id);",
        r"
        CREATE TRIGGER IF NOT EXISTS attempts_no_update BEFORE UPDATE ON attempts
        BEGIN
            SELECT RAISE(ABORT, 'attempts are append-only');
        END;",
        r"
        CREATE TRIGGER IF NOT EXISTS attempts_no_delete BEFORE DELETE ON attempts
        BEGIN
            SELECT RAISE(ABORT, 'attempts are append-only');
        END;",
        "INSERT OR IGNORE INTO users (id, username, password) VALUES (0, 'anonymous', '');",
    ] {
        sqlx::query(sql).execute(&mut *tx).await?;
    }

    let (course_count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM courses")
        .fetch_one(&mut *tx)
        .await?;
    if course_count == 0 {
        seed::seed_catalog(&mut tx).await?;
        log::info!("Seeded course catalog");
    }

    tx.commit().await?;

    log::info!("Initialized database at {}", db_path.as_ref().display());

    Ok(db_pool)
}

pub fn remove_db(db_path: impl AsRef<Path>) {
    // Remove WAL and SHM files (ignore errors as they might not exist)
    let wal_path = format!("{}-wal", db_path.as_ref().display());
    let shm_path = format!("{}-shm", db_path.as_ref().display());
    let _ = fs::remove_file(wal_path);
    let _ = fs::remove_file(shm_path);

    if let Err(e) = std::fs::remove_file(&db_path) {
        log::warn!(
            "Unable to remove database at {}: {e}",
            db_path.as_ref().display()
        );
    } else {
        log::info!("Removed database at {}", db_path.as_ref().display());
    }
}
