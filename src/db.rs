use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;

pub const DB_FILE_NAME: &str = "pacing.sqlite3";

const DEFAULT_REASONS: [&str; 5] = ["Holiday", "Teacher Workday", "Testing", "Weather", "Other"];

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS curriculum_libraries(
            id TEXT PRIMARY KEY,
            provider TEXT NOT NULL,
            class_code TEXT NOT NULL,
            class_name TEXT NOT NULL,
            UNIQUE(provider, class_code)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS curriculum_lessons(
            id TEXT PRIMARY KEY,
            library_id TEXT NOT NULL,
            sequence_index INTEGER NOT NULL,
            source_lesson_code TEXT,
            title TEXT NOT NULL,
            objective TEXT NOT NULL,
            FOREIGN KEY(library_id) REFERENCES curriculum_libraries(id),
            UNIQUE(library_id, sequence_index)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS standards(
            id TEXT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS curriculum_lesson_standards(
            lesson_id TEXT NOT NULL,
            standard_id TEXT NOT NULL,
            link_order INTEGER NOT NULL,
            PRIMARY KEY(lesson_id, standard_id),
            FOREIGN KEY(lesson_id) REFERENCES curriculum_lessons(id),
            FOREIGN KEY(standard_id) REFERENCES standards(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_lesson_standards_lesson ON curriculum_lesson_standards(lesson_id, link_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            title TEXT NOT NULL,
            class_name TEXT NOT NULL,
            selected_library_id TEXT NOT NULL,
            schedule_model TEXT NOT NULL,
            ab_pattern_start_date TEXT,
            school_year_start TEXT NOT NULL,
            school_year_end TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(selected_library_id) REFERENCES curriculum_libraries(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_courses_owner ON courses(owner_id)",
        [],
    )?;
    // Workspaces created before the meeting-day filter existed lack this column.
    ensure_courses_ab_meeting_day(conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS day_off_reasons(
            id TEXT PRIMARY KEY,
            owner_id TEXT,
            label TEXT NOT NULL
        )",
        [],
    )?;
    seed_default_reasons(conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS course_calendar_days(
            course_id TEXT NOT NULL,
            class_date TEXT NOT NULL,
            day_type TEXT NOT NULL,
            ab_day TEXT,
            reason_id TEXT,
            note TEXT,
            updated_at TEXT,
            PRIMARY KEY(course_id, class_date),
            FOREIGN KEY(course_id) REFERENCES courses(id),
            FOREIGN KEY(reason_id) REFERENCES day_off_reasons(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS course_lesson_plan(
            course_id TEXT NOT NULL,
            class_date TEXT NOT NULL,
            lesson_id TEXT NOT NULL,
            status TEXT NOT NULL,
            is_added_buffer_day INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY(course_id, class_date),
            FOREIGN KEY(course_id) REFERENCES courses(id),
            FOREIGN KEY(lesson_id) REFERENCES curriculum_lessons(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS course_announcements(
            course_id TEXT NOT NULL,
            class_date TEXT NOT NULL,
            content TEXT NOT NULL,
            content_sha256 TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY(course_id, class_date),
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;

    Ok(())
}

/// Applies the workspace busy timeout so concurrent writers wait instead of failing.
pub fn apply_busy_timeout(conn: &Connection, millis: u64) -> anyhow::Result<()> {
    conn.busy_timeout(Duration::from_millis(millis))?;
    Ok(())
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

fn ensure_courses_ab_meeting_day(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "courses", "ab_meeting_day")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE courses ADD COLUMN ab_meeting_day TEXT", [])?;
    Ok(())
}

fn seed_default_reasons(conn: &Connection) -> anyhow::Result<()> {
    for (i, label) in DEFAULT_REASONS.iter().enumerate() {
        conn.execute(
            "INSERT OR IGNORE INTO day_off_reasons(id, owner_id, label) VALUES(?, NULL, ?)",
            (format!("reason-default-{}", i + 1), label),
        )?;
    }
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
