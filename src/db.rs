use rusqlite::Connection;
use std::path::Path;
use uuid::Uuid;

pub const DB_FILE_NAME: &str = "gradebook.sqlite3";

const DEFAULT_LEVELS: [(&str, i64); 4] = [
    ("Excellent", 4),
    ("Good", 3),
    ("Satisfactory", 2),
    ("Needs Improvement", 1),
];

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS rubric_levels(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            points INTEGER NOT NULL CHECK(points >= 0),
            sort_order INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS rubrics(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )",
        [],
    )?;

    // Levels are shared; a rubric picks an ordered subset.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS rubric_level_links(
            rubric_id TEXT NOT NULL,
            level_id TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            PRIMARY KEY(rubric_id, level_id),
            FOREIGN KEY(rubric_id) REFERENCES rubrics(id),
            FOREIGN KEY(level_id) REFERENCES rubric_levels(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_rubric_level_links_rubric ON rubric_level_links(rubric_id, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS rubric_criteria(
            id TEXT PRIMARY KEY,
            rubric_id TEXT NOT NULL,
            name TEXT NOT NULL,
            weight REAL NOT NULL,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(rubric_id) REFERENCES rubrics(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_rubric_criteria_rubric ON rubric_criteria(rubric_id, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS exercises(
            id TEXT PRIMARY KEY,
            lesson_id TEXT NOT NULL,
            title TEXT NOT NULL,
            max_points INTEGER NOT NULL CHECK(max_points > 0),
            rubric_id TEXT NOT NULL,
            FOREIGN KEY(rubric_id) REFERENCES rubrics(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_exercises_lesson ON exercises(lesson_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            lesson_id TEXT NOT NULL,
            exercise_id TEXT NOT NULL,
            total_points INTEGER NOT NULL,
            percentage INTEGER NOT NULL,
            letter_grade TEXT NOT NULL,
            feedback TEXT,
            graded_by TEXT NOT NULL,
            graded_at TEXT NOT NULL,
            FOREIGN KEY(exercise_id) REFERENCES exercises(id),
            UNIQUE(student_id, exercise_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_student ON grades(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_lesson ON grades(lesson_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS criteria_grades(
            grade_id TEXT NOT NULL,
            criteria_id TEXT NOT NULL,
            level_id TEXT NOT NULL,
            points INTEGER NOT NULL,
            comments TEXT,
            sort_order INTEGER NOT NULL,
            PRIMARY KEY(grade_id, criteria_id),
            FOREIGN KEY(grade_id) REFERENCES grades(id),
            FOREIGN KEY(criteria_id) REFERENCES rubric_criteria(id),
            FOREIGN KEY(level_id) REFERENCES rubric_levels(id)
        )",
        [],
    )?;

    seed_default_levels(&conn)?;

    Ok(conn)
}

fn seed_default_levels(conn: &Connection) -> anyhow::Result<()> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM rubric_levels", [], |r| r.get(0))?;
    if count > 0 {
        return Ok(());
    }

    for (i, (name, points)) in DEFAULT_LEVELS.iter().enumerate() {
        conn.execute(
            "INSERT INTO rubric_levels(id, name, points, sort_order) VALUES(?, ?, ?, ?)",
            (Uuid::new_v4().to_string(), name, points, i as i64),
        )?;
    }
    tracing::debug!(count = DEFAULT_LEVELS.len(), "seeded default rubric levels");

    Ok(())
}
