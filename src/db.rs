use crate::extract::{Extraction, Mark, QuestionMeta, Student};
use anyhow::Context;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;

pub const DB_FILE: &str = "coattain.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS submissions(
            id TEXT PRIMARY KEY,
            subject_code TEXT NOT NULL,
            subject_name TEXT NOT NULL,
            evaluation_type TEXT NOT NULL,
            batch_id TEXT NOT NULL,
            section TEXT NOT NULL,
            semester TEXT NOT NULL,
            academic_year TEXT NOT NULL,
            submitted_at TEXT NOT NULL
        )",
        [],
    )?;
    ensure_submissions_source_columns(&conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS submission_students(
            submission_id TEXT NOT NULL,
            usn TEXT NOT NULL,
            name TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(submission_id) REFERENCES submissions(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_submission_students_sub ON submission_students(submission_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_marks(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            submission_id TEXT NOT NULL,
            usn TEXT NOT NULL,
            question_id TEXT NOT NULL,
            marks REAL NOT NULL,
            FOREIGN KEY(submission_id) REFERENCES submissions(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_student_marks_sub ON student_marks(submission_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS question_cos(
            submission_id TEXT NOT NULL,
            question_id TEXT NOT NULL,
            course_outcomes TEXT NOT NULL,
            max_mark REAL NOT NULL DEFAULT 0,
            sort_order INTEGER NOT NULL,
            PRIMARY KEY(submission_id, question_id),
            FOREIGN KEY(submission_id) REFERENCES submissions(id)
        )",
        [],
    )?;

    Ok(conn)
}

// Workspaces created before uploads were fingerprinted lack the source columns.
fn ensure_submissions_source_columns(conn: &Connection) -> anyhow::Result<()> {
    if !table_has_column(conn, "submissions", "source_name")? {
        conn.execute("ALTER TABLE submissions ADD COLUMN source_name TEXT", [])?;
    }
    if !table_has_column(conn, "submissions", "source_sha256")? {
        conn.execute("ALTER TABLE submissions ADD COLUMN source_sha256 TEXT", [])?;
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

#[derive(Debug, Clone, Default)]
pub struct SubmissionMeta {
    pub subject_code: String,
    pub subject_name: String,
    pub evaluation_type: String,
    pub batch_id: String,
    pub section: String,
    pub semester: String,
    pub academic_year: String,
    pub source_name: Option<String>,
    pub source_sha256: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRow {
    pub id: String,
    pub subject_code: String,
    pub subject_name: String,
    pub evaluation_type: String,
    pub batch_id: String,
    pub section: String,
    pub semester: String,
    pub academic_year: String,
    pub source_name: Option<String>,
    pub source_sha256: Option<String>,
    pub submitted_at: String,
    pub student_count: i64,
    pub mark_count: i64,
    pub question_count: i64,
}

/// Writes the submission and all of its records in one transaction; returns the new id.
pub fn insert_submission(
    conn: &Connection,
    meta: &SubmissionMeta,
    data: &Extraction,
) -> anyhow::Result<String> {
    let submission_id = uuid::Uuid::new_v4().to_string();
    let submitted_at = chrono::Utc::now().to_rfc3339();

    let tx = conn
        .unchecked_transaction()
        .context("failed to begin submission transaction")?;

    tx.execute(
        "INSERT INTO submissions(id, subject_code, subject_name, evaluation_type, batch_id,
                                 section, semester, academic_year, submitted_at,
                                 source_name, source_sha256)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            submission_id,
            meta.subject_code,
            meta.subject_name,
            meta.evaluation_type,
            meta.batch_id,
            meta.section,
            meta.semester,
            meta.academic_year,
            submitted_at,
            meta.source_name,
            meta.source_sha256,
        ],
    )
    .context("failed to insert submission")?;

    {
        let mut ins = tx.prepare(
            "INSERT INTO submission_students(submission_id, usn, name, sort_order)
             VALUES(?, ?, ?, ?)",
        )?;
        for (i, s) in data.students.iter().enumerate() {
            ins.execute(params![submission_id, s.usn, s.name, i as i64])
                .with_context(|| format!("failed to insert student {}", s.usn))?;
        }
    }

    {
        let mut ins = tx.prepare(
            "INSERT INTO student_marks(submission_id, usn, question_id, marks)
             VALUES(?, ?, ?, ?)",
        )?;
        for m in &data.marks {
            ins.execute(params![submission_id, m.usn, m.question_id, m.mark])
                .with_context(|| format!("failed to insert mark {}/{}", m.usn, m.question_id))?;
        }
    }

    {
        let mut ins = tx.prepare(
            "INSERT INTO question_cos(submission_id, question_id, course_outcomes, max_mark, sort_order)
             VALUES(?, ?, ?, ?, ?)
             ON CONFLICT(submission_id, question_id) DO UPDATE SET
               course_outcomes = excluded.course_outcomes,
               max_mark = excluded.max_mark",
        )?;
        for (i, q) in data.questions.iter().enumerate() {
            ins.execute(params![
                submission_id,
                q.question_id,
                q.course_outcomes,
                q.max_mark,
                i as i64
            ])
            .with_context(|| format!("failed to insert question {}", q.question_id))?;
        }
    }

    tx.commit().context("failed to commit submission")?;
    Ok(submission_id)
}

const SUBMISSION_SELECT: &str =
    "SELECT s.id, s.subject_code, s.subject_name, s.evaluation_type, s.batch_id, s.section,
            s.semester, s.academic_year, s.source_name, s.source_sha256, s.submitted_at,
            (SELECT COUNT(*) FROM submission_students st WHERE st.submission_id = s.id),
            (SELECT COUNT(*) FROM student_marks m WHERE m.submission_id = s.id),
            (SELECT COUNT(*) FROM question_cos q WHERE q.submission_id = s.id)
     FROM submissions s";

fn submission_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<SubmissionRow> {
    Ok(SubmissionRow {
        id: r.get(0)?,
        subject_code: r.get(1)?,
        subject_name: r.get(2)?,
        evaluation_type: r.get(3)?,
        batch_id: r.get(4)?,
        section: r.get(5)?,
        semester: r.get(6)?,
        academic_year: r.get(7)?,
        source_name: r.get(8)?,
        source_sha256: r.get(9)?,
        submitted_at: r.get(10)?,
        student_count: r.get(11)?,
        mark_count: r.get(12)?,
        question_count: r.get(13)?,
    })
}

pub fn list_submissions(conn: &Connection, limit: i64) -> anyhow::Result<Vec<SubmissionRow>> {
    let sql = format!("{SUBMISSION_SELECT} ORDER BY s.submitted_at DESC, s.rowid DESC LIMIT ?");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([limit], submission_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_submission(conn: &Connection, submission_id: &str) -> anyhow::Result<Option<SubmissionRow>> {
    let sql = format!("{SUBMISSION_SELECT} WHERE s.id = ?");
    let row = conn
        .query_row(&sql, [submission_id], submission_row)
        .optional()?;
    Ok(row)
}

/// Reloads the normalized records of a stored submission in insertion order.
pub fn load_extraction(conn: &Connection, submission_id: &str) -> anyhow::Result<Extraction> {
    let mut stmt = conn.prepare(
        "SELECT usn, name FROM submission_students WHERE submission_id = ? ORDER BY sort_order",
    )?;
    let students = stmt
        .query_map([submission_id], |r| {
            Ok(Student {
                usn: r.get(0)?,
                name: r.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT usn, question_id, marks FROM student_marks WHERE submission_id = ? ORDER BY id",
    )?;
    let marks = stmt
        .query_map([submission_id], |r| {
            Ok(Mark {
                usn: r.get(0)?,
                question_id: r.get(1)?,
                mark: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT question_id, course_outcomes, max_mark FROM question_cos
         WHERE submission_id = ? ORDER BY sort_order",
    )?;
    let questions = stmt
        .query_map([submission_id], |r| {
            Ok(QuestionMeta {
                question_id: r.get(0)?,
                course_outcomes: r.get(1)?,
                max_mark: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Extraction {
        students,
        marks,
        questions,
    })
}
