use crate::assignments::{ClassSubjects, TeacherAssignment};
use crate::fees::{FeeScheduleRecord, Receipt};
use crate::grades::{ScoreRecord, TestSlot};
use crate::roster::{Gender, Pupil};
use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE_NAME: &str = "schoolbook.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace.to_string_lossy()
        )
    })?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.to_string_lossy()))?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS pupils(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            name TEXT NOT NULL,
            class_name TEXT NOT NULL,
            academic_year TEXT NOT NULL,
            gender TEXT,
            registered_at TEXT NOT NULL,
            UNIQUE(student_id, academic_year)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_pupils_class_year ON pupils(class_name, academic_year)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS class_configs(
            class_name TEXT NOT NULL,
            academic_year TEXT NOT NULL,
            subject_percentage_total REAL,
            PRIMARY KEY(class_name, academic_year)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS scores(
            id TEXT PRIMARY KEY,
            pupil_id TEXT NOT NULL,
            subject TEXT NOT NULL,
            test TEXT NOT NULL,
            grade REAL NOT NULL,
            class_name TEXT NOT NULL,
            academic_year TEXT NOT NULL,
            updated_at TEXT,
            UNIQUE(pupil_id, subject, test, class_name, academic_year)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_scores_class_year ON scores(class_name, academic_year)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_scores_pupil ON scores(pupil_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS fee_schedules(
            class_name TEXT NOT NULL,
            academic_year TEXT NOT NULL,
            total_amount REAL NOT NULL,
            PRIMARY KEY(class_name, academic_year)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS receipts(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            amount REAL NOT NULL,
            academic_year TEXT NOT NULL,
            class_name TEXT NOT NULL,
            recorded_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_receipts_year ON receipts(academic_year)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_receipts_student ON receipts(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS class_subjects(
            class_name TEXT NOT NULL,
            subject TEXT NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY(class_name, subject)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teacher_assignments(
            id TEXT PRIMARY KEY,
            teacher TEXT NOT NULL,
            class_name TEXT NOT NULL,
            subjects_json TEXT NOT NULL,
            created_at TEXT NOT NULL,
            UNIQUE(teacher, class_name)
        )",
        [],
    )?;

    Ok(conn)
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
        Some(text) => Ok(Some(
            serde_json::from_str(&text).with_context(|| format!("bad settings json for {}", key))?,
        )),
        None => Ok(None),
    }
}

pub fn settings_set_json(
    conn: &Connection,
    key: &str,
    value: &serde_json::Value,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

/// Every score for a class and year. Rows whose test label no longer
/// parses are skipped.
pub fn load_class_scores(
    conn: &Connection,
    class_name: &str,
    academic_year: &str,
) -> anyhow::Result<Vec<ScoreRecord>> {
    let mut stmt = conn.prepare(
        "SELECT pupil_id, subject, test, grade, class_name, academic_year
         FROM scores
         WHERE class_name = ? AND academic_year = ?
         ORDER BY pupil_id, subject, test",
    )?;
    let rows = stmt
        .query_map((class_name, academic_year), |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, f64>(3)?,
                r.get::<_, String>(4)?,
                r.get::<_, String>(5)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = Vec::with_capacity(rows.len());
    for (pupil_id, subject, test, grade, class_name, academic_year) in rows {
        let test: TestSlot = match test.parse() {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(%pupil_id, %subject, error = %e, "skipping score row");
                continue;
            }
        };
        out.push(ScoreRecord {
            pupil_id,
            subject,
            test,
            grade,
            class_name,
            academic_year,
        });
    }
    Ok(out)
}

pub fn load_roster(
    conn: &Connection,
    class_name: Option<&str>,
    academic_year: &str,
) -> anyhow::Result<Vec<Pupil>> {
    let mut stmt = conn.prepare(
        "SELECT student_id, name, class_name, academic_year, gender
         FROM pupils
         WHERE academic_year = ?1 AND (?2 IS NULL OR class_name = ?2)
         ORDER BY class_name, name, student_id",
    )?;
    let pupils = stmt
        .query_map((academic_year, class_name), |r| {
            let gender: Option<String> = r.get(4)?;
            Ok(Pupil {
                student_id: r.get(0)?,
                name: r.get(1)?,
                class_name: r.get(2)?,
                academic_year: r.get(3)?,
                gender: gender.and_then(|g| g.parse::<Gender>().ok()),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(pupils)
}

pub fn load_fee_schedule(
    conn: &Connection,
    academic_year: &str,
) -> anyhow::Result<Vec<FeeScheduleRecord>> {
    let mut stmt = conn.prepare(
        "SELECT class_name, academic_year, total_amount
         FROM fee_schedules
         WHERE academic_year = ?
         ORDER BY class_name",
    )?;
    let rows = stmt
        .query_map([academic_year], |r| {
            Ok(FeeScheduleRecord {
                class_name: r.get(0)?,
                academic_year: r.get(1)?,
                total_amount: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn load_receipts(
    conn: &Connection,
    academic_year: &str,
    student_id: Option<&str>,
) -> anyhow::Result<Vec<Receipt>> {
    let mut stmt = conn.prepare(
        "SELECT id, student_id, amount, academic_year, class_name, recorded_at
         FROM receipts
         WHERE academic_year = ?1 AND (?2 IS NULL OR student_id = ?2)
         ORDER BY recorded_at, id",
    )?;
    let rows = stmt
        .query_map((academic_year, student_id), |r| {
            Ok(Receipt {
                receipt_id: r.get(0)?,
                student_id: r.get(1)?,
                amount: r.get(2)?,
                academic_year: r.get(3)?,
                class_name: r.get(4)?,
                timestamp: r.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn subject_percentage_total(
    conn: &Connection,
    class_name: &str,
    academic_year: &str,
) -> anyhow::Result<Option<f64>> {
    let v: Option<Option<f64>> = conn
        .query_row(
            "SELECT subject_percentage_total FROM class_configs
             WHERE class_name = ? AND academic_year = ?",
            (class_name, academic_year),
            |r| r.get(0),
        )
        .optional()?;
    Ok(v.flatten())
}

/// Subject catalog per class, in entry order. `None` lists every class.
pub fn load_class_subjects(
    conn: &Connection,
    class_name: Option<&str>,
) -> anyhow::Result<Vec<ClassSubjects>> {
    let mut stmt = conn.prepare(
        "SELECT class_name, subject
         FROM class_subjects
         WHERE ?1 IS NULL OR class_name = ?1
         ORDER BY class_name, position",
    )?;
    let rows = stmt
        .query_map([class_name], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut out: Vec<ClassSubjects> = Vec::new();
    for (class_name, subject) in rows {
        match out.last_mut() {
            Some(last) if last.class_name == class_name => last.subjects.push(subject),
            _ => out.push(ClassSubjects {
                class_name,
                subjects: vec![subject],
            }),
        }
    }
    Ok(out)
}

pub fn load_teacher_assignments(
    conn: &Connection,
    teacher: Option<&str>,
    class_name: Option<&str>,
) -> anyhow::Result<Vec<TeacherAssignment>> {
    let mut stmt = conn.prepare(
        "SELECT id, teacher, class_name, subjects_json
         FROM teacher_assignments
         WHERE (?1 IS NULL OR teacher = ?1) AND (?2 IS NULL OR class_name = ?2)
         ORDER BY teacher, class_name",
    )?;
    let rows = stmt
        .query_map((teacher, class_name), |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, String>(2)?,
                r.get::<_, String>(3)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(assignment_id, teacher, class_name, subjects_json)| {
            let subjects: Vec<String> = serde_json::from_str(&subjects_json)
                .with_context(|| format!("bad subjects json for assignment {}", assignment_id))?;
            Ok(TeacherAssignment {
                assignment_id,
                teacher,
                class_name,
                subjects,
            })
        })
        .collect()
}
