use crate::calc::{self, LetterGrade};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::handlers::exercises::load_exercise;
use crate::ipc::handlers::rubrics::load_rubric;
use crate::ipc::helpers::{non_blank, parse_params, placeholders, require_db, require_str};
use crate::ipc::types::{AppState, Request};
use crate::model::{ComputeGradeParams, CriteriaGrade, Grade, SaveGradeParams};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params_from_iter, Connection};
use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

const CRITERIA_FETCH_CHUNK: usize = 500;

enum GradeScope<'a> {
    Pair {
        student_id: &'a str,
        exercise_id: &'a str,
    },
    Student(&'a str),
    Lesson(Option<&'a str>),
}

fn parse_graded_at(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn load_grades(conn: &Connection, scope: GradeScope<'_>) -> rusqlite::Result<Vec<Grade>> {
    let (where_sql, binds): (&str, Vec<Value>) = match scope {
        GradeScope::Pair {
            student_id,
            exercise_id,
        } => (
            "WHERE student_id = ? AND exercise_id = ?",
            vec![
                Value::Text(student_id.to_string()),
                Value::Text(exercise_id.to_string()),
            ],
        ),
        GradeScope::Student(student_id) => (
            "WHERE student_id = ?",
            vec![Value::Text(student_id.to_string())],
        ),
        GradeScope::Lesson(Some(lesson_id)) => (
            "WHERE lesson_id = ?",
            vec![Value::Text(lesson_id.to_string())],
        ),
        GradeScope::Lesson(None) => ("", Vec::new()),
    };

    // graded_at is stored as fixed-width UTC RFC 3339, so text order is time order.
    let sql = format!(
        "SELECT id, student_id, lesson_id, exercise_id, total_points, percentage,
                letter_grade, feedback, graded_by, graded_at
         FROM grades
         {}
         ORDER BY student_id, graded_at, id",
        where_sql
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut grades = stmt
        .query_map(params_from_iter(binds), |r| {
            let letter: String = r.get(6)?;
            let letter_grade = LetterGrade::parse(&letter).ok_or_else(|| {
                rusqlite::Error::InvalidColumnType(6, "letter_grade".to_string(), Type::Text)
            })?;
            Ok(Grade {
                id: r.get(0)?,
                student_id: r.get(1)?,
                lesson_id: r.get(2)?,
                exercise_id: r.get(3)?,
                criteria_grades: Vec::new(),
                total_points: r.get(4)?,
                percentage: r.get(5)?,
                letter_grade,
                feedback: r.get(7)?,
                graded_by: r.get(8)?,
                graded_at: parse_graded_at(9, r.get(9)?)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    if grades.is_empty() {
        return Ok(grades);
    }

    let mut by_grade: HashMap<String, Vec<CriteriaGrade>> = HashMap::new();
    let ids: Vec<&str> = grades.iter().map(|g| g.id.as_str()).collect();
    for chunk in ids.chunks(CRITERIA_FETCH_CHUNK) {
        let sql = format!(
            "SELECT grade_id, criteria_id, level_id, points, comments
             FROM criteria_grades
             WHERE grade_id IN ({})
             ORDER BY grade_id, sort_order",
            placeholders(chunk.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(chunk.iter()), |r| {
            let grade_id: String = r.get(0)?;
            Ok((
                grade_id,
                CriteriaGrade {
                    criteria_id: r.get(1)?,
                    level_id: r.get(2)?,
                    points: r.get(3)?,
                    comments: r.get(4)?,
                },
            ))
        })?;
        for row in rows {
            let (grade_id, cg) = row?;
            by_grade.entry(grade_id).or_default().push(cg);
        }
    }
    for g in &mut grades {
        if let Some(cgs) = by_grade.remove(&g.id) {
            g.criteria_grades = cgs;
        }
    }

    Ok(grades)
}

fn optional_text(v: Option<&str>) -> Option<String> {
    v.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn save_grade(conn: &Connection, p: SaveGradeParams) -> Result<Grade, HandlerErr> {
    let student_id = non_blank("studentId", &p.student_id)?;
    let graded_by = non_blank("gradedBy", &p.graded_by)?;

    let Some(exercise) = load_exercise(conn, &p.exercise_id)? else {
        return Err(HandlerErr::not_found("exercise not found")
            .with_details(json!({ "exerciseId": p.exercise_id })));
    };
    let Some(rubric) = load_rubric(conn, &exercise.rubric_id)? else {
        return Err(HandlerErr::not_found("rubric not found")
            .with_details(json!({ "rubricId": exercise.rubric_id })));
    };

    let criteria_ids: HashSet<&str> = rubric.criteria.iter().map(|c| c.id.as_str()).collect();
    let level_points: HashMap<&str, i64> = rubric
        .levels
        .iter()
        .map(|l| (l.id.as_str(), l.points))
        .collect();

    let mut seen: HashSet<&str> = HashSet::new();
    let mut criteria_grades: Vec<CriteriaGrade> = Vec::with_capacity(p.criteria_grades.len());
    for sel in &p.criteria_grades {
        if !criteria_ids.contains(sel.criteria_id.as_str()) {
            return Err(HandlerErr::bad_params("criterion is not part of the exercise rubric")
                .with_details(json!({ "criteriaId": sel.criteria_id })));
        }
        if !seen.insert(sel.criteria_id.as_str()) {
            return Err(HandlerErr::bad_params("criterion graded more than once")
                .with_details(json!({ "criteriaId": sel.criteria_id })));
        }
        let Some(points) = level_points.get(sel.level_id.as_str()).copied() else {
            return Err(HandlerErr::bad_params("level is not part of the exercise rubric")
                .with_details(json!({ "levelId": sel.level_id })));
        };
        criteria_grades.push(CriteriaGrade {
            criteria_id: sel.criteria_id.clone(),
            level_id: sel.level_id.clone(),
            points,
            comments: optional_text(sel.comments.as_deref()),
        });
    }

    let result = calc::compute_grade(
        criteria_grades.iter().map(|c| c.points),
        exercise.max_points,
    )?;
    let feedback = optional_text(p.feedback.as_deref());
    let graded_at = Utc::now().trunc_subsecs(6);
    let graded_at_text = graded_at.to_rfc3339_opts(SecondsFormat::Micros, true);

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;

    // Re-grading keeps the row id and replaces everything else.
    tx.execute(
        "INSERT INTO grades(id, student_id, lesson_id, exercise_id, total_points, percentage,
                            letter_grade, feedback, graded_by, graded_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(student_id, exercise_id) DO UPDATE SET
           lesson_id = excluded.lesson_id,
           total_points = excluded.total_points,
           percentage = excluded.percentage,
           letter_grade = excluded.letter_grade,
           feedback = excluded.feedback,
           graded_by = excluded.graded_by,
           graded_at = excluded.graded_at",
        (
            Uuid::new_v4().to_string(),
            &student_id,
            &exercise.lesson_id,
            &exercise.id,
            result.total_points,
            result.percentage,
            result.letter_grade.as_str(),
            &feedback,
            &graded_by,
            &graded_at_text,
        ),
    )
    .map_err(|e| HandlerErr::insert_failed("grades", e))?;

    let grade_id: String = tx.query_row(
        "SELECT id FROM grades WHERE student_id = ? AND exercise_id = ?",
        (&student_id, &exercise.id),
        |r| r.get(0),
    )?;

    tx.execute("DELETE FROM criteria_grades WHERE grade_id = ?", [&grade_id])?;
    for (i, cg) in criteria_grades.iter().enumerate() {
        tx.execute(
            "INSERT INTO criteria_grades(grade_id, criteria_id, level_id, points, comments, sort_order)
             VALUES(?, ?, ?, ?, ?, ?)",
            (
                &grade_id,
                &cg.criteria_id,
                &cg.level_id,
                cg.points,
                &cg.comments,
                i as i64,
            ),
        )
        .map_err(|e| HandlerErr::insert_failed("criteria_grades", e))?;
    }

    tx.commit()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;

    tracing::info!(
        grade_id = %grade_id,
        student_id = %student_id,
        exercise_id = %exercise.id,
        total_points = result.total_points,
        percentage = result.percentage,
        letter_grade = %result.letter_grade,
        "grade saved"
    );

    Ok(Grade {
        id: grade_id,
        student_id,
        lesson_id: exercise.lesson_id,
        exercise_id: exercise.id,
        criteria_grades,
        total_points: result.total_points,
        percentage: result.percentage,
        letter_grade: result.letter_grade,
        feedback,
        graded_by,
        graded_at,
    })
}

fn handle_grades_compute(
    _state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let p: ComputeGradeParams = parse_params(req)?;
    let result = calc::compute_grade(p.criteria_grades.iter().map(|c| c.points), p.max_points)?;
    Ok(json!(result))
}

fn handle_grades_save(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state.db.as_ref())?;
    let p: SaveGradeParams = parse_params(req)?;
    let grade = save_grade(conn, p)?;
    Ok(json!({ "grade": grade }))
}

fn handle_grades_get(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state.db.as_ref())?;
    let student_id = require_str(req, "studentId")?;
    let exercise_id = require_str(req, "exerciseId")?;

    let grade = load_grades(
        conn,
        GradeScope::Pair {
            student_id: &student_id,
            exercise_id: &exercise_id,
        },
    )?
    .into_iter()
    .next();
    match grade {
        Some(g) => Ok(json!({ "grade": g })),
        None => Err(HandlerErr::not_found("grade not found")),
    }
}

fn handle_grades_list_for_student(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state.db.as_ref())?;
    let student_id = require_str(req, "studentId")?;

    let grades = load_grades(conn, GradeScope::Student(&student_id))?;
    let summary = calc::summarize_grades(&grades);
    Ok(json!({
        "grades": grades,
        "summary": {
            "bestGrade": summary.best,
            "averageGrade": summary.average,
        }
    }))
}

fn handle_grades_report(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state.db.as_ref())?;
    let lesson_id = match req.params.get("lessonId") {
        None => None,
        Some(v) if v.is_null() => None,
        Some(v) => match v.as_str() {
            Some(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => return Err(HandlerErr::bad_params("lessonId must be a non-empty string or null")),
        },
    };

    let grades = load_grades(conn, GradeScope::Lesson(lesson_id.as_deref()))?;
    let mut by_student: BTreeMap<&str, Vec<&Grade>> = BTreeMap::new();
    for g in &grades {
        by_student.entry(g.student_id.as_str()).or_default().push(g);
    }

    let students: Vec<serde_json::Value> = by_student
        .into_iter()
        .map(|(student_id, list)| {
            let summary = calc::summarize_grades(&list);
            json!({
                "studentId": student_id,
                "gradeCount": list.len(),
                "bestGrade": summary.best.copied(),
                "averageGrade": summary.average,
            })
        })
        .collect();

    Ok(json!({ "lessonId": lesson_id, "students": students }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "grades.compute" => handle_grades_compute(state, req),
        "grades.save" => handle_grades_save(state, req),
        "grades.get" => handle_grades_get(state, req),
        "grades.listForStudent" => handle_grades_list_for_student(state, req),
        "grades.report" => handle_grades_report(state, req),
        _ => return None,
    };
    Some(respond(&req.id, res))
}
