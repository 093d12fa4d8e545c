use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{non_blank, parse_params, require_db, require_str};
use crate::ipc::types::{AppState, Request};
use crate::model::{CreateExerciseParams, Exercise};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

pub(crate) fn load_exercise(
    conn: &Connection,
    exercise_id: &str,
) -> rusqlite::Result<Option<Exercise>> {
    conn.query_row(
        "SELECT id, lesson_id, title, max_points, rubric_id
         FROM exercises
         WHERE id = ?",
        [exercise_id],
        |r| {
            Ok(Exercise {
                id: r.get(0)?,
                lesson_id: r.get(1)?,
                title: r.get(2)?,
                max_points: r.get(3)?,
                rubric_id: r.get(4)?,
            })
        },
    )
    .optional()
}

fn handle_exercises_create(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state.db.as_ref())?;
    let p: CreateExerciseParams = parse_params(req)?;

    let lesson_id = non_blank("lessonId", &p.lesson_id)?;
    let title = non_blank("title", &p.title)?;
    if p.max_points <= 0 {
        return Err(HandlerErr::bad_params("maxPoints must be > 0")
            .with_details(json!({ "maxPoints": p.max_points })));
    }

    let rubric_exists: Option<i64> = conn
        .query_row("SELECT 1 FROM rubrics WHERE id = ?", [&p.rubric_id], |r| {
            r.get(0)
        })
        .optional()?;
    if rubric_exists.is_none() {
        return Err(HandlerErr::not_found("rubric not found")
            .with_details(json!({ "rubricId": p.rubric_id })));
    }

    let exercise_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO exercises(id, lesson_id, title, max_points, rubric_id) VALUES(?, ?, ?, ?, ?)",
        (&exercise_id, &lesson_id, &title, p.max_points, &p.rubric_id),
    )
    .map_err(|e| HandlerErr::insert_failed("exercises", e))?;

    Ok(json!({ "exerciseId": exercise_id }))
}

fn handle_exercises_get(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state.db.as_ref())?;
    let exercise_id = require_str(req, "exerciseId")?;

    match load_exercise(conn, &exercise_id)? {
        Some(exercise) => Ok(json!({ "exercise": exercise })),
        None => Err(HandlerErr::not_found("exercise not found")),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "exercises.create" => handle_exercises_create(state, req),
        "exercises.get" => handle_exercises_get(state, req),
        _ => return None,
    };
    Some(respond(&req.id, res))
}
