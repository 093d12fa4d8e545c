use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{non_blank, parse_params, require_db};
use crate::ipc::types::{AppState, Request};
use crate::model::{CreateLevelParams, RubricLevel};
use rusqlite::Connection;
use serde_json::json;
use uuid::Uuid;

fn list_levels(conn: &Connection) -> rusqlite::Result<Vec<RubricLevel>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, points, sort_order
         FROM rubric_levels
         ORDER BY sort_order",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(RubricLevel {
                id: r.get(0)?,
                name: r.get(1)?,
                points: r.get(2)?,
                sort_order: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn handle_levels_list(
    state: &mut AppState,
    _req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state.db.as_ref())?;
    let levels = list_levels(conn)?;
    Ok(json!({ "levels": levels }))
}

fn handle_levels_create(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state.db.as_ref())?;
    let p: CreateLevelParams = parse_params(req)?;

    let name = non_blank("name", &p.name)?;
    if p.points < 0 {
        return Err(HandlerErr::bad_params("points must be >= 0")
            .with_details(json!({ "points": p.points })));
    }

    let next_sort: i64 = conn.query_row(
        "SELECT COALESCE(MAX(sort_order) + 1, 0) FROM rubric_levels",
        [],
        |r| r.get(0),
    )?;
    let level_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO rubric_levels(id, name, points, sort_order) VALUES(?, ?, ?, ?)",
        (&level_id, &name, p.points, next_sort),
    )
    .map_err(|e| HandlerErr::insert_failed("rubric_levels", e))?;

    Ok(json!({ "levelId": level_id, "name": name, "points": p.points }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "levels.list" => handle_levels_list(state, req),
        "levels.create" => handle_levels_create(state, req),
        _ => return None,
    };
    Some(respond(&req.id, res))
}
