use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{non_blank, parse_params, require_db, require_str};
use crate::ipc::types::{AppState, Request};
use crate::model::{CreateRubricParams, Rubric, RubricCriteria, RubricLevel};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use std::collections::HashSet;
use uuid::Uuid;

pub(crate) fn load_rubric(conn: &Connection, rubric_id: &str) -> rusqlite::Result<Option<Rubric>> {
    let name: Option<String> = conn
        .query_row("SELECT name FROM rubrics WHERE id = ?", [rubric_id], |r| {
            r.get(0)
        })
        .optional()?;
    let Some(name) = name else {
        return Ok(None);
    };

    let mut criteria_stmt = conn.prepare(
        "SELECT id, rubric_id, name, weight, sort_order
         FROM rubric_criteria
         WHERE rubric_id = ?
         ORDER BY sort_order",
    )?;
    let criteria = criteria_stmt
        .query_map([rubric_id], |r| {
            Ok(RubricCriteria {
                id: r.get(0)?,
                rubric_id: r.get(1)?,
                name: r.get(2)?,
                weight: r.get(3)?,
                sort_order: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut levels_stmt = conn.prepare(
        "SELECT l.id, l.name, l.points, k.sort_order
         FROM rubric_level_links k
         JOIN rubric_levels l ON l.id = k.level_id
         WHERE k.rubric_id = ?
         ORDER BY k.sort_order",
    )?;
    let levels = levels_stmt
        .query_map([rubric_id], |r| {
            Ok(RubricLevel {
                id: r.get(0)?,
                name: r.get(1)?,
                points: r.get(2)?,
                sort_order: r.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(Rubric {
        id: rubric_id.to_string(),
        name,
        criteria,
        levels,
    }))
}

fn handle_rubrics_create(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state.db.as_ref())?;
    let p: CreateRubricParams = parse_params(req)?;

    let name = non_blank("name", &p.name)?;
    if p.criteria.is_empty() {
        return Err(HandlerErr::bad_params("criteria must not be empty"));
    }
    if p.level_ids.is_empty() {
        return Err(HandlerErr::bad_params("levelIds must not be empty"));
    }

    let mut criteria: Vec<(String, f64)> = Vec::with_capacity(p.criteria.len());
    for (i, c) in p.criteria.iter().enumerate() {
        let cname = non_blank("criteria.name", &c.name)?;
        if !c.weight.is_finite() || !(0.0..=100.0).contains(&c.weight) {
            return Err(HandlerErr::bad_params("criteria.weight must be between 0 and 100")
                .with_details(json!({ "index": i, "weight": c.weight })));
        }
        criteria.push((cname, c.weight));
    }

    let mut seen: HashSet<&str> = HashSet::new();
    for level_id in &p.level_ids {
        if !seen.insert(level_id.as_str()) {
            return Err(HandlerErr::bad_params("duplicate level id")
                .with_details(json!({ "levelId": level_id })));
        }
        let exists: Option<i64> = conn
            .query_row("SELECT 1 FROM rubric_levels WHERE id = ?", [level_id], |r| {
                r.get(0)
            })
            .optional()?;
        if exists.is_none() {
            return Err(HandlerErr::not_found("level not found")
                .with_details(json!({ "levelId": level_id })));
        }
    }

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;

    let rubric_id = Uuid::new_v4().to_string();
    tx.execute(
        "INSERT INTO rubrics(id, name) VALUES(?, ?)",
        (&rubric_id, &name),
    )
    .map_err(|e| HandlerErr::insert_failed("rubrics", e))?;

    for (i, (cname, weight)) in criteria.iter().enumerate() {
        tx.execute(
            "INSERT INTO rubric_criteria(id, rubric_id, name, weight, sort_order)
             VALUES(?, ?, ?, ?, ?)",
            (
                Uuid::new_v4().to_string(),
                &rubric_id,
                cname,
                weight,
                i as i64,
            ),
        )
        .map_err(|e| HandlerErr::insert_failed("rubric_criteria", e))?;
    }

    for (i, level_id) in p.level_ids.iter().enumerate() {
        tx.execute(
            "INSERT INTO rubric_level_links(rubric_id, level_id, sort_order) VALUES(?, ?, ?)",
            (&rubric_id, level_id, i as i64),
        )
        .map_err(|e| HandlerErr::insert_failed("rubric_level_links", e))?;
    }

    tx.commit()
        .map_err(|e| HandlerErr::new("db_tx_failed", e.to_string()))?;

    tracing::info!(rubric_id = %rubric_id, criteria = criteria.len(), "rubric created");
    Ok(json!({ "rubricId": rubric_id, "name": name }))
}

fn handle_rubrics_get(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let conn = require_db(state.db.as_ref())?;
    let rubric_id = require_str(req, "rubricId")?;

    let Some(rubric) = load_rubric(conn, &rubric_id)? else {
        return Err(HandlerErr::not_found("rubric not found"));
    };

    // Scoring ignores weights, so a rubric whose weights do not add up to 100
    // still grades. Report the total so the host can flag it.
    let weight_total = rubric.weight_total();
    if (weight_total - 100.0).abs() > 1e-9 {
        tracing::debug!(rubric_id = %rubric.id, weight_total, "rubric weights do not sum to 100");
    }

    Ok(json!({ "rubric": rubric, "weightTotal": weight_total }))
}

fn handle_rubrics_list(
    state: &mut AppState,
    _req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let Some(conn) = state.db.as_ref() else {
        return Ok(json!({ "rubrics": [] }));
    };

    let mut stmt = conn.prepare(
        "SELECT
           r.id,
           r.name,
           (SELECT COUNT(*) FROM rubric_criteria c WHERE c.rubric_id = r.id) AS criteria_count,
           (SELECT COUNT(*) FROM rubric_level_links k WHERE k.rubric_id = r.id) AS level_count
         FROM rubrics r
         ORDER BY r.name",
    )?;
    let rubrics = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let name: String = row.get(1)?;
            let criteria_count: i64 = row.get(2)?;
            let level_count: i64 = row.get(3)?;
            Ok(json!({
                "id": id,
                "name": name,
                "criteriaCount": criteria_count,
                "levelCount": level_count
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(json!({ "rubrics": rubrics }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let res = match req.method.as_str() {
        "rubrics.create" => handle_rubrics_create(state, req),
        "rubrics.get" => handle_rubrics_get(state, req),
        "rubrics.list" => handle_rubrics_list(state, req),
        _ => return None,
    };
    Some(respond(&req.id, res))
}
