use serde_json::json;

use crate::ipc::error::{err, ok, sync_err};
use crate::ipc::types::{AppState, Request};
use crate::model::PointKind;

fn handle_points_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(sync) = state.sync.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let student_id = match req.params.get("studentId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing studentId", None),
    };
    let Some(amount) = req.params.get("amount").and_then(|v| v.as_i64()) else {
        return err(&req.id, "bad_params", "missing/invalid amount", None);
    };
    let reason = match req.params.get("reason").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing reason", None),
    };
    if reason.is_empty() {
        return err(&req.id, "bad_params", "reason must not be empty", None);
    }
    let kind = match req
        .params
        .get("type")
        .and_then(|v| v.as_str())
        .and_then(PointKind::parse)
    {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing/unknown type", None),
    };
    if !sync.store().students.iter().any(|s| s.id == student_id) {
        return err(&req.id, "not_found", "student not found", None);
    }

    match sync.add_point(&student_id, amount, &reason, kind) {
        Ok(record) => ok(&req.id, json!({ "record": record })),
        Err(e) => sync_err(&req.id, e),
    }
}

fn handle_points_redeem(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(sync) = state.sync.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let student_id = match req.params.get("studentId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing studentId", None),
    };
    let Some(amount) = req.params.get("amount").and_then(|v| v.as_i64()) else {
        return err(&req.id, "bad_params", "missing/invalid amount", None);
    };
    let item = match req.params.get("item").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing item", None),
    };
    if item.is_empty() {
        return err(&req.id, "bad_params", "item must not be empty", None);
    }
    if !sync.store().students.iter().any(|s| s.id == student_id) {
        return err(&req.id, "not_found", "student not found", None);
    }

    match sync.redeem_points(&student_id, amount, &item) {
        Ok(outcome) => ok(
            &req.id,
            json!({
                "record": outcome.record,
                "negativeBalance": outcome.negative_balance,
            }),
        ),
        Err(e) => sync_err(&req.id, e),
    }
}

fn handle_points_reset(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(sync) = state.sync.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let student_id = match req.params.get("studentId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing studentId", None),
    };

    match sync.reset_points(&student_id) {
        Ok(record) => ok(&req.id, json!({ "record": record })),
        Err(e) => sync_err(&req.id, e),
    }
}

fn handle_points_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(sync) = state.sync.as_ref() else {
        return ok(&req.id, json!({ "points": [] }));
    };

    let student_id = req.params.get("studentId").and_then(|v| v.as_str());
    // Stored newest-first; serve as-is.
    let points: Vec<serde_json::Value> = sync
        .store()
        .points
        .iter()
        .filter(|p| student_id.map(|sid| p.student_id == sid).unwrap_or(true))
        .map(|p| json!(p))
        .collect();

    ok(&req.id, json!({ "points": points }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "points.add" => Some(handle_points_add(state, req)),
        "points.redeem" => Some(handle_points_redeem(state, req)),
        "points.reset" => Some(handle_points_reset(state, req)),
        "points.list" => Some(handle_points_list(state, req)),
        _ => None,
    }
}
