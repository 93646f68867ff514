use serde_json::json;

use crate::ipc::error::{err, ok, sync_err};
use crate::ipc::types::{AppState, Request};
use crate::model::AttendanceStatus;

fn handle_attendance_mark(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(sync) = state.sync.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let student_id = match req.params.get("studentId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing studentId", None),
    };
    let date = match req.params.get("date").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing date", None),
    };
    let status = match req
        .params
        .get("status")
        .and_then(|v| v.as_str())
        .and_then(AttendanceStatus::parse)
    {
        Some(v) => v,
        None => return err(&req.id, "bad_params", "missing/unknown status", None),
    };

    match sync.mark_attendance(&student_id, &date, status) {
        Ok(record) => ok(&req.id, json!({ "record": record })),
        Err(e) => sync_err(&req.id, e),
    }
}

fn handle_attendance_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(sync) = state.sync.as_ref() else {
        return ok(&req.id, json!({ "attendance": [] }));
    };

    let date = req.params.get("date").and_then(|v| v.as_str());
    let records: Vec<serde_json::Value> = sync
        .store()
        .attendance
        .iter()
        .filter(|a| date.map(|d| a.date == d).unwrap_or(true))
        .map(|a| json!(a))
        .collect();

    ok(&req.id, json!({ "attendance": records }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.mark" => Some(handle_attendance_mark(state, req)),
        "attendance.list" => Some(handle_attendance_list(state, req)),
        _ => None,
    }
}
