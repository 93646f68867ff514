use serde_json::json;

use crate::ipc::error::{err, ok, sync_err};
use crate::ipc::types::{AppState, Request};
use crate::model::StudentPatch;

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(sync) = state.sync.as_ref() else {
        return ok(&req.id, json!({ "students": [] }));
    };

    let class_id = req.params.get("classId").and_then(|v| v.as_str());
    let students: Vec<serde_json::Value> = sync
        .store()
        .students
        .iter()
        .filter(|s| class_id.map(|cid| s.class_id == cid).unwrap_or(true))
        .map(|s| json!(s))
        .collect();

    ok(&req.id, json!({ "students": students }))
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(sync) = state.sync.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let name = match req.params.get("name").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing name", None),
    };
    if name.is_empty() {
        return err(&req.id, "bad_params", "name must not be empty", None);
    }
    let class_id = match req.params.get("classId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing classId", None),
    };
    if !sync.store().classes.iter().any(|c| c.id == class_id) {
        return err(&req.id, "not_found", "class not found", None);
    }
    let avatar = req
        .params
        .get("avatar")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    match sync.add_student(&name, &class_id, avatar) {
        Ok(student) => ok(&req.id, json!({ "student": student })),
        Err(e) => sync_err(&req.id, e),
    }
}

fn handle_students_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(sync) = state.sync.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let student_id = match req.params.get("studentId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing studentId", None),
    };
    let Some(raw_patch) = req.params.get("patch") else {
        return err(&req.id, "bad_params", "missing patch", None);
    };
    let patch: StudentPatch = match serde_json::from_value(raw_patch.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", format!("invalid patch: {e}"), None),
    };
    if patch.is_empty() {
        return err(
            &req.id,
            "bad_params",
            "patch must include at least one field",
            None,
        );
    }
    if patch.name.as_deref().map(|n| n.trim().is_empty()) == Some(true) {
        return err(&req.id, "bad_params", "name must not be empty", None);
    }

    match sync.update_student(&student_id, &patch) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => sync_err(&req.id, e),
    }
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(sync) = state.sync.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let student_id = match req.params.get("studentId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing studentId", None),
    };

    match sync.delete_student(&student_id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => sync_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_students_list(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.update" => Some(handle_students_update(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        _ => None,
    }
}
