use serde_json::json;

use crate::ipc::error::{err, ok, sync_err};
use crate::ipc::types::{AppState, Request};

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(sync) = state.sync.as_ref() else {
        return ok(&req.id, json!({ "classes": [] }));
    };

    // Include a student count so the UI can show a useful roster overview.
    let store = sync.store();
    let classes: Vec<serde_json::Value> = store
        .classes
        .iter()
        .map(|c| {
            let student_count = store.students.iter().filter(|s| s.class_id == c.id).count();
            json!({
                "id": c.id,
                "name": c.name,
                "studentCount": student_count,
            })
        })
        .collect();

    ok(&req.id, json!({ "classes": classes }))
}

fn handle_classes_create(state: &mut AppState, req: &Request) -> serde_json::Value {
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

    match sync.add_class(&name) {
        Ok(class) => ok(&req.id, json!({ "class": class })),
        Err(e) => sync_err(&req.id, e),
    }
}

fn handle_classes_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(sync) = state.sync.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let class_id = match req.params.get("classId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing classId", None),
    };
    let name = match req.params.get("name").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing name", None),
    };
    if name.is_empty() {
        return err(&req.id, "bad_params", "name must not be empty", None);
    }

    match sync.update_class(&class_id, &name) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => sync_err(&req.id, e),
    }
}

fn handle_classes_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(sync) = state.sync.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let class_id = match req.params.get("classId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing classId", None),
    };

    match sync.delete_class(&class_id) {
        Ok(()) => ok(&req.id, json!({ "ok": true })),
        Err(e) => sync_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(handle_classes_list(state, req)),
        "classes.create" => Some(handle_classes_create(state, req)),
        "classes.update" => Some(handle_classes_update(state, req)),
        "classes.delete" => Some(handle_classes_delete(state, req)),
        _ => None,
    }
}
