use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::Teacher;

// PINs never leave the process; responses carry id and name only.
fn teacher_json(t: &Teacher) -> serde_json::Value {
    json!({ "id": t.id, "name": t.name })
}

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let pin = match req.params.get("pin").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing pin", None),
    };

    match state.teachers.login(&pin) {
        Some(teacher) => {
            let teacher = teacher.clone();
            let body = teacher_json(&teacher);
            state.current_user = Some(teacher);
            ok(&req.id, json!({ "teacher": body }))
        }
        None => err(&req.id, "bad_pin", "no teacher with that PIN", None),
    }
}

fn handle_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    state.current_user = None;
    ok(&req.id, json!({ "ok": true }))
}

fn handle_session(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({ "teacher": state.current_user.as_ref().map(teacher_json) }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "auth.login" => Some(handle_login(state, req)),
        "auth.logout" => Some(handle_logout(state, req)),
        "auth.session" => Some(handle_session(state, req)),
        _ => None,
    }
}
