use serde_json::json;

use crate::ipc::error::{err, ok, sync_err};
use crate::ipc::types::{AppState, Request};

fn handle_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(sync) = state.sync.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    match sync.export_data() {
        Ok(document) => ok(&req.id, json!({ "document": document })),
        Err(e) => sync_err(&req.id, e),
    }
}

fn handle_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(sync) = state.sync.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let Some(payload) = req.params.get("payload") else {
        return err(&req.id, "bad_params", "missing payload", None);
    };

    match sync.import_data(payload) {
        Ok(remote_warning) => ok(
            &req.id,
            json!({ "imported": true, "remoteWarning": remote_warning }),
        ),
        Err(e) => sync_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "data.export" => Some(handle_export(state, req)),
        "data.import" => Some(handle_import(state, req)),
        _ => None,
    }
}
