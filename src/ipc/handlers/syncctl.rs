use serde_json::json;

use crate::ipc::error::{err, ok, sync_err};
use crate::ipc::types::{AppState, Request};

fn handle_sync_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(sync) = state.sync.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    ok(
        &req.id,
        json!({
            "mode": sync.mode(),
            "isOnline": sync.is_remote_active(),
        }),
    )
}

fn handle_sync_poll(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(sync) = state.sync.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    match sync.poll_remote_changes() {
        Ok(summary) => ok(&req.id, json!({ "summary": summary })),
        Err(e) => sync_err(&req.id, e),
    }
}

fn handle_sync_refresh(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(sync) = state.sync.as_mut() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    match sync.refresh() {
        Ok(()) => ok(&req.id, json!({ "mode": sync.mode() })),
        Err(e) => sync_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sync.status" => Some(handle_sync_status(state, req)),
        "sync.poll" => Some(handle_sync_poll(state, req)),
        "sync.refresh" => Some(handle_sync_refresh(state, req)),
        _ => None,
    }
}
