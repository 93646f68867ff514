use serde_json::json;
use std::path::PathBuf;
use tracing::warn;

use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::local::LocalStore;
use crate::remote::{RemoteStore, SqliteRemote};
use crate::sync::SyncService;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "mode": state.sync.as_ref().map(|s| s.mode()),
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let path = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = path else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };
    let seed_demo = req
        .params
        .get("seedDemoData")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);

    let local = match LocalStore::open(&path) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "local_open_failed", format!("{e:?}"), None),
    };

    // Remote attach is best-effort: an unreachable remote must leave the
    // caller with a working local-only workspace, not an error.
    let mut remote_error: Option<String> = None;
    let remote: Option<Box<dyn RemoteStore>> = match req
        .params
        .get("remotePath")
        .and_then(|v| v.as_str())
    {
        Some(remote_path) => match SqliteRemote::open(std::path::Path::new(remote_path)) {
            Ok(r) => Some(Box::new(r)),
            Err(e) => {
                warn!(remote_path, error = %e, "remote open failed, starting local-only");
                remote_error = Some(e.to_string());
                None
            }
        },
        None => None,
    };

    match SyncService::init(local, remote, seed_demo) {
        Ok(service) => {
            let mode = service.mode();
            state.workspace = Some(path.clone());
            state.sync = Some(service);
            ok(
                &req.id,
                json!({
                    "workspacePath": path.to_string_lossy(),
                    "mode": mode,
                    "remoteError": remote_error,
                }),
            )
        }
        Err(e) => err(&req.id, "init_failed", format!("{e:?}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
