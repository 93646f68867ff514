use serde_json::json;

use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::stats::RankingPeriod;

fn handle_stats_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(sync) = state.sync.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let student_id = match req.params.get("studentId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing studentId", None),
    };

    // An unknown id yields a zeroed placeholder, never an error.
    let stats = sync.student_stats(&student_id);
    ok(&req.id, json!({ "stats": stats }))
}

fn handle_stats_leaderboard(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(sync) = state.sync.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };

    let period = match req.params.get("period").and_then(|v| v.as_str()) {
        Some(raw) => match RankingPeriod::parse(raw) {
            Some(p) => p,
            None => return err(&req.id, "bad_params", "unknown period", None),
        },
        None => RankingPeriod::Balance,
    };

    let stats = sync.leaderboard(period);
    ok(&req.id, json!({ "period": period, "stats": stats }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "stats.student" => Some(handle_stats_student(state, req)),
        "stats.leaderboard" => Some(handle_stats_leaderboard(state, req)),
        _ => None,
    }
}
