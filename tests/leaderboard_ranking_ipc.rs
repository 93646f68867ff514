use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_classpointsd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn classpointsd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value["result"].clone()
}

#[test]
fn leaderboard_orders_by_balance_with_stable_tie_break() {
    let workspace = temp_dir("classpoints-leaderboard");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy(), "seedDemoData": false }),
    );
    let class = request(
        &mut stdin,
        &mut reader,
        "2",
        "classes.create",
        json!({ "name": "Ranked Class" }),
    );
    let class_id = class["class"]["id"].as_str().expect("class id").to_string();

    let mut ids = Vec::new();
    for (i, name) in ["Ana", "Ben", "Cleo"].iter().enumerate() {
        let resp = request(
            &mut stdin,
            &mut reader,
            &format!("s{i}"),
            "students.create",
            json!({ "name": name, "classId": class_id }),
        );
        ids.push(resp["student"]["id"].as_str().expect("id").to_string());
    }

    // Ana 5, Ben 12, Cleo 5. Ben leads; Ana and Cleo tie on balance.
    let awards = [(0usize, 5i64), (1, 12), (2, 5)];
    for (n, (idx, amount)) in awards.iter().enumerate() {
        let _ = request(
            &mut stdin,
            &mut reader,
            &format!("p{n}"),
            "points.add",
            json!({
                "studentId": ids[*idx],
                "amount": amount,
                "reason": "Seed award",
                "type": "achievement"
            }),
        );
    }

    let board = request(
        &mut stdin,
        &mut reader,
        "b1",
        "stats.leaderboard",
        json!({ "period": "balance" }),
    );
    let rows = board["stats"].as_array().expect("stats rows");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["student"]["id"].as_str(), Some(ids[1].as_str()));
    assert_eq!(rows[0]["rank"].as_u64(), Some(1));
    assert_eq!(rows[0]["currentBalance"].as_i64(), Some(12));
    // Tied students order by ascending id so the board is deterministic.
    let (tie_a, tie_b) = (
        rows[1]["student"]["id"].as_str().expect("tie a"),
        rows[2]["student"]["id"].as_str().expect("tie b"),
    );
    assert!(tie_a < tie_b);
    assert_eq!(rows[1]["rank"].as_u64(), Some(2));
    assert_eq!(rows[2]["rank"].as_u64(), Some(3));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn weekly_metric_counts_only_positive_recent_points() {
    let workspace = temp_dir("classpoints-weekly");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy(), "seedDemoData": false }),
    );
    let class = request(
        &mut stdin,
        &mut reader,
        "2",
        "classes.create",
        json!({ "name": "Weekly Class" }),
    );
    let class_id = class["class"]["id"].as_str().expect("class id").to_string();
    let student = request(
        &mut stdin,
        &mut reader,
        "3",
        "students.create",
        json!({ "name": "Week Student", "classId": class_id }),
    );
    let sid = student["student"]["id"].as_str().expect("id").to_string();

    // Both records land now, so both fall inside the current week window;
    // the deduction must not count toward earned points.
    let _ = request(
        &mut stdin,
        &mut reader,
        "4",
        "points.add",
        json!({ "studentId": sid, "amount": 8, "reason": "Presentation", "type": "achievement" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "5",
        "points.add",
        json!({ "studentId": sid, "amount": -2, "reason": "Chatting", "type": "behavior" }),
    );

    let stats = request(
        &mut stdin,
        &mut reader,
        "6",
        "stats.student",
        json!({ "studentId": sid }),
    );
    assert_eq!(stats["stats"]["currentBalance"].as_i64(), Some(6));
    assert_eq!(stats["stats"]["weeklyPoints"].as_i64(), Some(8));
    assert_eq!(stats["stats"]["monthlyPoints"].as_i64(), Some(8));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn unknown_student_stats_use_a_placeholder_not_an_error() {
    let workspace = temp_dir("classpoints-placeholder");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy(), "seedDemoData": false }),
    );

    let stats = request(
        &mut stdin,
        &mut reader,
        "2",
        "stats.student",
        json!({ "studentId": "ghost" }),
    );
    assert_eq!(stats["stats"]["student"]["name"].as_str(), Some("Unknown"));
    assert_eq!(stats["stats"]["student"]["classId"].as_str(), Some("0"));
    assert_eq!(stats["stats"]["currentBalance"].as_i64(), Some(0));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
