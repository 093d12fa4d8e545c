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
    let exe = env!("CARGO_BIN_EXE_gradebookd");
    let mut child = Command::new(exe)
        .env_remove("GRADEBOOKD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradebookd");
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
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

fn request_known(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_ne!(
        error_code(&value),
        "not_implemented",
        "unexpected unknown method for {}",
        method
    );
    value
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("gradebook-router-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let methods = [
        ("health", json!({})),
        ("workspace.select", json!({ "path": workspace.to_string_lossy() })),
        ("levels.list", json!({})),
        ("levels.create", json!({ "name": "Smoke", "points": 0 })),
        ("rubrics.list", json!({})),
        ("rubrics.create", json!({ "name": "Smoke" })),
        ("rubrics.get", json!({ "rubricId": "missing" })),
        ("exercises.create", json!({})),
        ("exercises.get", json!({ "exerciseId": "missing" })),
        ("grades.compute", json!({ "criteriaGrades": [], "maxPoints": 1 })),
        ("grades.save", json!({})),
        ("grades.get", json!({ "studentId": "s", "exerciseId": "missing" })),
        ("grades.listForStudent", json!({ "studentId": "s" })),
        ("grades.report", json!({ "lessonId": null })),
    ];
    for (i, (method, params)) in methods.iter().enumerate() {
        let _ = request_known(&mut stdin, &mut reader, &i.to_string(), method, params.clone());
    }

    let unknown = request(&mut stdin, &mut reader, "u", "grades.explode", json!({}));
    assert_eq!(unknown["ok"], json!(false));
    assert_eq!(error_code(&unknown), "not_implemented");

    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush garbage");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read bad_json line");
    let bad: serde_json::Value = serde_json::from_str(line.trim()).expect("parse bad_json");
    assert_eq!(error_code(&bad), "bad_json");

    // Still serving after the bad line.
    let health = request(&mut stdin, &mut reader, "h", "health", json!({}));
    assert_eq!(health["ok"], json!(true));
    assert_eq!(
        health["result"]["workspacePath"],
        json!(workspace.to_string_lossy())
    );

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn startup_workspace_comes_from_environment() {
    let workspace = temp_dir("gradebook-env-workspace");
    let exe = env!("CARGO_BIN_EXE_gradebookd");
    let mut child = Command::new(exe)
        .env("GRADEBOOKD_WORKSPACE", &workspace)
        .env("GRADEBOOKD_LOG", "debug")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradebookd");
    let mut stdin = child.stdin.take().expect("child stdin");
    let mut reader = BufReader::new(child.stdout.take().expect("child stdout"));

    let levels = request(&mut stdin, &mut reader, "1", "levels.list", json!({}));
    assert_eq!(levels["ok"], json!(true), "{levels}");
    assert_eq!(levels["result"]["levels"].as_array().map(|a| a.len()), Some(4));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
