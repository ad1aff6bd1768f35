#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub const OWNER: &str = "teacher-1";

pub fn temp_dir(prefix: &str) -> PathBuf {
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

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_pacingd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn pacingd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
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

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

/// Returns the error code of a response that must have failed.
pub fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value
        .pointer("/error/code")
        .and_then(|v| v.as_str())
        .expect("error code")
        .to_string()
}

pub const SAMPLE_CSV: &str = "\
provider,class_code,class_name,sequence_index,lesson_code,title,objective,standards
OpenSci,BIO-9,Biology 9,1,L1,Cells,Identify cell parts.,NGSS.LS1.A; NGSS.LS1.B
OpenSci,BIO-9,Biology 9,2,L2,Membranes,,NGSS.LS1.A
OpenSci,BIO-9,Biology 9,3,L3,Mitosis,Describe mitosis.,
";

pub fn write_csv(dir: &Path, text: &str) -> PathBuf {
    let path = dir.join("lessons.csv");
    std::fs::write(&path, text).expect("write csv");
    path
}

/// Selects a fresh workspace, imports `SAMPLE_CSV` and returns the library id.
pub fn workspace_with_library(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &Path,
) -> String {
    let _ = request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let csv = write_csv(workspace, SAMPLE_CSV);
    let _ = request_ok(
        stdin,
        reader,
        "import",
        "curriculum.importCsv",
        json!({ "path": csv.to_string_lossy() }),
    );
    let libs = request_ok(stdin, reader, "libs", "libraries.list", json!({}));
    libs.pointer("/libraries/0/id")
        .and_then(|v| v.as_str())
        .expect("library id")
        .to_string()
}

pub fn create_course(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    library_id: &str,
    extra: serde_json::Value,
) -> String {
    let mut params = json!({
        "actorId": OWNER,
        "libraryId": library_id,
        "scheduleModel": "every_day",
        "schoolYearStart": "2024-09-02",
        "schoolYearEnd": "2024-09-06",
    });
    if let (Some(obj), Some(extra)) = (params.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            obj.insert(k.clone(), v.clone());
        }
    }
    let created = request_ok(stdin, reader, "course", "courses.create", params);
    created
        .get("courseId")
        .and_then(|v| v.as_str())
        .expect("courseId")
        .to_string()
}
