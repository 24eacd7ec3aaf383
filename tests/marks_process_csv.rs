use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_coattaind");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .env_remove("COATTAIND_CONFIG")
        .spawn()
        .expect("spawn coattaind");
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
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
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
    value["result"].clone()
}

fn error_code(v: &serde_json::Value) -> Option<&str> {
    v.get("error")
        .and_then(|e| e.get("code"))
        .and_then(|c| c.as_str())
}

fn write_file(dir: &Path, name: &str, body: &str) -> String {
    let p = dir.join(name);
    std::fs::write(&p, body).expect("write fixture");
    p.to_string_lossy().to_string()
}

fn outcome<'a>(rows: &'a serde_json::Value, label: &str) -> &'a serde_json::Value {
    rows["outcomes"]
        .as_array()
        .expect("outcomes")
        .iter()
        .find(|o| o["label"] == json!(label))
        .unwrap_or_else(|| panic!("no outcome {}", label))
}

const SCENARIO_A: &str = "\
COs mapped,,\"1,2\",3
Maximum Marks,,10,10
USN,STUDENT NAME,Q1,Q2
1AB01,Asha,7,5
1AB02,Ravi,5,9
";

#[test]
fn csv_upload_yields_co_po_and_question_metrics() {
    let workspace = tempfile::tempdir().expect("temp dir");
    let source = write_file(workspace.path(), "ia1.csv", SCENARIO_A);
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );
    let result = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "marks.process",
        json!({
            "sourcePath": source,
            "subject": "21CS51",
            "subjectName": "Automata Theory",
            "evaluationType": "IA1",
            "section": "A",
            "semester": "5"
        }),
    );

    assert!(result["submissionId"].as_str().is_some_and(|s| !s.is_empty()));

    let metrics = result["questionMetrics"].as_array().expect("metrics");
    assert_eq!(metrics.len(), 2);
    assert_eq!(metrics[0]["questionId"], json!("Q1"));
    assert_eq!(metrics[0]["threshold"], json!(6.0));
    assert_eq!(metrics[0]["numAttempted"], json!(2));
    assert_eq!(metrics[0]["numAboveThreshold"], json!(1));
    assert_eq!(metrics[0]["attainment"], json!(50.0));
    assert_eq!(metrics[1]["questionId"], json!("Q2"));
    assert_eq!(metrics[1]["attainment"], json!(50.0));

    let co = &result["coData"];
    for label in ["1", "2", "3"] {
        let row = outcome(co, label);
        assert_eq!(row["overall"], json!(50.0), "CO {}", label);
        assert_eq!(row["theory"], json!(50.0), "CO {}", label);
        assert_eq!(row["lab"], json!(0.0), "CO {}", label);
    }
    assert_eq!(co["summary"]["averageAttainment"], json!(50.0));

    let po = &result["poData"];
    assert_eq!(outcome(po, "PO1")["overall"], json!(21.43));
    assert_eq!(outcome(po, "PO8")["overall"], json!(16.67));

    assert_eq!(result["summary"]["totalStudents"], json!(2));
    assert_eq!(result["summary"]["totalQuestions"], json!(2));
    assert_eq!(result["summary"]["subject"], json!("Automata Theory"));
    assert_eq!(result["summary"]["evaluation"], json!("IA1"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn blank_usn_rows_and_text_marks_are_skipped() {
    let workspace = tempfile::tempdir().expect("temp dir");
    let source = write_file(
        workspace.path(),
        "ia2.csv",
        "\
,,1,2
Maximum Marks,,10,10
USN,STUDENT NAME,Q1,Q2
1AB01,Asha,AB,8
,Nobody,9,9
1AB02,Ravi,7,ABS
",
    );
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );
    let result = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "marks.process",
        json!({ "sourcePath": source }),
    );

    assert_eq!(result["summary"]["totalStudents"], json!(2));
    let metrics = result["questionMetrics"].as_array().expect("metrics");
    // Q2 is seen first because the first student's Q1 cell is text.
    assert_eq!(metrics[0]["questionId"], json!("Q2"));
    assert_eq!(metrics[0]["numAttempted"], json!(1));
    assert_eq!(metrics[1]["questionId"], json!("Q1"));
    assert_eq!(metrics[1]["numAttempted"], json!(1));
    assert_eq!(metrics[1]["numAboveThreshold"], json!(1));

    let list = request_ok(&mut stdin, &mut reader, "3", "submissions.list", json!({}));
    let rows = list["submissions"].as_array().expect("submissions");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["studentCount"], json!(2));
    assert_eq!(rows[0]["markCount"], json!(2));
    assert_eq!(rows[0]["sourceName"], json!("ia2.csv"));
    assert_eq!(
        rows[0]["sourceSha256"].as_str().map(|s| s.len()),
        Some(64)
    );

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn stored_submission_recomputes_to_the_same_report() {
    let workspace = tempfile::tempdir().expect("temp dir");
    let source = write_file(workspace.path(), "ia1.csv", SCENARIO_A);
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );
    let processed = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "marks.process",
        json!({ "sourcePath": source, "subjectName": "Automata", "evaluationType": "IA1" }),
    );
    let id = processed["submissionId"].as_str().expect("id").to_string();

    let again = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "submissions.attainment",
        json!({ "submissionId": id }),
    );
    assert_eq!(again["coData"], processed["coData"]);
    assert_eq!(again["poData"], processed["poData"]);
    assert_eq!(again["questionMetrics"], processed["questionMetrics"]);
    assert_eq!(again["summary"], processed["summary"]);

    let missing = request(
        &mut stdin,
        &mut reader,
        "4",
        "submissions.attainment",
        json!({ "submissionId": "no-such-id" }),
    );
    assert_eq!(error_code(&missing), Some("not_found"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn extraction_failures_map_to_stable_codes() {
    let workspace = tempfile::tempdir().expect("temp dir");
    let no_max_row = write_file(
        workspace.path(),
        "broken.csv",
        "\
,,1
USN,STUDENT NAME,Q1
1AB01,Asha,4
",
    );
    let txt = write_file(workspace.path(), "marks.txt", SCENARIO_A);
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let before_workspace = request(
        &mut stdin,
        &mut reader,
        "0",
        "marks.process",
        json!({ "sourcePath": txt }),
    );
    assert_eq!(error_code(&before_workspace), Some("no_workspace"));

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );

    let unsupported = request(
        &mut stdin,
        &mut reader,
        "2",
        "marks.process",
        json!({ "sourcePath": txt }),
    );
    assert_eq!(error_code(&unsupported), Some("unsupported_format"));

    let anchor = request(
        &mut stdin,
        &mut reader,
        "3",
        "marks.process",
        json!({ "sourcePath": no_max_row }),
    );
    assert_eq!(error_code(&anchor), Some("anchor_not_found"));
    assert_eq!(anchor["error"]["details"]["anchor"], json!("max_marks_row"));

    let unreadable = request(
        &mut stdin,
        &mut reader,
        "4",
        "marks.process",
        json!({ "sourcePath": workspace.path().join("gone.csv").to_string_lossy() }),
    );
    assert_eq!(error_code(&unreadable), Some("read_error"));

    let missing_param = request(&mut stdin, &mut reader, "5", "marks.process", json!({}));
    assert_eq!(error_code(&missing_param), Some("bad_params"));

    let list = request_ok(&mut stdin, &mut reader, "6", "submissions.list", json!({}));
    assert_eq!(list["submissions"], json!([]), "failed uploads persist nothing");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn manual_mark_entry_validates_and_persists() {
    let workspace = tempfile::tempdir().expect("temp dir");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );

    let no_usn = request(
        &mut stdin,
        &mut reader,
        "2",
        "marks.submit",
        json!({ "subjectCode": "21CS51", "marks": 5 }),
    );
    assert_eq!(error_code(&no_usn), Some("bad_params"));

    let negative = request(
        &mut stdin,
        &mut reader,
        "3",
        "marks.submit",
        json!({ "studentUsn": "1AB01", "subjectCode": "21CS51", "marks": -2 }),
    );
    assert_eq!(error_code(&negative), Some("bad_params"));

    let saved = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "marks.submit",
        json!({ "studentUsn": "1AB01", "subjectCode": "21CS51", "marks": "17.5" }),
    );
    let id = saved["submissionId"].as_str().expect("id").to_string();

    let list = request_ok(&mut stdin, &mut reader, "5", "submissions.list", json!({}));
    let rows = list["submissions"].as_array().expect("submissions");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], json!(id));
    assert_eq!(rows[0]["subjectCode"], json!("21CS51"));
    assert_eq!(rows[0]["evaluationType"], json!("manual"));
    assert_eq!(rows[0]["markCount"], json!(1));
    assert_eq!(rows[0]["questionCount"], json!(0));

    let report = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "submissions.attainment",
        json!({ "submissionId": id }),
    );
    let metrics = report["questionMetrics"].as_array().expect("metrics");
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0]["questionId"], json!("TOTAL"));
    assert_eq!(report["coData"]["outcomes"], json!([]));

    drop(stdin);
    let _ = child.wait();
}
