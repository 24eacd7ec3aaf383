use crate::attainment::{self, AttainmentReport};
use crate::db::{self, SubmissionMeta};
use crate::extract::{self, Extraction, Mark, Student};
use crate::ipc::error::{err, extract_err, ok};
use crate::ipc::helpers::{db_conn, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::upload::{StageError, StagedUpload};
use serde_json::json;
use std::path::Path;

fn submission_meta(req: &Request) -> SubmissionMeta {
    SubmissionMeta {
        subject_code: optional_str(req, "subject"),
        subject_name: optional_str(req, "subjectName"),
        evaluation_type: optional_str(req, "evaluationType"),
        batch_id: optional_str(req, "batchId"),
        section: optional_str(req, "section"),
        semester: optional_str(req, "semester"),
        academic_year: optional_str(req, "academicYear"),
        source_name: None,
        source_sha256: None,
    }
}

pub fn report_json(
    report: &AttainmentReport,
    data: &Extraction,
    subject: &str,
    evaluation: &str,
) -> serde_json::Value {
    json!({
        "coData": report.co_data,
        "poData": report.po_data,
        "questionMetrics": report.question_metrics,
        "summary": {
            "totalStudents": data.students.len(),
            "totalQuestions": data.questions.len(),
            "subject": subject,
            "evaluation": evaluation
        }
    })
}

fn handle_marks_process(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let source_path = match required_str(req, "sourcePath") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let file_name = match optional_str(req, "fileName") {
        n if !n.is_empty() => n,
        _ => Path::new(&source_path)
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string(),
    };
    if file_name.is_empty() {
        return err(&req.id, "bad_params", "no file selected", None);
    }

    let staged = match StagedUpload::from_path(&file_name, Path::new(&source_path)) {
        Ok(v) => v,
        Err(StageError::Extract(e)) => {
            log::warn!("rejected upload {:?}: {}", file_name, e);
            return extract_err(&req.id, &e);
        }
        Err(StageError::Io(e)) => {
            return err(
                &req.id,
                "read_error",
                format!("{e:#}"),
                Some(json!({ "sourcePath": source_path })),
            )
        }
    };

    log::debug!(
        "staged {:?} ({} bytes, {})",
        file_name,
        staged.byte_len,
        staged.format.as_str()
    );
    let sheets = match staged.read_sheets() {
        Ok(v) => v,
        Err(e) => {
            log::warn!("failed to read {:?}: {}", file_name, e);
            return extract_err(&req.id, &e);
        }
    };
    let mut meta = submission_meta(req);
    meta.source_name = Some(file_name.clone());
    meta.source_sha256 = Some(staged.sha256.clone());
    drop(staged);

    let data = match extract::extract_workbook(&sheets, &state.config.layout) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("failed to extract {:?}: {}", file_name, e);
            return extract_err(&req.id, &e);
        }
    };

    let submission_id = match db::insert_submission(conn, &meta, &data) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_insert_failed", format!("{e:#}"), None),
    };

    let report = attainment::compute(&data, &state.config);
    log::info!(
        "submission {} from {:?}: {} students, {} marks, {} questions",
        submission_id,
        file_name,
        data.students.len(),
        data.marks.len(),
        data.questions.len()
    );

    let mut result = report_json(&report, &data, &meta.subject_name, &meta.evaluation_type);
    result["submissionId"] = json!(submission_id);
    ok(&req.id, result)
}

fn handle_marks_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let usn = optional_str(req, "studentUsn");
    if usn.is_empty() {
        return err(&req.id, "bad_params", "missing studentUsn", None);
    }
    let subject_code = optional_str(req, "subjectCode");
    if subject_code.is_empty() {
        return err(&req.id, "bad_params", "missing subjectCode", None);
    }
    let question_id = match optional_str(req, "questionId") {
        q if q.is_empty() => "TOTAL".to_string(),
        q => q,
    };
    let mark = match req.params.get("marks") {
        Some(v) => v
            .as_f64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse::<f64>().ok())),
        None => None,
    };
    let Some(mark) = mark.filter(|m| m.is_finite() && *m >= 0.0) else {
        return err(
            &req.id,
            "bad_params",
            "marks must be a non-negative number",
            None,
        );
    };

    let meta = SubmissionMeta {
        subject_code,
        evaluation_type: "manual".to_string(),
        ..SubmissionMeta::default()
    };
    let data = Extraction {
        students: vec![Student {
            usn: usn.clone(),
            name: String::new(),
        }],
        marks: vec![Mark {
            usn,
            question_id,
            mark,
        }],
        questions: Vec::new(),
    };

    match db::insert_submission(conn, &meta, &data) {
        Ok(id) => ok(&req.id, json!({ "submissionId": id })),
        Err(e) => err(&req.id, "db_insert_failed", format!("{e:#}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "marks.process" => Some(handle_marks_process(state, req)),
        "marks.submit" => Some(handle_marks_submit(state, req)),
        _ => None,
    }
}
