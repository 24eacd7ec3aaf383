use crate::attainment;
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::marks::report_json;
use crate::ipc::helpers::{db_conn, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

const DEFAULT_LIST_LIMIT: i64 = 100;

fn handle_submissions_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let limit = match req.params.get("limit") {
        None => DEFAULT_LIST_LIMIT,
        Some(v) if v.is_null() => DEFAULT_LIST_LIMIT,
        Some(v) => match v.as_i64() {
            Some(n) if n > 0 => n,
            _ => return err(&req.id, "bad_params", "limit must be a positive integer", None),
        },
    };

    match db::list_submissions(conn, limit) {
        Ok(rows) => ok(&req.id, json!({ "submissions": rows })),
        Err(e) => err(&req.id, "db_query_failed", format!("{e:#}"), None),
    }
}

fn handle_submissions_attainment(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let submission_id = match required_str(req, "submissionId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let submission = match db::get_submission(conn, &submission_id) {
        Ok(Some(v)) => v,
        Ok(None) => {
            return err(
                &req.id,
                "not_found",
                "submission not found",
                Some(json!({ "submissionId": submission_id })),
            )
        }
        Err(e) => return err(&req.id, "db_query_failed", format!("{e:#}"), None),
    };

    let data = match db::load_extraction(conn, &submission_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", format!("{e:#}"), None),
    };
    let report = attainment::compute(&data, &state.config);

    let mut result = report_json(
        &report,
        &data,
        &submission.subject_name,
        &submission.evaluation_type,
    );
    result["submissionId"] = json!(submission_id);
    ok(&req.id, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "submissions.list" => Some(handle_submissions_list(state, req)),
        "submissions.attainment" => Some(handle_submissions_attainment(state, req)),
        _ => None,
    }
}
