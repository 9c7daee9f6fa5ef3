use crate::defaults;
use crate::grading;
use crate::ipc::error::ok;
use crate::ipc::helpers::{get_optional_f64, get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::{Exam, ExamStatus, Question};
use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;

fn trimmed_opt(v: Option<&serde_json::Value>) -> Option<String> {
    v.and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .and_then(|s| if s.is_empty() { None } else { Some(s) })
}

fn parse_status(s: &str) -> Result<ExamStatus, HandlerErr> {
    ExamStatus::parse(s)
        .ok_or_else(|| HandlerErr::bad_params("status must be drafted or graded"))
}

fn validated_date(date: Option<String>) -> Result<Option<String>, HandlerErr> {
    if let Some(d) = &date {
        if NaiveDate::parse_from_str(d, "%Y-%m-%d").is_err() {
            return Err(HandlerErr::bad_params("date must be a YYYY-MM-DD date"));
        }
    }
    Ok(date)
}

/// Parse and validate a full question sheet. Ordinals are assigned from
/// list position, 1-based; any client-sent numbering is ignored.
fn parse_questions(v: &serde_json::Value) -> Result<Vec<Question>, HandlerErr> {
    let Some(items) = v.as_array() else {
        return Err(HandlerErr::bad_params("questions must be an array"));
    };

    let mut questions = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let points = item
            .get("points")
            .and_then(|v| v.as_f64())
            .filter(|p| *p >= 0.0)
            .ok_or_else(|| {
                HandlerErr::bad_params(format!("questions[{}] missing points", i))
            })?;
        let answer = item
            .get("answer")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.to_string())
            .ok_or_else(|| {
                HandlerErr::bad_params(format!("questions[{}] missing answer", i))
            })?;

        let choices = match item.get("choices") {
            None => None,
            Some(v) if v.is_null() => None,
            Some(v) => {
                let n = v
                    .as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .filter(|n| (1..=26).contains(n))
                    .ok_or_else(|| {
                        HandlerErr::bad_params(format!(
                            "questions[{}] choices must be between 1 and 26",
                            i
                        ))
                    })?;
                Some(n)
            }
        };

        questions.push(Question {
            number: (i + 1) as u32,
            label: trimmed_opt(item.get("label")),
            kind: trimmed_opt(item.get("kind")),
            points,
            answer,
            choices,
        });
    }
    Ok(questions)
}

fn exam_summary_json(exam: &Exam) -> serde_json::Value {
    let view = defaults::resolve_exam(exam);
    json!({
        "id": view.id,
        "classId": view.class_id,
        "title": view.title,
        "examType": view.exam_type,
        "source": view.source,
        "passScore": view.pass_score,
        "date": view.date,
        "status": view.status,
        "totalQuestions": view.total_questions,
        "totalPoints": view.total_points
    })
}

fn exams_create(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let title = get_required_str(params, "title")?.trim().to_string();
    if title.is_empty() {
        return Err(HandlerErr::bad_params("title must not be empty"));
    }
    if state.classes.get(&class_id).is_none() {
        return Err(HandlerErr::not_found("class not found"));
    }

    let questions = match params.get("questions") {
        Some(v) => parse_questions(v)?,
        None => Vec::new(),
    };
    let status = match params.get("status").and_then(|v| v.as_str()) {
        Some(s) => parse_status(s)?,
        None => ExamStatus::Drafted,
    };

    let exam_id = Uuid::new_v4().to_string();
    state.exams.insert(Exam {
        id: exam_id.clone(),
        class_id,
        title,
        exam_type: trimmed_opt(params.get("examType")),
        source: trimmed_opt(params.get("source")),
        pass_score: get_optional_f64(params, "passScore")?,
        date: validated_date(trimmed_opt(params.get("date")))?,
        status,
        questions,
    });

    Ok(json!({ "examId": exam_id }))
}

fn exams_list(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = params
        .get("classId")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());
    let status = match params.get("status").and_then(|v| v.as_str()) {
        Some(s) => Some(parse_status(s)?),
        None => None,
    };

    let exams: Vec<serde_json::Value> = state
        .exams
        .list(class_id.as_deref(), status)
        .iter()
        .map(|e| exam_summary_json(e))
        .collect();
    Ok(json!({ "exams": exams }))
}

fn exams_get(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let exam_id = get_required_str(params, "examId")?;
    let Some(exam) = state.exams.get(&exam_id) else {
        return Err(HandlerErr::not_found("exam not found"));
    };
    serde_json::to_value(defaults::resolve_exam(exam))
        .map_err(|e| HandlerErr::new("encode_failed", e.to_string()))
}

fn exams_update(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let exam_id = get_required_str(params, "examId")?;
    let Some(patch) = params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("missing/invalid patch"));
    };

    let mut title: Option<String> = None;
    if let Some(v) = patch.get("title") {
        let Some(s) = v.as_str() else {
            return Err(HandlerErr::bad_params("patch.title must be a string"));
        };
        let s = s.trim().to_string();
        if s.is_empty() {
            return Err(HandlerErr::bad_params("title must not be empty"));
        }
        title = Some(s);
    }

    let mut exam_type: Option<Option<String>> = None;
    if let Some(v) = patch.get("examType") {
        exam_type = Some(nullable_text(v, "examType")?);
    }
    let mut source: Option<Option<String>> = None;
    if let Some(v) = patch.get("source") {
        source = Some(nullable_text(v, "source")?);
    }
    let mut date: Option<Option<String>> = None;
    if let Some(v) = patch.get("date") {
        date = Some(validated_date(nullable_text(v, "date")?)?);
    }
    let mut pass_score: Option<Option<f64>> = None;
    if let Some(v) = patch.get("passScore") {
        if v.is_null() {
            pass_score = Some(None);
        } else {
            let Some(n) = v.as_f64() else {
                return Err(HandlerErr::bad_params(
                    "patch.passScore must be a number or null",
                ));
            };
            pass_score = Some(Some(n));
        }
    }

    let Some(exam) = state.exams.get_mut(&exam_id) else {
        return Err(HandlerErr::not_found("exam not found"));
    };
    if let Some(v) = title {
        exam.title = v;
    }
    if let Some(v) = exam_type {
        exam.exam_type = v;
    }
    if let Some(v) = source {
        exam.source = v;
    }
    if let Some(v) = date {
        exam.date = v;
    }
    if let Some(v) = pass_score {
        exam.pass_score = v;
    }

    Ok(json!({ "ok": true }))
}

fn nullable_text(v: &serde_json::Value, key: &str) -> Result<Option<String>, HandlerErr> {
    if v.is_null() {
        return Ok(None);
    }
    let Some(s) = v.as_str() else {
        return Err(HandlerErr::bad_params(format!(
            "patch.{} must be a string or null",
            key
        )));
    };
    let t = s.trim();
    Ok(if t.is_empty() { None } else { Some(t.to_string()) })
}

/// Replace the whole question sheet and rescore every stored result so
/// scores never drift from the current key.
fn exams_update_questions(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let exam_id = get_required_str(params, "examId")?;
    let questions = match params.get("questions") {
        Some(v) => parse_questions(v)?,
        None => return Err(HandlerErr::bad_params("missing questions")),
    };

    let Some(exam) = state.exams.get_mut(&exam_id) else {
        return Err(HandlerErr::not_found("exam not found"));
    };
    exam.questions = questions;
    let questions = exam.questions.clone();
    let rescored = state
        .results
        .rescore_exam(&exam_id, |answers| {
            grading::calculate_score(&questions, answers)
        });

    Ok(json!({ "ok": true, "rescored": rescored }))
}

fn exams_set_status(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let exam_id = get_required_str(params, "examId")?;
    let status = parse_status(&get_required_str(params, "status")?)?;

    let Some(exam) = state.exams.get_mut(&exam_id) else {
        return Err(HandlerErr::not_found("exam not found"));
    };
    exam.status = status;
    Ok(json!({ "ok": true, "status": status.as_str() }))
}

fn exams_delete(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let exam_id = get_required_str(params, "examId")?;
    if !state.exams.remove(&exam_id) {
        return Err(HandlerErr::not_found("exam not found"));
    }
    state.results.remove_exam(&exam_id);
    Ok(json!({ "ok": true }))
}

fn respond(
    req: &Request,
    result: Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    match result {
        Ok(value) => ok(&req.id, value),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "exams.create" => Some(respond(req, exams_create(state, &req.params))),
        "exams.list" => Some(respond(req, exams_list(state, &req.params))),
        "exams.get" => Some(respond(req, exams_get(state, &req.params))),
        "exams.update" => Some(respond(req, exams_update(state, &req.params))),
        "exams.updateQuestions" => {
            Some(respond(req, exams_update_questions(state, &req.params)))
        }
        "exams.setStatus" => Some(respond(req, exams_set_status(state, &req.params))),
        "exams.delete" => Some(respond(req, exams_delete(state, &req.params))),
        _ => None,
    }
}
