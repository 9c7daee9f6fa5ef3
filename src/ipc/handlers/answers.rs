use crate::flow::ResultPhase;
use crate::grading;
use crate::ipc::error::ok;
use crate::ipc::helpers::{get_required_str, get_required_u32, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::AnswerMap;
use serde_json::json;

const BULK_SET_MAX_EDITS: usize = 5000;

fn locked_err(student_id: &str) -> HandlerErr {
    HandlerErr::new("locked", "result sheet is finalized")
        .with_details(json!({ "studentId": student_id }))
}

/// Submitted answer for one question: null clears the entry, a string
/// is stored raw. Matching happens later, at scoring time.
fn parse_answer_value(v: Option<&serde_json::Value>) -> Result<Option<String>, HandlerErr> {
    match v {
        None => Err(HandlerErr::bad_params("missing answer")),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or_else(|| HandlerErr::bad_params("answer must be a string or null")),
    }
}

/// Full answer sheet as a JSON object keyed by question number.
fn parse_answer_map(v: &serde_json::Value) -> Result<AnswerMap, HandlerErr> {
    let Some(obj) = v.as_object() else {
        return Err(HandlerErr::bad_params("answers must be an object"));
    };
    let mut map = AnswerMap::new();
    for (key, value) in obj {
        let number: u32 = key
            .parse()
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| {
                HandlerErr::bad_params(format!("answers key {:?} is not a question number", key))
            })?;
        let Some(s) = value.as_str() else {
            return Err(HandlerErr::bad_params(format!(
                "answers[{:?}] must be a string",
                key
            )));
        };
        map.insert(number, s.to_string());
    }
    Ok(map)
}

fn answers_set(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let exam_id = get_required_str(params, "examId")?;
    let student_id = get_required_str(params, "studentId")?;
    let question = get_required_u32(params, "question")?;
    let answer = parse_answer_value(params.get("answer"))?;

    let Some(exam) = state.exams.get(&exam_id) else {
        return Err(HandlerErr::not_found("exam not found"));
    };

    let prior = state.results.get(&exam_id, &student_id);
    if prior.map(|r| r.locked).unwrap_or(false) {
        return Err(locked_err(&student_id));
    }

    let mut answers = prior.map(|r| r.answers.clone()).unwrap_or_default();
    match answer {
        Some(a) => {
            answers.insert(question, a);
        }
        None => {
            answers.remove(&question);
        }
    }

    let score = grading::calculate_score(&exam.questions, &answers);
    state
        .results
        .upsert_result(&exam_id, &student_id, answers, score, None);

    Ok(json!({ "ok": true, "score": score }))
}

fn answers_bulk_set(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let exam_id = get_required_str(params, "examId")?;
    let Some(edits_arr) = params.get("edits").and_then(|v| v.as_array()) else {
        return Err(HandlerErr::bad_params("missing edits[]"));
    };
    if state.exams.get(&exam_id).is_none() {
        return Err(HandlerErr::not_found("exam not found"));
    }

    if edits_arr.len() > BULK_SET_MAX_EDITS {
        let rejected = edits_arr.len();
        return Ok(json!({
            "ok": true,
            "updated": 0,
            "rejected": rejected,
            "limitExceeded": true,
            "errors": [{
                "index": -1,
                "code": "too_many_edits",
                "message": format!(
                    "bulk payload exceeds max edits: {} > {}",
                    rejected, BULK_SET_MAX_EDITS
                )
            }]
        }));
    }

    let mut updated: usize = 0;
    let mut errors: Vec<serde_json::Value> = Vec::new();

    for (i, edit) in edits_arr.iter().enumerate() {
        let Some(obj) = edit.as_object() else {
            errors.push(json!({
                "index": i,
                "code": "bad_params",
                "message": format!("edit at index {} must be an object", i),
            }));
            continue;
        };

        let student_id = match obj.get("studentId").and_then(|v| v.as_str()) {
            Some(v) => v.to_string(),
            None => {
                errors.push(json!({
                    "index": i,
                    "code": "bad_params",
                    "message": format!("edit at index {} missing studentId", i),
                }));
                continue;
            }
        };
        let question = match obj
            .get("question")
            .and_then(|v| v.as_u64())
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n >= 1)
        {
            Some(v) => v,
            None => {
                errors.push(json!({
                    "index": i,
                    "studentId": student_id,
                    "code": "bad_params",
                    "message": format!("edit at index {} missing/invalid question", i),
                }));
                continue;
            }
        };
        let answer = match parse_answer_value(obj.get("answer")) {
            Ok(v) => v,
            Err(e) => {
                errors.push(json!({
                    "index": i,
                    "studentId": student_id,
                    "code": e.code,
                    "message": e.message,
                }));
                continue;
            }
        };

        let prior = state.results.get(&exam_id, &student_id);
        if prior.map(|r| r.locked).unwrap_or(false) {
            let e = locked_err(&student_id);
            errors.push(json!({
                "index": i,
                "studentId": student_id,
                "code": e.code,
                "message": e.message,
            }));
            continue;
        }

        let mut answers = prior.map(|r| r.answers.clone()).unwrap_or_default();
        match answer {
            Some(a) => {
                answers.insert(question, a);
            }
            None => {
                answers.remove(&question);
            }
        }

        let questions = state
            .exams
            .get(&exam_id)
            .map(|e| e.questions.as_slice())
            .unwrap_or_default();
        let score = grading::calculate_score(questions, &answers);
        state
            .results
            .upsert_result(&exam_id, &student_id, answers, score, None);
        updated += 1;
    }

    let rejected = errors.len();
    let mut result = json!({ "ok": true, "updated": updated });
    if rejected > 0 {
        if let Some(obj) = result.as_object_mut() {
            obj.insert("rejected".into(), json!(rejected));
            obj.insert("errors".into(), json!(errors));
        }
    }
    Ok(result)
}

/// Without a studentId this reads exam-wide: the whole store projection
/// keyed by student. With one it reads a single sheet plus its phase.
fn results_get(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let exam_id = get_required_str(params, "examId")?;
    if state.exams.get(&exam_id).is_none() {
        return Err(HandlerErr::not_found("exam not found"));
    }

    let Some(student_id) = params.get("studentId").and_then(|v| v.as_str()) else {
        let mut results = serde_json::Map::new();
        for (student_id, r) in state.results.exam_results(&exam_id) {
            let record = serde_json::to_value(r)
                .map_err(|e| HandlerErr::new("encode_failed", e.to_string()))?;
            results.insert(student_id.to_string(), record);
        }
        return Ok(json!({ "results": results }));
    };

    match state.results.get(&exam_id, student_id) {
        None => Ok(json!({
            "result": null,
            "phase": ResultPhase::Editable.as_str()
        })),
        Some(r) => {
            let record = serde_json::to_value(r)
                .map_err(|e| HandlerErr::new("encode_failed", e.to_string()))?;
            Ok(json!({
                "result": record,
                "phase": ResultPhase::from_locked(r.locked).as_str()
            }))
        }
    }
}

/// Save finalizes the sheet. A finalized sheet must be reopened through
/// results.edit before it accepts another save.
fn results_save(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let exam_id = get_required_str(params, "examId")?;
    let student_id = get_required_str(params, "studentId")?;

    let Some(exam) = state.exams.get(&exam_id) else {
        return Err(HandlerErr::not_found("exam not found"));
    };

    let prior = state.results.get(&exam_id, &student_id);
    let phase = ResultPhase::from_locked(prior.map(|r| r.locked).unwrap_or(false));
    if !phase.can_edit() {
        return Err(locked_err(&student_id));
    }

    let answers = match params.get("answers") {
        Some(v) => parse_answer_map(v)?,
        None => prior.map(|r| r.answers.clone()).unwrap_or_default(),
    };

    let score = grading::calculate_score(&exam.questions, &answers);
    let saved = phase.save();
    state
        .results
        .upsert_result(&exam_id, &student_id, answers, score, Some(saved.locked()));

    Ok(json!({
        "ok": true,
        "score": score,
        "phase": saved.as_str()
    }))
}

fn results_edit(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let exam_id = get_required_str(params, "examId")?;
    let student_id = get_required_str(params, "studentId")?;
    if state.exams.get(&exam_id).is_none() {
        return Err(HandlerErr::not_found("exam not found"));
    }

    let phase = ResultPhase::from_locked(
        state
            .results
            .get(&exam_id, &student_id)
            .map(|r| r.locked)
            .unwrap_or(false),
    );
    let reopened = phase.reopen();
    state
        .results
        .set_locked(&exam_id, &student_id, reopened.locked());

    Ok(json!({ "ok": true, "phase": reopened.as_str() }))
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
        "answers.set" => Some(respond(req, answers_set(state, &req.params))),
        "answers.bulkSet" => Some(respond(req, answers_bulk_set(state, &req.params))),
        "results.get" => Some(respond(req, results_get(state, &req.params))),
        "results.save" => Some(respond(req, results_save(state, &req.params))),
        "results.edit" => Some(respond(req, results_edit(state, &req.params))),
        _ => None,
    }
}
