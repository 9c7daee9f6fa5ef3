use crate::ipc::error::ok;
use crate::ipc::helpers::{get_optional_bool, get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::Student;
use serde_json::json;
use uuid::Uuid;

fn student_json(s: &Student) -> serde_json::Value {
    json!({
        "id": s.id,
        "classId": s.class_id,
        "name": s.name,
        "school": s.school,
        "gradeLabel": s.grade_label,
        "phone": s.phone,
        "active": s.active,
        "sortOrder": s.sort_order
    })
}

fn trimmed_opt(v: Option<&serde_json::Value>) -> Option<String> {
    v.and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .and_then(|s| if s.is_empty() { None } else { Some(s) })
}

/// Patch value for an optional text field: null and blank both clear it.
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

fn students_create(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let name = get_required_str(params, "name")?.trim().to_string();
    if name.is_empty() {
        return Err(HandlerErr::bad_params("name must not be empty"));
    }
    if state.classes.get(&class_id).is_none() {
        return Err(HandlerErr::not_found("class not found"));
    }

    let school = trimmed_opt(params.get("school"));
    let grade_label = trimmed_opt(params.get("gradeLabel"));
    let phone = trimmed_opt(params.get("phone"));
    let active = get_optional_bool(params, "active")?.unwrap_or(true);

    let sort_order = state.students.next_sort_order(&class_id);
    let student_id = Uuid::new_v4().to_string();
    state.students.insert(Student {
        id: student_id.clone(),
        class_id,
        name,
        school,
        grade_label,
        phone,
        active,
        sort_order,
    });

    Ok(json!({ "studentId": student_id }))
}

fn students_list(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let students: Vec<serde_json::Value> = state
        .students
        .roster(&class_id)
        .iter()
        .map(|s| student_json(s))
        .collect();
    Ok(json!({ "students": students }))
}

fn students_update(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let Some(patch) = params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("missing/invalid patch"));
    };

    // Validate the whole patch before touching the record.
    let mut name: Option<String> = None;
    if let Some(v) = patch.get("name") {
        let Some(s) = v.as_str() else {
            return Err(HandlerErr::bad_params("patch.name must be a string"));
        };
        let s = s.trim().to_string();
        if s.is_empty() {
            return Err(HandlerErr::bad_params("name must not be empty"));
        }
        name = Some(s);
    }
    let school = match patch.get("school") {
        Some(v) => Some(nullable_text(v, "school")?),
        None => None,
    };
    let grade_label = match patch.get("gradeLabel") {
        Some(v) => Some(nullable_text(v, "gradeLabel")?),
        None => None,
    };
    let phone = match patch.get("phone") {
        Some(v) => Some(nullable_text(v, "phone")?),
        None => None,
    };
    let mut active: Option<bool> = None;
    if let Some(v) = patch.get("active") {
        let Some(b) = v.as_bool() else {
            return Err(HandlerErr::bad_params("patch.active must be a boolean"));
        };
        active = Some(b);
    }
    let mut sort_order: Option<i64> = None;
    if let Some(v) = patch.get("sortOrder") {
        let Some(n) = v.as_i64() else {
            return Err(HandlerErr::bad_params("patch.sortOrder must be an integer"));
        };
        sort_order = Some(n);
    }

    let Some(student) = state.students.get_mut(&student_id) else {
        return Err(HandlerErr::not_found("student not found"));
    };
    if let Some(v) = name {
        student.name = v;
    }
    if let Some(v) = school {
        student.school = v;
    }
    if let Some(v) = grade_label {
        student.grade_label = v;
    }
    if let Some(v) = phone {
        student.phone = v;
    }
    if let Some(v) = active {
        student.active = v;
    }
    if let Some(v) = sort_order {
        student.sort_order = v;
    }

    Ok(json!({ "ok": true }))
}

fn students_delete(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    if !state.students.remove(&student_id) {
        return Err(HandlerErr::not_found("student not found"));
    }
    state.results.remove_student(&student_id);
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
        "students.create" => Some(respond(req, students_create(state, &req.params))),
        "students.list" => Some(respond(req, students_list(state, &req.params))),
        "students.update" => Some(respond(req, students_update(state, &req.params))),
        "students.delete" => Some(respond(req, students_delete(state, &req.params))),
        _ => None,
    }
}
