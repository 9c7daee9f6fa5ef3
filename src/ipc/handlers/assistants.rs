use serde_json::json;
use uuid::Uuid;

use crate::defaults;
use crate::grading;
use crate::ipc::error::ok;
use crate::ipc::helpers::{get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::{Assistant, Contract};

fn trimmed_opt(v: Option<&serde_json::Value>) -> Option<String> {
    v.and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .and_then(|s| if s.is_empty() { None } else { Some(s) })
}

fn parse_string_list(v: &serde_json::Value, key: &str) -> Result<Vec<String>, HandlerErr> {
    let Some(items) = v.as_array() else {
        return Err(HandlerErr::bad_params(format!("{} must be an array", key)));
    };
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        let Some(s) = item.as_str() else {
            return Err(HandlerErr::bad_params(format!(
                "{} entries must be strings",
                key
            )));
        };
        let t = s.trim();
        if !t.is_empty() {
            out.push(t.to_string());
        }
    }
    Ok(out)
}

fn parse_contract(v: &serde_json::Value) -> Result<Contract, HandlerErr> {
    let Some(obj) = v.as_object() else {
        return Err(HandlerErr::bad_params("contract must be an object"));
    };

    let hourly_rate = match obj.get("hourlyRate") {
        None => None,
        Some(x) if x.is_null() => None,
        Some(x) => {
            let n = x
                .as_f64()
                .filter(|n| *n >= 0.0)
                .ok_or_else(|| {
                    HandlerErr::bad_params("contract.hourlyRate must be a non-negative number")
                })?;
            Some(n)
        }
    };
    let weekly_hours = match obj.get("weeklyHours") {
        None => None,
        Some(x) if x.is_null() => None,
        Some(x) => {
            let n = x
                .as_i64()
                .filter(|n| *n >= 0)
                .ok_or_else(|| {
                    HandlerErr::bad_params("contract.weeklyHours must be a non-negative integer")
                })?;
            Some(n)
        }
    };

    Ok(Contract {
        hourly_rate,
        weekly_hours,
        started_on: trimmed_opt(obj.get("startedOn")),
        ended_on: trimmed_opt(obj.get("endedOn")),
    })
}

fn check_class_ids(state: &AppState, class_ids: &[String]) -> Result<(), HandlerErr> {
    for class_id in class_ids {
        if state.classes.get(class_id).is_none() {
            return Err(HandlerErr::not_found("class not found")
                .with_details(json!({ "classId": class_id })));
        }
    }
    Ok(())
}

fn assistants_create(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?.trim().to_string();
    if name.is_empty() {
        return Err(HandlerErr::bad_params("name must not be empty"));
    }

    let subjects = match params.get("subjects") {
        None => None,
        Some(v) if v.is_null() => None,
        Some(v) => Some(parse_string_list(v, "subjects")?),
    };
    let class_ids = match params.get("classIds") {
        None => Vec::new(),
        Some(v) if v.is_null() => Vec::new(),
        Some(v) => parse_string_list(v, "classIds")?,
    };
    check_class_ids(state, &class_ids)?;

    let contract = match params.get("contract") {
        None => None,
        Some(v) if v.is_null() => None,
        Some(v) => Some(parse_contract(v)?),
    };

    let assistant_id = Uuid::new_v4().to_string();
    state.assistants.insert(Assistant {
        id: assistant_id.clone(),
        name,
        role: trimmed_opt(params.get("role")),
        subjects,
        contract,
        class_ids,
    });

    Ok(json!({ "assistantId": assistant_id }))
}

fn assistants_list(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let views: Vec<defaults::AssistantView> = state
        .assistants
        .list()
        .iter()
        .map(defaults::resolve_assistant)
        .collect();
    let assistants = serde_json::to_value(views)
        .map_err(|e| HandlerErr::new("encode_failed", e.to_string()))?;
    Ok(json!({ "assistants": assistants }))
}

fn assistants_update(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let assistant_id = get_required_str(params, "assistantId")?;
    let Some(patch) = params.get("patch").and_then(|v| v.as_object()) else {
        return Err(HandlerErr::bad_params("missing/invalid patch"));
    };

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

    let mut role: Option<Option<String>> = None;
    if let Some(v) = patch.get("role") {
        if v.is_null() {
            role = Some(None);
        } else if let Some(s) = v.as_str() {
            let t = s.trim();
            role = Some(if t.is_empty() { None } else { Some(t.to_string()) });
        } else {
            return Err(HandlerErr::bad_params("patch.role must be a string or null"));
        }
    }

    let mut subjects: Option<Option<Vec<String>>> = None;
    if let Some(v) = patch.get("subjects") {
        if v.is_null() {
            subjects = Some(None);
        } else {
            subjects = Some(Some(parse_string_list(v, "patch.subjects")?));
        }
    }

    let mut class_ids: Option<Vec<String>> = None;
    if let Some(v) = patch.get("classIds") {
        let ids = parse_string_list(v, "patch.classIds")?;
        check_class_ids(state, &ids)?;
        class_ids = Some(ids);
    }

    let mut contract: Option<Option<Contract>> = None;
    if let Some(v) = patch.get("contract") {
        if v.is_null() {
            contract = Some(None);
        } else {
            contract = Some(Some(parse_contract(v)?));
        }
    }

    let Some(assistant) = state.assistants.get_mut(&assistant_id) else {
        return Err(HandlerErr::not_found("assistant not found"));
    };
    if let Some(v) = name {
        assistant.name = v;
    }
    if let Some(v) = role {
        assistant.role = v;
    }
    if let Some(v) = subjects {
        assistant.subjects = v;
    }
    if let Some(v) = class_ids {
        assistant.class_ids = v;
    }
    if let Some(v) = contract {
        assistant.contract = v;
    }

    Ok(json!({ "ok": true }))
}

fn assistants_profile_model(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let assistant_id = get_required_str(params, "assistantId")?;
    let Some(assistant) = state.assistants.get(&assistant_id) else {
        return Err(HandlerErr::not_found("assistant not found"));
    };

    let view = defaults::resolve_assistant(assistant);
    let weekly_pay =
        grading::round1(view.contract.hourly_rate * view.contract.weekly_hours as f64);

    let classes: Vec<serde_json::Value> = view
        .class_ids
        .iter()
        .filter_map(|class_id| state.classes.get(class_id))
        .map(|c| {
            json!({
                "id": c.id,
                "name": c.name,
                "studentCount": state.students.roster(&c.id).len()
            })
        })
        .collect();

    let mut payload = serde_json::to_value(&view)
        .map_err(|e| HandlerErr::new("encode_failed", e.to_string()))?;
    if let Some(obj) = payload.as_object_mut() {
        obj.insert("classes".to_string(), json!(classes));
        obj.insert("weeklyPay".to_string(), json!(weekly_pay));
    }
    Ok(payload)
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
        "assistants.create" => Some(respond(req, assistants_create(state, &req.params))),
        "assistants.list" => Some(respond(req, assistants_list(state))),
        "assistants.update" => Some(respond(req, assistants_update(state, &req.params))),
        "assistants.profileModel" => {
            Some(respond(req, assistants_profile_model(state, &req.params)))
        }
        _ => None,
    }
}
