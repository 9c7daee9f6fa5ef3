use chrono::{DateTime, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::flow::InquiryStatus;
use crate::ipc::error::ok;
use crate::ipc::helpers::{get_required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::store::{Inquiry, InquiryMessage};

fn trimmed_opt(v: Option<&serde_json::Value>) -> Option<String> {
    v.and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .and_then(|s| if s.is_empty() { None } else { Some(s) })
}

fn parse_status(s: &str) -> Result<InquiryStatus, HandlerErr> {
    InquiryStatus::parse(s)
        .ok_or_else(|| HandlerErr::bad_params("status must be one of: open, answered, closed"))
}

fn parse_message(
    v: &serde_json::Value,
    created_at: DateTime<Utc>,
) -> Result<InquiryMessage, HandlerErr> {
    let author = v
        .get("author")
        .and_then(|x| x.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params("missing author"))?;
    let body = v
        .get("body")
        .and_then(|x| x.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr::bad_params("missing body"))?;
    let staff = v.get("staff").and_then(|x| x.as_bool()).unwrap_or(false);
    Ok(InquiryMessage {
        author,
        staff,
        body,
        created_at,
    })
}

fn message_json(m: &InquiryMessage) -> serde_json::Value {
    json!({
        "author": m.author,
        "staff": m.staff,
        "body": m.body,
        "createdAt": m.created_at.to_rfc3339()
    })
}

fn summary_json(i: &Inquiry) -> serde_json::Value {
    json!({
        "id": i.id,
        "classId": i.class_id,
        "studentId": i.student_id,
        "title": i.title,
        "status": i.status.as_str(),
        "messageCount": i.messages.len(),
        "lastMessageAt": i.messages.last().map(|m| m.created_at.to_rfc3339())
    })
}

fn inquiries_create(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let title = get_required_str(params, "title")?.trim().to_string();
    if title.is_empty() {
        return Err(HandlerErr::bad_params("title must not be empty"));
    }
    let class_id = trimmed_opt(params.get("classId"));
    if let Some(ref c) = class_id {
        if state.classes.get(c).is_none() {
            return Err(HandlerErr::not_found("class not found"));
        }
    }
    let student_id = trimmed_opt(params.get("studentId"));
    if let Some(ref s) = student_id {
        if state.students.get(s).is_none() {
            return Err(HandlerErr::not_found("student not found"));
        }
    }

    let mut messages = Vec::new();
    if let Some(m) = params.get("message") {
        if !m.is_null() {
            messages.push(parse_message(m, state.clock.now())?);
        }
    }

    let inquiry_id = Uuid::new_v4().to_string();
    state.inquiries.insert(Inquiry {
        id: inquiry_id.clone(),
        class_id,
        student_id,
        title,
        status: InquiryStatus::Open,
        messages,
    });

    Ok(json!({
        "inquiryId": inquiry_id,
        "status": InquiryStatus::Open.as_str()
    }))
}

fn inquiries_list(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let status = match params.get("status").and_then(|v| v.as_str()) {
        Some(s) => Some(parse_status(s)?),
        None => None,
    };
    let class_id = params
        .get("classId")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let inquiries: Vec<serde_json::Value> = state
        .inquiries
        .list(status)
        .iter()
        .filter(|i| match class_id.as_deref() {
            Some(c) => i.class_id.as_deref() == Some(c),
            None => true,
        })
        .map(|i| summary_json(i))
        .collect();

    Ok(json!({ "inquiries": inquiries }))
}

fn inquiries_open(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let inquiry_id = get_required_str(params, "inquiryId")?;
    let Some(inquiry) = state.inquiries.get(&inquiry_id) else {
        return Err(HandlerErr::not_found("inquiry not found"));
    };

    let messages: Vec<serde_json::Value> =
        inquiry.messages.iter().map(message_json).collect();
    let mut payload = summary_json(inquiry);
    if let Some(obj) = payload.as_object_mut() {
        obj.insert("messages".to_string(), json!(messages));
    }
    Ok(payload)
}

/// Append a message. A staff reply flips an open thread to answered;
/// closed threads reject replies outright.
fn inquiries_reply(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let inquiry_id = get_required_str(params, "inquiryId")?;
    let message = parse_message(params, state.clock.now())?;

    let Some(inquiry) = state.inquiries.get_mut(&inquiry_id) else {
        return Err(HandlerErr::not_found("inquiry not found"));
    };
    if !inquiry.status.can_reply() {
        return Err(HandlerErr::new("bad_transition", "inquiry is closed")
            .with_details(json!({ "status": inquiry.status.as_str() })));
    }

    let staff = message.staff;
    inquiry.messages.push(message);
    inquiry.status = inquiry.status.on_reply(staff);

    Ok(json!({
        "ok": true,
        "status": inquiry.status.as_str(),
        "messageCount": inquiry.messages.len()
    }))
}

fn inquiries_set_status(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let inquiry_id = get_required_str(params, "inquiryId")?;
    let to = parse_status(&get_required_str(params, "status")?)?;

    let Some(inquiry) = state.inquiries.get_mut(&inquiry_id) else {
        return Err(HandlerErr::not_found("inquiry not found"));
    };
    if !inquiry.status.can_set(to) {
        return Err(
            HandlerErr::new("bad_transition", "closed inquiries must be reopened first")
                .with_details(json!({
                    "from": inquiry.status.as_str(),
                    "to": to.as_str()
                })),
        );
    }

    inquiry.status = to;
    Ok(json!({ "ok": true, "status": inquiry.status.as_str() }))
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
        "inquiries.create" => Some(respond(req, inquiries_create(state, &req.params))),
        "inquiries.list" => Some(respond(req, inquiries_list(state, &req.params))),
        "inquiries.open" => Some(respond(req, inquiries_open(state, &req.params))),
        "inquiries.reply" => Some(respond(req, inquiries_reply(state, &req.params))),
        "inquiries.setStatus" => Some(respond(req, inquiries_set_status(state, &req.params))),
        _ => None,
    }
}
