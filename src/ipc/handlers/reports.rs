use crate::flow::{Delivery, InquiryStatus, CARD_SEND_MS};
use crate::grading;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store::{CardDelivery, Exam, ExamStatus};
use serde_json::json;
use uuid::Uuid;

fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

fn exam_report(state: &AppState, exam: &Exam) -> grading::ExamReportModel {
    let roster = state.students.roster(&exam.class_id);
    let results = state.results.exam_results(&exam.id);
    grading::compute_exam_report(exam, &roster, &results)
}

fn handle_reports_exam_model(state: &mut AppState, req: &Request) -> serde_json::Value {
    let exam_id = match required_str(req, "examId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(exam) = state.exams.get(&exam_id) else {
        return err(&req.id, "not_found", "exam not found", None);
    };
    let Some(class) = state.classes.get(&exam.class_id) else {
        return err(&req.id, "not_found", "class not found", None);
    };

    let model = exam_report(state, exam);
    let mut payload = match serde_json::to_value(&model) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "encode_failed", e.to_string(), None),
    };
    if let Some(obj) = payload.as_object_mut() {
        obj.insert(
            "class".to_string(),
            json!({ "id": class.id, "name": class.name }),
        );
    }
    ok(&req.id, payload)
}

fn handle_reports_student_card_model(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(student) = state.students.get(&student_id) else {
        return err(&req.id, "not_found", "student not found", None);
    };
    let Some(class) = state.classes.get(&student.class_id) else {
        return err(&req.id, "not_found", "class not found", None);
    };

    // The card covers graded exams only; drafts stay off report cards.
    let mut rows: Vec<serde_json::Value> = Vec::new();
    let mut taken: Vec<f64> = Vec::new();
    for exam in state
        .exams
        .list(Some(&student.class_id), Some(ExamStatus::Graded))
    {
        let model = exam_report(state, exam);
        let Some(standing) = model
            .per_student
            .iter()
            .find(|s| s.student_id == student_id)
        else {
            continue;
        };
        if let Some(score) = standing.score {
            taken.push(score);
        }
        rows.push(json!({
            "examId": model.exam.id,
            "title": model.exam.title,
            "examType": model.exam.exam_type,
            "date": model.exam.date,
            "score": standing.score,
            "rank": standing.rank,
            "passed": standing.passed,
            "classAverage": model.class_average,
            "topAverage": model.top_average,
            "scoredCount": model.scored_count,
            "rosterSize": model.roster_size
        }));
    }

    let average = if taken.is_empty() {
        0.0
    } else {
        grading::round1(taken.iter().sum::<f64>() / taken.len() as f64)
    };

    ok(
        &req.id,
        json!({
            "class": { "id": class.id, "name": class.name },
            "student": {
                "id": student.id,
                "name": student.name,
                "school": student.school,
                "gradeLabel": student.grade_label,
                "active": student.active
            },
            "exams": rows,
            "examCount": rows.len(),
            "takenCount": taken.len(),
            "average": average
        }),
    )
}

fn handle_reports_dashboard_model(state: &mut AppState, req: &Request) -> serde_json::Value {
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(class) = state.classes.get(&class_id) else {
        return err(&req.id, "not_found", "class not found", None);
    };

    let roster = state.students.roster(&class_id);
    let active_students = roster.iter().filter(|s| s.active).count();
    let roster_size = roster.len();

    let exams: Vec<serde_json::Value> = state
        .exams
        .list(Some(&class_id), None)
        .iter()
        .map(|exam| {
            let model = exam_report(state, exam);
            json!({
                "id": exam.id,
                "title": exam.title,
                "status": exam.status.as_str(),
                "date": model.exam.date,
                "classAverage": model.class_average,
                "scoredCount": model.scored_count,
                "passCount": model.pass_count
            })
        })
        .collect();

    let mut open = 0usize;
    let mut answered = 0usize;
    let mut closed = 0usize;
    for inquiry in state.inquiries.list(None) {
        if inquiry.class_id.as_deref() != Some(class_id.as_str()) {
            continue;
        }
        match inquiry.status {
            InquiryStatus::Open => open += 1,
            InquiryStatus::Answered => answered += 1,
            InquiryStatus::Closed => closed += 1,
        }
    }

    let now = state.clock.now();
    let mut queued = 0usize;
    let mut sending = 0usize;
    let mut sent = 0usize;
    for d in state.deliveries.list(Some(&class_id)) {
        match Delivery::at(d.queued_at, d.deliver_after_ms, now) {
            Delivery::Queued => queued += 1,
            Delivery::Sending => sending += 1,
            Delivery::Sent => sent += 1,
        }
    }

    ok(
        &req.id,
        json!({
            "class": { "id": class.id, "name": class.name },
            "rosterSize": roster_size,
            "activeStudents": active_students,
            "exams": exams,
            "inquiries": { "open": open, "answered": answered, "closed": closed },
            "deliveries": { "queued": queued, "sending": sending, "sent": sent }
        }),
    )
}

fn handle_reports_send_card(state: &mut AppState, req: &Request) -> serde_json::Value {
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(student) = state.students.get(&student_id) else {
        return err(&req.id, "not_found", "student not found", None);
    };
    let class_id = student.class_id.clone();

    let deliver_after_ms = match req.params.get("deliverAfterMs") {
        None => CARD_SEND_MS,
        Some(v) if v.is_null() => CARD_SEND_MS,
        Some(v) => match v.as_i64() {
            Some(n) if n >= 0 => n,
            _ => {
                return err(
                    &req.id,
                    "bad_params",
                    "deliverAfterMs must be a non-negative integer",
                    None,
                )
            }
        },
    };

    let queued_at = state.clock.now();
    let delivery_id = Uuid::new_v4().to_string();
    state.deliveries.insert(CardDelivery {
        id: delivery_id.clone(),
        class_id,
        student_id,
        queued_at,
        deliver_after_ms,
    });

    ok(
        &req.id,
        json!({
            "deliveryId": delivery_id,
            "phase": Delivery::at(queued_at, deliver_after_ms, queued_at).as_str()
        }),
    )
}

fn handle_reports_deliveries(state: &mut AppState, req: &Request) -> serde_json::Value {
    let class_id = req
        .params
        .get("classId")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    let now = state.clock.now();
    let deliveries: Vec<serde_json::Value> = state
        .deliveries
        .list(class_id.as_deref())
        .iter()
        .map(|d| {
            json!({
                "id": d.id,
                "classId": d.class_id,
                "studentId": d.student_id,
                "queuedAt": d.queued_at.to_rfc3339(),
                "deliverAfterMs": d.deliver_after_ms,
                "phase": Delivery::at(d.queued_at, d.deliver_after_ms, now).as_str()
            })
        })
        .collect();

    ok(&req.id, json!({ "deliveries": deliveries }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.examModel" => Some(handle_reports_exam_model(state, req)),
        "reports.studentCardModel" => Some(handle_reports_student_card_model(state, req)),
        "reports.dashboardModel" => Some(handle_reports_dashboard_model(state, req)),
        "reports.sendCard" => Some(handle_reports_send_card(state, req)),
        "reports.deliveries" => Some(handle_reports_deliveries(state, req)),
        _ => None,
    }
}
