use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store::ClassGroup;
use serde_json::json;
use uuid::Uuid;

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    // Include basic counts so the UI can show a useful dashboard.
    let mut rows: Vec<&ClassGroup> = state.classes.list().iter().collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name));
    let classes: Vec<serde_json::Value> = rows
        .iter()
        .map(|c| {
            json!({
                "id": c.id,
                "name": c.name,
                "studentCount": state.students.roster(&c.id).len(),
                "examCount": state.exams.list(Some(&c.id), None).len()
            })
        })
        .collect();

    ok(&req.id, json!({ "classes": classes }))
}

fn handle_classes_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let name = match req.params.get("name").and_then(|v| v.as_str()) {
        Some(v) => v.trim().to_string(),
        None => return err(&req.id, "bad_params", "missing name", None),
    };
    if name.is_empty() {
        return err(&req.id, "bad_params", "name must not be empty", None);
    }

    let class_id = Uuid::new_v4().to_string();
    state.classes.insert(ClassGroup {
        id: class_id.clone(),
        name: name.clone(),
    });

    ok(&req.id, json!({ "classId": class_id, "name": name }))
}

fn handle_classes_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let class_id = match req.params.get("classId").and_then(|v| v.as_str()) {
        Some(v) => v.to_string(),
        None => return err(&req.id, "bad_params", "missing classId", None),
    };

    if state.classes.get(&class_id).is_none() {
        return err(&req.id, "not_found", "class not found", None);
    }

    // Delete in dependency order; grading records hang off both exams
    // and students. Keep this list updated as stores are added.
    for exam_id in state.exams.remove_class(&class_id) {
        state.results.remove_exam(&exam_id);
    }
    for student_id in state.students.remove_class(&class_id) {
        state.results.remove_student(&student_id);
    }
    state.inquiries.remove_class(&class_id);
    state.deliveries.remove_class(&class_id);
    state.assistants.unassign_class(&class_id);
    state.classes.remove(&class_id);

    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(handle_classes_list(state, req)),
        "classes.create" => Some(handle_classes_create(state, req)),
        "classes.delete" => Some(handle_classes_delete(state, req)),
        _ => None,
    }
}
