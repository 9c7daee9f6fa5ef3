use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_academyd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn academyd");
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
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
    value
}

fn result_str(value: &serde_json::Value, key: &str) -> String {
    value
        .get("result")
        .and_then(|v| v.get(key))
        .and_then(|v| v.as_str())
        .unwrap_or_else(|| panic!("missing result.{} in {}", key, value))
        .to_string()
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request(&mut stdin, &mut reader, "1", "health", json!({}));

    let created = request(
        &mut stdin,
        &mut reader,
        "2",
        "classes.create",
        json!({ "name": "Smoke Class" }),
    );
    let class_id = result_str(&created, "classId");

    let _ = request(&mut stdin, &mut reader, "3", "classes.list", json!({}));

    let created_student = request(
        &mut stdin,
        &mut reader,
        "4",
        "students.create",
        json!({ "classId": class_id, "name": "Smoke Student" }),
    );
    let student_id = result_str(&created_student, "studentId");
    let _ = request(
        &mut stdin,
        &mut reader,
        "4a",
        "students.list",
        json!({ "classId": class_id }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "4b",
        "students.update",
        json!({ "studentId": student_id, "patch": { "school": "Dongbu Middle" } }),
    );

    let created_exam = request(
        &mut stdin,
        &mut reader,
        "5",
        "exams.create",
        json!({
            "classId": class_id,
            "title": "Smoke Mock",
            "questions": [
                { "number": 1, "points": 50.0, "answer": "2" },
                { "number": 2, "points": 50.0, "answer": "4" }
            ]
        }),
    );
    let exam_id = result_str(&created_exam, "examId");
    let _ = request(
        &mut stdin,
        &mut reader,
        "5a",
        "exams.list",
        json!({ "classId": class_id }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "5b",
        "exams.get",
        json!({ "examId": exam_id }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "5c",
        "exams.setStatus",
        json!({ "examId": exam_id, "status": "graded" }),
    );

    let _ = request(
        &mut stdin,
        &mut reader,
        "6",
        "answers.set",
        json!({
            "examId": exam_id,
            "studentId": student_id,
            "question": 1,
            "answer": "2"
        }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "6a",
        "answers.bulkSet",
        json!({
            "examId": exam_id,
            "edits": [
                { "studentId": student_id, "question": 2, "answer": "3" }
            ]
        }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "6b",
        "results.get",
        json!({ "examId": exam_id, "studentId": student_id }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "6c",
        "results.save",
        json!({ "examId": exam_id, "studentId": student_id }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "6d",
        "results.edit",
        json!({ "examId": exam_id, "studentId": student_id }),
    );

    let _ = request(
        &mut stdin,
        &mut reader,
        "7",
        "reports.examModel",
        json!({ "examId": exam_id }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "7a",
        "reports.studentCardModel",
        json!({ "studentId": student_id }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "7b",
        "reports.dashboardModel",
        json!({ "classId": class_id }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "7c",
        "reports.sendCard",
        json!({ "studentId": student_id, "deliverAfterMs": 0 }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "7d",
        "reports.deliveries",
        json!({ "classId": class_id }),
    );

    let created_inquiry = request(
        &mut stdin,
        &mut reader,
        "8",
        "inquiries.create",
        json!({
            "classId": class_id,
            "studentId": student_id,
            "title": "Homework load",
            "message": { "author": "Parent Kim", "body": "Too much homework this week?" }
        }),
    );
    let inquiry_id = result_str(&created_inquiry, "inquiryId");
    let _ = request(&mut stdin, &mut reader, "8a", "inquiries.list", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "8b",
        "inquiries.open",
        json!({ "inquiryId": inquiry_id }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "8c",
        "inquiries.reply",
        json!({
            "inquiryId": inquiry_id,
            "author": "Teacher Lee",
            "staff": true,
            "body": "We'll ease off next week."
        }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "8d",
        "inquiries.setStatus",
        json!({ "inquiryId": inquiry_id, "status": "closed" }),
    );

    let created_assistant = request(
        &mut stdin,
        &mut reader,
        "9",
        "assistants.create",
        json!({ "name": "Hana Seo", "classIds": [class_id] }),
    );
    let assistant_id = result_str(&created_assistant, "assistantId");
    let _ = request(&mut stdin, &mut reader, "9a", "assistants.list", json!({}));
    let _ = request(
        &mut stdin,
        &mut reader,
        "9b",
        "assistants.update",
        json!({ "assistantId": assistant_id, "patch": { "role": "lead assistant" } }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "9c",
        "assistants.profileModel",
        json!({ "assistantId": assistant_id }),
    );

    let _ = request(
        &mut stdin,
        &mut reader,
        "10",
        "classes.delete",
        json!({ "classId": class_id }),
    );
    let _ = request(&mut stdin, &mut reader, "11", "session.reset", json!({}));

    let payload = json!({ "id": "12", "method": "nosuch.method", "params": {} });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let unknown: serde_json::Value =
        serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(unknown.get("ok").and_then(|v| v.as_bool()), Some(false));
    assert_eq!(
        unknown
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str()),
        Some("not_implemented")
    );

    drop(stdin);
    let _ = child.wait();
}
