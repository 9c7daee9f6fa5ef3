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

fn request_ok(
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
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn create_class(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, name: &str) -> String {
    let created = request_ok(stdin, reader, "c", "classes.create", json!({ "name": name }));
    created["classId"].as_str().unwrap().to_string()
}

fn create_student(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    class_id: &str,
    name: &str,
) -> String {
    let created = request_ok(
        stdin,
        reader,
        "s",
        "students.create",
        json!({ "classId": class_id, "name": name }),
    );
    created["studentId"].as_str().unwrap().to_string()
}

fn save_result(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    exam_id: &str,
    student_id: &str,
    answers: serde_json::Value,
) {
    let _ = request_ok(
        stdin,
        reader,
        "r",
        "results.save",
        json!({ "examId": exam_id, "studentId": student_id, "answers": answers }),
    );
}

#[test]
fn exam_model_ranks_and_band_averages() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let class_id = create_class(&mut stdin, &mut reader, "Math 3-A");
    let s1 = create_student(&mut stdin, &mut reader, &class_id, "Ahn Dahee");
    let s2 = create_student(&mut stdin, &mut reader, &class_id, "Bae Junho");
    let s3 = create_student(&mut stdin, &mut reader, &class_id, "Cho Yuna");
    let s4 = create_student(&mut stdin, &mut reader, &class_id, "Do Haneul");

    let exam = request_ok(
        &mut stdin,
        &mut reader,
        "e",
        "exams.create",
        json!({
            "classId": class_id,
            "title": "Midterm Mock",
            "status": "graded",
            "questions": [
                { "number": 1, "points": 70.0, "answer": "1" },
                { "number": 2, "points": 20.0, "answer": "2" },
                { "number": 3, "points": 10.0, "answer": "3" }
            ]
        }),
    );
    let exam_id = exam["examId"].as_str().unwrap().to_string();

    save_result(&mut stdin, &mut reader, &exam_id, &s1, json!({ "1": "1", "2": "2" }));
    save_result(&mut stdin, &mut reader, &exam_id, &s2, json!({ "1": "1", "2": "2" }));
    save_result(&mut stdin, &mut reader, &exam_id, &s3, json!({ "1": "1", "3": "3" }));
    save_result(&mut stdin, &mut reader, &exam_id, &s4, json!({ "1": "1" }));

    let model = request_ok(
        &mut stdin,
        &mut reader,
        "m",
        "reports.examModel",
        json!({ "examId": exam_id }),
    );

    assert_eq!(model["class"]["id"].as_str(), Some(class_id.as_str()));
    assert_eq!(model["rosterSize"].as_i64(), Some(4));
    assert_eq!(model["scoredCount"].as_i64(), Some(4));
    assert_eq!(model["classAverage"].as_f64(), Some(82.5));
    assert_eq!(model["topCount"].as_i64(), Some(2));
    assert_eq!(model["topAverage"].as_f64(), Some(90.0));
    assert_eq!(model["passCount"].as_i64(), Some(4));
    assert_eq!(model["exam"]["totalPoints"].as_f64(), Some(100.0));
    assert_eq!(model["exam"]["passScore"].as_f64(), Some(60.0));

    let standings = model["perStudent"].as_array().expect("perStudent");
    let ranks: Vec<i64> = standings
        .iter()
        .map(|s| s["rank"].as_i64().unwrap())
        .collect();
    assert_eq!(ranks, vec![1, 1, 2, 3]);
    assert_eq!(standings[0]["score"].as_f64(), Some(90.0));
    assert_eq!(standings[3]["score"].as_f64(), Some(70.0));
    assert_eq!(standings[0]["locked"].as_bool(), Some(true));

    let questions = model["perQuestion"].as_array().expect("perQuestion");
    assert_eq!(questions[0]["correctRate"].as_i64(), Some(100));
    assert_eq!(questions[0]["wrongRate"].as_i64(), Some(0));
    assert_eq!(questions[1]["correctCount"].as_i64(), Some(2));
    assert_eq!(questions[1]["correctRate"].as_i64(), Some(50));
    assert_eq!(questions[1]["wrongRate"].as_i64(), Some(50));
    assert_eq!(questions[1]["unansweredCount"].as_i64(), Some(2));
    assert_eq!(questions[2]["correctRate"].as_i64(), Some(25));
    assert_eq!(questions[2]["unansweredCount"].as_i64(), Some(3));

    // Everyone picked choice 1 on the first question.
    let choices = questions[0]["choices"].as_array().expect("choices");
    assert_eq!(choices.len(), 5);
    assert_eq!(choices[0]["choice"].as_str(), Some("1"));
    assert_eq!(choices[0]["count"].as_i64(), Some(4));
    assert_eq!(choices[0]["rate"].as_i64(), Some(100));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn top_band_of_three_is_one_student() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let class_id = create_class(&mut stdin, &mut reader, "Science 1-C");
    let s1 = create_student(&mut stdin, &mut reader, &class_id, "Ahn Dahee");
    let s2 = create_student(&mut stdin, &mut reader, &class_id, "Bae Junho");
    let s3 = create_student(&mut stdin, &mut reader, &class_id, "Cho Yuna");

    let exam = request_ok(
        &mut stdin,
        &mut reader,
        "e",
        "exams.create",
        json!({
            "classId": class_id,
            "title": "Weekly Quiz 7",
            "questions": [
                { "number": 1, "points": 60.0, "answer": "1" },
                { "number": 2, "points": 20.0, "answer": "2" },
                { "number": 3, "points": 20.0, "answer": "3" }
            ]
        }),
    );
    let exam_id = exam["examId"].as_str().unwrap().to_string();

    save_result(
        &mut stdin,
        &mut reader,
        &exam_id,
        &s1,
        json!({ "1": "1", "2": "2", "3": "3" }),
    );
    save_result(&mut stdin, &mut reader, &exam_id, &s2, json!({ "1": "1", "2": "2" }));
    save_result(&mut stdin, &mut reader, &exam_id, &s3, json!({ "1": "1" }));

    let model = request_ok(
        &mut stdin,
        &mut reader,
        "m",
        "reports.examModel",
        json!({ "examId": exam_id }),
    );
    assert_eq!(model["topCount"].as_i64(), Some(1));
    assert_eq!(model["topAverage"].as_f64(), Some(100.0));
    assert_eq!(model["classAverage"].as_f64(), Some(80.0));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn pending_students_stay_on_the_report() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let class_id = create_class(&mut stdin, &mut reader, "History 2-A");
    let s1 = create_student(&mut stdin, &mut reader, &class_id, "Ahn Dahee");
    let _s2 = create_student(&mut stdin, &mut reader, &class_id, "Bae Junho");

    let exam = request_ok(
        &mut stdin,
        &mut reader,
        "e",
        "exams.create",
        json!({
            "classId": class_id,
            "title": "Chapter Test",
            "questions": [{ "number": 1, "points": 100.0, "answer": "3" }]
        }),
    );
    let exam_id = exam["examId"].as_str().unwrap().to_string();
    save_result(&mut stdin, &mut reader, &exam_id, &s1, json!({ "1": "3" }));

    let model = request_ok(
        &mut stdin,
        &mut reader,
        "m",
        "reports.examModel",
        json!({ "examId": exam_id }),
    );
    assert_eq!(model["rosterSize"].as_i64(), Some(2));
    assert_eq!(model["scoredCount"].as_i64(), Some(1));

    let standings = model["perStudent"].as_array().expect("perStudent");
    assert_eq!(standings.len(), 2);
    assert!(standings[1]["score"].is_null());
    assert!(standings[1]["rank"].is_null());
    assert!(standings[1]["passed"].is_null());

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn student_card_lists_graded_exams_only() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let class_id = create_class(&mut stdin, &mut reader, "Math 3-A");
    let student_id = create_student(&mut stdin, &mut reader, &class_id, "Ahn Dahee");

    let graded = request_ok(
        &mut stdin,
        &mut reader,
        "e1",
        "exams.create",
        json!({
            "classId": class_id,
            "title": "March Mock",
            "status": "graded",
            "date": "2026-03-14",
            "questions": [{ "number": 1, "points": 100.0, "answer": "2" }]
        }),
    );
    let graded_id = graded["examId"].as_str().unwrap().to_string();

    let _draft = request_ok(
        &mut stdin,
        &mut reader,
        "e2",
        "exams.create",
        json!({
            "classId": class_id,
            "title": "April Mock",
            "questions": [{ "number": 1, "points": 100.0, "answer": "2" }]
        }),
    );

    save_result(&mut stdin, &mut reader, &graded_id, &student_id, json!({ "1": "2" }));

    let card = request_ok(
        &mut stdin,
        &mut reader,
        "m",
        "reports.studentCardModel",
        json!({ "studentId": student_id }),
    );
    assert_eq!(card["student"]["name"].as_str(), Some("Ahn Dahee"));
    assert_eq!(card["examCount"].as_i64(), Some(1));
    assert_eq!(card["takenCount"].as_i64(), Some(1));
    assert_eq!(card["average"].as_f64(), Some(100.0));

    let rows = card["exams"].as_array().expect("exams rows");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["title"].as_str(), Some("March Mock"));
    assert_eq!(rows[0]["score"].as_f64(), Some(100.0));
    assert_eq!(rows[0]["rank"].as_i64(), Some(1));
    assert_eq!(rows[0]["passed"].as_bool(), Some(true));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn dashboard_summarizes_roster_exams_and_inquiries() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let class_id = create_class(&mut stdin, &mut reader, "Math 3-A");
    let s1 = create_student(&mut stdin, &mut reader, &class_id, "Ahn Dahee");
    let _s2 = create_student(&mut stdin, &mut reader, &class_id, "Bae Junho");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "u",
        "students.update",
        json!({ "studentId": s1, "patch": { "active": false } }),
    );

    let exam = request_ok(
        &mut stdin,
        &mut reader,
        "e",
        "exams.create",
        json!({
            "classId": class_id,
            "title": "Placement",
            "status": "graded",
            "questions": [{ "number": 1, "points": 100.0, "answer": "4" }]
        }),
    );
    let exam_id = exam["examId"].as_str().unwrap().to_string();
    save_result(&mut stdin, &mut reader, &exam_id, &s1, json!({ "1": "4" }));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "q",
        "inquiries.create",
        json!({ "classId": class_id, "title": "Schedule change" }),
    );

    let model = request_ok(
        &mut stdin,
        &mut reader,
        "m",
        "reports.dashboardModel",
        json!({ "classId": class_id }),
    );
    assert_eq!(model["rosterSize"].as_i64(), Some(2));
    assert_eq!(model["activeStudents"].as_i64(), Some(1));
    assert_eq!(model["inquiries"]["open"].as_i64(), Some(1));
    assert_eq!(model["inquiries"]["answered"].as_i64(), Some(0));

    let exams = model["exams"].as_array().expect("exams");
    assert_eq!(exams.len(), 1);
    assert_eq!(exams[0]["classAverage"].as_f64(), Some(100.0));
    assert_eq!(exams[0]["scoredCount"].as_i64(), Some(1));
    assert_eq!(exams[0]["passCount"].as_i64(), Some(1));

    drop(stdin);
    let _ = child.wait();
}
