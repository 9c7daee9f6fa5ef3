use serde::Serialize;
use std::collections::BTreeMap;

use crate::defaults;
use crate::store::{AnswerMap, Exam, ExamResult, Question, Student};

/// Canonical form used on both sides of every correctness check.
pub fn normalize(answer: &str) -> String {
    answer.trim().to_lowercase()
}

/// Sum of points over questions whose submitted answer matches the key
/// after normalization. Unanswered questions contribute nothing.
pub fn calculate_score(questions: &[Question], answers: &AnswerMap) -> f64 {
    let mut total = 0.0;
    for q in questions {
        if let Some(submitted) = answers.get(&q.number) {
            if normalize(submitted) == normalize(&q.answer) {
                total += q.points;
            }
        }
    }
    total
}

/// Round half up to one decimal place.
pub fn round1(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

/// Integer percentage of `part` in `whole`, rounded half up. A zero
/// `whole` reads as 0, not an error.
pub fn percent_of(part: usize, whole: usize) -> i64 {
    if whole == 0 {
        return 0;
    }
    ((100.0 * part as f64 / whole as f64) + 0.5).floor() as i64
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamReportModel {
    pub exam: ExamHeader,
    pub roster_size: usize,
    pub scored_count: usize,
    pub class_average: f64,
    pub top_count: usize,
    pub top_average: f64,
    pub pass_count: usize,
    pub per_student: Vec<StudentStanding>,
    pub per_question: Vec<QuestionStats>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamHeader {
    pub id: String,
    pub class_id: String,
    pub title: String,
    pub exam_type: String,
    pub source: String,
    pub date: Option<String>,
    pub status: String,
    pub pass_score: f64,
    pub total_questions: usize,
    pub total_points: f64,
}

/// One roster row of the exam report. Students without a stored result
/// keep null score/rank/passed so the table can render them as pending.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStanding {
    pub student_id: String,
    pub name: String,
    pub score: Option<f64>,
    pub rank: Option<usize>,
    pub correct_count: usize,
    pub wrong_count: usize,
    pub unanswered_count: usize,
    pub passed: Option<bool>,
    pub locked: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionStats {
    pub number: u32,
    pub label: String,
    pub points: f64,
    pub answer: String,
    pub correct_count: usize,
    pub correct_rate: i64,
    pub wrong_rate: i64,
    pub unanswered_count: usize,
    pub choices: Vec<ChoiceStat>,
}

/// Distribution bucket for one printed choice label. Tallies match the
/// raw submitted string exactly; off-alphabet answers fall outside every
/// bucket.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChoiceStat {
    pub choice: String,
    pub count: usize,
    pub rate: i64,
}

/// Full exam report over one class roster. Rates are taken against the
/// whole roster, ranks are dense over distinct scores, and the top band
/// is the best 30 percent of scored students (never fewer than one).
pub fn compute_exam_report(
    exam: &Exam,
    roster: &[&Student],
    results: &BTreeMap<&str, &ExamResult>,
) -> ExamReportModel {
    let pass_score = defaults::exam_pass_score(exam);
    let keys: Vec<String> = exam
        .questions
        .iter()
        .map(|q| normalize(&q.answer))
        .collect();

    let mut ladder: Vec<f64> = roster
        .iter()
        .filter_map(|s| results.get(s.id.as_str()).map(|r| r.score))
        .collect();
    let scored_count = ladder.len();
    let class_average = if scored_count == 0 {
        0.0
    } else {
        round1(ladder.iter().sum::<f64>() / scored_count as f64)
    };

    ladder.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let mut distinct = ladder.clone();
    distinct.dedup();

    let top_count = if scored_count == 0 {
        0
    } else {
        ((scored_count as f64 * 0.3).ceil() as usize)
            .max(1)
            .min(scored_count)
    };
    let top_average = if top_count == 0 {
        0.0
    } else {
        round1(ladder[..top_count].iter().sum::<f64>() / top_count as f64)
    };

    let mut pass_count = 0usize;
    let mut per_student = Vec::with_capacity(roster.len());
    for s in roster {
        let result = results.get(s.id.as_str());
        let mut correct = 0usize;
        let mut wrong = 0usize;
        let mut unanswered = exam.questions.len();
        let mut score = None;
        let mut rank = None;
        let mut passed = None;
        if let Some(r) = result {
            unanswered = 0;
            for (idx, q) in exam.questions.iter().enumerate() {
                match r.answers.get(&q.number) {
                    None => unanswered += 1,
                    Some(a) if normalize(a) == keys[idx] => correct += 1,
                    Some(_) => wrong += 1,
                }
            }
            score = Some(r.score);
            rank = distinct.iter().position(|v| *v == r.score).map(|i| i + 1);
            let p = r.score >= pass_score;
            if p {
                pass_count += 1;
            }
            passed = Some(p);
        }
        per_student.push(StudentStanding {
            student_id: s.id.clone(),
            name: s.name.clone(),
            score,
            rank,
            correct_count: correct,
            wrong_count: wrong,
            unanswered_count: unanswered,
            passed,
            locked: result.map(|r| r.locked).unwrap_or(false),
        });
    }

    let roster_size = roster.len();
    let mut per_question = Vec::with_capacity(exam.questions.len());
    for (idx, q) in exam.questions.iter().enumerate() {
        let labels = defaults::choice_labels(q);
        let mut counts = vec![0usize; labels.len()];
        let mut correct = 0usize;
        let mut answered = 0usize;
        for s in roster {
            let Some(r) = results.get(s.id.as_str()) else {
                continue;
            };
            let Some(a) = r.answers.get(&q.number) else {
                continue;
            };
            answered += 1;
            if normalize(a) == keys[idx] {
                correct += 1;
            }
            if let Some(pos) = labels.iter().position(|l| l == a) {
                counts[pos] += 1;
            }
        }
        let correct_rate = percent_of(correct, roster_size);
        per_question.push(QuestionStats {
            number: q.number,
            label: defaults::question_label(q),
            points: q.points,
            answer: q.answer.clone(),
            correct_count: correct,
            correct_rate,
            wrong_rate: if roster_size == 0 { 0 } else { 100 - correct_rate },
            unanswered_count: roster_size - answered,
            choices: labels
                .into_iter()
                .zip(counts)
                .map(|(choice, count)| ChoiceStat {
                    rate: percent_of(count, roster_size),
                    choice,
                    count,
                })
                .collect(),
        });
    }

    let view = defaults::resolve_exam(exam);
    ExamReportModel {
        exam: ExamHeader {
            id: view.id,
            class_id: view.class_id,
            title: view.title,
            exam_type: view.exam_type,
            source: view.source,
            date: view.date,
            status: view.status,
            pass_score: view.pass_score,
            total_questions: view.total_questions,
            total_points: view.total_points,
        },
        roster_size,
        scored_count,
        class_average,
        top_count,
        top_average,
        pass_count,
        per_student,
        per_question,
    }
}
