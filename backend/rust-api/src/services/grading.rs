//! Per-type answer checking. Pure and deterministic: no I/O, no clock.

use crate::models::{Question, QuestionBody, Score, SubmissionStatus};

#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub status: SubmissionStatus,
    pub score: Score,
    /// Answer key of the variant that was graded.
    pub correct_answers: Vec<String>,
}

/// Grades `submitted` against the question, or against its complementary
/// variant for activation attempts when one exists.
pub fn grade_question(question: &Question, submitted: &[String], is_activation: bool) -> Verdict {
    let (body, max_score) = question.gradable(is_activation);
    grade(body, max_score, submitted)
}

pub fn grade(body: &QuestionBody, max_score: f64, submitted: &[String]) -> Verdict {
    let status = check_status(body, submitted);

    // Fill-in-the-gaps always earns partial credit, whatever the status says.
    let score = match body {
        QuestionBody::FillInTheGaps { answers } => {
            Score::points(partial_credit(answers, submitted, max_score))
        }
        _ => match status {
            SubmissionStatus::Correct => Score::points(max_score),
            SubmissionStatus::Wrong => Score::zero(),
            SubmissionStatus::Reviewing => Score::pending(),
        },
    };

    Verdict {
        status,
        score,
        correct_answers: body.answers().to_vec(),
    }
}

fn check_status(body: &QuestionBody, submitted: &[String]) -> SubmissionStatus {
    let correct = match body {
        QuestionBody::Mcq { answers, .. } | QuestionBody::TrueOrFalse { answers, .. } => submitted
            .first()
            .is_some_and(|choice| answers.contains(choice)),
        QuestionBody::Checkboxes { answers, .. } => {
            submitted.len() == answers.len() && answers.iter().all(|a| submitted.contains(a))
        }
        QuestionBody::Sorter { answers, .. } => answers.concat() == submitted.concat(),
        QuestionBody::FillInTheGaps { answers } => joined_trimmed(answers) == joined_trimmed(submitted),
        QuestionBody::FreeText { .. } => return SubmissionStatus::Reviewing,
    };

    if correct {
        SubmissionStatus::Correct
    } else {
        SubmissionStatus::Wrong
    }
}

fn joined_trimmed(values: &[String]) -> String {
    values.iter().map(|v| v.trim()).collect()
}

/// `matches / blanks * max_score`; zero when the key has no blanks.
fn partial_credit(answers: &[String], submitted: &[String], max_score: f64) -> f64 {
    if answers.is_empty() {
        return 0.0;
    }
    let matches = answers
        .iter()
        .enumerate()
        .filter(|(idx, expected)| {
            submitted
                .get(*idx)
                .is_some_and(|given| given.trim() == expected.trim())
        })
        .count();
    matches as f64 / answers.len() as f64 * max_score
}
