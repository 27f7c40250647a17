//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.
//!
//! The quiz DTO deliberately hides `correct_index` and tip bodies: tips are
//! only handed out through the reveal action so the scoring penalty stays
//! enforceable.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::catalog::Manifest;
use crate::quizfile::QuizConfig;
use crate::scoring::{Outcome, Report};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    Menu,
    OpenQuiz {
        quiz: Option<String>,
    },
    RevealTip {
        #[serde(rename = "attemptId")]
        attempt_id: Uuid,
        question: usize,
    },
    CheckAnswers {
        #[serde(rename = "attemptId")]
        attempt_id: Uuid,
        answers: Vec<Option<usize>>,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Menu {
        subjects: Vec<SubjectOut>,
    },
    Quiz {
        #[serde(rename = "attemptId")]
        attempt_id: Uuid,
        quiz: QuizOut,
        /// Canonical id when the request resolved via a legacy identifier.
        #[serde(rename = "legacyRedirect", skip_serializing_if = "Option::is_none")]
        legacy_redirect: Option<String>,
    },
    Tip {
        question: usize,
        text: String,
    },
    CheckResult {
        result: CheckOut,
    },
    Error {
        message: String,
    },
}

//
// Menu DTOs
//

#[derive(Debug, Serialize)]
pub struct SubjectOut {
    pub id: String,
    pub title: String,
    pub description: String,
    pub summary: String,
    pub quizzes: Vec<MenuQuizOut>,
}

#[derive(Debug, Serialize)]
pub struct MenuQuizOut {
    pub id: String,
    #[serde(rename = "legacyId")]
    pub legacy_id: String,
    pub title: String,
    pub description: String,
    pub summary: String,
    pub author: String,
    #[serde(rename = "sourceUrl")]
    pub source_url: String,
    #[serde(rename = "subjectTitle")]
    pub subject_title: String,
}

/// Project the manifest into the subject-grouped menu the front end renders.
pub fn to_menu(manifest: &Manifest) -> Vec<SubjectOut> {
    manifest
        .subjects
        .iter()
        .map(|subject| SubjectOut {
            id: subject.id.to_string(),
            title: subject.title.clone(),
            description: subject.description.clone(),
            summary: subject.summary.clone(),
            quizzes: subject
                .quizzes
                .iter()
                .map(|&idx| {
                    let quiz = &manifest.quizzes[idx];
                    MenuQuizOut {
                        id: quiz.id.to_string(),
                        legacy_id: quiz.legacy_id.to_string(),
                        title: quiz.title.clone(),
                        description: quiz.description.clone(),
                        summary: quiz.summary.clone(),
                        author: quiz.author.clone(),
                        source_url: quiz.source_url.clone(),
                        subject_title: quiz.subject_title.clone(),
                    }
                })
                .collect(),
        })
        .collect()
}

//
// Quiz / attempt DTOs
//

#[derive(Debug, Serialize)]
pub struct QuestionOut {
    pub prompt: String,
    pub answers: Vec<String>,
    #[serde(rename = "hasTip")]
    pub has_tip: bool,
}

#[derive(Debug, Serialize)]
pub struct QuizOut {
    pub id: String,
    pub title: String,
    pub description: String,
    pub author: String,
    #[serde(rename = "sourceUrl")]
    pub source_url: String,
    #[serde(rename = "tipPenalty")]
    pub tip_penalty: f32,
    pub questions: Vec<QuestionOut>,
}

/// Public projection of a validated quiz config (no correct answers, no tip
/// bodies).
pub fn to_quiz_out(id: &str, config: &QuizConfig) -> QuizOut {
    QuizOut {
        id: id.to_string(),
        title: config.title.clone(),
        description: config.description.clone(),
        author: config.author.clone(),
        source_url: config.source_url.clone(),
        tip_penalty: config.settings.tip_penalty,
        questions: config
            .questions
            .iter()
            .map(|q| QuestionOut {
                prompt: q.prompt.clone(),
                answers: q.answers.clone(),
                has_tip: !q.tip.is_empty(),
            })
            .collect(),
    }
}

//
// HTTP request/response DTOs
//

#[derive(Debug, Deserialize)]
pub struct OpenQuizIn {
    pub quiz: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AttemptOut {
    #[serde(rename = "attemptId")]
    pub attempt_id: Uuid,
    pub quiz: QuizOut,
    #[serde(rename = "legacyRedirect", skip_serializing_if = "Option::is_none")]
    pub legacy_redirect: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CloseIn {
    #[serde(rename = "attemptId")]
    pub attempt_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct CloseOut {
    pub released: bool,
}

#[derive(Debug, Deserialize)]
pub struct TipIn {
    #[serde(rename = "attemptId")]
    pub attempt_id: Uuid,
    pub question: usize,
}

#[derive(Debug, Serialize)]
pub struct TipOut {
    pub question: usize,
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckIn {
    #[serde(rename = "attemptId")]
    pub attempt_id: Uuid,
    /// One slot per question: chosen answer index, or null for no selection.
    pub answers: Vec<Option<usize>>,
}

#[derive(Debug, Serialize)]
pub struct IncorrectOut {
    pub prompt: String,
    #[serde(rename = "correctAnswer")]
    pub correct_answer: String,
    pub tip: String,
}

/// Result of a check. Incomplete attempts are a user-correctable outcome,
/// not an error.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckOut {
    Incomplete {
        unanswered: Vec<usize>,
        message: String,
    },
    Complete {
        #[serde(rename = "correctCount")]
        correct_count: usize,
        total: usize,
        /// One-decimal-rounded for display.
        score: f32,
        incorrect: Vec<IncorrectOut>,
    },
}

pub fn to_check_out(outcome: &Outcome) -> CheckOut {
    match outcome {
        Outcome::Incomplete { unanswered } => CheckOut::Incomplete {
            unanswered: unanswered.clone(),
            message: format!(
                "Please answer every question before checking. Unanswered: {}.",
                unanswered
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        },
        Outcome::Complete(report) => to_complete_out(report),
    }
}

fn to_complete_out(report: &Report) -> CheckOut {
    CheckOut::Complete {
        correct_count: report.correct_count,
        total: report.total,
        score: report.rounded_score(),
        incorrect: report
            .incorrect
            .iter()
            .map(|d| IncorrectOut {
                prompt: d.prompt.clone(),
                correct_answer: d.correct_answer.clone(),
                tip: d.tip.clone(),
            })
            .collect(),
    }
}

#[derive(Debug, Serialize)]
pub struct ReloadOut {
    pub subjects: usize,
    pub quizzes: usize,
    #[serde(rename = "legacyCollisions")]
    pub legacy_collisions: usize,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub message: String,
}
