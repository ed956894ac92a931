//! Game session: the question/answer/score cycle for one quiz run.
//!
//! A [`GameSession`] repeats [`GamePhase::AwaitingQuestion`] →
//! [`GamePhase::Answering`] → [`GamePhase::Resolved`] per round until a
//! terminal [`GamePhase::GameOver`] or [`GamePhase::GameError`]. Every
//! transition is driven by [`GameSession::apply_event`]; the only local
//! inputs are the per-second [`tick`](GameSession::tick) and answer
//! submission.
//!
//! Submission is two-phase so the driver can keep processing pushed events
//! while the acknowledgment is in flight (a new question may well arrive
//! first):
//!
//! ```text
//! let submission = game.submit_answer(&conn, index)?;   // marks the answer
//! // … keep applying events …
//! let outcome = submission.outcome().await;             // resolves at most once
//! game.apply_submission(outcome);                       // ignored if superseded
//! ```
//!
//! The round resolves from whichever arrives first — the personal
//! `answerFeedback` or the broadcast `roundEnd` — and the first resolution
//! wins; a later `roundEnd` never overwrites feedback fields. The countdown
//! is display-only: reaching zero resolves nothing (the server is the
//! authority on round endings) and the timer freezes the moment a
//! resolution lands.

use std::time::Duration;

use tracing::{debug, warn};

use crate::connection::{PendingAck, QuizwireConnection};
use crate::error::{QuizwireError, Result};
use crate::event::QuizwireEvent;
use crate::protocol::{
    BasicAck, ClientRequest, LobbyId, NewQuestionPayload, PlayerScore, Question, QuestionId,
};

/// Suggested bound after which a driver should warn that the first question
/// is overdue. Waiting itself stays a valid, displayable state — the client
/// never fabricates a question or invents an error from silence.
pub const QUESTION_WAIT_WARNING: Duration = Duration::from_secs(5);

/// Message used when the transport drops mid-game.
const CONNECTION_LOST: &str = "Connection to the server was lost.";

/// Where a game session currently stands.
#[derive(Debug, Clone, PartialEq)]
pub enum GamePhase {
    /// No question yet — "still loading", not an error.
    AwaitingQuestion,
    /// A question is open and the countdown is running.
    Answering,
    /// The current round resolved; awaiting the next question.
    Resolved,
    /// Terminal: the game finished. The lobby is torn down; control returns
    /// to the directory.
    GameOver { final_scores: Vec<PlayerScore> },
    /// Terminal: the game failed server-side or the connection dropped. The
    /// driver surfaces the message and returns to the directory after
    /// [`ERROR_RETURN_DELAY`](crate::ERROR_RETURN_DELAY).
    GameError { message: String },
}

/// How the current round resolved for the local player.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Index of the correct option, revealed by the server at resolution.
    pub correct_index: usize,
    /// Whether the local answer was correct; unset when the player never
    /// answered.
    pub was_correct: Option<bool>,
    /// Points earned this round; only known from personal feedback.
    pub points_earned: Option<i64>,
}

/// Transient state for the question currently on screen.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundState {
    pub question: Question,
    /// 1-based position of this question within the game.
    pub question_number: u32,
    pub total_questions: u32,
    /// Answer window in seconds, as announced by the server.
    pub time_limit: u32,
    /// Local countdown, seeded from `time_limit`; display-only.
    pub time_left: u32,
    /// The locally selected answer, set optimistically on submission and
    /// rolled back if the acknowledgment fails.
    pub local_answer: Option<usize>,
    /// Whether the server acknowledged the submission.
    pub submitted: bool,
    pub resolution: Option<Resolution>,
}

impl RoundState {
    fn new(payload: &NewQuestionPayload) -> Self {
        Self {
            question: payload.question.clone(),
            question_number: payload.question_number,
            total_questions: payload.total_questions,
            time_limit: payload.time_limit,
            time_left: payload.time_limit,
            local_answer: None,
            submitted: false,
            resolution: None,
        }
    }
}

/// State machine for one quiz run.
#[derive(Debug)]
pub struct GameSession {
    lobby_id: LobbyId,
    phase: GamePhase,
    round: Option<RoundState>,
    /// Scoreboard rows, kept score-descending for display.
    scores: Vec<PlayerScore>,
    /// Last submission error, for inline display; cleared on the next
    /// question or successful submission attempt.
    last_error: Option<String>,
}

impl GameSession {
    /// Start tracking the game for the given lobby, awaiting the first
    /// question.
    pub fn new(lobby_id: impl Into<LobbyId>) -> Self {
        Self {
            lobby_id: lobby_id.into(),
            phase: GamePhase::AwaitingQuestion,
            round: None,
            scores: Vec::new(),
            last_error: None,
        }
    }

    /// The lobby this game belongs to.
    pub fn lobby_id(&self) -> &LobbyId {
        &self.lobby_id
    }

    /// Current phase.
    pub fn phase(&self) -> &GamePhase {
        &self.phase
    }

    /// The round currently on screen, if a question has arrived.
    pub fn round(&self) -> Option<&RoundState> {
        self.round.as_ref()
    }

    /// Scoreboard rows in display order (score-descending).
    pub fn scores(&self) -> &[PlayerScore] {
        &self.scores
    }

    /// Last submission error, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether the session reached a terminal phase.
    pub fn is_over(&self) -> bool {
        matches!(
            self.phase,
            GamePhase::GameOver { .. } | GamePhase::GameError { .. }
        )
    }

    /// Advance the local countdown by one second.
    ///
    /// Only decrements while a question is open for answering; once a
    /// resolution is received the timer is frozen, so a tick scheduled
    /// before the resolution landed can never race it backwards.
    pub fn tick(&mut self) {
        if !matches!(self.phase, GamePhase::Answering) {
            return;
        }
        if let Some(round) = &mut self.round {
            if round.time_left > 0 {
                round.time_left -= 1;
            }
        }
    }

    /// Submit the local player's answer for the current question.
    ///
    /// Allowed at most once per question; repeat attempts, attempts with no
    /// open question, and out-of-range indices are rejected locally without
    /// contacting the server. On success the answer is marked optimistically
    /// and an [`AnswerSubmission`] is returned; await its outcome and feed
    /// it back through [`apply_submission`](Self::apply_submission).
    ///
    /// # Errors
    ///
    /// [`QuizwireError::NoActiveQuestion`], [`QuizwireError::AlreadyAnswered`],
    /// [`QuizwireError::Validation`] for the local guards, or
    /// [`QuizwireError::NotConnected`] when the request cannot be queued (the
    /// optimistic mark is rolled back).
    pub fn submit_answer(
        &mut self,
        conn: &QuizwireConnection,
        answer_index: usize,
    ) -> Result<AnswerSubmission> {
        if !matches!(self.phase, GamePhase::Answering) {
            return Err(QuizwireError::NoActiveQuestion);
        }
        let Some(round) = &mut self.round else {
            return Err(QuizwireError::NoActiveQuestion);
        };
        if round.local_answer.is_some() {
            return Err(QuizwireError::AlreadyAnswered);
        }
        if answer_index >= round.question.options.len() {
            return Err(QuizwireError::Validation(format!(
                "answer index {answer_index} is out of range"
            )));
        }

        round.local_answer = Some(answer_index);
        let question_id = round.question.id.clone();

        let pending = match conn.request_deferred(ClientRequest::SubmitAnswer {
            lobby_id: self.lobby_id.clone(),
            question_id: question_id.clone(),
            answer_index,
        }) {
            Ok(pending) => pending,
            Err(e) => {
                // Could not even queue the request: undo the optimistic mark.
                if let Some(round) = &mut self.round {
                    round.local_answer = None;
                }
                self.last_error = Some(e.to_string());
                return Err(e);
            }
        };

        debug!(question_id = %question_id, answer_index, "game: answer submitted");
        self.last_error = None;
        Ok(AnswerSubmission {
            question_id,
            pending,
        })
    }

    /// Feed a submission outcome back into the session.
    ///
    /// An outcome for a question that is no longer current (the round was
    /// superseded while the acknowledgment was in flight) is ignored
    /// entirely — it must not touch the new round. A failed outcome rolls
    /// the local answer back so the player may retry, and records the error
    /// for display.
    pub fn apply_submission(&mut self, outcome: SubmissionOutcome) {
        let is_current = self
            .round
            .as_ref()
            .is_some_and(|round| round.question.id == outcome.question_id);
        if !is_current {
            debug!(question_id = %outcome.question_id, "game: stale submission outcome ignored");
            return;
        }

        match outcome.result {
            Ok(ack) if ack.success => {
                if let Some(round) = &mut self.round {
                    round.submitted = true;
                }
                debug!("game: answer accepted");
            }
            Ok(ack) => {
                let message = ack
                    .message
                    .unwrap_or_else(|| "couldn't submit your answer".into());
                self.roll_back_answer(message);
            }
            Err(e) => self.roll_back_answer(e.to_string()),
        }
    }

    /// Apply one event to the session.
    ///
    /// After a terminal phase every event is ignored — the session is torn
    /// down and nothing may act on pushes for the old lobby.
    pub fn apply_event(&mut self, event: &QuizwireEvent) {
        if self.is_over() {
            return;
        }

        match event {
            QuizwireEvent::NewQuestion(payload) => {
                debug!(
                    question_number = payload.question_number,
                    total = payload.total_questions,
                    "game: new question"
                );
                self.round = Some(RoundState::new(payload));
                self.phase = GamePhase::Answering;
                self.last_error = None;
                if !payload.players.is_empty() {
                    self.scores = sort_scores(payload.players.clone());
                }
            }
            QuizwireEvent::ScoreUpdate { players } => {
                // Replaces the display list wholesale, whatever the round state.
                self.scores = sort_scores(players.clone());
            }
            QuizwireEvent::AnswerFeedback {
                correct,
                correct_answer_index,
                score_earned,
            } => {
                if let Some(round) = &mut self.round {
                    if round.resolution.is_none() {
                        round.resolution = Some(Resolution {
                            correct_index: *correct_answer_index,
                            was_correct: Some(*correct),
                            points_earned: Some(*score_earned),
                        });
                        self.phase = GamePhase::Resolved;
                        debug!(correct = *correct, "game: feedback resolved round");
                    }
                }
            }
            QuizwireEvent::RoundEnd {
                correct_answer_index,
            } => {
                if let Some(round) = &mut self.round {
                    // First resolution wins: feedback fields are never
                    // overwritten by the broadcast.
                    if round.resolution.is_none() {
                        round.resolution = Some(Resolution {
                            correct_index: *correct_answer_index,
                            was_correct: round
                                .local_answer
                                .map(|answer| answer == *correct_answer_index),
                            points_earned: None,
                        });
                    }
                    self.phase = GamePhase::Resolved;
                }
            }
            QuizwireEvent::GameOver { players } => {
                debug!("game: over");
                let final_scores = sort_scores(players.clone());
                self.scores = final_scores.clone();
                self.phase = GamePhase::GameOver { final_scores };
            }
            QuizwireEvent::GameError { message } => {
                warn!("game: server error: {message}");
                self.phase = GamePhase::GameError {
                    message: message.clone(),
                };
            }
            QuizwireEvent::Disconnected { .. } => {
                // Game state cannot be trusted across a transport gap.
                self.phase = GamePhase::GameError {
                    message: CONNECTION_LOST.into(),
                };
            }
            _ => {}
        }
    }

    /// Roll back the optimistic answer mark and record the failure.
    fn roll_back_answer(&mut self, message: String) {
        if let Some(round) = &mut self.round {
            if round.resolution.is_none() {
                round.local_answer = None;
            }
            round.submitted = false;
        }
        warn!("game: answer submission failed: {message}");
        self.last_error = Some(message);
    }
}

/// Sort scoreboard rows score-descending (stable, so server order breaks ties).
fn sort_scores(mut players: Vec<PlayerScore>) -> Vec<PlayerScore> {
    players.sort_by(|a, b| b.score.cmp(&a.score));
    players
}

// ── Answer submission ───────────────────────────────────────────────

/// An in-flight answer submission.
///
/// Await [`outcome`](Self::outcome) — concurrently with event processing —
/// and hand the result to [`GameSession::apply_submission`].
#[derive(Debug)]
pub struct AnswerSubmission {
    question_id: QuestionId,
    pending: PendingAck,
}

impl AnswerSubmission {
    /// The question this submission belongs to.
    pub fn question_id(&self) -> &QuestionId {
        &self.question_id
    }

    /// Wait for the acknowledgment (or its failure).
    pub async fn outcome(self) -> SubmissionOutcome {
        let result = self.pending.ack::<BasicAck>().await;
        SubmissionOutcome {
            question_id: self.question_id,
            result,
        }
    }
}

/// The resolved result of an [`AnswerSubmission`].
#[derive(Debug)]
pub struct SubmissionOutcome {
    question_id: QuestionId,
    result: Result<BasicAck>,
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::connection::QuizwireConfig;
    use crate::transport::{BoxedTransport, Connector};
    use async_trait::async_trait;

    /// A connector whose dial always fails; used to prove local guards fire
    /// before any network interaction.
    struct NeverConnector;

    #[async_trait]
    impl Connector for NeverConnector {
        async fn connect(&self) -> std::result::Result<BoxedTransport, QuizwireError> {
            Err(QuizwireError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "never connects",
            )))
        }
    }

    fn disconnected_conn() -> QuizwireConnection {
        let (conn, _events) = QuizwireConnection::new(NeverConnector, QuizwireConfig::new());
        conn
    }

    fn question_payload(id: &str, number: u32) -> NewQuestionPayload {
        NewQuestionPayload {
            question: Question {
                id: id.into(),
                text: "What is the capital of France?".into(),
                options: vec![
                    "Berlin".into(),
                    "Paris".into(),
                    "Madrid".into(),
                    "Rome".into(),
                ],
            },
            question_number: number,
            total_questions: 5,
            time_limit: 20,
            players: vec![
                score("S1", "Ann", 10),
                score("S2", "Bo", 20),
            ],
        }
    }

    fn score(id: &str, name: &str, points: i64) -> PlayerScore {
        PlayerScore {
            id: id.into(),
            name: name.into(),
            score: points,
        }
    }

    fn answering_session(question_id: &str) -> GameSession {
        let mut session = GameSession::new("L1");
        session.apply_event(&QuizwireEvent::NewQuestion(Box::new(question_payload(
            question_id,
            1,
        ))));
        session
    }

    fn ok_outcome(question_id: &str) -> SubmissionOutcome {
        SubmissionOutcome {
            question_id: question_id.into(),
            result: Ok(BasicAck {
                success: true,
                message: None,
            }),
        }
    }

    fn failed_outcome(question_id: &str, message: &str) -> SubmissionOutcome {
        SubmissionOutcome {
            question_id: question_id.into(),
            result: Ok(BasicAck {
                success: false,
                message: Some(message.into()),
            }),
        }
    }

    fn timeout_outcome(question_id: &str) -> SubmissionOutcome {
        SubmissionOutcome {
            question_id: question_id.into(),
            result: Err(QuizwireError::AckTimeout),
        }
    }

    // ── Round flow ──────────────────────────────────────────────────

    #[test]
    fn starts_awaiting_the_first_question() {
        let session = GameSession::new("L1");
        assert_eq!(session.phase(), &GamePhase::AwaitingQuestion);
        assert!(session.round().is_none());
        assert!(session.scores().is_empty());
    }

    #[test]
    fn new_question_enters_answering_with_fresh_round() {
        let session = answering_session("Q1");
        assert_eq!(session.phase(), &GamePhase::Answering);
        let round = session.round().unwrap();
        assert_eq!(round.question.id, "Q1");
        assert_eq!(round.time_left, 20);
        assert!(round.local_answer.is_none());
        assert!(round.resolution.is_none());
        // Scoreboard applied score-descending.
        assert_eq!(session.scores()[0].name, "Bo");
    }

    #[test]
    fn new_question_supersedes_resolved_round_directly() {
        let mut session = answering_session("Q1");
        session.apply_event(&QuizwireEvent::RoundEnd {
            correct_answer_index: 1,
        });
        assert_eq!(session.phase(), &GamePhase::Resolved);

        session.apply_event(&QuizwireEvent::NewQuestion(Box::new(question_payload(
            "Q2", 2,
        ))));
        assert_eq!(session.phase(), &GamePhase::Answering);
        let round = session.round().unwrap();
        assert_eq!(round.question.id, "Q2");
        assert!(round.resolution.is_none());
        assert!(round.local_answer.is_none());
    }

    #[test]
    fn new_question_with_empty_players_keeps_scoreboard() {
        let mut session = answering_session("Q1");
        let held = session.scores().to_vec();

        let mut payload = question_payload("Q2", 2);
        payload.players.clear();
        session.apply_event(&QuizwireEvent::NewQuestion(Box::new(payload)));
        assert_eq!(session.scores(), held.as_slice());
    }

    // ── Countdown ───────────────────────────────────────────────────

    #[test]
    fn tick_counts_down_and_stops_at_zero() {
        let mut session = answering_session("Q1");
        session.tick();
        assert_eq!(session.round().unwrap().time_left, 19);

        for _ in 0..30 {
            session.tick();
        }
        assert_eq!(session.round().unwrap().time_left, 0);
        // Reaching zero resolves nothing.
        assert_eq!(session.phase(), &GamePhase::Answering);
    }

    #[test]
    fn countdown_freezes_once_resolution_is_set() {
        let mut session = answering_session("Q1");
        session.tick();
        session.apply_event(&QuizwireEvent::AnswerFeedback {
            correct: true,
            correct_answer_index: 1,
            score_earned: 10,
        });
        let frozen = session.round().unwrap().time_left;

        // A tick scheduled before the resolution landed fires late.
        session.tick();
        session.tick();
        assert_eq!(session.round().unwrap().time_left, frozen);
    }

    #[test]
    fn tick_before_any_question_is_a_no_op() {
        let mut session = GameSession::new("L1");
        session.tick();
        assert!(session.round().is_none());
    }

    // ── Resolution ──────────────────────────────────────────────────

    #[test]
    fn feedback_resolves_the_round() {
        let mut session = answering_session("Q1");
        session.apply_event(&QuizwireEvent::AnswerFeedback {
            correct: true,
            correct_answer_index: 1,
            score_earned: 15,
        });

        assert_eq!(session.phase(), &GamePhase::Resolved);
        let resolution = session.round().unwrap().resolution.clone().unwrap();
        assert_eq!(resolution.correct_index, 1);
        assert_eq!(resolution.was_correct, Some(true));
        assert_eq!(resolution.points_earned, Some(15));
    }

    #[test]
    fn round_end_after_feedback_does_not_overwrite() {
        let mut session = answering_session("Q1");
        session.apply_event(&QuizwireEvent::AnswerFeedback {
            correct: true,
            correct_answer_index: 1,
            score_earned: 15,
        });
        session.apply_event(&QuizwireEvent::RoundEnd {
            correct_answer_index: 3,
        });

        // First resolution wins: the feedback fields survive untouched.
        let resolution = session.round().unwrap().resolution.clone().unwrap();
        assert_eq!(resolution.correct_index, 1);
        assert_eq!(resolution.was_correct, Some(true));
        assert_eq!(resolution.points_earned, Some(15));
    }

    #[test]
    fn round_end_derives_correctness_from_local_answer() {
        let mut session = answering_session("Q1");
        // Mark an answer as if submission went through.
        session.round.as_mut().unwrap().local_answer = Some(1);

        session.apply_event(&QuizwireEvent::RoundEnd {
            correct_answer_index: 1,
        });
        let resolution = session.round().unwrap().resolution.clone().unwrap();
        assert_eq!(resolution.was_correct, Some(true));
        assert_eq!(resolution.points_earned, None);
    }

    #[test]
    fn round_end_without_answer_leaves_correctness_unset() {
        let mut session = answering_session("Q1");
        session.apply_event(&QuizwireEvent::RoundEnd {
            correct_answer_index: 2,
        });
        let resolution = session.round().unwrap().resolution.clone().unwrap();
        assert_eq!(resolution.correct_index, 2);
        assert_eq!(resolution.was_correct, None);
    }

    #[test]
    fn round_end_before_any_question_is_ignored() {
        let mut session = GameSession::new("L1");
        session.apply_event(&QuizwireEvent::RoundEnd {
            correct_answer_index: 0,
        });
        // Absence of data stays a valid state; nothing is fabricated.
        assert_eq!(session.phase(), &GamePhase::AwaitingQuestion);
        assert!(session.round().is_none());
    }

    // ── Scores ──────────────────────────────────────────────────────

    #[test]
    fn score_update_replaces_wholesale_in_any_phase() {
        let mut session = answering_session("Q1");
        session.apply_event(&QuizwireEvent::RoundEnd {
            correct_answer_index: 0,
        });

        session.apply_event(&QuizwireEvent::ScoreUpdate {
            players: vec![score("S3", "Cy", 5), score("S1", "Ann", 30)],
        });
        assert_eq!(session.scores().len(), 2);
        assert_eq!(session.scores()[0].name, "Ann");
        assert_eq!(session.scores()[1].name, "Cy");
    }

    // ── Submission ──────────────────────────────────────────────────

    #[test]
    fn second_submission_is_rejected_locally() {
        let conn = disconnected_conn();
        let mut session = answering_session("Q1");
        session.round.as_mut().unwrap().local_answer = Some(2);

        // AlreadyAnswered (not NotConnected) proves the guard fired before
        // any network interaction was attempted.
        let err = session.submit_answer(&conn, 1).unwrap_err();
        assert!(matches!(err, QuizwireError::AlreadyAnswered));
        assert_eq!(session.round().unwrap().local_answer, Some(2));
    }

    #[test]
    fn submission_without_question_is_rejected_locally() {
        let conn = disconnected_conn();
        let mut session = GameSession::new("L1");
        let err = session.submit_answer(&conn, 0).unwrap_err();
        assert!(matches!(err, QuizwireError::NoActiveQuestion));
    }

    #[test]
    fn submission_after_resolution_is_rejected_locally() {
        let conn = disconnected_conn();
        let mut session = answering_session("Q1");
        session.apply_event(&QuizwireEvent::RoundEnd {
            correct_answer_index: 0,
        });
        let err = session.submit_answer(&conn, 1).unwrap_err();
        assert!(matches!(err, QuizwireError::NoActiveQuestion));
    }

    #[test]
    fn out_of_range_answer_is_rejected_locally() {
        let conn = disconnected_conn();
        let mut session = answering_session("Q1");
        let err = session.submit_answer(&conn, 4).unwrap_err();
        assert!(matches!(err, QuizwireError::Validation(_)));
        assert!(session.round().unwrap().local_answer.is_none());
    }

    #[test]
    fn unqueueable_submission_rolls_back_immediately() {
        let conn = disconnected_conn();
        let mut session = answering_session("Q1");

        let err = session.submit_answer(&conn, 1).unwrap_err();
        assert!(matches!(err, QuizwireError::NotConnected));
        assert!(session.round().unwrap().local_answer.is_none());
        assert!(session.last_error().is_some());
    }

    #[test]
    fn successful_outcome_marks_submitted() {
        let mut session = answering_session("Q1");
        session.round.as_mut().unwrap().local_answer = Some(1);

        session.apply_submission(ok_outcome("Q1"));
        let round = session.round().unwrap();
        assert!(round.submitted);
        assert_eq!(round.local_answer, Some(1));
    }

    #[test]
    fn failed_outcome_rolls_back_for_retry() {
        let mut session = answering_session("Q1");
        session.round.as_mut().unwrap().local_answer = Some(2);

        session.apply_submission(failed_outcome("Q1", "too late"));
        let round = session.round().unwrap();
        assert!(round.local_answer.is_none());
        assert!(!round.submitted);
        assert_eq!(session.last_error(), Some("too late"));
    }

    #[test]
    fn timed_out_outcome_rolls_back_and_next_question_still_resets() {
        let mut session = answering_session("Q1");
        session.round.as_mut().unwrap().local_answer = Some(2);

        session.apply_submission(timeout_outcome("Q1"));
        assert!(session.round().unwrap().local_answer.is_none());
        assert!(session.last_error().is_some());

        // The next question proceeds into a clean Answering round.
        session.apply_event(&QuizwireEvent::NewQuestion(Box::new(question_payload(
            "Q2", 2,
        ))));
        assert_eq!(session.phase(), &GamePhase::Answering);
        let round = session.round().unwrap();
        assert_eq!(round.question.id, "Q2");
        assert!(round.local_answer.is_none());
        assert!(session.last_error().is_none());
    }

    #[test]
    fn outcome_for_superseded_question_is_ignored() {
        let mut session = answering_session("Q1");
        session.round.as_mut().unwrap().local_answer = Some(2);

        // The next question arrives while the ack is still in flight.
        session.apply_event(&QuizwireEvent::NewQuestion(Box::new(question_payload(
            "Q2", 2,
        ))));

        session.apply_submission(timeout_outcome("Q1"));
        let round = session.round().unwrap();
        assert_eq!(round.question.id, "Q2");
        assert!(round.local_answer.is_none());
        assert!(!round.submitted);
        assert!(session.last_error().is_none());
    }

    // ── Terminal phases ─────────────────────────────────────────────

    #[test]
    fn game_over_mid_answering_is_terminal_and_final() {
        let mut session = answering_session("Q1");
        session.apply_event(&QuizwireEvent::GameOver {
            players: vec![score("S2", "Bo", 20), score("S1", "Ann", 30)],
        });

        match session.phase() {
            GamePhase::GameOver { final_scores } => {
                assert_eq!(final_scores[0].name, "Ann");
                assert_eq!(final_scores[0].score, 30);
                assert_eq!(final_scores[1].name, "Bo");
            }
            other => panic!("expected GameOver, got {other:?}"),
        }
        assert!(session.is_over());

        // Nothing acts on further pushes for the torn-down lobby.
        session.apply_event(&QuizwireEvent::NewQuestion(Box::new(question_payload(
            "Q2", 2,
        ))));
        session.apply_event(&QuizwireEvent::ScoreUpdate {
            players: vec![score("S3", "Cy", 99)],
        });
        assert!(matches!(session.phase(), GamePhase::GameOver { .. }));
        assert_eq!(session.scores()[0].name, "Ann");
    }

    #[test]
    fn game_error_is_terminal_with_message() {
        let mut session = answering_session("Q1");
        session.apply_event(&QuizwireEvent::GameError {
            message: "question bank exhausted".into(),
        });
        assert_eq!(
            session.phase(),
            &GamePhase::GameError {
                message: "question bank exhausted".into()
            }
        );
        assert!(session.is_over());
    }

    #[test]
    fn disconnect_is_terminal() {
        let mut session = answering_session("Q1");
        session.apply_event(&QuizwireEvent::Disconnected {
            reason: Some("gone".into()),
        });
        assert!(matches!(session.phase(), GamePhase::GameError { .. }));
    }
}
