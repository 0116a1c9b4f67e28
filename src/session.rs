//! Per-session conversation state and its exports.
//!
//! A [`ChatSession`] is created when a user starts chatting and dropped when
//! they leave. It is passed by `&mut` into every turn, so there is no shared
//! global history.
//!
//! Exports are derived views over the answered turns:
//!
//! ```text
//! [10:00:00] You: Q1
//! [10:00:00] Bot: A1
//!
//! ```
//!
//! and a CSV log with the header `timestamp,question,answer`.

use anyhow::{anyhow, bail, Result};
use chrono::Local;
use serde::Serialize;
use std::time::Duration;

use crate::models::Document;

/// Answer text shown while a turn is still being generated.
pub const ANSWER_PLACEHOLDER: &str = "...";

/// Where the current turn is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhase {
    AwaitingInput,
    QuerySubmitted,
    Retrieving,
    Generating,
    Answered,
}

#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub question: String,
    answer: String,
    /// Local time of submission, `HH:MM:SS`.
    pub timestamp: String,
    retrieved_docs: Option<Vec<Document>>,
    latency: Option<Duration>,
    answered: bool,
}

impl ChatTurn {
    pub fn new(question: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: ANSWER_PLACEHOLDER.to_string(),
            timestamp: timestamp.into(),
            retrieved_docs: None,
            latency: None,
            answered: false,
        }
    }

    pub fn answer(&self) -> &str {
        &self.answer
    }

    pub fn is_answered(&self) -> bool {
        self.answered
    }

    pub fn retrieved_docs(&self) -> Option<&[Document]> {
        self.retrieved_docs.as_deref()
    }

    pub fn latency(&self) -> Option<Duration> {
        self.latency
    }

    /// Replace the placeholder with the final answer. A turn is answered once.
    pub fn complete(
        &mut self,
        answer: String,
        retrieved_docs: Option<Vec<Document>>,
        latency: Duration,
    ) -> Result<()> {
        if self.answered {
            bail!("turn {:?} has already been answered", self.question);
        }
        self.answer = answer;
        self.retrieved_docs = retrieved_docs;
        self.latency = Some(latency);
        self.answered = true;
        Ok(())
    }
}

/// One user's conversation: append-only history plus the current phase.
#[derive(Debug)]
pub struct ChatSession {
    history: Vec<ChatTurn>,
    phase: TurnPhase,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            history: Vec::new(),
            phase: TurnPhase::AwaitingInput,
        }
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: TurnPhase) {
        self.phase = phase;
    }

    /// Append a new turn stamped with the current local time.
    pub fn begin_turn(&mut self, question: &str) -> usize {
        let timestamp = Local::now().format("%H:%M:%S").to_string();
        self.push_turn(ChatTurn::new(question, timestamp))
    }

    /// Append an already-built turn, returning its position.
    pub fn push_turn(&mut self, turn: ChatTurn) -> usize {
        self.history.push(turn);
        self.phase = TurnPhase::QuerySubmitted;
        self.history.len() - 1
    }

    pub fn turn_mut(&mut self, index: usize) -> Option<&mut ChatTurn> {
        self.history.get_mut(index)
    }

    fn answered_turns(&self) -> impl Iterator<Item = &ChatTurn> {
        self.history.iter().filter(|t| t.is_answered())
    }

    /// Plain-text transcript of every answered turn.
    pub fn export_transcript(&self) -> String {
        let mut out = String::new();
        for turn in self.answered_turns() {
            out.push_str(&format!("[{}] You: {}\n", turn.timestamp, turn.question));
            out.push_str(&format!("[{}] Bot: {}\n\n", turn.timestamp, turn.answer));
        }
        out
    }

    /// CSV log of every answered turn: `timestamp,question,answer`.
    pub fn export_csv(&self) -> Result<String> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        writer.write_record(CSV_HEADER)?;
        for turn in self.answered_turns() {
            writer.serialize(CsvRow {
                timestamp: &turn.timestamp,
                question: &turn.question,
                answer: &turn.answer,
            })?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| anyhow!("Failed to flush CSV export: {}", e))?;
        Ok(String::from_utf8(bytes)?)
    }
}

const CSV_HEADER: [&str; 3] = ["timestamp", "question", "answer"];

#[derive(Serialize)]
struct CsvRow<'a> {
    timestamp: &'a str,
    question: &'a str,
    answer: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answered(question: &str, answer: &str, ts: &str) -> ChatTurn {
        let mut turn = ChatTurn::new(question, ts);
        turn.complete(answer.to_string(), None, Duration::from_millis(5))
            .unwrap();
        turn
    }

    #[test]
    fn turn_starts_with_placeholder() {
        let turn = ChatTurn::new("Who was Pericles?", "09:15:00");
        assert_eq!(turn.answer(), ANSWER_PLACEHOLDER);
        assert!(!turn.is_answered());
        assert!(turn.latency().is_none());
    }

    #[test]
    fn answer_is_set_exactly_once() {
        let mut turn = ChatTurn::new("Q", "10:00:00");
        turn.complete("first".to_string(), None, Duration::ZERO)
            .unwrap();
        let err = turn
            .complete("second".to_string(), None, Duration::ZERO)
            .unwrap_err();
        assert!(err.to_string().contains("already been answered"));
        assert_eq!(turn.answer(), "first");
    }

    #[test]
    fn single_turn_exports() {
        let mut session = ChatSession::new();
        session.push_turn(answered("Q1", "A1", "10:00:00"));

        let txt = session.export_transcript();
        assert!(txt.contains("[10:00:00] You: Q1"));
        assert!(txt.contains("[10:00:00] Bot: A1"));
        assert_eq!(txt, "[10:00:00] You: Q1\n[10:00:00] Bot: A1\n\n");

        let csv = session.export_csv().unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines, vec!["timestamp,question,answer", "10:00:00,Q1,A1"]);
    }

    #[test]
    fn pending_turns_are_not_exported() {
        let mut session = ChatSession::new();
        session.push_turn(answered("Q1", "A1", "10:00:00"));
        session.begin_turn("still thinking");

        assert!(!session.export_transcript().contains("still thinking"));
        assert_eq!(session.export_csv().unwrap().lines().count(), 2);
        assert_eq!(session.history().len(), 2);
    }

    #[test]
    fn csv_quotes_awkward_fields() {
        let mut session = ChatSession::new();
        session.push_turn(answered(
            "Athens, or Sparta?",
            "He said \"Athens\"\nthen left.",
            "11:00:00",
        ));
        let csv = session.export_csv().unwrap();
        assert!(csv.contains("11:00:00,\"Athens, or Sparta?\",\"He said \"\"Athens\"\"\nthen left.\""));
    }

    #[test]
    fn begin_turn_uses_clock_format() {
        let mut session = ChatSession::new();
        let idx = session.begin_turn("When was Marathon?");
        let ts = &session.history()[idx].timestamp;
        assert_eq!(ts.len(), 8);
        assert_eq!(ts.as_bytes()[2], b':');
        assert_eq!(ts.as_bytes()[5], b':');
        assert_eq!(session.phase(), TurnPhase::QuerySubmitted);
    }
}
