//! Per-turn orchestration.
//!
//! ```text
//! AwaitingInput → QuerySubmitted → Retrieving (RAG only) → Generating → Answered
//! ```
//!
//! [`ChatController::handle_turn`] appends a turn with a placeholder answer,
//! times retrieval plus generation, and fills the answer in once. Any
//! failure propagates to the caller with the turn left pending and the
//! session back in `AwaitingInput`.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

use crate::config::Config;
use crate::index::IndexClient;
use crate::llm::{LanguageModel, OllamaClient};
use crate::models::Document;
use crate::prompt::assemble_prompt;
use crate::retriever::{format_docs, Retriever};
use crate::session::{ChatSession, TurnPhase};

/// How a question is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerMode {
    /// Retrieve context and answer from it.
    Rag,
    /// Send the bare question to the model.
    Direct,
}

impl AnswerMode {
    pub fn from_rag_flag(rag: bool) -> Self {
        if rag {
            AnswerMode::Rag
        } else {
            AnswerMode::Direct
        }
    }
}

/// Result of one completed turn, as handed to the front end.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub turn_index: usize,
    pub timestamp: String,
    pub answer: String,
    pub retrieved_docs: Vec<Document>,
    pub latency: Duration,
}

#[derive(Clone)]
pub struct ChatController {
    retriever: Retriever,
    llm: Arc<dyn LanguageModel>,
    rag_temperature: f32,
}

impl ChatController {
    pub fn new(retriever: Retriever, llm: Arc<dyn LanguageModel>, rag_temperature: f32) -> Self {
        Self {
            retriever,
            llm,
            rag_temperature,
        }
    }

    /// Connect to the configured vector database and language model.
    pub async fn from_config(config: &Config) -> Result<(Self, IndexClient)> {
        let index = IndexClient::connect(config).await?;
        let llm = Arc::new(OllamaClient::new(&config.llm)?);
        let controller = Self::new(index.open_for_query(), llm, config.llm.temperature);
        Ok((controller, index))
    }

    pub async fn handle_turn(
        &self,
        session: &mut ChatSession,
        question: &str,
        mode: AnswerMode,
    ) -> Result<TurnOutcome> {
        let turn_index = session.begin_turn(question);
        let result = self.answer(session, question, mode).await;
        let (answer, docs, latency) = match result {
            Ok(v) => v,
            Err(e) => {
                session.set_phase(TurnPhase::AwaitingInput);
                return Err(e);
            }
        };

        let turn = session
            .turn_mut(turn_index)
            .context("turn vanished from session history")?;
        let retrieved = match mode {
            AnswerMode::Rag => Some(docs.clone()),
            AnswerMode::Direct => None,
        };
        turn.complete(answer.clone(), retrieved, latency)?;
        let timestamp = turn.timestamp.clone();
        session.set_phase(TurnPhase::Answered);

        info!(
            mode = ?mode,
            latency_ms = latency.as_millis() as u64,
            sources = docs.len(),
            "turn answered"
        );

        Ok(TurnOutcome {
            turn_index,
            timestamp,
            answer,
            retrieved_docs: docs,
            latency,
        })
    }

    async fn answer(
        &self,
        session: &mut ChatSession,
        question: &str,
        mode: AnswerMode,
    ) -> Result<(String, Vec<Document>, Duration)> {
        let start = Instant::now();
        match mode {
            AnswerMode::Rag => {
                session.set_phase(TurnPhase::Retrieving);
                let docs = self.retriever.retrieve(question).await?;
                let prompt = assemble_prompt(&format_docs(&docs), question);
                session.set_phase(TurnPhase::Generating);
                let answer = self
                    .llm
                    .generate(&prompt, Some(self.rag_temperature))
                    .await?;
                Ok((answer, docs, start.elapsed()))
            }
            AnswerMode::Direct => {
                session.set_phase(TurnPhase::Generating);
                let answer = self.llm.generate(question, None).await?;
                Ok((answer, Vec::new(), start.elapsed()))
            }
        }
    }
}

/// Progressive prefixes of `answer`, one more word each step.
///
/// Front ends render these in turn to simulate streaming of an answer that
/// has already been generated in full.
pub fn reveal_words(answer: &str) -> impl Iterator<Item = String> + '_ {
    let mut shown = String::new();
    answer.split_whitespace().map(move |word| {
        if !shown.is_empty() {
            shown.push(' ');
        }
        shown.push_str(word);
        shown.clone()
    })
}
