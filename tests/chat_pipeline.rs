mod common;

use agora::chat::AnswerMode;
use agora::ingest::rebuild_from_directory;
use agora::models::Document;
use agora::session::{ChatSession, TurnPhase, ANSWER_PLACEHOLDER};
use common::{controller, memory_index, RecordingModel};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn corpus() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    fs::create_dir_all(root.join("aegean")).unwrap();
    fs::write(root.join("aegean/minoans.txt"), "The Minoans lived on Crete.").unwrap();
    fs::write(root.join("sparta.txt"), "Sparta was a warrior state.").unwrap();
    fs::write(
        root.join("athens.txt"),
        "Athens was the birthplace of democracy!",
    )
    .unwrap();
    fs::write(root.join("olympia.txt"), "Olympia hosted games for Zeus.").unwrap();
    tmp
}

#[tokio::test]
async fn identical_document_is_retrieved_first() {
    let (index, _) = memory_index();
    let docs = vec![
        Document::new("sparta was a warrior state", "sparta.txt"),
        Document::new("the minoans lived on crete", "minoans.txt"),
        Document::new("athens was the birthplace of democracy", "athens.txt"),
        Document::new("olympia hosted games for zeus", "olympia.txt"),
    ];
    index.rebuild(docs).await.unwrap();

    let hits = index
        .open_for_query()
        .retrieve("the minoans lived on crete")
        .await
        .unwrap();
    assert_eq!(hits.len(), 3);
    assert_eq!(hits[0].source(), "minoans.txt");
}

#[tokio::test]
async fn rag_turn_builds_prompt_from_retrieved_context() {
    let data = corpus();
    let (index, store) = memory_index();
    let indexed = rebuild_from_directory(&index, data.path()).await.unwrap();
    assert_eq!(indexed, 4);
    assert_eq!(store.len(), 4);

    let model = Arc::new(RecordingModel::replying("On Crete."));
    let chat = controller(&index, model.clone());
    let mut session = ChatSession::new();

    let outcome = chat
        .handle_turn(&mut session, "Where did the Minoans live?", AnswerMode::Rag)
        .await
        .unwrap();

    assert_eq!(outcome.answer, "On Crete.");
    assert_eq!(outcome.retrieved_docs.len(), 3);
    assert!(outcome
        .retrieved_docs
        .iter()
        .any(|d| d.source() == "minoans.txt"));

    let calls = model.calls();
    assert_eq!(calls.len(), 1);
    let (prompt, temperature) = &calls[0];
    assert!(prompt.contains("the minoans lived on crete"));
    assert!(prompt.contains("Where did the Minoans live?"));
    assert_eq!(*temperature, Some(0.1));

    let turn = &session.history()[0];
    assert!(turn.is_answered());
    assert_eq!(turn.answer(), "On Crete.");
    assert_eq!(turn.retrieved_docs().map(|d| d.len()), Some(3));
    assert_eq!(session.phase(), TurnPhase::Answered);
}

#[tokio::test]
async fn direct_turn_skips_retrieval() {
    let data = corpus();
    let (index, _) = memory_index();
    rebuild_from_directory(&index, data.path()).await.unwrap();

    let model = Arc::new(RecordingModel::replying("A statesman of Athens."));
    let chat = controller(&index, model.clone());
    let mut session = ChatSession::new();

    let outcome = chat
        .handle_turn(&mut session, "Who was Pericles?", AnswerMode::Direct)
        .await
        .unwrap();

    assert!(outcome.retrieved_docs.is_empty());
    assert_eq!(
        model.calls(),
        vec![("Who was Pericles?".to_string(), None)]
    );
    assert!(session.history()[0].retrieved_docs().is_none());
}

#[tokio::test]
async fn failed_generation_leaves_turn_pending() {
    let (index, _) = memory_index();
    index
        .rebuild(vec![Document::new("the minoans lived on crete", "m.txt")])
        .await
        .unwrap();

    let chat = controller(&index, Arc::new(RecordingModel::failing()));
    let mut session = ChatSession::new();

    let err = chat
        .handle_turn(&mut session, "Where is Knossos?", AnswerMode::Rag)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("connection refused"));

    assert_eq!(session.history().len(), 1);
    let turn = &session.history()[0];
    assert_eq!(turn.answer(), ANSWER_PLACEHOLDER);
    assert!(!turn.is_answered());
    assert_eq!(session.phase(), TurnPhase::AwaitingInput);
    assert_eq!(session.export_csv().unwrap(), "timestamp,question,answer\n");
}

#[tokio::test]
async fn exports_follow_conversation_order() {
    let (index, _) = memory_index();
    let chat = controller(&index, Arc::new(RecordingModel::replying("Yes, indeed.")));
    let mut session = ChatSession::new();

    let first = chat
        .handle_turn(&mut session, "Was Socrates Athenian?", AnswerMode::Direct)
        .await
        .unwrap();
    chat.handle_turn(&mut session, "Did he write books?", AnswerMode::Direct)
        .await
        .unwrap();

    let txt = session.export_transcript();
    let first_pos = txt.find("You: Was Socrates Athenian?").unwrap();
    let second_pos = txt.find("You: Did he write books?").unwrap();
    assert!(first_pos < second_pos);
    assert!(txt.starts_with(&format!("[{}] You:", first.timestamp)));

    let csv = session.export_csv().unwrap();
    assert_eq!(csv.lines().count(), 3);
    assert!(csv.contains(",Was Socrates Athenian?,\"Yes, indeed.\""));
}

#[tokio::test]
async fn rag_turn_over_empty_collection_still_answers() {
    let (index, _) = memory_index();
    let model = Arc::new(RecordingModel::replying("I don't know."));
    let chat = controller(&index, model.clone());
    let mut session = ChatSession::new();

    let outcome = chat
        .handle_turn(&mut session, "Who founded Byzantium?", AnswerMode::Rag)
        .await
        .unwrap();
    assert!(outcome.retrieved_docs.is_empty());
    assert!(model.calls()[0].0.contains("Who founded Byzantium?"));
}
