//! # Agora
//!
//! Retrieval-augmented chat about Ancient Greece.
//!
//! Documents are normalized, embedded and stored in a Milvus collection.
//! Each question is embedded, the three nearest documents are pulled back,
//! and a local Ollama model answers from that context.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────┐
//! │   Loader    │──▶│  Normalize  │──▶│  Milvus  │
//! │ TXT/PDF/DOCX│   │   + Embed   │   │ (COSINE) │
//! └─────────────┘   └─────────────┘   └────┬─────┘
//!                                          │ top-3
//!                                    ┌─────▼─────┐   ┌────────┐
//!                                    │  Prompt   │──▶│ Ollama │
//!                                    └─────┬─────┘   └────────┘
//!                      ┌───────────────────┤
//!                      ▼                   ▼
//!                 ┌──────────┐       ┌──────────┐
//!                 │   REPL   │       │   HTTP   │
//!                 └──────────┘       └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Documents and uploads |
//! | [`normalize`] | Text cleanup before indexing |
//! | [`extract`] | PDF and DOCX text extraction |
//! | [`loader`] | Directory and upload loading |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | Vector index trait and client |
//! | [`milvus`] | Milvus REST backend |
//! | [`memory`] | In-memory backend |
//! | [`retriever`] | Top-k retrieval |
//! | [`prompt`] | Prompt assembly |
//! | [`llm`] | Ollama chat client |
//! | [`session`] | Chat history and exports |
//! | [`chat`] | Per-turn orchestration |
//! | [`ingest`] | Rebuild and upload commands |
//! | [`repl`] | Terminal chat |
//! | [`server`] | JSON HTTP API |
//! | [`logging`] | Tracing subscriber setup |

pub mod chat;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod loader;
pub mod logging;
pub mod memory;
pub mod milvus;
pub mod models;
pub mod normalize;
pub mod prompt;
pub mod repl;
pub mod retriever;
pub mod server;
pub mod session;
