//! Interactive terminal chat.
//!
//! Reads questions from stdin one line at a time and answers them serially.
//! Lines starting with `/` are commands; see [`HELP`].

use anyhow::Result;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::chat::{reveal_words, AnswerMode, ChatController};
use crate::index::IndexClient;
use crate::ingest::{ingest_uploads, print_upload_summary, read_upload_files};
use crate::session::ChatSession;

const HELP: &str = "\
Commands:
  /rag [on|off]       answer from retrieved context (default on)
  /sources [on|off]   show source citations (default on)
  /chunks [on|off]    show retrieved chunks (default off)
  /latency [on|off]   show response time (default on)
  /upload FILE...     index .txt, .pdf or .docx files
  /export DIR         write chat_history.txt and chat_log.csv
  /history            reprint the conversation
  /help               this message
  /quit               leave";

/// Characters of each retrieved document shown in citations.
const EXCERPT_CHARS: usize = 300;

/// Display toggles for the terminal session.
#[derive(Debug, Clone, Copy)]
pub struct DisplayOptions {
    pub rag: bool,
    pub show_sources: bool,
    pub show_chunks: bool,
    pub show_latency: bool,
}

impl Default for DisplayOptions {
    fn default() -> Self {
        Self {
            rag: true,
            show_sources: true,
            show_chunks: false,
            show_latency: true,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Toggle(Toggle, Option<bool>),
    Upload(Vec<PathBuf>),
    Export(PathBuf),
    History,
    Help,
    Quit,
    Unknown(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Toggle {
    Rag,
    Sources,
    Chunks,
    Latency,
}

fn parse_command(line: &str) -> Command {
    let mut parts = line.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();
    let switch = match args.first().copied() {
        Some("on") => Some(true),
        Some("off") => Some(false),
        _ => None,
    };
    match name {
        "/rag" => Command::Toggle(Toggle::Rag, switch),
        "/sources" => Command::Toggle(Toggle::Sources, switch),
        "/chunks" => Command::Toggle(Toggle::Chunks, switch),
        "/latency" => Command::Toggle(Toggle::Latency, switch),
        "/upload" if !args.is_empty() => {
            Command::Upload(args.iter().map(PathBuf::from).collect())
        }
        "/export" if args.len() == 1 => Command::Export(PathBuf::from(args[0])),
        "/history" => Command::History,
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        other => Command::Unknown(other.to_string()),
    }
}

impl DisplayOptions {
    fn apply(&mut self, toggle: Toggle, value: Option<bool>) -> bool {
        let slot = match toggle {
            Toggle::Rag => &mut self.rag,
            Toggle::Sources => &mut self.show_sources,
            Toggle::Chunks => &mut self.show_chunks,
            Toggle::Latency => &mut self.show_latency,
        };
        *slot = value.unwrap_or(!*slot);
        *slot
    }
}

pub async fn run_chat(controller: &ChatController, index: &IndexClient) -> Result<()> {
    let mut session = ChatSession::new();
    let mut options = DisplayOptions::default();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Hello! Ask me anything about Ancient Greece. Type /help for commands.");

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with('/') {
            match parse_command(line) {
                Command::Toggle(toggle, value) => {
                    let state = options.apply(toggle, value);
                    println!("{:?} {}", toggle, if state { "on" } else { "off" });
                }
                Command::Upload(paths) => {
                    match read_upload_files(&paths) {
                        Ok(files) => match ingest_uploads(index, &files).await {
                            Ok(summary) => print_upload_summary(&summary),
                            Err(e) => eprintln!("Upload failed: {:#}", e),
                        },
                        Err(e) => eprintln!("Upload failed: {:#}", e),
                    }
                }
                Command::Export(dir) => match export_session(&session, &dir) {
                    Ok(()) => println!("Exported chat to {}", dir.display()),
                    Err(e) => eprintln!("Export failed: {:#}", e),
                },
                Command::History => print_history(&session, &options),
                Command::Help => println!("{}", HELP),
                Command::Quit => break,
                Command::Unknown(name) => println!("Unknown command {}. Type /help.", name),
            }
            continue;
        }

        let mode = AnswerMode::from_rag_flag(options.rag);
        match controller.handle_turn(&mut session, line, mode).await {
            Ok(outcome) => {
                render_progressively(&outcome.answer)?;
                if options.show_latency {
                    println!("Response time: {:.2} sec", outcome.latency.as_secs_f64());
                }
                if options.show_sources {
                    print_sources(&outcome.retrieved_docs);
                }
                if options.show_chunks {
                    print!("{}", format_chunks(&outcome.retrieved_docs));
                }
            }
            Err(e) => eprintln!("Error: {:#}", e),
        }
        println!();
    }

    Ok(())
}

fn render_progressively(answer: &str) -> Result<()> {
    let mut stdout = std::io::stdout();
    let mut printed = 0;
    for prefix in reveal_words(answer) {
        write!(stdout, "{}", &prefix[printed..])?;
        stdout.flush()?;
        printed = prefix.len();
    }
    writeln!(stdout)?;
    Ok(())
}

fn print_sources(docs: &[crate::models::Document]) {
    if docs.is_empty() {
        return;
    }
    println!("Sources:");
    for (i, doc) in docs.iter().enumerate() {
        println!("  Source {}: {}", i + 1, doc.source());
        println!("    {}", doc.excerpt(EXCERPT_CHARS));
    }
}

fn format_chunks(docs: &[crate::models::Document]) -> String {
    docs.iter()
        .enumerate()
        .map(|(i, doc)| {
            format!(
                "--- chunk {} ({}) ---\n{}\n",
                i + 1,
                doc.source(),
                doc.excerpt(EXCERPT_CHARS)
            )
        })
        .collect()
}

fn print_history(session: &ChatSession, options: &DisplayOptions) {
    for turn in session.history() {
        println!("[{}] You: {}", turn.timestamp, turn.question);
        println!("[{}] Bot: {}", turn.timestamp, turn.answer());
        if options.show_sources {
            if let Some(docs) = turn.retrieved_docs() {
                print_sources(docs);
            }
        }
        println!();
    }
}

/// Write `chat_history.txt` and `chat_log.csv` into `dir`.
pub fn export_session(session: &ChatSession, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(dir.join("chat_history.txt"), session.export_transcript())?;
    std::fs::write(dir.join("chat_log.csv"), session.export_csv()?)?;
    Ok(())
}
