#![allow(dead_code)]

use agora::chat::ChatController;
use agora::embedding::{normalize_l2, EmbeddingProvider};
use agora::index::IndexClient;
use agora::llm::LanguageModel;
use agora::memory::InMemoryIndex;
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

const DIMS: usize = 256;

/// Bag-of-words embedder: each whitespace token adds one to an FNV-1a bucket.
pub struct HashEmbedder;

fn bucket(word: &str) -> usize {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in word.to_lowercase().bytes() {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    (hash % DIMS as u64) as usize
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-bow"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0f32; DIMS];
                for word in text.split_whitespace() {
                    v[bucket(word)] += 1.0;
                }
                normalize_l2(&mut v);
                v
            })
            .collect())
    }
}

/// Language model that records every prompt and replies with a fixed string.
pub struct RecordingModel {
    reply: String,
    fail: bool,
    pub calls: Mutex<Vec<(String, Option<f32>)>>,
}

impl RecordingModel {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: String::new(),
            fail: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, Option<f32>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for RecordingModel {
    fn model_name(&self) -> &str {
        "recording"
    }

    async fn generate(&self, prompt: &str, temperature: Option<f32>) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), temperature));
        if self.fail {
            bail!("connection refused");
        }
        Ok(self.reply.clone())
    }
}

pub fn memory_index() -> (IndexClient, Arc<InMemoryIndex>) {
    let store = Arc::new(InMemoryIndex::new("test"));
    let client = IndexClient::new(Arc::new(HashEmbedder), store.clone());
    (client, store)
}

pub fn controller(index: &IndexClient, model: Arc<dyn LanguageModel>) -> ChatController {
    ChatController::new(index.open_for_query(), model, 0.1)
}

/// Single-page PDF drawing `phrase` in Helvetica.
pub fn minimal_pdf(phrase: &str) -> Vec<u8> {
    paged_pdf(&[phrase])
}

/// PDF with one page per entry of `pages`, each drawing its phrase in Helvetica.
pub fn paged_pdf(pages: &[&str]) -> Vec<u8> {
    // 1: catalog, 2: page tree, 3: font, then a page object and its content stream per page.
    let page_ids: Vec<usize> = (0..pages.len()).map(|i| 4 + 2 * i).collect();
    let kids: Vec<String> = page_ids.iter().map(|id| format!("{} 0 R", id)).collect();

    let mut objects: Vec<String> = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            pages.len()
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];
    for (phrase, id) in pages.iter().zip(&page_ids) {
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R /Resources << /Font << /F1 3 0 R >> >> >>",
            id + 1
        ));
        let stream = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", phrase);
        objects.push(format!(
            "<< /Length {} >> stream\n{}\nendstream",
            stream.len(),
            stream
        ));
    }

    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj {} endobj\n", i + 1, body).as_bytes());
    }
    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}

/// Word document whose body is one paragraph per entry of `paragraphs`.
pub fn minimal_docx(paragraphs: &[&str]) -> Vec<u8> {
    use std::io::Write;
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        zip.start_file(
            "word/document.xml",
            zip::write::SimpleFileOptions::default(),
        )
        .unwrap();
        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t>{}</w:t></w:r></w:p>", p))
            .collect();
        let xml = format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
            body
        );
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }
    buf
}
