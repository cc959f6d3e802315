//! Shared fakes for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use chatmuse::config::Config;
use chatmuse::embedding::Embedder;
use chatmuse::llm::LanguageModel;
use chatmuse::models::Page;
use chatmuse::session::{ChatSession, Services};
use chatmuse::store::memory::InMemoryStore;
use chatmuse::voice::SpeechSynthesizer;

const DIMS: usize = 64;

/// Hashed bag-of-words vectors: texts sharing words are close.
pub struct BagOfWordsEmbedder;

fn bucket(word: &str) -> usize {
    word.bytes()
        .fold(7usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize))
        % DIMS
}

#[async_trait]
impl Embedder for BagOfWordsEmbedder {
    fn model_name(&self) -> &str {
        "bag-of-words"
    }

    fn dims(&self) -> usize {
        DIMS
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut v = vec![0.0; DIMS];
                for word in text
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|w| !w.is_empty())
                {
                    v[bucket(&word.to_lowercase())] += 1.0;
                }
                if v.iter().all(|x| *x == 0.0) {
                    v[0] = 1.0;
                }
                v
            })
            .collect())
    }
}

/// Answers with the context it was given, so tests can see what was retrieved.
#[derive(Default)]
pub struct EchoModel {
    calls: Mutex<usize>,
}

impl EchoModel {
    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl LanguageModel for EchoModel {
    fn model_name(&self) -> &str {
        "echo"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        *self.calls.lock().unwrap() += 1;
        let context = prompt
            .split_once("\n\n")
            .and_then(|(_, rest)| rest.rsplit_once("\n\nQuestion:"))
            .map(|(context, _)| context.to_string())
            .ok_or_else(|| anyhow!("unexpected prompt layout"))?;
        Ok(context)
    }
}

pub struct FixedSpeech(pub Option<Vec<u8>>);

#[async_trait]
impl SpeechSynthesizer for FixedSpeech {
    async fn synthesize(&self, _text: &str, _lang: &str) -> Result<Vec<u8>> {
        self.0.clone().ok_or_else(|| anyhow!("speech service unavailable"))
    }
}

pub struct TestSession {
    pub session: ChatSession,
    pub store: Arc<InMemoryStore>,
    pub llm: Arc<EchoModel>,
}

/// A session over the in-memory store. `audio: None` makes speech fail.
pub fn test_session(config: Config, audio: Option<Vec<u8>>) -> TestSession {
    let store = Arc::new(InMemoryStore::new());
    let llm = Arc::new(EchoModel::default());
    let services = Services {
        embedder: Arc::new(BagOfWordsEmbedder),
        store: store.clone(),
        llm: llm.clone(),
        speech: Arc::new(FixedSpeech(audio)),
    };
    TestSession {
        session: ChatSession::new(config, services),
        store,
        llm,
    }
}

pub fn pages(texts: &[&str]) -> Vec<Page> {
    texts
        .iter()
        .enumerate()
        .map(|(index, text)| Page {
            index,
            text: text.to_string(),
        })
        .collect()
}

/// A one-page PDF with each line drawn in Helvetica.
pub fn pdf_with_lines(lines: &[&str]) -> Vec<u8> {
    pdf_with_pages(&[lines])
}

/// A PDF with one page per entry, each page's lines drawn in Helvetica.
pub fn pdf_with_pages(pages: &[&[&str]]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for lines in pages {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
        ];
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                operations.push(Operation::new("Td", vec![0.into(), (-16).into()]));
            }
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        }
        operations.push(Operation::new("ET", vec![]));

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}
