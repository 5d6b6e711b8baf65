//! Ingest and query flows over one knowledge store.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use docqa_core::chunker::Chunker;
use docqa_core::config::Settings;
use docqa_core::prompt::PromptAssembler;
use docqa_core::traits::{Embedder, Generator, Store};
use docqa_core::types::{ScoredChunk, StoreStats};
use docqa_core::{Error, Result};
use docqa_reader::ReaderRegistry;

use crate::ingest::{DocStatus, IngestEvent, IngestFailure, IngestReport, IngestedDocument, SkipReason};
use crate::retriever::Retriever;
use crate::state::{PipelineState, StateWatch};

/// Generated answer and the passages that were placed in its prompt.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub context: Vec<ScoredChunk>,
}

/// One question/answer turn kept for the session.
#[derive(Debug, Clone, PartialEq)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
    pub context_used: usize,
    pub sources: Vec<String>,
}

enum Outcome {
    Ingested { doc_id: String, chunks: usize },
    Skipped(SkipReason),
}

pub struct Orchestrator<S> {
    store: S,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    readers: ReaderRegistry,
    chunker: Chunker,
    assembler: PromptAssembler,
    model: String,
    top_k: usize,
    min_score: f32,
    state: StateWatch,
    history: Vec<Exchange>,
}

impl<S: Store> Orchestrator<S> {
    pub fn new(store: S, embedder: Arc<dyn Embedder>, generator: Arc<dyn Generator>, settings: &Settings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            store,
            embedder,
            generator,
            readers: ReaderRegistry::default(),
            chunker: Chunker::new(settings.chunking.clone())?,
            assembler: PromptAssembler::new(settings.prompt.clone()),
            model: settings.llm.model.clone(),
            top_k: settings.retrieval.top_k,
            min_score: settings.retrieval.min_score,
            state: StateWatch::default(),
            history: Vec::new(),
        })
    }

    pub fn with_readers(mut self, readers: ReaderRegistry) -> Self {
        self.readers = readers;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state.get()
    }

    pub fn state_watch(&self) -> StateWatch {
        self.state.clone()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ingests `paths` one by one. A failing document is recorded in the
    /// report and does not stop the others.
    pub async fn ingest<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
        observer: &mut (dyn FnMut(IngestEvent) + Send),
    ) -> Result<IngestReport> {
        let _guard = self.state.enter(PipelineState::Ingesting)?;
        let total = paths.len();
        let mut report = IngestReport::default();
        tracing::info!(files = total, "ingest started");

        for (position, path) in paths.iter().enumerate() {
            let path = path.as_ref();
            observer(IngestEvent::Started { path: path.to_path_buf(), position, total });
            let status = match self.ingest_one(path).await {
                Ok(Outcome::Ingested { doc_id, chunks }) => {
                    tracing::info!(path = %path.display(), chunks, "document ingested");
                    report.ingested.push(IngestedDocument { path: path.to_path_buf(), doc_id, chunks });
                    DocStatus::Ingested { chunks }
                }
                Ok(Outcome::Skipped(reason)) => {
                    tracing::warn!(path = %path.display(), ?reason, "document skipped");
                    report.skipped.push((path.to_path_buf(), reason));
                    DocStatus::Skipped(reason)
                }
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "document failed");
                    let status = DocStatus::Failed(error.to_string());
                    report.failed.push(IngestFailure { path: path.to_path_buf(), error });
                    status
                }
            };
            observer(IngestEvent::Finished { path: path.to_path_buf(), position, total, status });
        }

        tracing::info!(
            ingested = report.ingested.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            chunks = report.total_chunks(),
            "ingest finished"
        );
        Ok(report)
    }

    pub async fn ingest_paths<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<IngestReport> {
        self.ingest(paths, &mut |_| {}).await
    }

    async fn ingest_one(&mut self, path: &Path) -> Result<Outcome> {
        let doc = self.readers.load(path)?;
        if self.store.contains_document(&doc.id).await? {
            return Ok(Outcome::Skipped(SkipReason::Duplicate));
        }
        if doc.text.trim().is_empty() {
            return Ok(Outcome::Skipped(SkipReason::NoText));
        }
        let chunks = self.chunker.chunk_document(&doc);
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        self.store.add(&chunks, &embeddings).await?;
        Ok(Outcome::Ingested { doc_id: doc.id, chunks: chunks.len() })
    }

    /// Retrieves context for `question`, builds the prompt and asks the model.
    pub async fn ask(&mut self, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidArgument("question is empty".into()));
        }
        let _guard = self.state.enter(PipelineState::Querying)?;

        let hits = Retriever::new(self.embedder.as_ref(), &self.store)
            .with_min_score(self.min_score)
            .retrieve_scored(question, self.top_k)
            .await?;
        let chunks: Vec<_> = hits.iter().map(|h| h.chunk.clone()).collect();
        let prompt = self.assembler.assemble(question, &chunks)?;
        let text = self.generator.generate(prompt.as_ref(), &self.model).await?;

        let mut context = hits;
        context.truncate(prompt.chunks_used);
        let mut seen = BTreeSet::new();
        let sources = context
            .iter()
            .filter(|h| seen.insert(h.chunk.source.clone()))
            .map(|h| h.chunk.source.clone())
            .collect();
        self.history.push(Exchange {
            question: question.to_string(),
            answer: text.clone(),
            context_used: context.len(),
            sources,
        });
        tracing::info!(context = context.len(), answer_chars = text.chars().count(), "question answered");
        Ok(Answer { text, context })
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        self.store.stats().await
    }

    pub fn history(&self) -> &[Exchange] {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Empties the knowledge store and forgets the conversation.
    pub async fn reset(&mut self) -> Result<()> {
        let _guard = self.state.enter(PipelineState::Ingesting)?;
        self.store.reset().await?;
        self.history.clear();
        tracing::info!("knowledge base and history cleared");
        Ok(())
    }
}
