//! docqa-pipeline
//!
//! Wires readers, chunker, embedder, store and generator into the two flows
//! the application exposes: ingesting documents and answering questions.

pub mod ingest;
pub mod orchestrator;
pub mod retriever;
pub mod state;

pub use ingest::{DocStatus, IngestEvent, IngestFailure, IngestReport, IngestedDocument, SkipReason};
pub use orchestrator::{Answer, Exchange, Orchestrator};
pub use retriever::Retriever;
pub use state::{PipelineState, StateWatch};
