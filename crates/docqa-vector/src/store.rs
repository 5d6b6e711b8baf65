//! Persistent knowledge store on LanceDB.
//!
//! One table holds chunk metadata, text, an insertion sequence number and the
//! embedding. The table is created by the first non-empty `add`, which also
//! fixes the vector width. `reset` deletes every row in one commit; the table
//! and its width stay.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use arrow_array::RecordBatchIterator;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{Connection, DistanceType, Table};

use docqa_core::traits::Store;
use docqa_core::types::{Chunk, DocumentFormat, ScoredChunk, StoreStats};
use docqa_core::{Error, Result};

use crate::schema::{max_seq, read_documents, read_hits, to_record_batch, vector_dim};
use crate::table::{open_db, open_existing, sql_literal};
use crate::{check_batch, check_k, rank};

/// Extra rows fetched past `k` before checking whether a tie runs past the page.
const TIE_SLACK: usize = 16;

pub struct LanceStore {
    conn: Connection,
    table_name: String,
    table: Option<Table>,
    dim: Option<usize>,
    next_seq: i64,
}

impl LanceStore {
    /// Opens (or prepares to create) `table_name` in the database at `path`.
    pub async fn open(path: &Path, table_name: &str) -> Result<Self> {
        std::fs::create_dir_all(path)?;
        let conn = open_db(path.to_string_lossy().as_ref()).await?;
        let mut store = Self { conn, table_name: table_name.to_string(), table: None, dim: None, next_seq: 0 };
        if let Some(table) = open_existing(&store.conn, table_name).await? {
            let schema = table.schema().await.map_err(Error::store)?;
            store.dim = vector_dim(&schema);
            store.next_seq = last_seq(&table).await?.map_or(0, |s| s + 1);
            store.table = Some(table);
        }
        tracing::info!(path = %path.display(), table = table_name, dim = ?store.dim, "opened knowledge store");
        Ok(store)
    }

    pub fn dim(&self) -> Option<usize> {
        self.dim
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

async fn last_seq(table: &Table) -> Result<Option<i64>> {
    let mut stream = table
        .query()
        .select(Select::columns(&["seq"]))
        .execute()
        .await
        .map_err(Error::store)?;
    let mut last = None;
    while let Some(batch) = stream.try_next().await.map_err(Error::store)? {
        last = last.max(max_seq(&batch)?);
    }
    Ok(last)
}

async fn nearest(table: &Table, embedding: &[f32], limit: usize) -> Result<Vec<(ScoredChunk, i64)>> {
    let mut stream = table
        .vector_search(embedding.to_vec())
        .map_err(Error::store)?
        .distance_type(DistanceType::Cosine)
        .limit(limit)
        .execute()
        .await
        .map_err(Error::store)?;
    let mut hits = Vec::new();
    while let Some(batch) = stream.try_next().await.map_err(Error::store)? {
        hits.extend(read_hits(&batch)?);
    }
    Ok(hits)
}

/// Whether the lowest score fetched equals the k-th best one.
fn tie_reaches_page_end(hits: &[(ScoredChunk, i64)], k: usize) -> bool {
    let mut scores: Vec<f32> = hits.iter().map(|(h, _)| h.score).collect();
    scores.sort_by(|a, b| b.total_cmp(a));
    match (scores.get(k.min(scores.len()).saturating_sub(1)), scores.last()) {
        (Some(kth), Some(last)) => last >= kth,
        _ => false,
    }
}

#[async_trait]
impl Store for LanceStore {
    async fn add(&mut self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
        let Some(dim) = check_batch(chunks, embeddings, self.dim)? else {
            return Ok(());
        };
        let now = chrono::Utc::now().timestamp_millis();
        let batch = to_record_batch(chunks, embeddings, dim, self.next_seq, now)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        if let Some(table) = &self.table {
            table.add(reader).execute().await.map_err(Error::store)?;
        } else {
            let table = self
                .conn
                .create_table(&self.table_name, reader)
                .execute()
                .await
                .map_err(Error::store)?;
            self.table = Some(table);
            self.dim = Some(dim);
        }
        self.next_seq += chunks.len() as i64;
        tracing::debug!(rows = chunks.len(), table = %self.table_name, "appended chunks");
        Ok(())
    }

    async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        check_k(k)?;
        let (Some(table), Some(dim)) = (&self.table, self.dim) else {
            return Ok(Vec::new());
        };
        if embedding.len() != dim {
            return Err(Error::DimensionMismatch { expected: dim, actual: embedding.len() });
        }
        let total = table.count_rows(None).await.map_err(Error::store)?;
        if total == 0 {
            return Ok(Vec::new());
        }
        let mut limit = k.saturating_add(TIE_SLACK).min(total);
        loop {
            let hits = nearest(table, embedding, limit).await?;
            // a full page whose last row still ties the k-th may hide earlier inserts
            if hits.len() < limit || limit >= total || !tie_reaches_page_end(&hits, k) {
                return Ok(rank(hits, k));
            }
            limit = limit.saturating_mul(2).min(total);
            tracing::debug!(limit, "tied block spans the page, widening");
        }
    }

    async fn reset(&mut self) -> Result<()> {
        if let Some(table) = &self.table {
            table.delete("seq >= 0").await.map_err(Error::store)?;
            tracing::info!(table = %self.table_name, "knowledge store cleared");
        }
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        match &self.table {
            Some(table) => Ok(table.count_rows(None).await.map_err(Error::store)?),
            None => Ok(0),
        }
    }

    async fn contains_document(&self, doc_id: &str) -> Result<bool> {
        let Some(table) = &self.table else {
            return Ok(false);
        };
        let filter = format!("doc_id = {}", sql_literal(doc_id));
        let n = table.count_rows(Some(filter)).await.map_err(Error::store)?;
        Ok(n > 0)
    }

    async fn stats(&self) -> Result<StoreStats> {
        let Some(table) = &self.table else {
            return Ok(StoreStats::default());
        };
        let mut stream = table
            .query()
            .select(Select::columns(&["doc_id", "format"]))
            .execute()
            .await
            .map_err(Error::store)?;
        let mut chunks = 0usize;
        let mut docs: HashSet<String> = HashSet::new();
        let mut formats: BTreeMap<DocumentFormat, usize> = BTreeMap::new();
        while let Some(batch) = stream.try_next().await.map_err(Error::store)? {
            for (doc_id, format) in read_documents(&batch)? {
                chunks += 1;
                if docs.insert(doc_id) {
                    if let Some(f) = DocumentFormat::parse(&format) {
                        *formats.entry(f).or_insert(0) += 1;
                    }
                }
            }
        }
        Ok(StoreStats { documents: docs.len(), chunks, formats })
    }
}
