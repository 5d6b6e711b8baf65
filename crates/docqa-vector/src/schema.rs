//! Arrow layout of the chunk table and conversions to and from record batches.

use std::sync::Arc;

use arrow_array::types::Float32Type;
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int32Array, Int64Array, RecordBatch, StringArray,
    TimestampMillisecondArray,
};
use arrow_schema::{DataType, Field, Schema, SchemaRef, TimeUnit};

use docqa_core::types::{Chunk, DocumentFormat, ScoredChunk};
use docqa_core::{Error, Result};

pub const VECTOR_COLUMN: &str = "vector";
pub const DISTANCE_COLUMN: &str = "_distance";

pub fn chunk_schema(dim: usize) -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("doc_id", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("format", DataType::Utf8, false),
        Field::new("chunk_index", DataType::Int32, false),
        Field::new("total_chunks", DataType::Int32, false),
        Field::new("overlap", DataType::Int32, false),
        Field::new("content", DataType::Utf8, false),
        Field::new("seq", DataType::Int64, false),
        Field::new("ingested_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
        Field::new(
            VECTOR_COLUMN,
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim as i32),
            true,
        ),
    ]))
}

/// Width of the vector column, if the schema has one.
pub fn vector_dim(schema: &Schema) -> Option<usize> {
    match schema.field_with_name(VECTOR_COLUMN).ok()?.data_type() {
        DataType::FixedSizeList(_, n) => Some(*n as usize),
        _ => None,
    }
}

/// One batch holding `chunks` with sequence numbers starting at `first_seq`.
pub fn to_record_batch(
    chunks: &[Chunk],
    embeddings: &[Vec<f32>],
    dim: usize,
    first_seq: i64,
    ingested_at_ms: i64,
) -> Result<RecordBatch> {
    let vectors = embeddings.iter().map(|v| Some(v.iter().copied().map(Some).collect::<Vec<_>>()));
    let columns: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from_iter_values(chunks.iter().map(|c| c.id.as_str()))),
        Arc::new(StringArray::from_iter_values(chunks.iter().map(|c| c.doc_id.as_str()))),
        Arc::new(StringArray::from_iter_values(chunks.iter().map(|c| c.source.as_str()))),
        Arc::new(StringArray::from_iter_values(chunks.iter().map(|c| c.format.as_str()))),
        Arc::new(Int32Array::from_iter_values(chunks.iter().map(|c| c.index as i32))),
        Arc::new(Int32Array::from_iter_values(chunks.iter().map(|c| c.total as i32))),
        Arc::new(Int32Array::from_iter_values(chunks.iter().map(|c| c.overlap as i32))),
        Arc::new(StringArray::from_iter_values(chunks.iter().map(|c| c.content.as_str()))),
        Arc::new(Int64Array::from_iter_values((0..chunks.len() as i64).map(|i| first_seq + i))),
        Arc::new(TimestampMillisecondArray::from(vec![ingested_at_ms; chunks.len()])),
        Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim as i32)),
    ];
    RecordBatch::try_new(chunk_schema(dim), columns).map_err(Error::store)
}

fn column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| Error::Store(format!("column '{name}' missing or of unexpected type")))
}

/// Decodes search results into `(hit, seq)` pairs. Score is `1 - cosine distance`.
pub fn read_hits(batch: &RecordBatch) -> Result<Vec<(ScoredChunk, i64)>> {
    let ids = column::<StringArray>(batch, "id")?;
    let doc_ids = column::<StringArray>(batch, "doc_id")?;
    let sources = column::<StringArray>(batch, "source")?;
    let formats = column::<StringArray>(batch, "format")?;
    let indexes = column::<Int32Array>(batch, "chunk_index")?;
    let totals = column::<Int32Array>(batch, "total_chunks")?;
    let overlaps = column::<Int32Array>(batch, "overlap")?;
    let contents = column::<StringArray>(batch, "content")?;
    let seqs = column::<Int64Array>(batch, "seq")?;
    let distances = column::<Float32Array>(batch, DISTANCE_COLUMN)?;

    let mut hits = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let format = DocumentFormat::parse(formats.value(i))
            .ok_or_else(|| Error::Store(format!("unknown format '{}' in row {}", formats.value(i), ids.value(i))))?;
        let chunk = Chunk {
            id: ids.value(i).to_string(),
            doc_id: doc_ids.value(i).to_string(),
            source: sources.value(i).to_string(),
            format,
            index: indexes.value(i) as usize,
            total: totals.value(i) as usize,
            overlap: overlaps.value(i) as usize,
            content: contents.value(i).to_string(),
        };
        let score = 1.0 - distances.value(i);
        // a zero query vector has no direction
        let score = if score.is_finite() { score } else { 0.0 };
        hits.push((ScoredChunk { chunk, score }, seqs.value(i)));
    }
    Ok(hits)
}

/// Pulls `(doc_id, format)` pairs out of a batch projected to those columns.
pub fn read_documents(batch: &RecordBatch) -> Result<Vec<(String, String)>> {
    let doc_ids = column::<StringArray>(batch, "doc_id")?;
    let formats = column::<StringArray>(batch, "format")?;
    Ok((0..batch.num_rows())
        .map(|i| (doc_ids.value(i).to_string(), formats.value(i).to_string()))
        .collect())
}

pub fn max_seq(batch: &RecordBatch) -> Result<Option<i64>> {
    let seqs = column::<Int64Array>(batch, "seq")?;
    Ok(seqs.iter().flatten().max())
}
