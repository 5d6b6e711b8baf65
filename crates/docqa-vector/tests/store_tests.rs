use docqa_core::traits::Store;
use docqa_core::types::{Chunk, DocumentFormat};
use docqa_core::Error;
use docqa_vector::{LanceStore, MemoryStore, SharedStore};

fn chunk(doc: &str, index: usize, format: DocumentFormat, content: &str) -> Chunk {
    Chunk {
        id: format!("{doc}:{index}"),
        doc_id: doc.to_string(),
        source: format!("{doc}.{}", format.as_str()),
        format,
        index,
        total: 3,
        overlap: 0,
        content: content.to_string(),
    }
}

fn sample() -> (Vec<Chunk>, Vec<Vec<f32>>) {
    let chunks = vec![
        chunk("a", 0, DocumentFormat::Text, "north"),
        chunk("a", 1, DocumentFormat::Text, "east"),
        chunk("b", 0, DocumentFormat::Pdf, "north-east"),
    ];
    let embeddings = vec![vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0], vec![0.7, 0.7, 0.0]];
    (chunks, embeddings)
}

/// Behaviour every store must share.
async fn exercise_store<S: Store>(store: &mut S) -> anyhow::Result<()> {
    assert!(store.is_empty().await?);
    assert!(store.query(&[1.0, 0.0, 0.0], 3).await?.is_empty());

    let (chunks, embeddings) = sample();
    store.add(&chunks, &embeddings).await?;
    assert_eq!(store.len().await?, 3);
    assert!(store.contains_document("a").await?);
    assert!(!store.contains_document("zzz").await?);

    let hits = store.query(&[1.0, 0.0, 0.0], 2).await?;
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].chunk.content, "north");
    assert_eq!(hits[1].chunk.content, "north-east");
    assert!(hits[0].score >= hits[1].score);
    assert!((hits[0].score - 1.0).abs() < 1e-4);

    // k above the entry count
    assert_eq!(store.query(&[0.0, 1.0, 0.0], 50).await?.len(), 3);
    assert!(matches!(store.query(&[1.0, 0.0, 0.0], 0).await, Err(Error::InvalidArgument(_))));
    assert!(matches!(store.query(&[1.0, 0.0], 1).await, Err(Error::DimensionMismatch { expected: 3, actual: 2 })));

    // rejected batches leave the count unchanged
    let extra = vec![chunk("c", 0, DocumentFormat::Docx, "x")];
    assert!(matches!(store.add(&extra, &[vec![1.0, 0.0]]).await, Err(Error::DimensionMismatch { .. })));
    assert!(matches!(store.add(&extra, &[]).await, Err(Error::DimensionMismatch { .. })));
    assert_eq!(store.len().await?, 3);

    let stats = store.stats().await?;
    assert_eq!(stats.documents, 2);
    assert_eq!(stats.chunks, 3);
    assert_eq!(stats.formats.get(&DocumentFormat::Text), Some(&1));
    assert_eq!(stats.formats.get(&DocumentFormat::Pdf), Some(&1));

    store.reset().await?;
    assert!(store.query(&[1.0, 0.0, 0.0], 3).await?.is_empty());
    store.reset().await?;
    assert_eq!(store.len().await?, 0);
    assert!(!store.contains_document("a").await?);
    Ok(())
}

#[tokio::test]
async fn memory_store_contract() -> anyhow::Result<()> {
    exercise_store(&mut MemoryStore::new()).await
}

#[tokio::test]
async fn lance_store_contract() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut store = LanceStore::open(&tmp.path().join("kb"), "document_chunks").await?;
    exercise_store(&mut store).await
}

#[tokio::test]
async fn shared_store_contract() -> anyhow::Result<()> {
    exercise_store(&mut SharedStore::new(MemoryStore::new())).await
}

#[tokio::test]
async fn ties_go_to_the_earlier_insert() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut lance = LanceStore::open(tmp.path(), "ties").await?;
    let mut memory = MemoryStore::new();
    let first = vec![chunk("first", 0, DocumentFormat::Text, "same")];
    let second = vec![chunk("second", 0, DocumentFormat::Text, "same")];
    for store in [&mut lance as &mut dyn Store, &mut memory as &mut dyn Store] {
        store.add(&first, &[vec![0.0, 1.0]]).await?;
        store.add(&second, &[vec![0.0, 1.0]]).await?;
        let hits = store.query(&[0.0, 1.0], 1).await?;
        assert_eq!(hits[0].chunk.doc_id, "first");
    }
    Ok(())
}

#[tokio::test]
async fn long_tie_runs_still_favour_the_earliest_inserts() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut lance = LanceStore::open(tmp.path(), "header_pages").await?;
    let mut memory = MemoryStore::new();
    let chunks: Vec<Chunk> = (0..120).map(|i| chunk("d0", i, DocumentFormat::Pdf, "Page header")).collect();
    let embeddings = vec![vec![0.6, 0.8]; chunks.len()];
    for store in [&mut lance as &mut dyn Store, &mut memory as &mut dyn Store] {
        // several commits so later rows can land in other fragments
        for (c, e) in chunks.chunks(40).zip(embeddings.chunks(40)) {
            store.add(c, e).await?;
        }
        let ids: Vec<String> = store.query(&[0.6, 0.8], 3).await?.into_iter().map(|h| h.chunk.id).collect();
        assert_eq!(ids, vec!["d0:0", "d0:1", "d0:2"]);
    }
    Ok(())
}

#[tokio::test]
async fn unbounded_k_returns_every_row() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut lance = LanceStore::open(tmp.path(), "k_max").await?;
    let mut memory = MemoryStore::new();
    let (chunks, embeddings) = sample();
    for store in [&mut lance as &mut dyn Store, &mut memory as &mut dyn Store] {
        store.add(&chunks, &embeddings).await?;
        let hits = store.query(&[1.0, 0.0, 0.0], usize::MAX).await?;
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].chunk.id, "a:0");
    }
    Ok(())
}

#[tokio::test]
async fn lance_contents_survive_reopen() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = tmp.path().join("kb");
    {
        let mut store = LanceStore::open(&path, "document_chunks").await?;
        let (chunks, embeddings) = sample();
        store.add(&chunks, &embeddings).await?;
    }
    let mut store = LanceStore::open(&path, "document_chunks").await?;
    assert_eq!(store.dim(), Some(3));
    assert_eq!(store.len().await?, 3);
    let hits = store.query(&[0.0, 1.0, 0.0], 1).await?;
    assert_eq!(hits[0].chunk.id, "a:1");
    assert_eq!(hits[0].chunk.format, DocumentFormat::Text);

    // new rows continue the insertion order
    store.add(&[chunk("z", 0, DocumentFormat::Text, "east again")], &[vec![0.0, 1.0, 0.0]]).await?;
    let hits = store.query(&[0.0, 1.0, 0.0], 2).await?;
    assert_eq!(hits[0].chunk.id, "a:1");
    assert_eq!(hits[1].chunk.id, "z:0");
    Ok(())
}

#[tokio::test]
async fn lance_reset_keeps_vector_width() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let mut store = LanceStore::open(tmp.path(), "t").await?;
    let (chunks, embeddings) = sample();
    store.add(&chunks, &embeddings).await?;
    store.reset().await?;
    let err = store.add(&chunks[..1], &[vec![1.0, 0.0]]).await.unwrap_err();
    assert!(matches!(err, Error::DimensionMismatch { expected: 3, actual: 2 }));
    store.add(&chunks[..1], &embeddings[..1]).await?;
    assert_eq!(store.len().await?, 1);
    Ok(())
}

#[tokio::test]
async fn readers_never_see_a_half_reset() -> anyhow::Result<()> {
    let mut shared = SharedStore::new(MemoryStore::new());
    let chunks: Vec<Chunk> = (0..200).map(|i| chunk("bulk", i, DocumentFormat::Text, "row")).collect();
    let embeddings: Vec<Vec<f32>> = (0..200).map(|i| vec![1.0, i as f32]).collect();
    shared.add(&chunks, &embeddings).await?;

    let mut readers = Vec::new();
    for _ in 0..16 {
        let handle = shared.clone();
        readers.push(tokio::spawn(async move { handle.len().await }));
    }
    let mut writer = shared.clone();
    let reset = tokio::spawn(async move { writer.reset().await });
    for r in readers {
        let n = r.await??;
        assert!(n == 0 || n == 200, "observed {n} rows");
    }
    reset.await??;
    assert_eq!(shared.len().await?, 0);
    Ok(())
}
