use crate::chunking::ChunkingConfig;
use crate::embeddings::Embedder;
use crate::error::{EmbeddingError, IndexError, IngestError, SearchError, SnapshotError};
use crate::index::FlatL2Index;
use crate::ingest::{prepare_document, DocumentInput, PreparedDocument};
use crate::models::{preview, Answer, Chunk, IngestionReport, RagOptions, ScoredChunk, SourceReference};
use crate::retriever;
use crate::snapshot::{self, SnapshotInfo};
use crate::store::KnowledgeStore;
use crate::synthesis::{AnswerSynthesizer, GenerationBackend, NO_INFORMATION_MESSAGE};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Vector index and chunk records. Only ever mutated together under one write guard.
#[derive(Debug)]
struct Collection {
    index: FlatL2Index,
    store: KnowledgeStore,
}

impl Collection {
    fn append(&mut self, chunks: Vec<Chunk>, embeddings: &[Vec<f32>]) -> Result<(), IngestError> {
        if chunks.len() != embeddings.len() {
            return Err(IndexError::BatchMismatch {
                vectors: embeddings.len(),
                chunks: chunks.len(),
            }
            .into());
        }
        // insert validates every vector first, so a failure leaves both halves untouched
        self.index.insert(embeddings)?;
        self.store.append(chunks);
        Ok(())
    }

    fn clear(&mut self) {
        self.index.clear();
        self.store.clear();
    }
}

/// The single owner of a knowledge base: its collection, embedder and answer synthesizer.
pub struct KnowledgeBase {
    collection: RwLock<Collection>,
    embedder: Arc<dyn Embedder>,
    synthesizer: AnswerSynthesizer,
    chunking: ChunkingConfig,
    options: RagOptions,
}

impl KnowledgeBase {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        backend: GenerationBackend,
        options: RagOptions,
    ) -> Result<Self, IngestError> {
        let chunking = ChunkingConfig::from(&options);
        chunking.validate()?;

        info!(
            dimension = embedder.dimensions(),
            backend = backend.name(),
            chunk_size = chunking.target_size,
            chunk_overlap = chunking.overlap,
            "knowledge base initialized"
        );

        Ok(Self {
            collection: RwLock::new(Collection {
                index: FlatL2Index::new(embedder.dimensions()),
                store: KnowledgeStore::new(),
            }),
            synthesizer: AnswerSynthesizer::new(backend, &options),
            embedder,
            chunking,
            options,
        })
    }

    pub fn dimension(&self) -> usize {
        self.embedder.dimensions()
    }

    pub fn options(&self) -> &RagOptions {
        &self.options
    }

    pub fn backend(&self) -> &GenerationBackend {
        self.synthesizer.backend()
    }

    /// Chunks, embeds and stores one document. Failures are reported, never partially applied.
    pub async fn ingest(&self, source: &str, text: &str) -> IngestionReport {
        let document = DocumentInput::new(source, text);
        match self.try_ingest(&document).await {
            Ok(0) => {
                warn!(source, "document produced no chunks");
                IngestionReport::succeeded(source, 0)
            }
            Ok(added) => {
                info!(source, chunks = added, "document ingested");
                IngestionReport::succeeded(source, added)
            }
            Err(error) => {
                warn!(source, %error, "document ingestion failed");
                IngestionReport::failed(source, error)
            }
        }
    }

    /// Ingests each document independently; one failure does not stop the rest.
    pub async fn ingest_batch(&self, documents: &[DocumentInput]) -> Vec<IngestionReport> {
        let mut reports = Vec::with_capacity(documents.len());
        for document in documents {
            reports.push(self.ingest(&document.source, &document.text).await);
        }
        reports
    }

    async fn try_ingest(&self, document: &DocumentInput) -> Result<usize, IngestError> {
        let PreparedDocument {
            chunks, embeddings, ..
        } = prepare_document(document, &self.chunking, self.embedder.clone()).await?;

        if chunks.is_empty() {
            return Ok(0);
        }

        let added = chunks.len();
        let mut collection = self.collection.write().await;
        collection.append(chunks, &embeddings)?;
        Ok(added)
    }

    /// Ranked chunks for `query`. `top_k == 0` or an empty collection yields nothing.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<ScoredChunk>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::Request("query is empty".to_string()));
        }
        if top_k == 0 || self.document_count().await == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embed_query(query).await?;
        let collection = self.collection.read().await;
        retriever::retrieve(
            &collection.index,
            &collection.store,
            &query_embedding,
            top_k,
        )
    }

    /// Retrieves context and synthesizes a grounded answer with cited sources.
    pub async fn answer(&self, query: &str, top_k: usize) -> Result<Answer, SearchError> {
        let context = self.retrieve(query, top_k).await?;
        if context.is_empty() {
            return Ok(Answer {
                query: query.to_string(),
                answer: NO_INFORMATION_MESSAGE.to_string(),
                sources: Vec::new(),
            });
        }

        let answer = self.synthesizer.compose(query, &context).await;
        let sources = context
            .iter()
            .map(|item| SourceReference {
                source: item.chunk.source.clone(),
                sequence_index: item.chunk.sequence_index,
                distance: item.distance,
                preview: preview(&item.chunk.text, self.options.source_preview_chars),
            })
            .collect();

        Ok(Answer {
            query: query.to_string(),
            answer,
            sources,
        })
    }

    /// Number of stored chunks.
    pub async fn document_count(&self) -> usize {
        self.collection.read().await.store.len()
    }

    pub async fn list_sources(&self) -> BTreeSet<String> {
        self.collection.read().await.store.sources()
    }

    pub async fn clear_all(&self) {
        self.collection.write().await.clear();
        info!("knowledge base cleared");
    }

    pub async fn save_snapshot(&self, dir: &Path) -> Result<SnapshotInfo, SnapshotError> {
        let encoded = {
            let collection = self.collection.read().await;
            snapshot::encode(&collection.index, &collection.store)?
        };
        snapshot::write(dir, &encoded).await?;
        Ok(encoded.info)
    }

    /// Replaces the collection with the snapshot in `dir`. A missing snapshot leaves it untouched.
    pub async fn load_snapshot(&self, dir: &Path) -> Result<Option<SnapshotInfo>, SnapshotError> {
        let Some(loaded) = snapshot::read(dir, self.dimension()).await? else {
            return Ok(None);
        };

        let mut collection = self.collection.write().await;
        collection.index = loaded.index;
        collection.store = loaded.store;
        Ok(Some(loaded.info))
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, SearchError> {
        let embedder = self.embedder.clone();
        let query = query.to_string();
        tokio::task::spawn_blocking(move || embedder.embed(&query))
            .await
            .map_err(|error| EmbeddingError::Aborted(error.to_string()))?
            .map_err(SearchError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbedder;
    use tempfile::tempdir;

    const PUMPS: &str = "Hydraulic pumps convert mechanical power into fluid power. \
Gear pumps are simple and robust. Piston pumps reach the highest pressures.";
    const VALVES: &str = "Relief valves protect the circuit from overpressure. \
Directional valves route flow to the actuators. Check valves allow flow in one direction.";

    /// Embeds by keyword presence so distances are predictable.
    struct KeywordEmbedder;

    impl Embedder for KeywordEmbedder {
        fn dimensions(&self) -> usize {
            3
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            let lowered = text.to_lowercase();
            Ok(["pump", "valve", "filter"]
                .iter()
                .map(|word| if lowered.contains(word) { 1.0 } else { 0.0 })
                .collect())
        }
    }

    struct WrongDimensionEmbedder;

    impl Embedder for WrongDimensionEmbedder {
        fn dimensions(&self) -> usize {
            4
        }

        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            // claims 4 dimensions, returns 2 for anything mentioning "broken"
            if text.contains("broken") {
                Ok(vec![0.0; 2])
            } else {
                Ok(vec![0.0; 4])
            }
        }
    }

    fn options() -> RagOptions {
        RagOptions {
            chunk_size: 80,
            chunk_overlap: 10,
            ..RagOptions::default()
        }
    }

    fn knowledge_base(embedder: Arc<dyn Embedder>) -> KnowledgeBase {
        KnowledgeBase::new(embedder, GenerationBackend::NoBackend, options()).unwrap()
    }

    #[tokio::test]
    async fn ingest_then_answer_cites_relevant_source() {
        let kb = knowledge_base(Arc::new(KeywordEmbedder));
        let pumps = kb.ingest("pumps.txt", PUMPS).await;
        let valves = kb.ingest("valves.txt", VALVES).await;
        assert!(!pumps.failed && !valves.failed);
        assert!(pumps.chunks_added > 1);

        let answer = kb.answer("Which valve protects against overpressure?", 2).await.unwrap();
        assert_eq!(answer.sources.len(), 2);
        assert!(answer.sources.iter().all(|source| source.source == "valves.txt"));
        assert!(answer.sources[0].distance <= answer.sources[1].distance);
        assert!(answer.answer.starts_with("Based on the available documents:"));
    }

    #[tokio::test]
    async fn empty_knowledge_base_answers_with_fixed_message() {
        let kb = knowledge_base(Arc::new(KeywordEmbedder));
        let answer = kb.answer("anything", 3).await.unwrap();
        assert_eq!(answer.answer, NO_INFORMATION_MESSAGE);
        assert!(answer.sources.is_empty());
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let kb = knowledge_base(Arc::new(KeywordEmbedder));
        assert!(matches!(
            kb.answer("   ", 3).await,
            Err(SearchError::Request(_))
        ));
    }

    #[tokio::test]
    async fn zero_top_k_returns_no_sources() {
        let kb = knowledge_base(Arc::new(KeywordEmbedder));
        kb.ingest("pumps.txt", PUMPS).await;
        let answer = kb.answer("pump", 0).await.unwrap();
        assert!(answer.sources.is_empty());
        assert_eq!(answer.answer, NO_INFORMATION_MESSAGE);
    }

    #[tokio::test]
    async fn sources_and_counts_track_ingestion_and_clear() {
        let kb = knowledge_base(Arc::new(HashingEmbedder::with_dimensions(64)));
        let reports = kb
            .ingest_batch(&[
                DocumentInput::new("pumps.txt", PUMPS),
                DocumentInput::new("valves.txt", VALVES),
            ])
            .await;
        let added: usize = reports.iter().map(|report| report.chunks_added).sum();

        assert_eq!(kb.document_count().await, added);
        assert_eq!(
            kb.list_sources().await.into_iter().collect::<Vec<_>>(),
            vec!["pumps.txt".to_string(), "valves.txt".to_string()]
        );

        kb.clear_all().await;
        assert_eq!(kb.document_count().await, 0);
        assert!(kb.list_sources().await.is_empty());
    }

    #[tokio::test]
    async fn failed_document_is_isolated_and_leaves_state_untouched() {
        let kb = knowledge_base(Arc::new(WrongDimensionEmbedder));
        let reports = kb
            .ingest_batch(&[
                DocumentInput::new("good.txt", PUMPS),
                DocumentInput::new("bad.txt", "This one is broken on purpose."),
                DocumentInput::new("also-good.txt", VALVES),
            ])
            .await;

        assert!(!reports[0].failed);
        assert!(reports[1].failed);
        assert!(reports[1].error.as_deref().unwrap().contains("dimension"));
        assert_eq!(reports[1].chunks_added, 0);
        assert!(!reports[2].failed);

        let expected = reports[0].chunks_added + reports[2].chunks_added;
        assert_eq!(kb.document_count().await, expected);
        assert!(!kb.list_sources().await.contains("bad.txt"));

        let collection = kb.collection.read().await;
        assert_eq!(collection.index.len(), collection.store.len());
    }

    #[tokio::test]
    async fn empty_document_adds_nothing() {
        let kb = knowledge_base(Arc::new(KeywordEmbedder));
        let report = kb.ingest("empty.txt", "").await;
        assert!(!report.failed);
        assert_eq!(report.chunks_added, 0);
        assert_eq!(kb.document_count().await, 0);
    }

    #[tokio::test]
    async fn invalid_chunking_options_fail_construction() {
        let options = RagOptions {
            chunk_size: 10,
            chunk_overlap: 10,
            ..RagOptions::default()
        };
        let result = KnowledgeBase::new(
            Arc::new(KeywordEmbedder),
            GenerationBackend::NoBackend,
            options,
        );
        assert!(matches!(result, Err(IngestError::Chunking(_))));
    }

    #[tokio::test]
    async fn save_clear_load_restores_state() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let kb = knowledge_base(Arc::new(HashingEmbedder::with_dimensions(64)));
        kb.ingest("pumps.txt", PUMPS).await;
        kb.ingest("valves.txt", VALVES).await;

        let count = kb.document_count().await;
        let sources = kb.list_sources().await;
        let before = kb.retrieve("relief valve pressure", 3).await?;

        kb.save_snapshot(dir.path()).await?;
        kb.clear_all().await;
        assert_eq!(kb.document_count().await, 0);

        let info = kb.load_snapshot(dir.path()).await?.expect("snapshot should load");
        assert_eq!(info.count, count);
        assert_eq!(kb.document_count().await, count);
        assert_eq!(kb.list_sources().await, sources);
        assert_eq!(kb.retrieve("relief valve pressure", 3).await?, before);
        Ok(())
    }

    #[tokio::test]
    async fn loading_into_different_dimension_is_incompatible() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let kb = knowledge_base(Arc::new(HashingEmbedder::with_dimensions(64)));
        kb.ingest("pumps.txt", PUMPS).await;
        kb.save_snapshot(dir.path()).await?;

        let other = knowledge_base(Arc::new(HashingEmbedder::with_dimensions(32)));
        let result = other.load_snapshot(dir.path()).await;
        assert!(matches!(result, Err(SnapshotError::Incompatible { .. })));
        assert_eq!(other.document_count().await, 0);
        Ok(())
    }

    #[tokio::test]
    async fn missing_snapshot_starts_empty() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let kb = knowledge_base(Arc::new(KeywordEmbedder));
        let loaded = kb.load_snapshot(&dir.path().join("absent")).await?;
        assert!(loaded.is_none());
        assert_eq!(kb.document_count().await, 0);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_ingest_and_clear_keep_structures_in_sync() {
        let kb = Arc::new(knowledge_base(Arc::new(HashingEmbedder::with_dimensions(32))));
        let mut tasks = Vec::new();
        for round in 0..24 {
            let kb = kb.clone();
            tasks.push(tokio::spawn(async move {
                match round % 4 {
                    0 => kb.clear_all().await,
                    1 => {
                        let _ = kb.retrieve("pump pressure", 3).await;
                    }
                    _ => {
                        kb.ingest(&format!("doc-{round}.txt"), PUMPS).await;
                    }
                }
                let collection = kb.collection.read().await;
                assert_eq!(collection.index.len(), collection.store.len());
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let collection = kb.collection.read().await;
        assert_eq!(collection.index.len(), collection.store.len());
    }
}
