use crate::error::SearchError;
use crate::index::FlatL2Index;
use crate::models::ScoredChunk;
use crate::store::KnowledgeStore;
use tracing::debug;

/// Ranks stored chunks against `query_embedding`, closest first.
///
/// An empty store or `top_k == 0` is a normal empty result.
pub fn retrieve(
    index: &FlatL2Index,
    store: &KnowledgeStore,
    query_embedding: &[f32],
    top_k: usize,
) -> Result<Vec<ScoredChunk>, SearchError> {
    if store.is_empty() || top_k == 0 {
        return Ok(Vec::new());
    }

    let neighbors = index.search(query_embedding, top_k.min(store.len()))?;
    let scored = neighbors
        .into_iter()
        .map(|neighbor| {
            store.get(neighbor.position).map(|chunk| ScoredChunk {
                chunk: chunk.clone(),
                distance: neighbor.distance,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    debug!(top_k, returned = scored.len(), "retrieved chunks");
    Ok(scored)
}
