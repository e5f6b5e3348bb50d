//! Query-time retrieval.
//!
//! Embeds the query and delegates to the vector store, returning the
//! backend's relevance ordering exactly. No re-ranking happens here;
//! position 1 is the most relevant chunk and downstream citation labels
//! are bound to these positions.

use std::sync::Arc;

use anyhow::anyhow;

use crate::embedding::EmbeddingProvider;
use crate::error::{Error, Result};
use crate::index::VectorStore;
use crate::models::Chunk;

pub struct Retriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
}

impl Retriever {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self { store, embedder }
    }

    /// Return up to `k` chunks for `query`, most relevant first. Fewer
    /// than `k` indexed chunks yields all of them without error.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Chunk>> {
        if k == 0 {
            return Err(Error::InvalidConfiguration(
                "retrieval k must be >= 1".to_string(),
            ));
        }

        let vectors = self.embedder.embed(&[query.to_string()]).await?;
        let query_vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| Error::Backend(anyhow!("empty embedding response for query")))?;

        self.store.query(&query_vector, k).await
    }
}
