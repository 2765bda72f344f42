use std::sync::Mutex;

use crate::{
    error::{Error, Result},
    model_manager::{ModelManager, TokenMatrix},
};

/// Turns query text into a fixed-length vector.
///
/// Implementations must tolerate concurrent calls from in-flight requests.
pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

/// [`Embedder`] backed by the ColBERT model.
///
/// ColBERT produces one vector per token; these are mean-pooled and
/// L2-normalised into a single vector. Model access is serialised behind a
/// mutex since inference needs `&mut`.
pub struct ColbertEmbedder {
    model: Mutex<ModelManager>,
    model_id: String,
}

impl ColbertEmbedder {
    pub fn new(model: ModelManager) -> Self {
        let model_id = model.model_id().to_string();
        Self {
            model: Mutex::new(model),
            model_id,
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Load model weights up front instead of on the first query.
    pub fn preload(&self) -> Result<()> {
        self.lock()?.load()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ModelManager>> {
        self.model
            .lock()
            .map_err(|_| Error::EmbeddingFailed("model lock poisoned".into()))
    }
}

impl Embedder for ColbertEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let tokens = self.lock()?.encode_tokens(text)?;
        let mut pooled = mean_pool(&tokens)?;
        l2_normalize(&mut pooled);
        Ok(pooled)
    }
}

impl std::fmt::Debug for ColbertEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColbertEmbedder")
            .field("model_id", &self.model_id)
            .finish_non_exhaustive()
    }
}

/// Average the token vectors of a matrix into one vector.
pub fn mean_pool(tokens: &TokenMatrix) -> Result<Vec<f32>> {
    let dimension = tokens.dimension;
    if dimension == 0
        || tokens.data.is_empty()
        || tokens.data.len() % dimension != 0
    {
        return Err(Error::EmbeddingFailed(format!(
            "cannot pool {} values into {dimension}-dimensional tokens",
            tokens.data.len()
        )));
    }

    let count = tokens.data.len() / dimension;
    let mut pooled = vec![0.0f32; dimension];
    for row in tokens.data.chunks_exact(dimension) {
        for (acc, value) in pooled.iter_mut().zip(row) {
            *acc += value;
        }
    }
    for value in &mut pooled {
        *value /= count as f32;
    }
    Ok(pooled)
}

/// Scale `v` to unit length. Zero vectors are left untouched.
pub fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Reject embeddings that cannot be compared against stored vectors.
pub fn validate_embedding(embedding: &[f32]) -> Result<()> {
    if embedding.is_empty() {
        return Err(Error::EmbeddingFailed("embedding is empty".into()));
    }
    if embedding.iter().any(|x| !x.is_finite()) {
        return Err(Error::EmbeddingFailed(
            "embedding contains non-finite values".into(),
        ));
    }
    Ok(())
}
