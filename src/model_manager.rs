use candle_core::{Device, Tensor};
use pylate_rs::ColBERT;

use crate::error::{Error, Result};

pub const DEFAULT_MODEL_ID: &str = "lightonai/GTE-ModernColBERT-v1";
pub const MODEL_ENV_VAR: &str = "SEARCH_MCP_MODEL";

/// Select the best available compute device.
///
/// Uses CUDA when compiled with the `cuda` feature, Metal when compiled with
/// the `metal` feature, and falls back to CPU otherwise.
fn default_device() -> Device {
    #[cfg(feature = "cuda")]
    {
        if let Ok(device) = Device::new_cuda(0) {
            return device;
        }
    }

    #[cfg(feature = "metal")]
    {
        if let Ok(device) = Device::new_metal(0) {
            return device;
        }
    }

    Device::Cpu
}

/// Per-token embeddings for a single text, flattened row-major.
#[derive(Debug, Clone)]
pub struct TokenMatrix {
    pub dimension: usize,
    /// `data[token_idx * dimension + dim_idx]`
    pub data: Vec<f32>,
}

/// Manages the ColBERT model lifecycle, supporting lazy loading on first use.
pub struct ModelManager {
    model: Option<ColBERT>,
    model_id: String,
}

impl Default for ModelManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelManager {
    /// Creates a new `ModelManager`. The model ID is resolved from:
    /// 1. The `SEARCH_MCP_MODEL` environment variable, if set
    /// 2. Otherwise, the default model (`lightonai/GTE-ModernColBERT-v1`)
    ///
    /// The model is not loaded until [`ModelManager::load`] or the first
    /// call to [`ModelManager::encode_tokens`].
    pub fn new() -> Self {
        let model_id = std::env::var(MODEL_ENV_VAR)
            .unwrap_or_else(|_| DEFAULT_MODEL_ID.to_string());

        Self {
            model: None,
            model_id,
        }
    }

    /// Creates a `ModelManager` with an explicit model ID, bypassing
    /// environment variable resolution.
    pub fn with_model_id(model_id: String) -> Self {
        Self {
            model: None,
            model_id,
        }
    }

    /// Returns the model ID that will be (or has been) loaded.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    #[cfg(test)]
    fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// Load the model now, downloading from HuggingFace Hub if needed.
    pub fn load(&mut self) -> Result<()> {
        self.ensure_loaded().map(|_| ())
    }

    fn ensure_loaded(&mut self) -> Result<&mut ColBERT> {
        if self.model.is_none() {
            let device = default_device();
            tracing::info!(model = %self.model_id, "loading embedding model");
            let colbert: ColBERT = ColBERT::from(&self.model_id)
                .with_device(device)
                .try_into()
                .map_err(|e| {
                    Error::EmbeddingFailed(format!(
                        "failed to load model {}: {e}",
                        self.model_id
                    ))
                })?;
            self.model = Some(colbert);
        }

        self.model.as_mut().ok_or_else(|| {
            Error::EmbeddingFailed("model not loaded".to_string())
        })
    }

    /// Encodes a text into ColBERT token-level embeddings.
    pub fn encode_tokens(&mut self, text: &str) -> Result<TokenMatrix> {
        let model = self.ensure_loaded()?;
        let embeddings = model
            .encode(&[text.to_string()], false)
            .map_err(|e| Error::EmbeddingFailed(e.to_string()))?;

        // [1, T, D] -> [T, D]
        let matrix = embeddings.squeeze(0).map_err(map_candle_err)?;
        let (_tokens, dimension) = matrix.dims2().map_err(map_candle_err)?;

        Ok(TokenMatrix {
            dimension,
            data: tensor_to_flat_f32(&matrix)?,
        })
    }
}

fn tensor_to_flat_f32(tensor: &Tensor) -> Result<Vec<f32>> {
    tensor
        .flatten_all()
        .and_then(|t| t.to_vec1::<f32>())
        .map_err(map_candle_err)
}

fn map_candle_err(e: candle_core::Error) -> Error {
    Error::EmbeddingFailed(format!("tensor computation error: {e}"))
}
