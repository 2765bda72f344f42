use serde::Serialize;

use crate::{
    error::{Error, Result},
    identity::FolderIdentity,
    text_util,
    vector_store::{Candidate, Collection},
};

/// A single ranked hit from one folder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// Similarity in `[0, 1]`, rounded to four decimals.
    pub score: f64,
    pub directory: String,
    pub file_path: String,
    pub file_name: String,
    pub snippet: String,
}

/// Query one folder's collection and normalise its candidates.
///
/// Results keep the store's nearest-first order. Any store failure is
/// reported as [`Error::CollectionQueryFailed`] for this folder only.
pub fn execute(
    directory: &FolderIdentity,
    collection: &dyn Collection,
    embedding: &[f32],
    k: usize,
) -> Result<Vec<SearchResult>> {
    let candidates = collection.query(embedding, k).map_err(|e| {
        Error::CollectionQueryFailed {
            directory: directory.to_string(),
            reason: e.to_string(),
        }
    })?;

    Ok(candidates
        .into_iter()
        .take(k)
        .map(|candidate| to_result(directory, collection.name(), candidate))
        .collect())
}

fn to_result(
    directory: &FolderIdentity,
    collection: &str,
    candidate: Candidate,
) -> SearchResult {
    let Candidate {
        document,
        metadata,
        distance,
    } = candidate;

    SearchResult {
        score: distance_to_score(distance, collection),
        directory: directory.to_string(),
        file_path: metadata.file_path.unwrap_or_default(),
        file_name: metadata.file_name.unwrap_or_default(),
        snippet: text_util::snippet(&document),
    }
}

/// `1 - distance`, rounded to four decimals.
///
/// Distances outside `[0, 1]` are clamped and logged, since they point at
/// vectors that were not normalised the way the index expects.
pub fn distance_to_score(distance: f32, collection: &str) -> f64 {
    let raw = 1.0 - f64::from(distance);
    let score = if raw.is_nan() {
        tracing::warn!(collection, distance, "store returned NaN distance");
        0.0
    } else if !(0.0..=1.0).contains(&raw) {
        tracing::warn!(
            collection,
            distance,
            "distance outside [0, 1], clamping score"
        );
        raw.clamp(0.0, 1.0)
    } else {
        raw
    };
    (score * 10_000.0).round() / 10_000.0
}
