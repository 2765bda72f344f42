//! Fan-out search across every indexed folder.
//!
//! A request is handled in one pass:
//!
//! 1. Resolve the target folders (one, or all of them).
//! 2. Embed the query once; the same vector is used for every folder.
//! 3. Query all targets concurrently, each under its own deadline.
//! 4. Wait for every query, turning failures into error entries.
//! 5. Merge, sort by score descending (errors last), keep `n_results`.
//!
//! Each folder is asked for `n_results` candidates, no more. When the best
//! matches are concentrated in one folder this can return fewer than the
//! true global top-k; that trade-off keeps per-folder work bounded.
//!
//! Ties in score keep folder order in practice, but callers must not rely on
//! any particular order among equal scores.

use std::{fmt, sync::Arc, time::Duration};

use serde::Serialize;
use tokio::task::JoinSet;

use crate::{
    config::DEFAULT_QUERY_TIMEOUT,
    embedding::{Embedder, validate_embedding},
    error::{Error, Result},
    executor::{self, SearchResult},
    identity::FolderIdentity,
    registry::Registry,
    vector_store::Collection,
};

pub const DEFAULT_N_RESULTS: usize = 5;

/// Stand-in for a result (or a whole folder's results) that failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResult {
    pub error: String,
}

/// One entry of a search response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SearchHit {
    Match(SearchResult),
    Error(ErrorResult),
}

impl SearchHit {
    pub fn error(message: impl fmt::Display) -> Self {
        Self::Error(ErrorResult {
            error: message.to_string(),
        })
    }

    pub fn as_match(&self) -> Option<&SearchResult> {
        match self {
            Self::Match(result) => Some(result),
            Self::Error(_) => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Deadline for each folder's query.
    pub query_timeout: Duration,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

type Target = (FolderIdentity, Arc<dyn Collection>);

/// Request handling context: the registry, the embedder and search options.
///
/// Constructed once after startup and shared read-only by all requests.
pub struct Searcher {
    registry: Arc<Registry>,
    embedder: Arc<dyn Embedder>,
    options: SearchOptions,
}

impl Searcher {
    pub fn new(
        registry: Arc<Registry>,
        embedder: Arc<dyn Embedder>,
        options: SearchOptions,
    ) -> Self {
        Self {
            registry,
            embedder,
            options,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Every searchable folder, as absolute path strings.
    pub fn list_directories(&self) -> Vec<String> {
        self.registry
            .directories()
            .map(ToString::to_string)
            .collect()
    }

    /// Search and always answer with a list.
    ///
    /// Request-level failures (unknown directory, invalid arguments, embedding
    /// failure) become the sole error entry of the response.
    pub async fn search(
        &self,
        query: &str,
        n_results: usize,
        directory: Option<&str>,
    ) -> Vec<SearchHit> {
        match self.try_search(query, n_results, directory).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(error = %e, "search request failed");
                vec![SearchHit::error(e)]
            }
        }
    }

    /// Search, returning request-level failures as `Err`.
    ///
    /// Per-folder failures never surface here; they are entries in the
    /// returned list.
    pub async fn try_search(
        &self,
        query: &str,
        n_results: usize,
        directory: Option<&str>,
    ) -> Result<Vec<SearchHit>> {
        if n_results == 0 {
            return Err(Error::InvalidRequest(
                "n_results must be at least 1".into(),
            ));
        }

        let targets = self.resolve_targets(directory)?;
        if targets.is_empty() {
            return Ok(Vec::new());
        }

        let embedding = self.embed(query).await?;
        tracing::debug!(
            targets = targets.len(),
            n_results,
            dimension = embedding.len(),
            "fanning out query"
        );

        let contributions =
            self.fan_out(targets, Arc::new(embedding), n_results).await;
        Ok(merge_ranked(contributions, n_results))
    }

    fn resolve_targets(&self, directory: Option<&str>) -> Result<Vec<Target>> {
        match directory {
            Some(directory) => {
                let (identity, collection) = self.registry.lookup(directory)?;
                Ok(vec![(identity.clone(), Arc::clone(collection))])
            }
            None => Ok(self
                .registry
                .entries()
                .map(|(identity, collection)| {
                    (identity.clone(), Arc::clone(collection))
                })
                .collect()),
        }
    }

    async fn embed(&self, query: &str) -> Result<Vec<f32>> {
        let embedder = Arc::clone(&self.embedder);
        let query = query.to_string();

        let embedding = tokio::task::spawn_blocking(move || embedder.embed(&query))
            .await
            .map_err(|e| {
                Error::EmbeddingFailed(format!("embedding task failed: {e}"))
            })?
            .map_err(|e| match e {
                Error::EmbeddingFailed(_) => e,
                other => Error::EmbeddingFailed(other.to_string()),
            })?;

        validate_embedding(&embedding)?;
        Ok(embedding)
    }

    /// Query every target concurrently and wait for all of them.
    ///
    /// Contributions come back in target order. A query that overruns the
    /// deadline is reported as timed out; its blocking worker is left to
    /// finish in the background.
    async fn fan_out(
        &self,
        targets: Vec<Target>,
        embedding: Arc<Vec<f32>>,
        k: usize,
    ) -> Vec<Result<Vec<SearchResult>>> {
        let timeout = self.options.query_timeout;
        let labels: Vec<String> =
            targets.iter().map(|(id, _)| id.to_string()).collect();

        let mut tasks = JoinSet::new();
        for (idx, (directory, collection)) in targets.into_iter().enumerate() {
            let embedding = Arc::clone(&embedding);
            let label = labels[idx].clone();

            tasks.spawn(async move {
                let query = tokio::task::spawn_blocking(move || {
                    executor::execute(
                        &directory,
                        collection.as_ref(),
                        &embedding,
                        k,
                    )
                });

                let outcome = match tokio::time::timeout(timeout, query).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(e)) => Err(Error::CollectionQueryFailed {
                        directory: label,
                        reason: format!("query task failed: {e}"),
                    }),
                    Err(_) => Err(Error::CollectionTimedOut {
                        directory: label,
                        timeout,
                    }),
                };
                (idx, outcome)
            });
        }

        let mut slots: Vec<Option<Result<Vec<SearchResult>>>> =
            labels.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, outcome)) => slots[idx] = Some(outcome),
                Err(e) => tracing::error!(error = %e, "fan-out task aborted"),
            }
        }

        slots
            .into_iter()
            .zip(labels)
            .map(|(slot, directory)| {
                let outcome = slot.unwrap_or_else(|| {
                    Err(Error::CollectionQueryFailed {
                        directory,
                        reason: "query task aborted".into(),
                    })
                });
                if let Err(e) = &outcome {
                    tracing::warn!(error = %e, "folder query failed");
                }
                outcome
            })
            .collect()
    }
}

impl fmt::Debug for Searcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Searcher")
            .field("registry", &self.registry)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// Merge per-folder contributions into one ranked, truncated list.
///
/// Matches are stable-sorted by descending score. Each failed contribution
/// becomes one error entry placed after every match.
pub fn merge_ranked(
    contributions: Vec<Result<Vec<SearchResult>>>,
    n_results: usize,
) -> Vec<SearchHit> {
    let mut matches = Vec::new();
    let mut errors = Vec::new();

    for contribution in contributions {
        match contribution {
            Ok(results) => matches.extend(results),
            Err(e) => errors.push(SearchHit::error(e)),
        }
    }

    matches.sort_by(|a, b| b.score.total_cmp(&a.score));

    matches
        .into_iter()
        .map(SearchHit::Match)
        .chain(errors)
        .take(n_results)
        .collect()
}
