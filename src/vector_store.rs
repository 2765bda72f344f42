use std::{path::Path, sync::Arc};

use rayon::prelude::*;
use redb::{
    Database,
    ReadableDatabase,
    ReadableTable,
    ReadableTableMetadata,
    TableDefinition,
    TableError,
    TableHandle,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    identity::CollectionName,
};

/// Header size: 4 bytes embedding dimension + 4 bytes payload length.
const HEADER_SIZE: usize = 8;

/// Per-document metadata kept next to the vector.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

/// One row returned by a similarity query, before any normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub document: String,
    pub metadata: CandidateMetadata,
    /// Cosine distance to the query (`1 - cosine similarity`).
    pub distance: f32,
}

/// A queryable similarity index backing a single folder.
pub trait Collection: Send + Sync {
    fn name(&self) -> &str;

    /// Return up to `k` candidates, nearest first.
    fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<Candidate>>;
}

/// Lookup of collections by name.
pub trait VectorStore: Send + Sync {
    /// Returns `None` when no collection with that name was ever built.
    fn get_collection(
        &self,
        name: &CollectionName,
    ) -> Result<Option<Arc<dyn Collection>>>;
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredPayload {
    document: String,
    #[serde(flatten)]
    metadata: CandidateMetadata,
}

/// On-disk vector store: one redb table per collection.
///
/// Binary format per row:
/// - 4 bytes: embedding dimension D (u32 LE)
/// - 4 bytes: payload length P (u32 LE)
/// - D * 4 bytes: f32 LE embedding values
/// - P bytes: JSON payload (`document`, `file_path`, `file_name`)
#[derive(Clone)]
pub struct VectorDb {
    db: Arc<Database>,
}

impl VectorDb {
    /// Open or create a vector store at the given path.
    ///
    /// # Examples
    ///
    /// ```
    /// # let tmp = tempfile::tempdir().unwrap();
    /// use search_mcp::{FolderIdentity, VectorDb};
    ///
    /// let db = VectorDb::open(&tmp.path().join("collections.redb")).unwrap();
    /// let notes = FolderIdentity::from_canonical("/data/notes").collection_name();
    /// assert_eq!(db.collection_len(&notes).unwrap(), None);
    /// ```
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Create an empty collection if it does not exist yet.
    pub fn create_collection(&self, name: &CollectionName) -> Result<()> {
        let txn = self.db.begin_write()?;
        txn.open_table(table_definition(name.as_str()))?;
        txn.commit()?;
        Ok(())
    }

    /// Store a document with its embedding, creating the collection on demand.
    pub fn insert(
        &self,
        collection: &CollectionName,
        doc_id: u64,
        embedding: &[f32],
        document: &str,
        metadata: &CandidateMetadata,
    ) -> Result<()> {
        let record = encode_record(embedding, document, metadata)?;

        let txn = self.db.begin_write()?;
        {
            let mut table =
                txn.open_table(table_definition(collection.as_str()))?;
            table.insert(doc_id, record.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Number of rows in a collection, or `None` if it does not exist.
    pub fn collection_len(&self, name: &CollectionName) -> Result<Option<u64>> {
        let txn = self.db.begin_read()?;
        match txn.open_table(table_definition(name.as_str())) {
            Ok(table) => Ok(Some(table.len()?)),
            Err(TableError::TableDoesNotExist(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl VectorStore for VectorDb {
    fn get_collection(
        &self,
        name: &CollectionName,
    ) -> Result<Option<Arc<dyn Collection>>> {
        let txn = self.db.begin_read()?;
        match txn.open_table(table_definition(name.as_str())) {
            Ok(_) => Ok(Some(Arc::new(RedbCollection {
                db: Arc::clone(&self.db),
                name: name.as_str().to_string(),
            }))),
            Err(TableError::TableDoesNotExist(_)) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl std::fmt::Debug for VectorDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorDb").finish_non_exhaustive()
    }
}

/// Handle to one collection table inside a [`VectorDb`].
struct RedbCollection {
    db: Arc<Database>,
    name: String,
}

impl Collection for RedbCollection {
    fn name(&self) -> &str {
        &self.name
    }

    /// Exhaustive scan: every stored vector is scored against the query in
    /// parallel, then the `k` nearest are kept.
    fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<Candidate>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(table_definition(&self.name))?;

        let mut rows = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            rows.push(value.value().to_vec());
        }

        let query_norm = norm(embedding);
        let mut candidates = rows
            .par_iter()
            .map(|bytes| {
                let (vector, payload) = decode_record(bytes)?;
                if vector.len() != embedding.len() {
                    return Err(Error::Store(format!(
                        "collection {} stores {}-dimensional vectors, query has {}",
                        self.name,
                        vector.len(),
                        embedding.len()
                    )));
                }
                Ok(Candidate {
                    distance: cosine_distance(embedding, query_norm, &vector),
                    document: payload.document,
                    metadata: payload.metadata,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        candidates.sort_by(|a, b| {
            sort_distance(a.distance).total_cmp(&sort_distance(b.distance))
        });
        candidates.truncate(k);

        Ok(candidates)
    }
}

fn table_definition(name: &str) -> TableDefinition<'_, u64, &'static [u8]> {
    TableDefinition::new(name)
}

fn encode_record(
    embedding: &[f32],
    document: &str,
    metadata: &CandidateMetadata,
) -> Result<Vec<u8>> {
    let payload = serde_json::to_vec(&StoredPayload {
        document: document.to_string(),
        metadata: metadata.clone(),
    })
    .map_err(|e| Error::Store(format!("failed to encode payload: {e}")))?;

    let dimension = u32::try_from(embedding.len())
        .map_err(|_| Error::Store("embedding too large".into()))?;
    let payload_len = u32::try_from(payload.len())
        .map_err(|_| Error::Store("document too large".into()))?;

    let mut record = Vec::with_capacity(
        HEADER_SIZE + std::mem::size_of_val(embedding) + payload.len(),
    );
    record.extend_from_slice(&dimension.to_le_bytes());
    record.extend_from_slice(&payload_len.to_le_bytes());
    record.extend_from_slice(bytemuck::cast_slice(embedding));
    record.extend_from_slice(&payload);
    Ok(record)
}

fn decode_record(bytes: &[u8]) -> Result<(Vec<f32>, StoredPayload)> {
    let corrupt = || Error::Store("corrupt record".into());

    let header = bytes.get(..HEADER_SIZE).ok_or_else(corrupt)?;
    let dimension = u32::from_le_bytes([header[0], header[1], header[2], header[3]])
        as usize;
    let payload_len =
        u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;

    let vector_end = HEADER_SIZE + dimension * 4;
    if bytes.len() != vector_end + payload_len {
        return Err(corrupt());
    }

    // Row bytes carry no alignment guarantee, so copy instead of casting.
    let vector: Vec<f32> =
        bytemuck::pod_collect_to_vec(&bytes[HEADER_SIZE..vector_end]);
    let payload: StoredPayload = serde_json::from_slice(&bytes[vector_end..])
        .map_err(|e| Error::Store(format!("corrupt payload: {e}")))?;

    Ok((vector, payload))
}

/// NaN distances rank after every real one.
fn sort_distance(distance: f32) -> f32 {
    if distance.is_nan() {
        f32::INFINITY
    } else {
        distance
    }
}

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine_distance(query: &[f32], query_norm: f32, doc: &[f32]) -> f32 {
    let doc_norm = norm(doc);
    if query_norm == 0.0 || doc_norm == 0.0 {
        return 1.0;
    }
    let dot: f32 = query.iter().zip(doc).map(|(a, b)| a * b).sum();
    1.0 - dot / (query_norm * doc_norm)
}
