use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    error::{Error, Result},
    identity::FolderIdentity,
    vector_store::{Collection, VectorStore},
};

/// Why a configured folder is absent from the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OmittedReason {
    /// The path could not be canonicalised (missing, unreadable).
    Unresolvable(String),
    /// The store has no collection for this folder.
    NotIndexed,
}

impl fmt::Display for OmittedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unresolvable(e) => write!(f, "path cannot be resolved: {e}"),
            Self::NotIndexed => f.write_str("no collection in vector store"),
        }
    }
}

/// A configured folder that was skipped while building the registry.
#[derive(Debug, Clone)]
pub struct OmittedFolder {
    pub path: PathBuf,
    pub reason: OmittedReason,
}

/// Immutable mapping from folder to the collection that indexes it.
///
/// Built once at startup and shared read-only by every request.
#[derive(Clone, Default)]
pub struct Registry {
    entries: Vec<(FolderIdentity, Arc<dyn Collection>)>,
    omitted: Vec<OmittedFolder>,
}

impl Registry {
    /// Bind each configured folder to its collection.
    ///
    /// Folders that cannot be resolved or have no collection are left out
    /// with a warning so that one broken folder does not block the rest.
    /// Store failures other than a missing collection abort the build.
    pub fn build(folders: &[PathBuf], store: &dyn VectorStore) -> Result<Self> {
        let mut registry = Self::default();

        for path in folders {
            let identity = match FolderIdentity::resolve(path) {
                Ok(identity) => identity,
                Err(e) => {
                    registry.omit(path, OmittedReason::Unresolvable(e.to_string()));
                    continue;
                }
            };

            if registry.contains(&identity) {
                tracing::debug!(
                    folder = %identity,
                    "folder listed more than once, keeping first entry"
                );
                continue;
            }

            let name = identity.collection_name();
            let collection = store.get_collection(&name).map_err(|e| {
                Error::RegistryBuildFailed(format!(
                    "cannot open collection {name} for {identity}: {e}"
                ))
            })?;

            match collection {
                Some(collection) => {
                    tracing::debug!(folder = %identity, collection = %name, "registered folder");
                    registry.entries.push((identity, collection));
                }
                None => registry.omit(path, OmittedReason::NotIndexed),
            }
        }

        tracing::info!(
            folders = registry.entries.len(),
            omitted = registry.omitted.len(),
            "collection registry ready"
        );

        Ok(registry)
    }

    /// Build a registry from already-open collections.
    pub fn from_entries(
        entries: Vec<(FolderIdentity, Arc<dyn Collection>)>,
    ) -> Self {
        Self {
            entries,
            omitted: Vec::new(),
        }
    }

    fn omit(&mut self, path: &Path, reason: OmittedReason) {
        tracing::warn!(
            folder = %path.display(),
            %reason,
            "omitting folder from search"
        );
        self.omitted.push(OmittedFolder {
            path: path.to_path_buf(),
            reason,
        });
    }

    fn contains(&self, identity: &FolderIdentity) -> bool {
        self.entries.iter().any(|(id, _)| id == identity)
    }

    /// Find the collection for a client-supplied directory.
    ///
    /// The directory is matched as given first, then after canonicalisation,
    /// so `/data/./notes` finds the folder registered as `/data/notes`.
    /// Relative paths never match.
    pub fn lookup(
        &self,
        directory: &str,
    ) -> Result<(&FolderIdentity, &Arc<dyn Collection>)> {
        if !Path::new(directory).is_absolute() {
            return Err(Error::DirectoryNotIndexed(directory.to_string()));
        }

        let exact = FolderIdentity::from_canonical(directory);
        let found = self.entry(&exact).or_else(|| {
            FolderIdentity::resolve(Path::new(directory))
                .ok()
                .and_then(|resolved| self.entry(&resolved))
        });

        found.ok_or_else(|| Error::DirectoryNotIndexed(directory.to_string()))
    }

    fn entry(
        &self,
        identity: &FolderIdentity,
    ) -> Option<(&FolderIdentity, &Arc<dyn Collection>)> {
        self.entries
            .iter()
            .find(|(id, _)| id == identity)
            .map(|(id, collection)| (id, collection))
    }

    /// Every searchable folder, in configuration order.
    pub fn directories(&self) -> impl Iterator<Item = &FolderIdentity> {
        self.entries.iter().map(|(id, _)| id)
    }

    /// Every searchable folder with its collection, in configuration order.
    pub fn entries(
        &self,
    ) -> impl Iterator<Item = (&FolderIdentity, &Arc<dyn Collection>)> {
        self.entries.iter().map(|(id, collection)| (id, collection))
    }

    /// Folders skipped during [`Registry::build`].
    pub fn omitted(&self) -> &[OmittedFolder] {
        &self.omitted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field(
                "directories",
                &self.directories().map(ToString::to_string).collect::<Vec<_>>(),
            )
            .field("omitted", &self.omitted)
            .finish()
    }
}
