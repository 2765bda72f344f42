use std::{
    fmt,
    path::{Path, PathBuf},
};

use sha2::{Digest, Sha256};

use crate::error::Result;

/// Namespace tag prepended to every derived collection name.
pub const COLLECTION_PREFIX: &str = "folder_";

/// Number of hex characters of the path digest kept in a collection name.
const NAME_HEX_LEN: usize = 16;

/// A configured folder, identified by its canonical absolute path.
///
/// Two identities compare equal iff they resolve to the same canonical path,
/// so `/data/./notes` and a symlink pointing at `/data/notes` are the same
/// folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FolderIdentity(PathBuf);

impl FolderIdentity {
    /// Resolve `path` to its canonical form. Fails if the path does not exist.
    pub fn resolve(path: &Path) -> Result<Self> {
        Ok(Self(path.canonicalize()?))
    }

    /// Wrap a path the caller already knows to be canonical.
    pub fn from_canonical(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// The collection backing this folder in the vector store.
    pub fn collection_name(&self) -> CollectionName {
        CollectionName::for_folder(self)
    }
}

impl fmt::Display for FolderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Stable collection name derived from a folder's canonical path.
///
/// The name is `folder_` followed by the first 16 hex characters of the
/// SHA-256 digest of the raw path bytes, so it survives restarts and never
/// leaks the path itself into the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionName(String);

impl CollectionName {
    pub fn for_folder(folder: &FolderIdentity) -> Self {
        let digest = Sha256::digest(folder.0.as_os_str().as_encoded_bytes());
        let mut name =
            String::with_capacity(COLLECTION_PREFIX.len() + NAME_HEX_LEN);
        name.push_str(COLLECTION_PREFIX);
        for byte in digest.iter().take(NAME_HEX_LEN / 2) {
            name.push_str(&format!("{byte:02x}"));
        }
        Self(name)
    }

    #[cfg(test)]
    pub(crate) fn from_raw(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
