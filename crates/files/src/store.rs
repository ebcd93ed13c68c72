//! The store directory and safe name resolution
//!
//! [`DocumentStore`] owns the canonical path of the store directory and turns
//! validated [`DocumentName`]s into filesystem paths. Resolution is a
//! canonicalize-and-prefix-check: names are already single path components, and
//! any existing entry is canonicalised (following symlinks) and must still lie
//! under the store root before the caller touches it.
//!
//! The store holds no lock. It is an externally-owned resource: other processes
//! and concurrent requests may change the directory at any time.

use crate::{FilesError, FilesResult};
use docdir_types::DocumentName;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// A flat directory of documents
#[derive(Debug, Clone)]
pub struct DocumentStore {
    /// Canonicalised store directory
    root: PathBuf,
}

impl DocumentStore {
    /// Opens an existing store directory
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::StoreUnavailable`] if the path does not exist, is not
    /// a directory, or cannot be canonicalised.
    pub fn new(root: &Path) -> FilesResult<Self> {
        if !root.is_dir() {
            return Err(FilesError::StoreUnavailable(std::io::Error::new(
                ErrorKind::NotFound,
                format!("store path is not a directory: {}", root.display()),
            )));
        }

        let root = root.canonicalize().map_err(|e| {
            FilesError::StoreUnavailable(std::io::Error::new(
                e.kind(),
                format!("cannot canonicalize store path {}: {}", root.display(), e),
            ))
        })?;

        Ok(Self { root })
    }

    /// Creates the store directory (and any missing parents) before opening it
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::StoreUnavailable`] if the directory cannot be created
    /// or opened.
    pub fn open_or_create(root: &Path) -> FilesResult<Self> {
        fs::create_dir_all(root).map_err(|e| {
            FilesError::StoreUnavailable(std::io::Error::new(
                e.kind(),
                format!("cannot create store directory {}: {}", root.display(), e),
            ))
        })?;
        Self::new(root)
    }

    /// Returns the canonical store directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a document name to a path inside the store
    ///
    /// The returned path is the name joined to the root, not the symlink target,
    /// so renames act on the directory entry itself.
    ///
    /// # Errors
    ///
    /// - [`FilesError::InvalidInput`] if the entry is a symlink that leaves the
    ///   store or cannot be resolved
    /// - [`FilesError::StoreUnavailable`] if the entry cannot be inspected
    pub fn resolve(&self, name: &DocumentName) -> FilesResult<PathBuf> {
        let joined = self.root.join(name.as_str());

        match fs::symlink_metadata(&joined) {
            Ok(_) => {
                // Dangling symlinks fail here too; creating through one would
                // write wherever it points.
                let resolved = joined.canonicalize().map_err(|e| {
                    FilesError::InvalidInput(format!("cannot resolve {}: {}", name, e))
                })?;
                if !resolved.starts_with(&self.root) {
                    return Err(FilesError::InvalidInput(format!(
                        "{} resolves outside the store directory",
                        name
                    )));
                }
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if joined.parent() != Some(self.root.as_path()) {
                    return Err(FilesError::InvalidInput(format!(
                        "{} resolves outside the store directory",
                        name
                    )));
                }
            }
            Err(e) => return Err(FilesError::StoreUnavailable(e)),
        }

        Ok(joined)
    }
}
