//! docdir File Storage
//!
//! This crate provides the document store behind the docdir web server: one flat
//! directory on the local filesystem, holding one file per document.
//!
//! ## Design Principles
//!
//! - A document is identified by its filename and nothing else
//! - The directory listing is the collection; nothing is cached or indexed
//! - Every name accepted from a caller resolves strictly inside the store directory
//! - Uploads overwrite silently; renames follow filesystem rename semantics
//! - No locking: concurrent writers to one name race at the filesystem level
//!
//! ## Storage Model
//!
//! ```text
//! <store_directory>/
//! ├── report.txt
//! ├── scan.pdf
//! └── archive/      # sub-directories are ignored by listings
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use docdir_files::{DocumentStore, FilesService};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = DocumentStore::open_or_create(Path::new("./public"))?;
//! let service = FilesService::new(store);
//!
//! service.upload_document(Some(&b"hello"[..]), "report.txt", None)?;
//! for name in service.list_documents()? {
//!     println!("{name}");
//! }
//! # Ok(())
//! # }
//! ```

mod files;
mod store;

pub use docdir_types::DocumentName;
pub use files::{Download, FilesService};
pub use store::DocumentStore;

/// Errors that can occur during document operations
///
/// The service never logs; callers decide how each kind is reported.
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// A required parameter is missing or a name is unsafe to resolve
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The referenced document does not exist or is not a regular file
    #[error("document not found: {0}")]
    NotFound(String),

    /// The store directory cannot be read or does not exist
    #[error("store directory unavailable: {0}")]
    StoreUnavailable(std::io::Error),

    /// A document could not be created or fully written
    #[error("failed to write document: {0}")]
    WriteFailure(std::io::Error),

    /// A partially written document could not be removed after a failed copy
    #[error(
        "write failed and cleanup also failed (path: {path}): write={write_error}; cleanup={cleanup_error}",
        path = path.display()
    )]
    CleanupAfterWriteFailed {
        path: std::path::PathBuf,
        #[source]
        write_error: std::io::Error,
        cleanup_error: std::io::Error,
    },

    /// Any other filesystem failure (e.g. a rename rejected by the OS)
    #[error("document operation failed: {0}")]
    OperationFailed(std::io::Error),
}

pub type FilesResult<T> = std::result::Result<T, FilesError>;
