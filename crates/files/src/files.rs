//! Document operations over the store directory
//!
//! [`FilesService`] implements the four document operations (list, upload,
//! rename, download) on top of a [`DocumentStore`]. Every name received from a
//! caller is validated as a [`DocumentName`] and resolved through the store
//! before any filesystem call is made.
//!
//! # Outcomes
//!
//! Operations return typed [`FilesError`]s and never log. The caller (the HTTP
//! layer) maps each kind to a response:
//!
//! - `InvalidInput`: missing parameters, empty names, path traversal attempts
//! - `NotFound`: the referenced document is absent or not a regular file
//! - `StoreUnavailable`, `WriteFailure`, `OperationFailed`: filesystem failures
//!
//! # Concurrency
//!
//! All calls block on the filesystem. Nothing serialises access to a given
//! name: two uploads of the same name are last-writer-wins, and a download
//! running during an overwrite may observe a partially written file.

use crate::{DocumentStore, FilesError, FilesResult};
use docdir_types::DocumentName;
use std::fs;
use std::io::{self, ErrorKind, Read, Write};

/// An open document ready to be streamed to a client
#[derive(Debug)]
pub struct Download {
    /// Name the document was requested under
    pub name: DocumentName,

    /// Open handle to the document
    pub file: fs::File,

    /// Size of the document in bytes at the time it was opened
    pub size_bytes: u64,
}

/// Service for managing the documents in one store directory
#[derive(Debug, Clone)]
pub struct FilesService {
    store: DocumentStore,
}

impl FilesService {
    /// Creates a new `FilesService` over an opened store
    pub fn new(store: DocumentStore) -> Self {
        Self { store }
    }

    /// Returns the underlying store
    #[must_use]
    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Lists the documents currently in the store
    ///
    /// Sub-directories are skipped. Entries whose names are not valid UTF-8, or
    /// are blank, are skipped as well since they could not be addressed by the
    /// other operations. Names are returned exactly as stored.
    ///
    /// # Returns
    ///
    /// Document names sorted ascending; empty if the store has no documents.
    ///
    /// # Errors
    ///
    /// Returns [`FilesError::StoreUnavailable`] if the directory cannot be read.
    pub fn list_documents(&self) -> FilesResult<Vec<DocumentName>> {
        let entries = fs::read_dir(self.store.root()).map_err(FilesError::StoreUnavailable)?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(FilesError::StoreUnavailable)?;
            let file_type = entry.file_type().map_err(FilesError::StoreUnavailable)?;
            if file_type.is_dir() {
                continue;
            }

            let Some(file_name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            if let Ok(name) = DocumentName::new(&file_name) {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    /// Stores an uploaded payload as a document
    ///
    /// The target name is `requested_name` when it is present and non-blank,
    /// otherwise `supplied_filename` (the filename carried by the upload).
    /// Either is used verbatim; surrounding whitespace is part of the name.
    /// An existing document with the same name is overwritten.
    ///
    /// # Arguments
    ///
    /// * `payload` - The uploaded bytes; `None` if the request carried no file
    /// * `supplied_filename` - Filename sent along with the payload
    /// * `requested_name` - Optional caller-chosen target name
    ///
    /// # Returns
    ///
    /// The name the document was stored under.
    ///
    /// # Errors
    ///
    /// - [`FilesError::InvalidInput`] if there is no payload or the target name is
    ///   empty or unsafe; nothing is written in that case
    /// - [`FilesError::WriteFailure`] if the file cannot be created or the copy
    ///   fails; a partially written file is removed
    /// - [`FilesError::CleanupAfterWriteFailed`] if that removal also fails
    pub fn upload_document<R: Read>(
        &self,
        payload: Option<R>,
        supplied_filename: &str,
        requested_name: Option<&str>,
    ) -> FilesResult<DocumentName> {
        let mut payload =
            payload.ok_or_else(|| FilesError::InvalidInput("no file in upload".into()))?;

        let target = requested_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(supplied_filename);
        let name = DocumentName::new(target).map_err(|e| {
            FilesError::InvalidInput(format!("invalid target filename {:?}: {}", target, e))
        })?;
        let path = self.store.resolve(&name)?;

        let mut dest = fs::File::create(&path).map_err(|e| {
            FilesError::WriteFailure(io::Error::new(
                e.kind(),
                format!("failed to create {}: {}", path.display(), e),
            ))
        })?;

        let copied = io::copy(&mut payload, &mut dest).and_then(|_| dest.flush());
        if let Err(write_error) = copied {
            drop(dest);
            return match fs::remove_file(&path) {
                Ok(()) => Err(FilesError::WriteFailure(write_error)),
                Err(cleanup_error) => Err(FilesError::CleanupAfterWriteFailed {
                    path,
                    write_error,
                    cleanup_error,
                }),
            };
        }

        Ok(name)
    }

    /// Renames a document in place
    ///
    /// Content is unchanged. A document already present under `new_name` is
    /// replaced, following the platform's rename semantics.
    ///
    /// # Errors
    ///
    /// - [`FilesError::InvalidInput`] if either name is empty or unsafe
    /// - [`FilesError::NotFound`] if no document is stored under `old_name`
    /// - [`FilesError::OperationFailed`] for any other rename failure
    pub fn rename_document(&self, old_name: &str, new_name: &str) -> FilesResult<()> {
        if old_name.trim().is_empty() || new_name.trim().is_empty() {
            return Err(FilesError::InvalidInput(
                "file names cannot be empty".into(),
            ));
        }

        let old = parse_name(old_name)?;
        let new = parse_name(new_name)?;
        let old_path = self.store.resolve(&old)?;
        let new_path = self.store.resolve(&new)?;

        fs::rename(&old_path, &new_path).map_err(|e| match e.kind() {
            ErrorKind::NotFound if !old_path.exists() => FilesError::NotFound(old.to_string()),
            _ => FilesError::OperationFailed(io::Error::new(
                e.kind(),
                format!("failed to rename {} to {}: {}", old, new, e),
            )),
        })
    }

    /// Opens a document for download
    ///
    /// # Errors
    ///
    /// - [`FilesError::InvalidInput`] if the name is empty or unsafe
    /// - [`FilesError::NotFound`] if the document is absent or not a regular file
    /// - [`FilesError::OperationFailed`] if an existing file cannot be opened
    pub fn download_document(&self, name: &str) -> FilesResult<Download> {
        if name.trim().is_empty() {
            return Err(FilesError::InvalidInput("file not specified".into()));
        }

        let name = parse_name(name)?;
        let path = self.store.resolve(&name)?;

        let metadata = match fs::metadata(&path) {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Err(FilesError::NotFound(name.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(FilesError::NotFound(name.to_string()))
            }
            Err(e) => return Err(FilesError::OperationFailed(e)),
        };

        let file = fs::File::open(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => FilesError::NotFound(name.to_string()),
            _ => FilesError::OperationFailed(e),
        })?;

        Ok(Download {
            name,
            file,
            size_bytes: metadata.len(),
        })
    }
}

fn parse_name(input: &str) -> FilesResult<DocumentName> {
    DocumentName::new(input)
        .map_err(|e| FilesError::InvalidInput(format!("invalid file name {:?}: {}", input, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn create_service(root: &Path) -> FilesService {
        FilesService::new(DocumentStore::new(root).expect("store should open"))
    }

    /// Reader that yields some bytes and then fails, like a dropped connection
    struct FailingReader {
        sent: bool,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.sent {
                return Err(io::Error::new(ErrorKind::ConnectionReset, "client went away"));
            }
            self.sent = true;
            let chunk = b"partial";
            buf[..chunk.len()].copy_from_slice(chunk);
            Ok(chunk.len())
        }
    }

    fn read_all(download: Download) -> Vec<u8> {
        let mut file = download.file;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer).unwrap();
        buffer
    }

    #[test]
    fn test_list_empty_store() {
        let temp = TempDir::new().unwrap();
        let service = create_service(temp.path());

        assert!(service.list_documents().unwrap().is_empty());
    }

    #[test]
    fn test_list_skips_directories() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.txt"), "b").unwrap();
        fs::write(temp.path().join("a.txt"), "a").unwrap();
        fs::create_dir_all(temp.path().join("archive")).unwrap();

        let service = create_service(temp.path());
        let names: Vec<String> = service
            .list_documents()
            .unwrap()
            .into_iter()
            .map(|n| n.to_string())
            .collect();

        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_list_keeps_names_with_surrounding_whitespace() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("notes.txt "), "trailing").unwrap();
        fs::write(temp.path().join(" lead.txt"), "leading").unwrap();

        let service = create_service(temp.path());
        let names: Vec<String> = service
            .list_documents()
            .unwrap()
            .into_iter()
            .map(|n| n.to_string())
            .collect();

        assert_eq!(names, vec![" lead.txt", "notes.txt "]);
    }

    #[test]
    fn test_list_store_removed() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("store");
        fs::create_dir_all(&root).unwrap();
        let service = create_service(&root);
        fs::remove_dir(&root).unwrap();

        let result = service.list_documents();

        assert!(matches!(result, Err(FilesError::StoreUnavailable(_))));
    }

    #[test]
    fn test_upload_then_download_same_bytes() {
        let temp = TempDir::new().unwrap();
        let service = create_service(temp.path());
        let content: Vec<u8> = (0..=255).collect();

        let name = service
            .upload_document(Some(content.as_slice()), "binary.dat", None)
            .unwrap();
        assert_eq!(name.as_str(), "binary.dat");

        let download = service.download_document("binary.dat").unwrap();
        assert_eq!(download.size_bytes, 256);
        assert_eq!(read_all(download), content);
    }

    #[test]
    fn test_upload_prefers_requested_name() {
        let temp = TempDir::new().unwrap();
        let service = create_service(temp.path());

        let name = service
            .upload_document(Some(&b"hello"[..]), "original.txt", Some("renamed.txt"))
            .unwrap();

        assert_eq!(name.as_str(), "renamed.txt");
        assert!(temp.path().join("renamed.txt").is_file());
        assert!(!temp.path().join("original.txt").exists());
    }

    #[test]
    fn test_upload_blank_requested_name_falls_back() {
        let temp = TempDir::new().unwrap();
        let service = create_service(temp.path());

        let name = service
            .upload_document(Some(&b"hello"[..]), "original.txt", Some("   "))
            .unwrap();

        assert_eq!(name.as_str(), "original.txt");
    }

    #[test]
    fn test_upload_requested_name_kept_verbatim() {
        let temp = TempDir::new().unwrap();
        let service = create_service(temp.path());

        let name = service
            .upload_document(Some(&b"hello"[..]), "original.txt", Some(" spaced.txt"))
            .unwrap();

        assert_eq!(name.as_str(), " spaced.txt");
        assert!(temp.path().join(" spaced.txt").is_file());
        assert!(!temp.path().join("spaced.txt").exists());
    }

    #[test]
    fn test_upload_overwrites_existing() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("report.txt"), "old content that is longer").unwrap();
        let service = create_service(temp.path());

        service
            .upload_document(Some(&b"new"[..]), "report.txt", None)
            .unwrap();

        assert_eq!(fs::read(temp.path().join("report.txt")).unwrap(), b"new");
    }

    #[test]
    fn test_upload_without_payload_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let service = create_service(temp.path());

        let result = service.upload_document(None::<&[u8]>, "report.txt", None);

        assert!(matches!(result, Err(FilesError::InvalidInput(_))));
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_upload_empty_name_rejected() {
        let temp = TempDir::new().unwrap();
        let service = create_service(temp.path());

        let result = service.upload_document(Some(&b"data"[..]), "", None);

        assert!(matches!(result, Err(FilesError::InvalidInput(_))));
        assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_upload_traversal_rejected() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("store");
        fs::create_dir_all(&root).unwrap();
        let service = create_service(&root);

        for target in ["../../evil", "../evil", "..", "/tmp/evil", "sub/evil"] {
            let result = service.upload_document(Some(&b"x"[..]), "ok.txt", Some(target));
            assert!(
                matches!(result, Err(FilesError::InvalidInput(_))),
                "{target} should be rejected"
            );
        }

        assert!(!temp.path().join("evil").exists());
        assert_eq!(fs::read_dir(&root).unwrap().count(), 0);
    }

    #[test]
    fn test_upload_failed_copy_removes_partial_file() {
        let temp = TempDir::new().unwrap();
        let service = create_service(temp.path());

        let result =
            service.upload_document(Some(FailingReader { sent: false }), "broken.bin", None);

        assert!(matches!(result, Err(FilesError::WriteFailure(_))));
        assert!(!temp.path().join("broken.bin").exists());
    }

    #[test]
    fn test_rename_moves_document() {
        let temp = TempDir::new().unwrap();
        let service = create_service(temp.path());
        service
            .upload_document(Some(&b"hello"[..]), "report.txt", None)
            .unwrap();

        service
            .rename_document("report.txt", "report-final.txt")
            .unwrap();

        let names: Vec<String> = service
            .list_documents()
            .unwrap()
            .into_iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(names, vec!["report-final.txt"]);
        assert_eq!(
            fs::read(temp.path().join("report-final.txt")).unwrap(),
            b"hello"
        );
    }

    #[test]
    fn test_rename_overwrites_target() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "a").unwrap();
        fs::write(temp.path().join("b.txt"), "b").unwrap();
        let service = create_service(temp.path());

        service.rename_document("a.txt", "b.txt").unwrap();

        assert_eq!(fs::read(temp.path().join("b.txt")).unwrap(), b"a");
        assert!(!temp.path().join("a.txt").exists());
    }

    #[test]
    fn test_rename_empty_names_rejected() {
        let temp = TempDir::new().unwrap();
        let service = create_service(temp.path());

        assert!(matches!(
            service.rename_document("", "b.txt"),
            Err(FilesError::InvalidInput(_))
        ));
        assert!(matches!(
            service.rename_document("a.txt", "  "),
            Err(FilesError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_rename_missing_source_not_found() {
        let temp = TempDir::new().unwrap();
        let service = create_service(temp.path());

        let result = service.rename_document("ghost.txt", "b.txt");

        assert!(matches!(result, Err(FilesError::NotFound(_))));
    }

    #[test]
    fn test_rename_traversal_rejected() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("store");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("a.txt"), "a").unwrap();
        let service = create_service(&root);

        let result = service.rename_document("a.txt", "../escaped.txt");

        assert!(matches!(result, Err(FilesError::InvalidInput(_))));
        assert!(root.join("a.txt").exists());
        assert!(!temp.path().join("escaped.txt").exists());
    }

    #[test]
    fn test_download_name_with_trailing_space() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("notes.txt"), "plain").unwrap();
        fs::write(temp.path().join("notes.txt "), "trailing").unwrap();
        let service = create_service(temp.path());

        let download = service.download_document("notes.txt ").unwrap();

        assert_eq!(download.name.as_str(), "notes.txt ");
        assert_eq!(read_all(download), b"trailing");
    }

    #[test]
    fn test_download_missing_not_found() {
        let temp = TempDir::new().unwrap();
        let service = create_service(temp.path());

        let result = service.download_document("ghost.txt");

        assert!(matches!(result, Err(FilesError::NotFound(_))));
    }

    #[test]
    fn test_download_directory_not_found() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("archive")).unwrap();
        let service = create_service(temp.path());

        let result = service.download_document("archive");

        assert!(matches!(result, Err(FilesError::NotFound(_))));
    }

    #[test]
    fn test_download_empty_name_invalid() {
        let temp = TempDir::new().unwrap();
        let service = create_service(temp.path());

        assert!(matches!(
            service.download_document(""),
            Err(FilesError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_download_traversal_rejected() {
        let temp = TempDir::new().unwrap();
        let service = create_service(temp.path());

        let result = service.download_document("../../etc/passwd");

        assert!(matches!(result, Err(FilesError::InvalidInput(_))));
    }
}
