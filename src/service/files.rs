//! Binary resources owned by file units.
//!
//! Every stored file belongs to exactly one unit. Releasing a unit's files
//! deletes them outright, there is no sharing or reference counting.

use std::path::{Path, PathBuf};

use crate::data::unit::db::Upload;
use crate::data::unit::FileRecord;
use crate::error::{CoreError, FieldErrorKind, ValidationErrors};
use crate::util;

/// Location and size of a freshly written upload.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct StoredFile {
    pub path: String,
    pub size: u64,
}

/// Result of deleting one stored file.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Deletion {
    Deleted,
    Failed(String),
}

/// Summary of a best-effort cleanup.
///
/// Not an error. There is no conversion into [`CoreError`], a failed cleanup
/// can't be returned from a unit operation.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct CleanupOutcome {
    pub attempted: usize,
    pub failed: Vec<String>,
}

impl CleanupOutcome {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Binary storage backing file units.
#[allow(async_fn_in_trait)]
pub trait FileStore {
    async fn write_uploaded_file(&self, name: &str, bytes: &[u8]) -> std::io::Result<StoredFile>;

    /// Never fails, problems are reported through [`Deletion::Failed`].
    async fn delete_file(&self, path: &str) -> Deletion;
}

/// Stores uploads as plain files under a configured directory.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> LocalFileStore {
        LocalFileStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl FileStore for LocalFileStore {
    async fn write_uploaded_file(&self, name: &str, bytes: &[u8]) -> std::io::Result<StoredFile> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.root.join(name);
        tokio::fs::write(&path, bytes).await?;

        Ok(StoredFile {
            path: path.to_string_lossy().into_owned(),
            size: bytes.len() as u64,
        })
    }

    async fn delete_file(&self, path: &str) -> Deletion {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Deletion::Deleted,
            Err(e) => Deletion::Failed(e.to_string()),
        }
    }
}

/// Attaches uploads to file units and releases the files they no longer own.
pub struct FileAssets<F> {
    store: F,
}

impl<F: FileStore> FileAssets<F> {
    pub fn new(store: F) -> FileAssets<F> {
        FileAssets { store }
    }

    pub fn store(&self) -> &F {
        &self.store
    }

    /// Writes `uploads` under random storage names and appends their records
    /// to `files`. If a write fails, files written by this call are released.
    pub async fn attach(
        &self,
        files: &mut Vec<FileRecord>,
        uploads: &[Upload],
    ) -> Result<(), CoreError> {
        let mut written = Vec::with_capacity(uploads.len());

        for upload in uploads {
            let name = util::random_storage_name(&upload.file_name);
            match self.store.write_uploaded_file(&name, &upload.bytes).await {
                Ok(stored) => {
                    tracing::debug!("Stored upload '{}' as '{}'", upload.file_name, name);
                    written.push(FileRecord {
                        path: stored.path,
                        name,
                        alias: upload.file_name.clone(),
                        size: stored.size,
                    });
                }
                Err(e) => {
                    tracing::error!("Unable to store upload '{}': {}", upload.file_name, e);
                    self.release(&written).await;
                    return Err(e.into());
                }
            }
        }

        files.extend(written);
        Ok(())
    }

    /// Deletes every given file. Failures are logged and reported, never raised.
    pub async fn release(&self, files: &[FileRecord]) -> CleanupOutcome {
        let mut outcome = CleanupOutcome::default();

        for file in files {
            outcome.attempted += 1;
            if let Deletion::Failed(reason) = self.store.delete_file(&file.path).await {
                tracing::warn!("Unable to delete file '{}': {}", file.path, reason);
                outcome.failed.push(file.path.clone());
            }
        }

        outcome
    }
}

/// Splits the currently owned files by a requested replacement list.
///
/// Returns the stored records to keep, in requested order, and the records to
/// release. Requested files are matched by storage `name`; a name the unit
/// doesn't own is rejected since units may only reference their own files.
pub fn partition_files(
    current: &[FileRecord],
    requested: &[FileRecord],
) -> Result<(Vec<FileRecord>, Vec<FileRecord>), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let mut kept = Vec::with_capacity(requested.len());

    for (i, file) in requested.iter().enumerate() {
        match current.iter().find(|it| it.name == file.name) {
            Some(owned) if !kept.contains(owned) => kept.push(owned.clone()),
            Some(_) => {}
            None => errors.push(
                format!("files.{}", i),
                FieldErrorKind::Invalid,
                format!("File '{}' doesn't belong to this unit.", file.name),
            ),
        }
    }
    errors.into_result()?;

    let removed = current
        .iter()
        .filter(|it| !kept.iter().any(|k| k.name == it.name))
        .cloned()
        .collect();

    Ok((kept, removed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> FileRecord {
        FileRecord {
            path: format!("uploads/{}", name),
            name: name.to_string(),
            alias: format!("original-{}", name),
            size: 1,
        }
    }

    #[test]
    fn partition_keeps_requested_and_releases_rest() {
        let current = vec![record("a"), record("b"), record("c")];
        let (kept, removed) = partition_files(&current, &[record("c"), record("a")]).unwrap();
        assert_eq!(kept, vec![record("c"), record("a")]);
        assert_eq!(removed, vec![record("b")]);
    }

    #[test]
    fn partition_rejects_foreign_files() {
        let errors = partition_files(&[record("a")], &[record("z")]).unwrap_err();
        assert!(errors.has_field("files.0"));
    }

    #[tokio::test]
    async fn attach_writes_under_random_names() {
        let dir = tempfile::tempdir().unwrap();
        let assets = FileAssets::new(LocalFileStore::new(dir.path().join("units")));

        let mut files = vec![];
        assets
            .attach(&mut files, &[Upload::new("notes.md", "# Traits")])
            .await
            .unwrap();

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].alias, "notes.md");
        assert_ne!(files[0].name, "notes.md");
        assert!(files[0].name.ends_with(".md"));
        assert_eq!(files[0].size, 8);
        assert_eq!(std::fs::read_to_string(&files[0].path).unwrap(), "# Traits");
    }

    #[tokio::test]
    async fn release_ignores_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let assets = FileAssets::new(LocalFileStore::new(dir.path()));

        let mut files = vec![];
        assets
            .attach(&mut files, &[Upload::new("a.txt", "a")])
            .await
            .unwrap();
        files.push(FileRecord {
            path: dir.path().join("gone.txt").to_string_lossy().into_owned(),
            name: "gone.txt".to_string(),
            alias: "gone.txt".to_string(),
            size: 0,
        });

        let outcome = assets.release(&files).await;
        assert_eq!(outcome.attempted, 2);
        assert_eq!(outcome.failed.len(), 1);
        assert!(!std::path::Path::new(&files[0].path).exists());
    }
}
