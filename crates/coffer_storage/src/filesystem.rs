//! Local filesystem backend.
//!
//! Content for an object lives at
//! `{base}/[typeId/][bucket/]typeId.objectId`. Writes land in a `.tmp`
//! sibling and only replace the live file on commit, after the previous
//! generations have been rotated into `.bak`, `.bak.1`, ... siblings.

use crate::registry::FILESYSTEM_BACKEND;
use crate::resource::as_commit_failure;
use crate::{ContentReader, ObjectProperties, Resource, ResourceBase, keys};
use coffer_core::{ObjectRef, StoreDefinition, StoreEvent, TransactionId};
use coffer_error::{CofferResult, ConfigError, StorageError, StorageErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufReader};

const FILE_SCHEME: &str = "file://";
const TEMP_SUFFIX: &str = ".tmp";
const BACKUP_SUFFIX: &str = ".bak";
const RETIRED_SUFFIX: &str = ".retired";

/// Filesystem resource with staged writes and rotating backups.
///
/// # Properties
///
/// - `base-name` (required): root directory, optionally as a `file://` URL
/// - `provider`: `file` or `local` (default `file`)
/// - `number-of-subdirectories`: bucket count (default 1, no buckets)
/// - `use-type-in-path`: prefix the path with the type id (default false)
/// - `number-of-backups`: retained generations (default 1, 0 disables)
#[derive(Debug)]
pub struct FileSystemResource {
    base: ResourceBase,
    path: PathBuf,
    backups: u32,
    staged: bool,
}

impl FileSystemResource {
    /// Configure a filesystem resource for an object.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `base-name` is missing, the provider
    /// is not local or a numeric property is malformed.
    pub fn new(
        object: ObjectRef,
        store: &StoreDefinition,
        metadata: Arc<dyn ObjectProperties>,
    ) -> CofferResult<Self> {
        let properties = store.properties();

        let provider = properties
            .get(keys::PROVIDER)
            .map(|p| p.trim().to_ascii_lowercase())
            .unwrap_or_else(|| "file".to_string());
        if provider != "file" && provider != "local" {
            return Err(ConfigError::new(format!(
                "Unsupported filesystem provider '{}' for store {}",
                provider,
                store.name()
            ))
            .into());
        }

        let base_name = properties.required(keys::BASE_NAME)?;
        let root = PathBuf::from(base_name.strip_prefix(FILE_SCHEME).unwrap_or(base_name));
        let subdirectories = properties.u32_or(keys::NUMBER_OF_SUBDIRECTORIES, 1)?;
        let use_type = properties.bool_or(keys::USE_TYPE_IN_PATH, false)?;
        let backups = properties.u32_or(keys::NUMBER_OF_BACKUPS, 1)?;

        let path = content_path(&root, &object, subdirectories, use_type);
        let base = ResourceBase::new(object, store, metadata)?;

        Ok(Self {
            base,
            path,
            backups,
            staged: false,
        })
    }

    /// Location of the live content.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Location of staged, uncommitted content.
    pub fn temp_path(&self) -> PathBuf {
        sibling(&self.path, TEMP_SUFFIX)
    }

    /// Location of a backup generation; generation 0 is the newest.
    pub fn backup_path(&self, generation: u32) -> PathBuf {
        if generation == 0 {
            sibling(&self.path, BACKUP_SUFFIX)
        } else {
            sibling(&self.path, &format!("{}.{}", BACKUP_SUFFIX, generation))
        }
    }

    /// Number of retained backup generations.
    pub fn backups(&self) -> u32 {
        self.backups
    }

    /// Replace the live file with the staged one.
    ///
    /// Every rename is journaled; if any step fails the journal is undone so
    /// the live file and its backups are left exactly as they were. The
    /// generation pushed past the limit is parked and only removed once the
    /// staged file is live.
    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    async fn promote(&mut self) -> CofferResult<()> {
        let temp = self.temp_path();
        ensure_file(&temp).await?;

        if self.backups == 0 {
            return rename(&temp, &self.path).await;
        }

        let retired = sibling(&self.path, RETIRED_SUFFIX);
        let mut journal = RenameJournal::default();
        let shifted = async {
            self.shift_generations(&mut journal, &retired).await?;
            if exists(&self.path).await? {
                journal.rename(&self.path, &self.backup_path(0)).await?;
            }
            journal.rename(&temp, &self.path).await
        }
        .await;

        if let Err(e) = shifted {
            journal.undo().await;
            return Err(e);
        }
        discard_retired(&retired).await;
        Ok(())
    }

    /// Shift generations one step older. The oldest one is parked at
    /// `retired` rather than removed.
    async fn shift_generations(
        &self,
        journal: &mut RenameJournal,
        retired: &Path,
    ) -> CofferResult<()> {
        remove_if_exists(retired).await?;

        let oldest = self.backup_path(self.backups - 1);
        if exists(&oldest).await? {
            journal.rename(&oldest, retired).await?;
        }

        for generation in (0..self.backups - 1).rev() {
            let from = self.backup_path(generation);
            if exists(&from).await? {
                journal
                    .rename(&from, &self.backup_path(generation + 1))
                    .await?;
            }
        }
        Ok(())
    }

    /// Move the live file out of the way, keeping one recoverable generation.
    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    async fn retire(&mut self) -> CofferResult<()> {
        if self.staged {
            remove_if_exists(&self.temp_path()).await?;
            self.staged = false;
        }
        if !exists(&self.path).await? {
            tracing::debug!("Nothing to delete");
            return Ok(());
        }
        if self.backups == 0 {
            return remove_if_exists(&self.path).await;
        }

        let retired = sibling(&self.path, RETIRED_SUFFIX);
        remove_if_exists(&retired).await?;

        let newest = self.backup_path(0);
        let mut journal = RenameJournal::default();
        let moved = async {
            if exists(&newest).await? {
                journal.rename(&newest, &retired).await?;
            }
            journal.rename(&self.path, &newest).await
        }
        .await;

        if let Err(e) = moved {
            journal.undo().await;
            return Err(e);
        }

        discard_retired(&retired).await;
        for generation in 1..self.backups {
            let older = self.backup_path(generation);
            if let Err(e) = remove_if_exists(&older).await {
                tracing::warn!(path = %older.display(), error = %e, "Failed to remove old generation");
            }
        }
        Ok(())
    }

    async fn discard_staged(&mut self) {
        if !self.staged {
            return;
        }
        let temp = self.temp_path();
        if let Err(e) = remove_if_exists(&temp).await {
            tracing::warn!(path = %temp.display(), error = %e, "Failed to remove staged content");
        }
        self.staged = false;
    }
}

#[async_trait::async_trait]
impl Resource for FileSystemResource {
    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ResourceBase {
        &mut self.base
    }

    fn backend(&self) -> &'static str {
        FILESYSTEM_BACKEND
    }

    async fn exists(&mut self) -> CofferResult<bool> {
        self.base.ensure_active()?;
        exists(&self.path).await
    }

    #[tracing::instrument(skip(self))]
    async fn read(&mut self) -> CofferResult<Option<ContentReader>> {
        self.base.begin(StoreEvent::Read)?;
        if !exists(&self.path).await? {
            return Ok(None);
        }

        let file = File::open(&self.path).await.map_err(|e| {
            StorageError::new(StorageErrorKind::NotFound(format!(
                "{}: {}",
                self.path.display(),
                e
            )))
        })?;
        Ok(Some(self.base.decode(Box::new(BufReader::new(file)))))
    }

    #[tracing::instrument(skip(self, data))]
    async fn write(
        &mut self,
        data: ContentReader,
        size: i64,
        file_name: &str,
    ) -> CofferResult<i64> {
        self.base.begin(StoreEvent::Write)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                    "{}: {}",
                    parent.display(),
                    e
                )))
            })?;
        }

        let (mut encoded, counter) = self.base.encode(data, size, file_name)?;
        let temp = self.temp_path();
        let mut file = File::create(&temp).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "{}: {}",
                temp.display(),
                e
            )))
        })?;
        self.staged = true;

        let copied = async {
            tokio::io::copy(&mut encoded, &mut file).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = copied {
            drop(file);
            self.discard_staged().await;
            return Err(StorageError::new(StorageErrorKind::FileWrite(format!(
                "{}: {}",
                temp.display(),
                e
            )))
            .into());
        }

        let length = counter.get();
        self.base.record_written(file_name, length).await?;
        tracing::debug!(path = %temp.display(), length, "Staged content");
        Ok(length as i64)
    }

    async fn delete(&mut self) -> CofferResult<()> {
        self.base.begin(StoreEvent::Delete)?;
        tracing::debug!(path = %self.path.display(), "Marked for deletion");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn commit(&mut self, xid: &TransactionId, one_phase: bool) -> CofferResult<()> {
        self.base.ensure_active()?;

        let result = match self.base.event() {
            StoreEvent::Write if self.staged => {
                let promoted = self.promote().await;
                if promoted.is_ok() {
                    self.staged = false;
                }
                promoted
            }
            StoreEvent::Delete => self.retire().await,
            _ => Ok(()),
        };
        if result.is_err() {
            self.discard_staged().await;
        }
        self.base.close();

        result.map_err(as_commit_failure)?;
        tracing::info!(path = %self.path.display(), one_phase, "Committed");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn rollback(&mut self, xid: &TransactionId) -> CofferResult<()> {
        self.base.ensure_active()?;
        self.discard_staged().await;
        self.base.close();
        tracing::warn!(path = %self.path.display(), "Rolled back");
        Ok(())
    }
}

/// Path of the live file for an object.
fn content_path(root: &Path, object: &ObjectRef, subdirectories: u32, use_type: bool) -> PathBuf {
    let mut path = root.to_path_buf();
    if use_type {
        path.push(object.type_id().to_string());
    }
    if subdirectories > 1 {
        let width = (subdirectories - 1).to_string().len();
        let bucket = object.id().rem_euclid(i64::from(subdirectories));
        path.push(format!("{:0width$}", bucket, width = width));
    }
    path.push(format!("{}.{}", object.type_id(), object.id()));
    path
}

/// Append a suffix to the full file name.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Renames performed so far, undone in reverse order on failure.
#[derive(Debug, Default)]
struct RenameJournal {
    done: Vec<(PathBuf, PathBuf)>,
}

impl RenameJournal {
    async fn rename(&mut self, from: &Path, to: &Path) -> CofferResult<()> {
        rename(from, to).await?;
        self.done.push((from.to_path_buf(), to.to_path_buf()));
        Ok(())
    }

    async fn undo(&mut self) {
        while let Some((from, to)) = self.done.pop() {
            match tokio::fs::rename(&to, &from).await {
                Ok(()) => tracing::debug!(path = %from.display(), "Restored"),
                Err(e) => tracing::error!(
                    from = %to.display(),
                    to = %from.display(),
                    error = %e,
                    "Could not undo rename"
                ),
            }
        }
    }
}

/// Remove a parked generation once the new state is in place.
async fn discard_retired(retired: &Path) {
    if let Err(e) = remove_if_exists(retired).await {
        tracing::warn!(path = %retired.display(), error = %e, "Failed to remove retired generation");
    }
}

/// Fail unless `path` is a regular file.
async fn ensure_file(path: &Path) -> CofferResult<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(()),
        Ok(_) => Err(StorageError::new(StorageErrorKind::Io(format!(
            "{} is not a file",
            path.display()
        )))
        .into()),
        Err(e) => Err(StorageError::new(StorageErrorKind::NotFound(format!(
            "{}: {}",
            path.display(),
            e
        )))
        .into()),
    }
}

async fn exists(path: &Path) -> CofferResult<bool> {
    tokio::fs::try_exists(path).await.map_err(|e| {
        StorageError::new(StorageErrorKind::Io(format!("{}: {}", path.display(), e))).into()
    })
}

async fn rename(from: &Path, to: &Path) -> CofferResult<()> {
    tokio::fs::rename(from, to).await.map_err(|e| {
        StorageError::new(StorageErrorKind::Io(format!(
            "rename {} to {}: {}",
            from.display(),
            to.display(),
            e
        )))
        .into()
    })
}

async fn remove_if_exists(path: &Path) -> CofferResult<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StorageError::new(StorageErrorKind::Io(format!(
            "remove {}: {}",
            path.display(),
            e
        )))
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_layout() {
        let path = content_path(Path::new("/data"), &ObjectRef::from_ids(4711, 12), 1, false);
        assert_eq!(path, PathBuf::from("/data/12.4711"));
    }

    #[test]
    fn test_bucket_is_zero_padded() {
        let object = ObjectRef::from_ids(4703, 12);
        let path = content_path(Path::new("/data"), &object, 100, true);
        assert_eq!(path, PathBuf::from("/data/12/03/12.4703"));

        let path = content_path(Path::new("/data"), &object, 10, false);
        assert_eq!(path, PathBuf::from("/data/3/12.4703"));
    }

    #[tokio::test]
    async fn test_journal_undo_restores_in_reverse() {
        let dir = tempfile::TempDir::new().unwrap();
        let live = dir.path().join("12.4711");
        let bak = dir.path().join("12.4711.bak");
        let parked = dir.path().join("12.4711.retired");
        std::fs::write(&live, b"v2").unwrap();
        std::fs::write(&bak, b"v1").unwrap();

        let mut journal = RenameJournal::default();
        journal.rename(&bak, &parked).await.unwrap();
        journal.rename(&live, &bak).await.unwrap();
        journal.undo().await;

        assert_eq!(std::fs::read(&live).unwrap(), b"v2");
        assert_eq!(std::fs::read(&bak).unwrap(), b"v1");
        assert!(!parked.exists());
    }

    #[test]
    fn test_sibling_keeps_dotted_leaf() {
        let path = PathBuf::from("/data/12.4711");
        assert_eq!(sibling(&path, ".tmp"), PathBuf::from("/data/12.4711.tmp"));
    }
}
