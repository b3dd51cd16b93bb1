//! Content-repository backend.
//!
//! Content lives in a file node of a hierarchical repository. The node's
//! identifier is assigned by the repository and persisted on the owning
//! object's side; changes become visible when the session is saved.

mod memory;

pub use memory::{MemoryNodeIdentifiers, MemoryRepository};

use crate::registry::REPOSITORY_BACKEND;
use crate::resource::as_commit_failure;
use crate::{ContentReader, ObjectProperties, Resource, ResourceBase, keys};
use chrono::{DateTime, Datelike, Utc};
use coffer_core::{ObjectRef, StoreDefinition, StoreEvent, TransactionId};
use coffer_error::{CofferResult, StorageError, StorageErrorKind};
use std::io::Cursor;
use std::sync::Arc;
use tokio::io::AsyncReadExt;

const DEFAULT_WORKSPACE: &str = "default";
const DEFAULT_BASE_FOLDER: &str = "attachments";

/// Login credentials for a repository session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// User name
    pub user: String,
    /// Password
    pub password: String,
}

/// Binary property of a file node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeContent {
    /// Stored bytes, compressed when the store compresses
    pub data: Vec<u8>,
    /// Encoding of `data`, the store's compression mode
    pub encoding: String,
    /// Time of the last write
    pub last_modified: DateTime<Utc>,
    /// Raw content length
    pub size: u64,
    /// Original file name
    pub file_name: String,
}

/// A repository that hands out sessions per workspace.
#[async_trait::async_trait]
pub trait ContentRepository: Send + Sync {
    /// Open a session on a workspace.
    async fn login(
        &self,
        workspace: &str,
        credentials: &Credentials,
    ) -> CofferResult<Box<dyn RepositorySession>>;
}

/// Unit of work against a repository workspace.
///
/// Changes are private to the session until [`save`](RepositorySession::save).
#[async_trait::async_trait]
pub trait RepositorySession: Send {
    /// Whether a node with this identifier exists.
    async fn node_exists(&mut self, node_id: &str) -> CofferResult<bool>;

    /// Create a file node below `folder`, creating folders as needed.
    /// Returns the new node's identifier.
    async fn add_file_node(&mut self, folder: &[String], name: &str) -> CofferResult<String>;

    /// Replace the binary content of a file node.
    async fn set_content(&mut self, node_id: &str, content: NodeContent) -> CofferResult<()>;

    /// Binary content of a file node.
    async fn content(&mut self, node_id: &str) -> CofferResult<Option<NodeContent>>;

    /// Remove a node.
    async fn remove(&mut self, node_id: &str) -> CofferResult<()>;

    /// Whether unsaved changes exist.
    fn has_pending_changes(&self) -> bool;

    /// Persist pending changes.
    async fn save(&mut self) -> CofferResult<()>;

    /// End the session, discarding unsaved changes.
    async fn logout(&mut self) -> CofferResult<()>;
}

/// Side table mapping owning objects to repository node identifiers.
#[async_trait::async_trait]
pub trait NodeIdentifiers: Send + Sync {
    /// Persisted node identifier of an object.
    async fn node_id(&self, object: &ObjectRef) -> CofferResult<Option<String>>;

    /// Persist the node identifier of an object.
    async fn set_node_id(&self, object: &ObjectRef, node_id: &str) -> CofferResult<()>;

    /// Forget the node identifier of an object.
    async fn clear_node_id(&self, object: &ObjectRef) -> CofferResult<()>;
}

/// Resource storing content in a repository file node.
///
/// # Properties
///
/// - `workspace-name`: workspace to log into (default `default`)
/// - `base-folder`: root of the date folders (default `attachments`)
/// - `enable-deletion`: whether `delete` removes nodes (default false)
/// - `user-name`, `password`: session credentials
/// - `repository-name`: repository registered with the backend context
pub struct RepositoryResource {
    base: ResourceBase,
    repository: Arc<dyn ContentRepository>,
    identifiers: Arc<dyn NodeIdentifiers>,
    workspace: String,
    base_folder: String,
    enable_deletion: bool,
    credentials: Credentials,
    session: Option<Box<dyn RepositorySession>>,
    // Node whose identifier is cleared once the removal is saved.
    removed_node: Option<String>,
}

impl RepositoryResource {
    /// Configure a repository resource.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for malformed properties.
    pub fn new(
        object: ObjectRef,
        store: &StoreDefinition,
        metadata: Arc<dyn ObjectProperties>,
        repository: Arc<dyn ContentRepository>,
        identifiers: Arc<dyn NodeIdentifiers>,
    ) -> CofferResult<Self> {
        let properties = store.properties();
        let workspace = properties
            .get(keys::WORKSPACE_NAME)
            .unwrap_or(DEFAULT_WORKSPACE)
            .to_string();
        let base_folder = properties
            .get(keys::BASE_FOLDER)
            .unwrap_or(DEFAULT_BASE_FOLDER)
            .trim_matches('/')
            .to_string();
        let enable_deletion = properties.bool_or(keys::ENABLE_DELETION, false)?;
        let credentials = Credentials {
            user: properties.get(keys::USER_NAME).unwrap_or_default().to_string(),
            password: properties.get(keys::PASSWORD).unwrap_or_default().to_string(),
        };

        Ok(Self {
            base: ResourceBase::new(object, store, metadata)?,
            repository,
            identifiers,
            workspace,
            base_folder,
            enable_deletion,
            credentials,
            session: None,
            removed_node: None,
        })
    }

    /// Whether `delete` removes nodes.
    pub fn deletion_enabled(&self) -> bool {
        self.enable_deletion
    }

    /// Date folder for content written at `now`.
    pub fn folder_for(&self, now: DateTime<Utc>) -> Vec<String> {
        let mut folder: Vec<String> = self
            .base_folder
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();
        folder.push(format!("{:04}", now.year()));
        folder.push(format!("{:02}", now.month()));
        folder.push(format!("{:02}", now.day()));
        folder
    }

    async fn session(&mut self) -> CofferResult<&mut Box<dyn RepositorySession>> {
        if self.session.is_none() {
            let session = self
                .repository
                .login(&self.workspace, &self.credentials)
                .await?;
            tracing::debug!(workspace = %self.workspace, "Logged into repository");
            return Ok(self.session.insert(session));
        }
        self.session.as_mut().ok_or_else(|| {
            StorageError::new(StorageErrorKind::Unavailable("repository session".into())).into()
        })
    }

    /// Identifier of the object's node, when it is persisted and still exists.
    async fn existing_node(&mut self) -> CofferResult<Option<String>> {
        let Some(node_id) = self.identifiers.node_id(self.base.object()).await? else {
            return Ok(None);
        };
        if self.session().await?.node_exists(&node_id).await? {
            Ok(Some(node_id))
        } else {
            Ok(None)
        }
    }

    async fn end_session(&mut self) -> CofferResult<()> {
        match self.session.take() {
            Some(mut session) => session.logout().await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for RepositoryResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryResource")
            .field("base", &self.base)
            .field("workspace", &self.workspace)
            .field("base_folder", &self.base_folder)
            .field("enable_deletion", &self.enable_deletion)
            .field("session", &self.session.is_some())
            .field("removed_node", &self.removed_node)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Resource for RepositoryResource {
    fn base(&self) -> &ResourceBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ResourceBase {
        &mut self.base
    }

    fn backend(&self) -> &'static str {
        REPOSITORY_BACKEND
    }

    async fn exists(&mut self) -> CofferResult<bool> {
        self.base.ensure_active()?;
        let Some(node_id) = self.existing_node().await? else {
            return Ok(false);
        };
        Ok(self.session().await?.content(&node_id).await?.is_some())
    }

    #[tracing::instrument(skip(self))]
    async fn read(&mut self) -> CofferResult<Option<ContentReader>> {
        self.base.begin(StoreEvent::Read)?;
        let Some(node_id) = self.existing_node().await? else {
            return Ok(None);
        };
        let Some(content) = self.session().await?.content(&node_id).await? else {
            return Ok(None);
        };
        tracing::debug!(node_id = %node_id, bytes = content.data.len(), "Read node");
        Ok(Some(self.base.decode(Box::new(Cursor::new(content.data)))))
    }

    #[tracing::instrument(skip(self, data))]
    async fn write(
        &mut self,
        data: ContentReader,
        size: i64,
        file_name: &str,
    ) -> CofferResult<i64> {
        self.base.begin(StoreEvent::Write)?;

        let (mut encoded, counter) = self.base.encode(data, size, file_name)?;
        let mut stored = Vec::new();
        encoded.read_to_end(&mut stored).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "node for {}: {}",
                self.base.object(),
                e
            )))
        })?;
        let length = counter.get();

        let now = Utc::now();
        let node_id = match self.existing_node().await? {
            Some(node_id) => node_id,
            None => {
                let folder = self.folder_for(now);
                let name = self.base.object().stable_key().clone();
                let node_id = self.session().await?.add_file_node(&folder, &name).await?;
                self.identifiers
                    .set_node_id(self.base.object(), &node_id)
                    .await?;
                tracing::debug!(node_id = %node_id, folder = %folder.join("/"), "Created node");
                node_id
            }
        };

        let content = NodeContent {
            data: stored,
            encoding: self.base.compression().mode().to_string(),
            last_modified: now,
            size: length,
            file_name: file_name.to_string(),
        };
        self.session().await?.set_content(&node_id, content).await?;

        self.base.record_written(file_name, length).await?;
        Ok(length as i64)
    }

    async fn delete(&mut self) -> CofferResult<()> {
        self.base.begin(StoreEvent::Delete)?;
        if !self.enable_deletion {
            tracing::debug!(object = %self.base.object(), "Deletion disabled, node kept");
            return Ok(());
        }
        if let Some(node_id) = self.existing_node().await? {
            self.session().await?.remove(&node_id).await?;
            tracing::debug!(node_id = %node_id, "Staged node removal");
            self.removed_node = Some(node_id);
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn commit(&mut self, xid: &TransactionId, one_phase: bool) -> CofferResult<()> {
        self.base.ensure_active()?;

        let saved = match self.session.as_mut() {
            Some(session) if session.has_pending_changes() => session.save().await,
            _ => Ok(()),
        };
        let ended = self.end_session().await;
        let removed = self.removed_node.take();
        self.base.close();

        saved.map_err(as_commit_failure)?;
        if let Err(e) = ended {
            tracing::warn!(error = %e, "Logout after commit failed");
        }
        if let Some(node_id) = removed {
            self.identifiers
                .clear_node_id(self.base.object())
                .await
                .map_err(as_commit_failure)?;
            tracing::debug!(node_id = %node_id, "Cleared node identifier");
        }
        tracing::info!(object = %self.base.object(), one_phase, "Committed");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn rollback(&mut self, xid: &TransactionId) -> CofferResult<()> {
        self.base.ensure_active()?;
        let ended = self.end_session().await;
        self.removed_node = None;
        self.base.close();
        if let Err(e) = ended {
            tracing::warn!(error = %e, "Logout after rollback failed");
        }
        tracing::warn!(object = %self.base.object(), "Rolled back");
        Ok(())
    }
}
