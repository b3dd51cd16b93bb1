//! In-process repository and node identifier table.

use super::{ContentRepository, Credentials, NodeContent, NodeIdentifiers, RepositorySession};
use coffer_core::ObjectRef;
use coffer_error::{CofferResult, StorageError, StorageErrorKind};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Node {
    folder: Vec<String>,
    name: String,
    content: Option<NodeContent>,
}

type Workspace = HashMap<String, Node>;

/// Repository held in memory, with sessions that stage changes until saved.
///
/// Clones share the same workspaces.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    workspaces: Arc<DashMap<String, Workspace>>,
    credentials: Option<Credentials>,
}

impl MemoryRepository {
    /// Create a repository that accepts any credentials.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only accept logins with these credentials.
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            user: user.into(),
            password: password.into(),
        });
        self
    }

    /// Number of saved nodes in a workspace.
    pub fn node_count(&self, workspace: &str) -> usize {
        self.workspaces
            .get(workspace)
            .map(|nodes| nodes.len())
            .unwrap_or(0)
    }

    /// Saved path of a node, `folder/.../name`.
    pub fn node_path(&self, workspace: &str, node_id: &str) -> Option<String> {
        let nodes = self.workspaces.get(workspace)?;
        let node = nodes.get(node_id)?;
        let mut segments = node.folder.clone();
        segments.push(node.name.clone());
        Some(segments.join("/"))
    }
}

#[async_trait::async_trait]
impl ContentRepository for MemoryRepository {
    async fn login(
        &self,
        workspace: &str,
        credentials: &Credentials,
    ) -> CofferResult<Box<dyn RepositorySession>> {
        if self
            .credentials
            .as_ref()
            .is_some_and(|expected| expected != credentials)
        {
            return Err(StorageError::new(StorageErrorKind::Unavailable(format!(
                "login rejected for user '{}' on workspace {}",
                credentials.user, workspace
            )))
            .into());
        }
        Ok(Box::new(MemorySession {
            workspace: workspace.to_string(),
            workspaces: Arc::clone(&self.workspaces),
            staged: HashMap::new(),
            live: true,
        }))
    }
}

#[derive(Debug)]
enum Staged {
    Put(Node),
    Removed,
}

#[derive(Debug)]
struct MemorySession {
    workspace: String,
    workspaces: Arc<DashMap<String, Workspace>>,
    staged: HashMap<String, Staged>,
    live: bool,
}

impl MemorySession {
    fn ensure_live(&self) -> CofferResult<()> {
        if !self.live {
            return Err(StorageError::new(StorageErrorKind::InvalidState(format!(
                "session on workspace {} is logged out",
                self.workspace
            )))
            .into());
        }
        Ok(())
    }

    /// The node as this session sees it.
    fn visible(&self, node_id: &str) -> Option<Node> {
        match self.staged.get(node_id) {
            Some(Staged::Put(node)) => Some(node.clone()),
            Some(Staged::Removed) => None,
            None => self
                .workspaces
                .get(&self.workspace)
                .and_then(|nodes| nodes.get(node_id).cloned()),
        }
    }
}

#[async_trait::async_trait]
impl RepositorySession for MemorySession {
    async fn node_exists(&mut self, node_id: &str) -> CofferResult<bool> {
        self.ensure_live()?;
        Ok(self.visible(node_id).is_some())
    }

    async fn add_file_node(&mut self, folder: &[String], name: &str) -> CofferResult<String> {
        self.ensure_live()?;
        let node_id = Uuid::new_v4().to_string();
        let node = Node {
            folder: folder.to_vec(),
            name: name.to_string(),
            content: None,
        };
        self.staged.insert(node_id.clone(), Staged::Put(node));
        Ok(node_id)
    }

    async fn set_content(&mut self, node_id: &str, content: NodeContent) -> CofferResult<()> {
        self.ensure_live()?;
        let Some(mut node) = self.visible(node_id) else {
            return Err(StorageError::new(StorageErrorKind::NotFound(format!(
                "node {} in workspace {}",
                node_id, self.workspace
            )))
            .into());
        };
        node.content = Some(content);
        self.staged.insert(node_id.to_string(), Staged::Put(node));
        Ok(())
    }

    async fn content(&mut self, node_id: &str) -> CofferResult<Option<NodeContent>> {
        self.ensure_live()?;
        Ok(self.visible(node_id).and_then(|node| node.content))
    }

    async fn remove(&mut self, node_id: &str) -> CofferResult<()> {
        self.ensure_live()?;
        if self.visible(node_id).is_some() {
            self.staged.insert(node_id.to_string(), Staged::Removed);
        }
        Ok(())
    }

    fn has_pending_changes(&self) -> bool {
        !self.staged.is_empty()
    }

    async fn save(&mut self) -> CofferResult<()> {
        self.ensure_live()?;
        let mut nodes = self.workspaces.entry(self.workspace.clone()).or_default();
        for (node_id, change) in self.staged.drain() {
            match change {
                Staged::Put(node) => {
                    nodes.insert(node_id, node);
                }
                Staged::Removed => {
                    nodes.remove(&node_id);
                }
            }
        }
        Ok(())
    }

    async fn logout(&mut self) -> CofferResult<()> {
        self.staged.clear();
        self.live = false;
        Ok(())
    }
}

/// In-process [`NodeIdentifiers`] keyed by object id.
#[derive(Debug, Clone, Default)]
pub struct MemoryNodeIdentifiers {
    ids: Arc<DashMap<i64, String>>,
}

impl MemoryNodeIdentifiers {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl NodeIdentifiers for MemoryNodeIdentifiers {
    async fn node_id(&self, object: &ObjectRef) -> CofferResult<Option<String>> {
        Ok(self.ids.get(object.id()).map(|id| id.value().clone()))
    }

    async fn set_node_id(&self, object: &ObjectRef, node_id: &str) -> CofferResult<()> {
        self.ids.insert(*object.id(), node_id.to_string());
        Ok(())
    }

    async fn clear_node_id(&self, object: &ObjectRef) -> CofferResult<()> {
        self.ids.remove(object.id());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn content(data: &[u8]) -> NodeContent {
        NodeContent {
            data: data.to_vec(),
            encoding: "none".into(),
            last_modified: Utc::now(),
            size: data.len() as u64,
            file_name: "a.txt".into(),
        }
    }

    #[tokio::test]
    async fn test_changes_invisible_until_saved() {
        let repository = MemoryRepository::new();
        let mut writer = repository.login("ws", &Credentials::default()).await.unwrap();
        let node_id = writer
            .add_file_node(&["docs".to_string()], "1.1")
            .await
            .unwrap();
        writer.set_content(&node_id, content(b"abc")).await.unwrap();

        let mut reader = repository.login("ws", &Credentials::default()).await.unwrap();
        assert!(!reader.node_exists(&node_id).await.unwrap());

        writer.save().await.unwrap();
        assert!(reader.node_exists(&node_id).await.unwrap());
        assert_eq!(repository.node_path("ws", &node_id).unwrap(), "docs/1.1");
    }

    #[tokio::test]
    async fn test_rejects_wrong_credentials() {
        let repository = MemoryRepository::new().with_credentials("alice", "secret");
        let wrong = Credentials {
            user: "alice".into(),
            password: "guess".into(),
        };
        assert!(repository.login("ws", &wrong).await.is_err());
    }

    #[tokio::test]
    async fn test_logged_out_session_rejects_use() {
        let repository = MemoryRepository::new();
        let mut session = repository.login("ws", &Credentials::default()).await.unwrap();
        session.logout().await.unwrap();
        assert!(session.node_exists("missing").await.is_err());
    }
}
