use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::PatentError;

/// Section headings every new draft starts with, in order.
pub const SECTIONS: [&str; 5] = [
    "Abstract",
    "Background",
    "Summary",
    "Detailed Description",
    "Claims",
];

/// Separator placed between the existing text and every appended block.
pub const BLOCK_SEPARATOR: &str = "\n\n";

/// The initial text of a draft. No trailing newline, so each appended block
/// ends up exactly one blank line below the previous one.
pub fn skeleton(title: &str) -> String {
    let mut text = format!("# {title}");
    for section in SECTIONS {
        text.push_str(BLOCK_SEPARATOR);
        text.push_str("## ");
        text.push_str(section);
    }
    text
}

/// Where a session's document lives.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DocumentHandle {
    key: String,
    location: String,
}

impl DocumentHandle {
    pub fn new(key: &str, location: &str) -> Self {
        Self {
            key: key.to_string(),
            location: location.to_string(),
        }
    }

    /// The session id the document is stored under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Printable location, a file path for [`FsDocumentStore`].
    pub fn location(&self) -> &str {
        &self.location
    }
}

/// Text blob storage keyed by session id.
///
/// `append` is a plain read-modify-write. Two overlapping appends to the
/// same document can lose one of them; callers rely on there being a single
/// writer.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Allocates the document for `session_id` and writes the skeleton.
    async fn create(&self, session_id: &str, title: &str) -> Result<DocumentHandle, PatentError>;

    async fn read(&self, session_id: &str) -> Result<String, PatentError>;

    async fn append(&self, session_id: &str, text: &str) -> Result<(), PatentError>;

    async fn overwrite(&self, session_id: &str, text: &str) -> Result<(), PatentError>;
}

/// One markdown file per session under a root directory.
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, session_id: &str) -> PathBuf {
        self.root.join(format!("patent_{session_id}.md"))
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn create(&self, session_id: &str, title: &str) -> Result<DocumentHandle, PatentError> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            PatentError::storage(format!("creating {}", self.root.display()), e)
        })?;
        self.overwrite(session_id, &skeleton(title)).await?;
        let path = self.path_for(session_id);
        tracing::debug!("created patent document {}", path.display());
        Ok(DocumentHandle::new(session_id, &path.to_string_lossy()))
    }

    async fn read(&self, session_id: &str) -> Result<String, PatentError> {
        let path = self.path_for(session_id);
        tokio::fs::read_to_string(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => PatentError::NotFound(path.display().to_string()),
            _ => PatentError::storage(format!("reading {}", path.display()), e),
        })
    }

    async fn append(&self, session_id: &str, text: &str) -> Result<(), PatentError> {
        let mut content = self.read(session_id).await?;
        content.push_str(BLOCK_SEPARATOR);
        content.push_str(text);
        self.overwrite(session_id, &content).await
    }

    async fn overwrite(&self, session_id: &str, text: &str) -> Result<(), PatentError> {
        let path = self.path_for(session_id);
        tokio::fs::write(&path, text)
            .await
            .map_err(|e| PatentError::storage(format!("writing {}", path.display()), e))
    }
}
