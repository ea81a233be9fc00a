//! Core data models used throughout RepoLens.
//!
//! These types represent the repositories, file records, vectors,
//! summaries, and chat sessions that flow through the ingestion and
//! retrieval pipeline.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RepolensError;

/// Path sentinel of the single per-repository metadata vector.
pub const REPO_METADATA_PATH: &str = "REPO_METADATA";

/// Status of one pipeline for one repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStatus {
    #[default]
    Pending,
    Processing,
    Ready,
    Failed,
}

impl PipelineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Ready => "ready",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineStatus {
    type Err = RepolensError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "ready" => Ok(Self::Ready),
            "failed" => Ok(Self::Failed),
            other => Err(RepolensError::Store(format!(
                "unknown pipeline status '{}'",
                other
            ))),
        }
    }
}

/// The three independently-written status fields of a [`Repository`].
///
/// Each pipeline owns exactly one of these and never writes the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusField {
    Structure,
    Ai,
    Embedding,
}

impl StatusField {
    pub const ALL: [StatusField; 3] = [Self::Structure, Self::Ai, Self::Embedding];

    /// Column / field name used by the stores.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Structure => "structure_status",
            Self::Ai => "ai_status",
            Self::Embedding => "embedding_status",
        }
    }
}

impl fmt::Display for StatusField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Structure => "structure",
            Self::Ai => "ai",
            Self::Embedding => "embedding",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Dir,
}

/// Snapshot of a repository's directory tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeNode {
    File {
        name: String,
        path: String,
        size: u64,
        extension: String,
    },
    Dir {
        name: String,
        path: String,
        children: Vec<TreeNode>,
    },
}

impl TreeNode {
    /// Build a file node, inferring the extension from `name`.
    pub fn file(name: &str, path: &str, size: u64) -> Self {
        Self::File {
            name: name.to_string(),
            path: path.to_string(),
            size,
            extension: extension_of(name),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Self::File { .. } => NodeKind::File,
            Self::Dir { .. } => NodeKind::Dir,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::File { path, .. } | Self::Dir { path, .. } => path,
        }
    }

    /// Number of file nodes in this subtree.
    pub fn file_count(&self) -> usize {
        match self {
            Self::File { .. } => 1,
            Self::Dir { children, .. } => children.iter().map(TreeNode::file_count).sum(),
        }
    }
}

/// Substring after the last `.` (including the dot), or empty if none.
pub fn extension_of(name: &str) -> String {
    name.rfind('.')
        .map(|i| name[i..].to_string())
        .unwrap_or_default()
}

/// Repository metadata fetched from the hosting collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoMetadata {
    pub name: String,
    pub description: String,
    pub stars: u64,
    pub forks: u64,
    pub watchers: u64,
    pub commit_count: u64,
    pub branches: Vec<String>,
    pub contributors: Vec<String>,
    pub languages: Vec<String>,
}

/// A tracked repository, unique by `(url, user_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub id: String,
    /// Normalized GitHub URL (no trailing slash, no `.git`).
    pub url: String,
    /// The user who asked for the analysis.
    pub user_id: String,
    /// GitHub owner login.
    pub owner: String,
    pub name: String,
    pub description: String,
    pub stars: u64,
    pub forks: u64,
    pub watchers: u64,
    pub commit_count: u64,
    pub branches: Vec<String>,
    pub contributors: Vec<String>,
    pub languages: Vec<String>,
    pub file_tree: Option<TreeNode>,
    pub summary_id: Option<String>,
    pub structure_status: PipelineStatus,
    pub ai_status: PipelineStatus,
    pub embedding_status: PipelineStatus,
    pub last_synced: DateTime<Utc>,
}

impl Repository {
    /// New repository record with all statuses `pending`.
    pub fn new(url: &str, user_id: &str, owner: &str, meta: RepoMetadata) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.to_string(),
            user_id: user_id.to_string(),
            owner: owner.to_string(),
            name: meta.name,
            description: meta.description,
            stars: meta.stars,
            forks: meta.forks,
            watchers: meta.watchers,
            commit_count: meta.commit_count,
            branches: meta.branches,
            contributors: meta.contributors,
            languages: meta.languages,
            file_tree: None,
            summary_id: None,
            structure_status: PipelineStatus::Pending,
            ai_status: PipelineStatus::Pending,
            embedding_status: PipelineStatus::Pending,
            last_synced: Utc::now(),
        }
    }

    pub fn status(&self, field: StatusField) -> PipelineStatus {
        match field {
            StatusField::Structure => self.structure_status,
            StatusField::Ai => self.ai_status,
            StatusField::Embedding => self.embedding_status,
        }
    }

    pub fn set_status(&mut self, field: StatusField, status: PipelineStatus) {
        match field {
            StatusField::Structure => self.structure_status = status,
            StatusField::Ai => self.ai_status = status,
            StatusField::Embedding => self.embedding_status = status,
        }
    }

    /// Fixed-format text embedded as the `REPO_METADATA` vector.
    pub fn metadata_text(&self) -> String {
        let description = if self.description.is_empty() {
            "No description provided"
        } else {
            &self.description
        };
        format!(
            "Repository name: {}\n\
             Description: {}\n\
             Owner: {}\n\
             Stars: {}, Forks: {}, Watchers: {}\n\
             Contributors: {}\n\
             Languages used: {}\n\
             Total commits: {}",
            self.name,
            description,
            self.owner,
            self.stars,
            self.forks,
            self.watchers,
            self.contributors.join(", "),
            self.languages.join(", "),
            self.commit_count,
        )
    }
}

/// One file encountered during ingestion, with decoded content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub repo_id: String,
    pub path: String,
    pub kind: NodeKind,
    pub size: u64,
    pub extension: String,
    /// Decoded text; empty when the file is binary or had no body.
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl FileRecord {
    pub fn new(repo_id: &str, path: &str, size: u64, extension: &str, content: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            repo_id: repo_id.to_string(),
            path: path.to_string(),
            kind: NodeKind::File,
            size,
            extension: extension.to_string(),
            content,
            created_at: Utc::now(),
        }
    }

    /// File name component of the path.
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// A stored embedding plus its preview text and origin coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub repo_id: String,
    /// `None` only for the `REPO_METADATA` record.
    pub file_id: Option<String>,
    pub path: String,
    pub chunk_index: i64,
    pub vector: Vec<f32>,
    pub preview: String,
    /// SHA-256 of the embedded text.
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

impl VectorRecord {
    pub fn is_metadata(&self) -> bool {
        self.file_id.is_none() && self.path == REPO_METADATA_PATH
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Complexity {
    Low,
    #[default]
    Medium,
    High,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }

    /// Exact match on the three labels; anything else is `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Low" => Some(Self::Low),
            "Medium" => Some(Self::Medium),
            "High" => Some(Self::High),
            _ => None,
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The parsed fields of an AI summary, before it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryFields {
    pub summary: String,
    pub architecture: String,
    pub complexity: Complexity,
    pub potential_issues: Vec<String>,
}

/// Stored AI summary; one per repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub id: String,
    pub repo_id: String,
    pub summary: String,
    pub architecture: String,
    pub complexity: Complexity,
    pub potential_issues: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Summary {
    pub fn from_fields(repo_id: &str, fields: SummaryFields) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            repo_id: repo_id.to_string(),
            summary: fields.summary,
            architecture: fields.architecture,
            complexity: fields.complexity,
            potential_issues: fields.potential_issues,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, content: &str) -> Self {
        Self {
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// Chat history for a repository (one session per repository).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub repo_id: String,
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
}

/// Intent label of a chat question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Greeting,
    Acknowledgement,
    Query,
}

impl Intent {
    /// Parse a classifier label. Anything unrecognised is a `Query`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_uppercase().as_str() {
            "GREETING" => Self::Greeting,
            "ACKNOWLEDGEMENT" => Self::Acknowledgement,
            _ => Self::Query,
        }
    }
}

/// One ranked retrieval result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalHit {
    pub path: String,
    pub chunk_index: i64,
    pub preview: String,
    pub score: f32,
}

/// Result of one chat turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatAnswer {
    pub answer: String,
    pub sources: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("main.rs"), ".rs");
        assert_eq!(extension_of("archive.tar.gz"), ".gz");
        assert_eq!(extension_of("Makefile"), "");
        assert_eq!(extension_of(".gitignore"), ".gitignore");
    }

    #[test]
    fn test_tree_node_serializes_with_type_tag() {
        let tree = TreeNode::Dir {
            name: "root".into(),
            path: String::new(),
            children: vec![TreeNode::file("README.md", "README.md", 10)],
        };
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["type"], "dir");
        assert_eq!(json["children"][0]["type"], "file");
        assert_eq!(json["children"][0]["extension"], ".md");
        assert_eq!(tree.file_count(), 1);
    }

    #[test]
    fn test_status_round_trip_through_str() {
        for s in [
            PipelineStatus::Pending,
            PipelineStatus::Processing,
            PipelineStatus::Ready,
            PipelineStatus::Failed,
        ] {
            assert_eq!(s.as_str().parse::<PipelineStatus>().unwrap(), s);
        }
        assert!("stuck".parse::<PipelineStatus>().is_err());
    }

    #[test]
    fn test_intent_labels_are_permissive() {
        assert_eq!(Intent::from_label("greeting\n"), Intent::Greeting);
        assert_eq!(Intent::from_label("ACKNOWLEDGEMENT"), Intent::Acknowledgement);
        assert_eq!(Intent::from_label("QUERY"), Intent::Query);
        assert_eq!(Intent::from_label("I think GREETING"), Intent::Query);
    }

    #[test]
    fn test_metadata_text_lists_fields() {
        let meta = RepoMetadata {
            name: "demo".into(),
            stars: 3,
            contributors: vec!["a".into(), "b".into()],
            languages: vec!["Rust".into()],
            commit_count: 42,
            ..Default::default()
        };
        let repo = Repository::new("https://github.com/o/demo", "u1", "o", meta);
        let text = repo.metadata_text();
        assert!(text.contains("Repository name: demo"));
        assert!(text.contains("No description provided"));
        assert!(text.contains("Contributors: a, b"));
        assert!(text.contains("Total commits: 42"));
    }
}
