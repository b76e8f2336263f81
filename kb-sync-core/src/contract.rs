//! # contract: the two adapters the sync orchestrators talk to
//!
//! - [`RepositorySource`] reads a Git-hosted repository: tree listings, file
//!   contents at a ref, and per-commit diffs.
//! - [`KnowledgeBase`] writes to the knowledge base: documents by id, lookups
//!   by name, and per-document metadata against a cached field map.
//!
//! ## Interface
//! - All methods are async and return [`AdapterError`], a boxed error. The
//!   orchestrators never branch on transport details, they only log and count.
//! - [`find_document_by_name`] builds an exact-name lookup on top of
//!   [`KnowledgeBase::search_documents`], which may match loosely.
//! - The wire types ([`RepoTreeEntry`], [`FileDiff`], [`KbDocument`]) deserialize
//!   straight from the GitLab and Dify JSON payloads.
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall`. `MockRepositorySource` and
//!   `MockKnowledgeBase` are exported with the `test-export-mocks` feature
//!   (on by default) so the CLI crate's tests can use them too.
//!
//! ## Adding a Source or Knowledge Base
//! - Implement the trait in the binary crate, next to the GitLab and Dify
//!   clients in `kb-sync`.
//! - Map "already gone" responses on deletion to `Ok(())`; the orchestrators
//!   count a deletion of a missing document as a success.
//! - Keep metadata writes tolerant: keys the target does not define are
//!   reported in [`MetadataOutcome::skipped`], not turned into errors.

use async_trait::async_trait;
#[allow(unused_imports)]
use mockall::{automock, predicate::*};
use serde::{Deserialize, Serialize};

use crate::metadata::{DocMetadata, MetadataFieldMap};

/// Error returned by adapter calls.
pub type AdapterError = Box<dyn std::error::Error + Send + Sync>;

/// One entry of a recursive repository tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoTreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub entry_type: String,
}

impl RepoTreeEntry {
    pub fn blob(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            entry_type: "blob".to_string(),
        }
    }

    pub fn tree(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            entry_type: "tree".to_string(),
        }
    }

    pub fn is_blob(&self) -> bool {
        self.entry_type == "blob"
    }
}

/// One file of a commit diff.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiff {
    pub old_path: String,
    pub new_path: String,
    #[serde(default)]
    pub new_file: bool,
    #[serde(default)]
    pub deleted_file: bool,
    #[serde(default)]
    pub renamed_file: bool,
}

/// A file read from the repository at a given ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
    pub reference: String,
}

/// A document ready to be written to the knowledge base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedDocument {
    pub canonical_name: String,
    pub metadata: DocMetadata,
    pub body: String,
}

/// A document as the knowledge base reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KbDocument {
    pub id: String,
    pub name: String,
}

/// Outcome of writing metadata to one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataOutcome {
    pub applied: usize,
    pub skipped: Vec<String>,
}

/// Result of looking a document up by name.
#[derive(Debug)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    TransportError(AdapterError),
}

/// Read access to a Git-hosted repository.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait RepositorySource: Send + Sync {
    /// Every entry of the tree at `reference`, directories included.
    async fn list_files(
        &self,
        project: &str,
        reference: &str,
    ) -> Result<Vec<RepoTreeEntry>, AdapterError>;

    /// Decoded text of `path` at `reference`.
    async fn read_file(
        &self,
        project: &str,
        path: &str,
        reference: &str,
    ) -> Result<String, AdapterError>;

    /// Per-file changes introduced by `commit`.
    async fn diff(&self, project: &str, commit: &str) -> Result<Vec<FileDiff>, AdapterError>;
}

/// Document store of the knowledge base.
///
/// Implementors own the metadata field cache: it starts empty, fills on the
/// first call that needs it (or on [`KnowledgeBase::prewarm_metadata_fields`])
/// and is not refreshed for the lifetime of the instance.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    /// Fill the metadata field cache ahead of a run.
    async fn prewarm_metadata_fields(&self) -> Result<(), AdapterError>;

    /// The cached field map, fetched on first use.
    async fn metadata_fields(&self) -> Result<MetadataFieldMap, AdapterError>;

    /// Create a document and attach its metadata.
    async fn create_document(&self, doc: &NormalizedDocument) -> Result<KbDocument, AdapterError>;

    /// Replace content and metadata of document `id`. The returned document
    /// may carry a new id when the implementation had to recreate it.
    async fn update_document(
        &self,
        id: &str,
        doc: &NormalizedDocument,
    ) -> Result<KbDocument, AdapterError>;

    /// Delete document `id`. A document that is already gone is not an error.
    async fn delete_document(&self, id: &str) -> Result<(), AdapterError>;

    /// Every document currently in the knowledge base.
    async fn list_documents(&self) -> Result<Vec<KbDocument>, AdapterError>;

    /// Documents whose name matches `keyword` (substring search).
    async fn search_documents(&self, keyword: &str) -> Result<Vec<KbDocument>, AdapterError>;

    /// Write `metadata` to document `id`. Keys the knowledge base does not
    /// define are skipped rather than rejected.
    async fn set_metadata(
        &self,
        id: &str,
        metadata: &DocMetadata,
    ) -> Result<MetadataOutcome, AdapterError>;
}

/// Find the document named exactly `name`.
pub async fn find_document_by_name<K>(kb: &K, name: &str) -> Lookup<KbDocument>
where
    K: KnowledgeBase + ?Sized,
{
    match kb.search_documents(name).await {
        Ok(docs) => docs
            .into_iter()
            .find(|doc| doc.name == name)
            .map_or(Lookup::NotFound, Lookup::Found),
        Err(e) => Lookup::TransportError(e),
    }
}
