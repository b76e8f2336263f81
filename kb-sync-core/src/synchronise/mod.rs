//! Reconciliation of a knowledge base against a repository.
//!
//! Two entrypoints share the helpers in this module:
//!   - [`full::full_sync`] reconciles every eligible file of a branch against
//!     the full document listing of the knowledge base, optionally deleting
//!     leftovers;
//!   - [`incremental::incremental_sync`] reconciles only the files touched by
//!     one commit.
//!
//! # Error Handling
//! Failures of a single file are logged and counted in the returned report;
//! they never abort a run. Only the calls a run cannot proceed without (the
//! branch listing, the document listing when cleanup is enabled, the commit
//! diff) return [`SyncError`].
//!
//! All remote calls are awaited one after another, in listing or diff order.

pub mod full;
pub mod incremental;

pub use full::{eligible_files, full_sync, FullSyncReport};
pub use incremental::{
    incremental_sync, CategoryReport, ChangeSet, DeleteOutcome, IncrementalSyncReport,
};

use tracing::{info, warn};

use crate::contract::{
    find_document_by_name, AdapterError, KbDocument, KnowledgeBase, Lookup, NormalizedDocument,
    RepositorySource, SourceFile,
};
use crate::preprocess::prepare_document;

/// Run-level failure: nothing could be reconciled.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("failed to list files at `{reference}`: {source}")]
    ListFiles {
        reference: String,
        #[source]
        source: AdapterError,
    },

    #[error("failed to list knowledge base documents: {0}")]
    ListDocuments(#[source] AdapterError),

    #[error("failed to fetch diff of commit `{commit}`: {source}")]
    CommitDiff {
        commit: String,
        #[source]
        source: AdapterError,
    },
}

/// What a write did to the knowledge base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteAction {
    Created(KbDocument),
    Updated(KbDocument),
}

impl WriteAction {
    pub fn document(&self) -> &KbDocument {
        match self {
            WriteAction::Created(doc) | WriteAction::Updated(doc) => doc,
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            WriteAction::Created(_) => "created",
            WriteAction::Updated(_) => "updated",
        }
    }
}

/// Fill the metadata field cache once before a run. A failure only means the
/// cache fills lazily on the first metadata write.
pub(crate) async fn prewarm<K>(kb: &K)
where
    K: KnowledgeBase + ?Sized,
{
    match kb.prewarm_metadata_fields().await {
        Ok(()) => info!("[SYNC] Metadata field map preloaded"),
        Err(e) => warn!(error = %e, "[SYNC] Failed to preload metadata field map"),
    }
}

/// Read `path` at `reference` and turn it into a document.
pub(crate) async fn fetch_document<S>(
    source: &S,
    project: &str,
    path: &str,
    reference: &str,
    enable_metadata: bool,
) -> Result<NormalizedDocument, AdapterError>
where
    S: RepositorySource + ?Sized,
{
    let content = source.read_file(project, path, reference).await?;
    let file = SourceFile {
        path: path.to_string(),
        content,
        reference: reference.to_string(),
    };
    Ok(prepare_document(&file, enable_metadata))
}

/// Update the document carrying `doc`'s canonical name, or create it.
pub async fn upsert_by_name<K>(kb: &K, doc: &NormalizedDocument) -> Result<WriteAction, AdapterError>
where
    K: KnowledgeBase + ?Sized,
{
    match find_document_by_name(kb, &doc.canonical_name).await {
        Lookup::Found(existing) => kb
            .update_document(&existing.id, doc)
            .await
            .map(WriteAction::Updated),
        Lookup::NotFound => kb.create_document(doc).await.map(WriteAction::Created),
        Lookup::TransportError(e) => Err(e),
    }
}
