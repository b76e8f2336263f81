//! Full reconciliation of one branch.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::{fetch_document, prewarm, upsert_by_name, SyncError, WriteAction};
use crate::config::SyncConfig;
use crate::contract::{AdapterError, KbDocument, KnowledgeBase, RepoTreeEntry, RepositorySource};
use crate::normalize::is_eligible;

/// Counts of a full sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FullSyncReport {
    pub total_files: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub deleted: usize,
    pub delete_failed: usize,
}

/// Paths of the blobs in `entries` that should be mirrored, in listing order.
pub fn eligible_files<S: AsRef<str>>(entries: &[RepoTreeEntry], extensions: &[S]) -> Vec<String> {
    entries
        .iter()
        .filter(|entry| entry.is_blob() && is_eligible(&entry.path, extensions))
        .map(|entry| entry.path.clone())
        .collect()
}

/// Knowledge base names not yet matched to a repository file.
#[derive(Debug, Default)]
struct SeenSet {
    unmatched: BTreeMap<String, String>,
    /// Extra documents sharing a name with an earlier one.
    redundant: Vec<KbDocument>,
    /// Names written during this run, with the id they ended up with.
    written: HashMap<String, String>,
}

impl SeenSet {
    fn from_documents(documents: Vec<KbDocument>) -> Self {
        let mut seen = SeenSet::default();
        for doc in documents {
            if seen.unmatched.contains_key(&doc.name) {
                warn!(name = %doc.name, id = %doc.id, "[FULL] Duplicate document name in knowledge base");
                seen.redundant.push(doc);
            } else {
                seen.unmatched.insert(doc.name, doc.id);
            }
        }
        seen
    }

    /// Id to update for `name`, if the knowledge base already has it.
    fn claim(&mut self, name: &str) -> Option<String> {
        self.unmatched
            .remove(name)
            .or_else(|| self.written.get(name).cloned())
    }

    fn record_written(&mut self, name: &str, id: &str) {
        self.written.insert(name.to_string(), id.to_string());
    }

    fn into_leftovers(self) -> Vec<KbDocument> {
        self.unmatched
            .into_iter()
            .map(|(name, id)| KbDocument { id, name })
            .chain(self.redundant)
            .collect()
    }
}

/// Reconcile every eligible file of `branch` with the knowledge base.
///
/// Existing documents (matched by canonical name) are updated, missing ones
/// created. With `cleanup_deleted`, documents that no file produced are
/// deleted afterwards, and a failed document listing aborts the run; without
/// it, a failed listing only switches matching to a search per file.
pub async fn full_sync<S, K>(
    source: &S,
    kb: &K,
    config: &SyncConfig,
    project: &str,
    branch: &str,
) -> Result<FullSyncReport, SyncError>
where
    S: RepositorySource + ?Sized,
    K: KnowledgeBase + ?Sized,
{
    info!(project, branch, "[FULL] Starting full synchronisation");

    prewarm(kb).await;

    let entries = source
        .list_files(project, branch)
        .await
        .map_err(|e| SyncError::ListFiles {
            reference: branch.to_string(),
            source: e,
        })?;
    let files = eligible_files(&entries, &config.allowed_extensions);
    info!(
        listed = entries.len(),
        eligible = files.len(),
        "[FULL] Selected documentation files"
    );

    // Only cleanup needs the complete listing.
    let mut seen = match kb.list_documents().await {
        Ok(existing) => {
            info!(documents = existing.len(), "[FULL] Fetched knowledge base documents");
            Some(SeenSet::from_documents(existing))
        }
        Err(e) if config.cleanup_deleted => return Err(SyncError::ListDocuments(e)),
        Err(e) => {
            warn!(error = %e, "[FULL] Failed to list knowledge base documents, looking up each file by name");
            None
        }
    };

    let mut report = FullSyncReport {
        total_files: files.len(),
        ..FullSyncReport::default()
    };

    for path in &files {
        report.processed += 1;
        match sync_file(source, kb, config, project, branch, path, &mut seen).await {
            Ok(action) => {
                report.succeeded += 1;
                let doc = action.document();
                info!(path = %path, name = %doc.name, id = %doc.id, action = action.verb(), "[FULL] Document synchronised");
            }
            Err(e) => {
                report.failed += 1;
                error!(path = %path, error = %e, "[FULL][ERROR] Failed to synchronise file");
            }
        }
    }

    let leftovers = seen.map(SeenSet::into_leftovers).unwrap_or_default();
    if config.cleanup_deleted {
        for doc in leftovers {
            match kb.delete_document(&doc.id).await {
                Ok(()) => {
                    report.deleted += 1;
                    info!(name = %doc.name, id = %doc.id, "[FULL] Deleted stale document");
                }
                Err(e) => {
                    report.delete_failed += 1;
                    error!(name = %doc.name, id = %doc.id, error = %e, "[FULL][ERROR] Failed to delete stale document");
                }
            }
        }
    } else if !leftovers.is_empty() {
        debug!(count = leftovers.len(), "[FULL] Cleanup disabled, keeping unmatched documents");
    }

    info!(?report, "[FULL] Full synchronisation finished");
    Ok(report)
}

async fn sync_file<S, K>(
    source: &S,
    kb: &K,
    config: &SyncConfig,
    project: &str,
    branch: &str,
    path: &str,
    seen: &mut Option<SeenSet>,
) -> Result<WriteAction, AdapterError>
where
    S: RepositorySource + ?Sized,
    K: KnowledgeBase + ?Sized,
{
    let doc = fetch_document(source, project, path, branch, config.enable_metadata).await?;

    let Some(seen) = seen else {
        return upsert_by_name(kb, &doc).await;
    };
    let action = match seen.claim(&doc.canonical_name) {
        Some(id) => WriteAction::Updated(kb.update_document(&id, &doc).await?),
        None => WriteAction::Created(kb.create_document(&doc).await?),
    };
    seen.record_written(&doc.canonical_name, &action.document().id);
    Ok(action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eligible_files_skips_trees_and_foreign_paths() {
        let entries = vec![
            RepoTreeEntry::tree("docs/ciam"),
            RepoTreeEntry::blob("docs/ciam/intro.md"),
            RepoTreeEntry::blob("docs/ciam/img.png"),
            RepoTreeEntry::blob("src/pages/index.md"),
            RepoTreeEntry::blob("i18n/en/docusaurus-plugin-content-docs-ciam/current/intro.md"),
        ];
        assert_eq!(
            eligible_files(&entries, &[".md"]),
            vec![
                "docs/ciam/intro.md".to_string(),
                "i18n/en/docusaurus-plugin-content-docs-ciam/current/intro.md".to_string(),
            ]
        );
    }

    #[test]
    fn seen_set_queues_duplicate_names_for_cleanup() {
        let mut seen = SeenSet::from_documents(vec![
            KbDocument { id: "1".into(), name: "a".into() },
            KbDocument { id: "2".into(), name: "a".into() },
            KbDocument { id: "3".into(), name: "b".into() },
        ]);
        assert_eq!(seen.claim("a"), Some("1".to_string()));
        let leftovers = seen.into_leftovers();
        assert_eq!(
            leftovers,
            vec![
                KbDocument { id: "3".into(), name: "b".into() },
                KbDocument { id: "2".into(), name: "a".into() },
            ]
        );
    }

    #[test]
    fn names_written_in_this_run_are_claimed_again() {
        let mut seen = SeenSet::default();
        assert_eq!(seen.claim("x"), None);
        seen.record_written("x", "new-id");
        assert_eq!(seen.claim("x"), Some("new-id".to_string()));
    }
}
