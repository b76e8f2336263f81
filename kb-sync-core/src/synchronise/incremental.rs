//! Incremental reconciliation driven by a single commit.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, error, info};

use super::{fetch_document, prewarm, upsert_by_name, SyncError, WriteAction};
use crate::config::SyncConfig;
use crate::contract::{
    find_document_by_name, AdapterError, FileDiff, KnowledgeBase, Lookup, RepositorySource,
};
use crate::normalize::{canonical_name, is_eligible};

/// Files of one commit, grouped by what has to happen to their documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub added: Vec<String>,
    pub modified: Vec<String>,
    /// Old paths whose documents should disappear.
    pub deleted: Vec<String>,
}

impl ChangeSet {
    /// Sort the entries of a commit diff into added, modified and deleted
    /// paths. Each side of a rename is checked for eligibility on its own.
    ///
    /// A deletion whose canonical name is written again by the same commit is
    /// dropped, so a rename that keeps the name becomes an in-place update.
    /// A rename with both sides eligible therefore yields one deletion and
    /// one addition only when the canonical name changes.
    pub fn classify<S: AsRef<str>>(diffs: &[FileDiff], extensions: &[S]) -> Self {
        let mut changes = ChangeSet::default();
        let eligible = |path: &str| is_eligible(path, extensions);

        for diff in diffs {
            if diff.deleted_file {
                if eligible(diff.old_path.as_str()) {
                    changes.deleted.push(diff.old_path.clone());
                }
            } else if diff.new_file {
                if eligible(diff.new_path.as_str()) {
                    changes.added.push(diff.new_path.clone());
                }
            } else if diff.renamed_file {
                if eligible(diff.old_path.as_str()) {
                    changes.deleted.push(diff.old_path.clone());
                }
                if eligible(diff.new_path.as_str()) {
                    changes.added.push(diff.new_path.clone());
                }
            } else if eligible(diff.new_path.as_str()) {
                changes.modified.push(diff.new_path.clone());
            }
        }

        let rewritten: HashSet<String> = changes
            .added
            .iter()
            .chain(&changes.modified)
            .map(|path| canonical_name(path))
            .collect();
        changes.deleted.retain(|path| {
            let keep = !rewritten.contains(&canonical_name(path));
            if !keep {
                debug!(path = %path, "[INCR] Deleted path is rewritten by the same commit, skipping deletion");
            }
            keep
        });

        changes
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }
}

/// Outcome counts of one change category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl CategoryReport {
    fn new(total: usize) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    fn record<T>(&mut self, result: &Result<T, AdapterError>) {
        match result {
            Ok(_) => self.succeeded += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Counts of an incremental sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IncrementalSyncReport {
    pub added: CategoryReport,
    pub modified: CategoryReport,
    pub deleted: CategoryReport,
}

/// What happened to the document of a deleted file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted { id: String },
    AlreadyAbsent,
}

/// Reconcile the files touched by `commit` with the knowledge base.
pub async fn incremental_sync<S, K>(
    source: &S,
    kb: &K,
    config: &SyncConfig,
    project: &str,
    commit: &str,
) -> Result<IncrementalSyncReport, SyncError>
where
    S: RepositorySource + ?Sized,
    K: KnowledgeBase + ?Sized,
{
    info!(project, commit, "[INCR] Starting incremental synchronisation");

    prewarm(kb).await;

    let diffs = source
        .diff(project, commit)
        .await
        .map_err(|e| SyncError::CommitDiff {
            commit: commit.to_string(),
            source: e,
        })?;
    let changes = ChangeSet::classify(&diffs, &config.allowed_extensions);
    info!(
        diff_entries = diffs.len(),
        added = changes.added.len(),
        modified = changes.modified.len(),
        deleted = changes.deleted.len(),
        "[INCR] Classified commit changes"
    );

    let mut report = IncrementalSyncReport {
        added: CategoryReport::new(changes.added.len()),
        modified: CategoryReport::new(changes.modified.len()),
        deleted: CategoryReport::new(changes.deleted.len()),
    };

    for path in &changes.added {
        let result = write_file(source, kb, config, project, commit, path).await;
        log_write("added", path, &result);
        report.added.record(&result);
    }

    for path in &changes.modified {
        let result = write_file(source, kb, config, project, commit, path).await;
        log_write("modified", path, &result);
        report.modified.record(&result);
    }

    for path in &changes.deleted {
        let result = delete_file(kb, path).await;
        match &result {
            Ok(DeleteOutcome::Deleted { id }) => {
                info!(path = %path, id = %id, "[INCR] Deleted document")
            }
            Ok(DeleteOutcome::AlreadyAbsent) => {
                info!(path = %path, "[INCR] No document for deleted file, nothing to do")
            }
            Err(e) => error!(path = %path, error = %e, "[INCR][ERROR] Failed to delete document"),
        }
        report.deleted.record(&result);
    }

    info!(?report, "[INCR] Incremental synchronisation finished");
    Ok(report)
}

/// Fetch `path` at the commit and upsert its document by canonical name.
async fn write_file<S, K>(
    source: &S,
    kb: &K,
    config: &SyncConfig,
    project: &str,
    commit: &str,
    path: &str,
) -> Result<WriteAction, AdapterError>
where
    S: RepositorySource + ?Sized,
    K: KnowledgeBase + ?Sized,
{
    let doc = fetch_document(source, project, path, commit, config.enable_metadata).await?;
    upsert_by_name(kb, &doc).await
}

async fn delete_file<K>(kb: &K, path: &str) -> Result<DeleteOutcome, AdapterError>
where
    K: KnowledgeBase + ?Sized,
{
    let name = canonical_name(path);
    match find_document_by_name(kb, &name).await {
        Lookup::Found(doc) => {
            kb.delete_document(&doc.id).await?;
            Ok(DeleteOutcome::Deleted { id: doc.id })
        }
        Lookup::NotFound => Ok(DeleteOutcome::AlreadyAbsent),
        Lookup::TransportError(e) => Err(e),
    }
}

fn log_write(category: &str, path: &str, result: &Result<WriteAction, AdapterError>) {
    match result {
        Ok(action) => {
            let doc = action.document();
            info!(category, path, name = %doc.name, id = %doc.id, action = action.verb(), "[INCR] Document synchronised");
        }
        Err(e) => error!(category, path, error = %e, "[INCR][ERROR] Failed to synchronise file"),
    }
}
