//! # kb-sync CLI
//!
//! Command parsing and wiring for the `kb-sync` binary: loads the config,
//! builds the GitLab and Dify clients and hands them to the orchestrators in
//! [`kb_sync_core::synchronise`]. No reconciliation logic lives here.
//!
//! ## Features
//! - `full` mirrors every eligible file of a branch, optionally deleting
//!   knowledge base documents that no file produces any more.
//! - `incremental` applies the changes of a single commit: additions,
//!   modifications, renames and deletions.
//! - The run report is printed as pretty JSON on stdout
//!   (`{"mode": ..., "report": ...}`); logs go to stderr.
//!
//! ## How To Use
//! ```text
//! kb-sync --config sync_config.yaml full --project-id group/docs --branch main
//! kb-sync incremental --project-id 42 --commit-sha 1a2b3c4d
//! ```
//! Secrets can come from the environment instead of the config file
//! (`GITLAB_PRIVATE_TOKEN`, `DIFY_API_KEY`, `DIFY_KNOWLEDGE_BASE_ID`, also read
//! from a `.env` file).
//!
//! ## Exit Status
//! Non-zero for configuration errors and for failures that stop a whole run.
//! Failures of single files only show up in the report.
//!
//! [`run`] is the async entrypoint used by `main` and by the integration
//! tests.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kb_sync_core::synchronise::{full_sync, incremental_sync};
use serde::Serialize;

use crate::dify::DifyClient;
use crate::gitlab::GitLabClient;
use crate::load_config::load_config;

/// Mirror Docusaurus documentation from GitLab into a Dify knowledge base.
#[derive(Debug, Parser)]
#[clap(name = "kb-sync", version, about)]
pub struct Cli {
    /// Path to the YAML config file
    #[clap(long, global = true, default_value = "sync_config.yaml")]
    pub config: PathBuf,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Synchronise every documentation file of a branch
    Full {
        /// GitLab project id or full path
        #[clap(long)]
        project_id: String,
        #[clap(long, default_value = "main")]
        branch: String,
    },
    /// Synchronise the files changed by one commit
    Incremental {
        /// GitLab project id or full path
        #[clap(long)]
        project_id: String,
        #[clap(long)]
        commit_sha: String,
    },
}

pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    let config = load_config(&cli.config)?;
    let http = config.http_settings();
    let source = GitLabClient::new(&config.gitlab_settings(), &http)?;
    let kb = DifyClient::new(&config.dify_settings(), &http)?;
    let sync_config = config.sync_config();

    match cli.command {
        Commands::Full { project_id, branch } => {
            tracing::info!(command = "full", project_id = %project_id, branch = %branch, "Starting synchronisation");
            let report = full_sync(&source, &kb, &sync_config, &project_id, &branch)
                .await
                .map_err(|e| {
                    tracing::error!(command = "full", error = %e, "Synchronisation failed");
                    e
                })?;
            tracing::info!(command = "full", ?report, "Synchronisation complete");
            print_report("full", &report)
        }
        Commands::Incremental {
            project_id,
            commit_sha,
        } => {
            tracing::info!(command = "incremental", project_id = %project_id, commit_sha = %commit_sha, "Starting synchronisation");
            let report = incremental_sync(&source, &kb, &sync_config, &project_id, &commit_sha)
                .await
                .map_err(|e| {
                    tracing::error!(command = "incremental", error = %e, "Synchronisation failed");
                    e
                })?;
            tracing::info!(command = "incremental", ?report, "Synchronisation complete");
            print_report("incremental", &report)
        }
    }
}

#[derive(Serialize)]
struct ReportOutput<'a, R> {
    mode: &'a str,
    report: &'a R,
}

fn print_report<R: Serialize>(mode: &str, report: &R) -> Result<()> {
    let rendered = serde_json::to_string_pretty(&ReportOutput { mode, report })
        .context("Failed to render sync report")?;
    println!("{rendered}");
    Ok(())
}
