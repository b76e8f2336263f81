//! GitLab REST v4 implementation of [`RepositorySource`].

use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

use kb_sync_core::contract::{AdapterError, FileDiff, RepoTreeEntry, RepositorySource};

use crate::error::ApiError;
use crate::http::{HttpClient, HttpSettings};

const SERVICE: &str = "GitLab";
const NEXT_PAGE_HEADER: &str = "x-next-page";

/// Connection details of the GitLab instance.
#[derive(Debug, Clone)]
pub struct GitLabSettings {
    pub host: String,
    pub private_token: String,
    pub page_size: u32,
}

pub struct GitLabClient {
    http: HttpClient,
    host: String,
    page_size: u32,
}

#[derive(Debug, Deserialize)]
struct FileResponse {
    content: String,
    #[serde(default)]
    encoding: String,
}

impl GitLabClient {
    pub fn new(settings: &GitLabSettings, http: &HttpSettings) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        let mut token = HeaderValue::from_str(&settings.private_token)
            .map_err(|e| anyhow::anyhow!("GitLab private token is not a valid header value: {e}"))?;
        token.set_sensitive(true);
        headers.insert("PRIVATE-TOKEN", token);

        let client = Self {
            http: HttpClient::new(SERVICE, http, headers)?,
            host: settings.host.trim_end_matches('/').to_string(),
            page_size: settings.page_size.max(1),
        };
        info!(host = %client.host, page_size = client.page_size, "Initialised GitLab client");
        Ok(client)
    }

    fn project_url(&self, project: &str) -> String {
        format!(
            "{}/api/v4/projects/{}",
            self.host,
            urlencoding::encode(project)
        )
    }

    /// Collect every page of a list endpoint.
    ///
    /// Stops on an empty page or an empty `x-next-page` header. Without the
    /// header, a short page is taken as the last one.
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, ApiError> {
        let per_page = self.page_size.to_string();
        let mut items = Vec::new();
        let mut page: u32 = 1;

        loop {
            let page_param = page.to_string();
            let (headers, batch): (_, Vec<T>) = self
                .http
                .execute_json_with_headers(Method::GET, url, |req| {
                    req.query(query)
                        .query(&[("per_page", per_page.as_str()), ("page", page_param.as_str())])
                })
                .await?;
            let next_page = headers
                .get(NEXT_PAGE_HEADER)
                .map(|v| v.to_str().unwrap_or_default().trim().to_string());

            let batch_len = batch.len();
            debug!(url, page, items = batch_len, "Fetched GitLab page");
            if batch.is_empty() {
                break;
            }
            items.extend(batch);

            match next_page {
                Some(next) if next.is_empty() => break,
                Some(next) => match next.parse::<u32>() {
                    Ok(n) if n > page => page = n,
                    _ => break,
                },
                None if batch_len < self.page_size as usize => break,
                None => page += 1,
            }
        }
        Ok(items)
    }
}

/// Decode the `content` of a file response into text.
fn decode_content(file: FileResponse) -> Result<String, ApiError> {
    if !file.encoding.is_empty() && file.encoding != "base64" {
        return Ok(file.content);
    }
    let compact: String = file.content.split_whitespace().collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| ApiError::decode(SERVICE, format!("file content is not valid base64: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| ApiError::decode(SERVICE, format!("file content is not UTF-8: {e}")))
}

#[async_trait]
impl RepositorySource for GitLabClient {
    async fn list_files(
        &self,
        project: &str,
        reference: &str,
    ) -> Result<Vec<RepoTreeEntry>, AdapterError> {
        let url = format!("{}/repository/tree", self.project_url(project));
        let entries: Vec<RepoTreeEntry> = self
            .get_all_pages(&url, &[("recursive", "true"), ("ref", reference)])
            .await?;
        info!(project, reference, entries = entries.len(), "Listed repository tree");
        Ok(entries)
    }

    async fn read_file(
        &self,
        project: &str,
        path: &str,
        reference: &str,
    ) -> Result<String, AdapterError> {
        let url = format!(
            "{}/repository/files/{}",
            self.project_url(project),
            urlencoding::encode(path)
        );
        let file: FileResponse = self
            .http
            .execute_json(Method::GET, &url, |req| req.query(&[("ref", reference)]))
            .await?;
        let content = decode_content(file)?;
        debug!(project, path, reference, bytes = content.len(), "Read repository file");
        Ok(content)
    }

    async fn diff(&self, project: &str, commit: &str) -> Result<Vec<FileDiff>, AdapterError> {
        let url = format!(
            "{}/repository/commits/{}/diff",
            self.project_url(project),
            urlencoding::encode(commit)
        );
        let diffs: Vec<FileDiff> = self.get_all_pages(&url, &[]).await?;
        info!(project, commit, files = diffs.len(), "Fetched commit diff");
        Ok(diffs)
    }
}
