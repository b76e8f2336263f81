//! Dify dataset API implementation of [`KnowledgeBase`].
//!
//! Documents are created and updated from text; metadata is written in a
//! separate call against the dataset's field map, fetched once per client.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use kb_sync_core::contract::{
    AdapterError, KbDocument, KnowledgeBase, MetadataOutcome, NormalizedDocument,
};
use kb_sync_core::metadata::{DocMetadata, MetadataFieldMap};

use crate::error::ApiError;
use crate::http::{HttpClient, HttpSettings};

const SERVICE: &str = "Dify";

/// Connection and indexing settings of the target dataset.
#[derive(Debug, Clone)]
pub struct DifySettings {
    pub host: String,
    pub api_key: String,
    pub knowledge_base_id: String,
    pub indexing_technique: String,
    pub process_rule: Value,
    pub page_size: u32,
}

/// Segmentation used when the config does not set `dify.process_rule`.
pub fn default_process_rule() -> Value {
    json!({
        "mode": "automatic",
        "rules": {
            "pre_processing_rules": [
                {"id": "remove_extra_spaces", "enabled": true},
                {"id": "remove_urls_emails", "enabled": false}
            ],
            "segmentation": {
                "separator": "\n",
                "max_tokens": 800
            }
        }
    })
}

pub struct DifyClient {
    http: HttpClient,
    dataset_url: String,
    indexing_technique: String,
    process_rule: Value,
    page_size: u32,
    fields: OnceCell<MetadataFieldMap>,
}

#[derive(Debug, Deserialize)]
struct MetadataField {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct MetadataFieldsResponse {
    #[serde(default)]
    doc_metadata: Vec<MetadataField>,
}

#[derive(Debug, Deserialize)]
struct DocumentResponse {
    document: KbDocument,
}

#[derive(Debug, Deserialize)]
struct DocumentPage {
    #[serde(default)]
    data: Vec<KbDocument>,
    #[serde(default)]
    has_more: bool,
}

impl DifyClient {
    pub fn new(settings: &DifySettings, http: &HttpSettings) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", settings.api_key))
            .map_err(|e| anyhow::anyhow!("Dify API key is not a valid header value: {e}"))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);

        let dataset_url = format!(
            "{}/v1/datasets/{}",
            settings.host.trim_end_matches('/'),
            urlencoding::encode(&settings.knowledge_base_id)
        );
        info!(
            dataset_url = %dataset_url,
            indexing_technique = %settings.indexing_technique,
            "Initialised Dify client"
        );
        Ok(Self {
            http: HttpClient::new(SERVICE, http, headers)?,
            dataset_url,
            indexing_technique: settings.indexing_technique.clone(),
            process_rule: settings.process_rule.clone(),
            page_size: settings.page_size.max(1),
            fields: OnceCell::new(),
        })
    }

    fn document_url(&self, id: &str) -> String {
        format!("{}/documents/{}", self.dataset_url, urlencoding::encode(id))
    }

    fn text_payload(&self, doc: &NormalizedDocument) -> Value {
        json!({
            "name": doc.canonical_name,
            "text": doc.body,
            "indexing_technique": self.indexing_technique,
            "process_rule": self.process_rule,
        })
    }

    async fn fetch_fields(&self) -> Result<MetadataFieldMap, ApiError> {
        let url = format!("{}/metadata", self.dataset_url);
        let body: MetadataFieldsResponse =
            self.http.execute_json(Method::GET, &url, |req| req).await?;
        let fields =
            MetadataFieldMap::from_fields(body.doc_metadata.into_iter().map(|f| (f.name, f.id)));
        info!(fields = fields.len(), "Fetched dataset metadata fields");
        Ok(fields)
    }

    /// Every document page for `keyword` (or all documents).
    async fn documents(&self, keyword: Option<&str>) -> Result<Vec<KbDocument>, ApiError> {
        let url = format!("{}/documents", self.dataset_url);
        let limit = self.page_size.to_string();
        let mut documents = Vec::new();
        let mut page: u32 = 1;

        loop {
            let page_param = page.to_string();
            let batch: DocumentPage = self
                .http
                .execute_json(Method::GET, &url, |req| {
                    let req = req.query(&[("page", page_param.as_str()), ("limit", limit.as_str())]);
                    match keyword {
                        Some(k) => req.query(&[("keyword", k)]),
                        None => req,
                    }
                })
                .await?;
            debug!(page, documents = batch.data.len(), has_more = batch.has_more, "Fetched document page");
            let done = !batch.has_more || batch.data.is_empty();
            documents.extend(batch.data);
            if done {
                break;
            }
            page += 1;
        }
        Ok(documents)
    }

    /// Metadata write after a create or update; failures only warn.
    async fn attach_metadata(&self, id: &str, metadata: &DocMetadata) {
        match self.set_metadata(id, metadata).await {
            Ok(outcome) => debug!(id, applied = outcome.applied, skipped = ?outcome.skipped, "Attached metadata"),
            Err(e) => warn!(id, error = %e, "Failed to attach metadata, document kept without it"),
        }
    }

    async fn create(&self, doc: &NormalizedDocument) -> Result<KbDocument, ApiError> {
        let url = format!("{}/document/create_by_text", self.dataset_url);
        let payload = self.text_payload(doc);
        let created: DocumentResponse = self
            .http
            .execute_json(Method::POST, &url, |req| req.json(&payload))
            .await?;
        info!(id = %created.document.id, name = %created.document.name, "Created document");
        Ok(created.document)
    }

    async fn update(&self, id: &str, doc: &NormalizedDocument) -> Result<KbDocument, ApiError> {
        let url = format!("{}/update-by-text", self.document_url(id));
        let payload = self.text_payload(doc);
        let updated: DocumentResponse = self
            .http
            .execute_json(Method::POST, &url, |req| req.json(&payload))
            .await?;
        info!(id = %updated.document.id, name = %updated.document.name, "Updated document");
        Ok(updated.document)
    }
}

#[async_trait]
impl KnowledgeBase for DifyClient {
    async fn prewarm_metadata_fields(&self) -> Result<(), AdapterError> {
        self.metadata_fields().await.map(|_| ())
    }

    async fn metadata_fields(&self) -> Result<MetadataFieldMap, AdapterError> {
        let fields = self
            .fields
            .get_or_try_init(|| self.fetch_fields())
            .await?;
        Ok(fields.clone())
    }

    async fn create_document(&self, doc: &NormalizedDocument) -> Result<KbDocument, AdapterError> {
        let created = self.create(doc).await?;
        self.attach_metadata(&created.id, &doc.metadata).await;
        Ok(created)
    }

    async fn update_document(
        &self,
        id: &str,
        doc: &NormalizedDocument,
    ) -> Result<KbDocument, AdapterError> {
        match self.update(id, doc).await {
            Ok(updated) => {
                self.attach_metadata(&updated.id, &doc.metadata).await;
                Ok(updated)
            }
            Err(e) => {
                warn!(id, name = %doc.canonical_name, error = %e, "Update failed, recreating document");
                self.delete_document(id).await?;
                self.create_document(doc).await
            }
        }
    }

    async fn delete_document(&self, id: &str) -> Result<(), AdapterError> {
        match self
            .http
            .execute(Method::DELETE, &self.document_url(id), |req| req)
            .await
        {
            Ok(_) => {
                info!(id, "Deleted document");
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                debug!(id, "Document already gone");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_documents(&self) -> Result<Vec<KbDocument>, AdapterError> {
        Ok(self.documents(None).await?)
    }

    async fn search_documents(&self, keyword: &str) -> Result<Vec<KbDocument>, AdapterError> {
        Ok(self.documents(Some(keyword)).await?)
    }

    async fn set_metadata(
        &self,
        id: &str,
        metadata: &DocMetadata,
    ) -> Result<MetadataOutcome, AdapterError> {
        let fields = self.metadata_fields().await?;
        let resolved = fields.resolve(metadata);
        for key in &resolved.skipped {
            debug!(id, key = %key, "Skipping metadata key not defined on the dataset");
        }
        if resolved.values.is_empty() {
            info!(id, "No defined metadata fields to write");
            return Ok(MetadataOutcome {
                applied: 0,
                skipped: resolved.skipped,
            });
        }

        let applied = resolved.values.len();
        let url = format!("{}/documents/metadata", self.dataset_url);
        let payload = json!({
            "operation_data": [{
                "document_id": id,
                "metadata_list": resolved.values,
            }]
        });
        self.http
            .execute(Method::POST, &url, |req| req.json(&payload))
            .await?;
        debug!(id, applied, "Wrote document metadata");
        Ok(MetadataOutcome {
            applied,
            skipped: resolved.skipped,
        })
    }
}
