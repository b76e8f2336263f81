//! Retrying HTTP client shared by the GitLab and Dify adapters.
//!
//! Every request is retried up to `max_retries` attempts with a fixed
//! `retry_interval` between them. 401, 403 and 404 fail on the first attempt;
//! a body that does not decode counts as a failed attempt.

use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use reqwest::header::HeaderMap;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::ApiError;

/// Transport settings taken from the `sync` section of the config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_interval: Duration,
    pub verify_ssl: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_retries: 3,
            retry_interval: Duration::from_secs(2),
            verify_ssl: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    service: &'static str,
    max_retries: u32,
    retry_interval: Duration,
}

impl HttpClient {
    /// `service` names the remote in logs and errors; `headers` are sent with
    /// every request.
    pub fn new(
        service: &'static str,
        settings: &HttpSettings,
        headers: HeaderMap,
    ) -> anyhow::Result<Self> {
        let inner = reqwest::Client::builder()
            .timeout(settings.timeout)
            .danger_accept_invalid_certs(!settings.verify_ssl)
            .default_headers(headers)
            .build()
            .with_context(|| format!("Failed to build HTTP client for {service}"))?;
        if !settings.verify_ssl {
            warn!(service, "TLS certificate verification is disabled");
        }
        Ok(Self {
            inner,
            service,
            max_retries: settings.max_retries.max(1),
            retry_interval: settings.retry_interval,
        })
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    /// Send `method url`, letting `configure` add query and body on every
    /// attempt. Returns the first successful response.
    pub async fn execute<F>(
        &self,
        method: Method,
        url: &str,
        configure: F,
    ) -> Result<Response, ApiError>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let configure = &configure;
        let method = &method;
        self.with_retries(method, url, || async move {
            self.send_once(method, url, configure).await
        })
        .await
    }

    /// Like [`HttpClient::execute`], but the JSON body is decoded as part of
    /// the attempt, so a malformed body is retried like any other transient
    /// failure.
    pub async fn execute_json<T, F>(
        &self,
        method: Method,
        url: &str,
        configure: F,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        self.execute_json_with_headers(method, url, configure)
            .await
            .map(|(_, body)| body)
    }

    /// [`HttpClient::execute_json`] that also hands back the response headers,
    /// for pagination.
    pub async fn execute_json_with_headers<T, F>(
        &self,
        method: Method,
        url: &str,
        configure: F,
    ) -> Result<(HeaderMap, T), ApiError>
    where
        T: DeserializeOwned,
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let configure = &configure;
        let method = &method;
        self.with_retries(method, url, || async move {
            let response = self.send_once(method, url, configure).await?;
            let headers = response.headers().clone();
            let body: T = self.json(response).await?;
            Ok::<_, ApiError>((headers, body))
        })
        .await
    }

    async fn with_retries<T, A, Fut>(
        &self,
        method: &Method,
        url: &str,
        mut attempt_once: A,
    ) -> Result<T, ApiError>
    where
        A: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut attempt = 1;
        loop {
            let err = match attempt_once().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if err.is_permanent() || attempt >= self.max_retries {
                debug!(service = self.service, %method, url, attempt, error = %err, "Giving up on request");
                return Err(err);
            }
            warn!(
                service = self.service,
                %method,
                url,
                attempt,
                max_retries = self.max_retries,
                error = %err,
                "Request failed, retrying"
            );
            tokio::time::sleep(self.retry_interval).await;
            attempt += 1;
        }
    }

    async fn send_once<F>(&self, method: &Method, url: &str, configure: &F) -> Result<Response, ApiError>
    where
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let request = configure(self.inner.request(method.clone(), url));
        match request.send().await {
            Ok(response) => self.check(url, response).await,
            Err(source) => Err(ApiError::Request {
                service: self.service,
                source,
            }),
        }
    }

    async fn json<T: DeserializeOwned>(&self, response: Response) -> Result<T, ApiError> {
        let url = response.url().to_string();
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::decode(self.service, format!("{url}: {e}")))
    }

    async fn check(&self, url: &str, response: Response) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let service = self.service;
        let url = url.to_string();
        Err(match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized { service, url },
            StatusCode::FORBIDDEN => ApiError::Forbidden { service, url },
            StatusCode::NOT_FOUND => ApiError::NotFound { service, url },
            _ => ApiError::Status {
                service,
                status,
                url,
                body: response.text().await.unwrap_or_default(),
            },
        })
    }
}
