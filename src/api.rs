use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use url::Url;

use crate::error::SearchError;
use crate::formats::{ApiEnvelope, SearchPage};
use crate::params::SearchParams;

pub const SEARCH_ENDPOINT: &str = "book/searchByPage";

/// The remote catalog search endpoint.
#[async_trait]
pub trait SearchApi: Send + Sync {
    async fn search(&self, params: &SearchParams) -> Result<SearchPage, SearchError>;
}

/// `reqwest` client for `GET {base}/book/searchByPage`.
#[derive(Debug, Clone)]
pub struct HttpSearchApi {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpSearchApi {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| anyhow::anyhow!("build http client: {err}"))?;
        Self::with_client(client, base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            client,
            endpoint: search_endpoint(base_url)?,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Full request URL for `params`.
    pub fn request_url(&self, params: &SearchParams) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.clear();
            for (key, value) in params.query_pairs() {
                query.append_pair(key, &value);
            }
        }
        url
    }
}

/// Resolves the endpoint under `base_url`, keeping any path prefix
/// (`https://host/api` → `https://host/api/book/searchByPage`).
pub fn search_endpoint(base_url: &str) -> anyhow::Result<Url> {
    let base_url = base_url.trim().trim_end_matches('/');
    let base = Url::parse(&format!("{base_url}/"))
        .map_err(|err| anyhow::anyhow!("invalid api base url {base_url:?}: {err}"))?;
    if base.scheme() != "http" && base.scheme() != "https" {
        anyhow::bail!("api base url must be http/https: {base}");
    }
    base.join(SEARCH_ENDPOINT)
        .map_err(|err| anyhow::anyhow!("build search endpoint: {err}"))
}

#[async_trait]
impl SearchApi for HttpSearchApi {
    async fn search(&self, params: &SearchParams) -> Result<SearchPage, SearchError> {
        let url = self.request_url(params);
        tracing::debug!(%url, "GET search");

        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .header(
                USER_AGENT,
                concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")),
            )
            .send()
            .await?;

        let status = response.status();
        let raw = response.text().await?;
        if !status.is_success() {
            return Err(SearchError::Status {
                status: status.as_u16(),
                detail: parse_error_detail(&raw),
            });
        }

        decode_search_response(&raw)
    }
}

/// Decodes a 200 response body, classifying embedded failure codes.
pub fn decode_search_response(raw: &str) -> Result<SearchPage, SearchError> {
    let envelope: ApiEnvelope<SearchPage> =
        serde_json::from_str(raw).map_err(|err| SearchError::Parse(err.to_string()))?;
    if !envelope.is_success() {
        return Err(SearchError::Business {
            code: envelope.code,
            msg: envelope.msg,
        });
    }
    envelope
        .data
        .ok_or_else(|| SearchError::Parse("missing `data` in successful response".to_owned()))
}

fn parse_error_detail(raw: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    ["msg", "error"]
        .iter()
        .filter_map(|key| value.get(key).and_then(|v| v.as_str()))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_owned)
}
