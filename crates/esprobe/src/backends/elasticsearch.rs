//! # 📡 THE ELASTICSEARCH BACKEND
//!
//! *Previously, on esprobe...*
//!
//! 🎬 COLD OPEN: INT. SERVER ROOM, 3:47 AM
//!
//! The dashboard says the log was written. The dashboard has a green checkmark.
//! The search bar says "No results". Our hero refreshes. Still nothing. Refreshes again.
//! There it is. Two hundred milliseconds of existential dread, brought to you by the
//! refresh interval.
//!
//! 🚀 This module is the HTTP side of that story. Four endpoints, one client, zero magic:
//!
//! | operation        | verb   | path               |
//! |------------------|--------|--------------------|
//! | index exists?    | `HEAD` | `/{index}`         |
//! | create index     | `PUT`  | `/{index}`         |
//! | write document   | `POST` | `/{index}/_doc`    |
//! | search by ids    | `POST` | `/{index}/_search` |
//!
//! 🔒 Auth: API key wins over basic auth. No credentials at all means anonymous, which
//! works on exactly one laptop in the world and it isn't yours.
//!
//! 🔄 Nothing here retries. Waiting for visibility is the verifier's job, and every other
//! failure is fatal to the caller.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, trace};

use crate::backends::SearchBackend;
use crate::common::{CollectionDescriptor, CreateIndexAck, IndexCreation, SearchHit, WriteReceipt};

/// 📡 Where the cluster lives and how to prove we're allowed in.
#[derive(Debug, Deserialize, Clone)]
pub struct ElasticsearchConfig {
    /// 📡 The URL of your cluster. Include scheme + port. Yes, all of it.
    pub url: String,
    /// 🔒 Username for basic auth. Optional, like flossing. You know you should have one.
    #[serde(default)]
    pub username: Option<String>,
    /// 🔒 Password. "changeme" is not a password. It is a confession.
    #[serde(default)]
    pub password: Option<String>,
    /// 🔒 API key auth, the velvet rope variant. Beats basic auth when both are set.
    #[serde(default)]
    pub api_key: Option<String>,
}

/// 📦 The body of a `_search` response, pared down to what we read.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: SearchResponseHits,
}

#[derive(Debug, Deserialize)]
struct SearchResponseHits {
    #[serde(default)]
    total: Option<TotalHits>,
    #[serde(default)]
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct TotalHits {
    value: u64,
}

/// 📡 One `reqwest::Client`, one config, shared for the whole run.
#[derive(Debug)]
pub(crate) struct ElasticsearchBackend {
    // -- 📡 reused across requests. one connection pool per run, like one coffee per standup.
    client: reqwest::Client,
    config: ElasticsearchConfig,
}

impl ElasticsearchBackend {
    /// 🔧 Build the HTTP client. No network traffic yet.
    ///
    /// 10 second connect timeout, 30 second request timeout. We will wait, but not forever.
    pub(crate) fn new(config: ElasticsearchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .context("💀 The HTTP client refused to be born. The TLS stack wept. We tried to build a reqwest::Client and the universe said 'no'.")?;
        Ok(Self { client, config })
    }

    /// 🚀 Build the client AND knock on the cluster's front door.
    ///
    /// The `GET /` ping confirms the URL is real and the credentials work, so we fail here
    /// instead of halfway through the first scenario.
    pub(crate) async fn connect(config: ElasticsearchConfig) -> Result<Self> {
        let backend = Self::new(config)?;
        backend.ping().await?;
        Ok(backend)
    }

    /// 📡 "Hello? Is this thing on?": GET the cluster root.
    pub(crate) async fn ping(&self) -> Result<()> {
        let response = self
            .authorize(self.client.get(self.endpoint("")))
            .send()
            .await
            .with_context(|| {
                format!(
                    "💀 Could not reach the cluster at '{}'. We knocked. Nobody answered. Check the URL and whether the cluster is actually up.",
                    self.config.url
                )
            })?;
        let response = ensure_success(response, "ping the cluster").await?;
        let the_cluster_hello: Value = response.json().await.unwrap_or(Value::Null);
        debug!(
            "✅ Cluster said hello: name={} version={}",
            the_cluster_hello["cluster_name"], the_cluster_hello["version"]["number"]
        );
        Ok(())
    }

    /// 🔗 `{url}/{path}` with exactly one slash in between. One slash of difference.
    /// Infinite suffering of difference.
    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.url.trim_end_matches('/'), path)
    }

    /// 🔒 Auth priority: API key wins over basic auth. This is not a democracy.
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        if let Some(ref api_key) = self.config.api_key {
            request.header("Authorization", format!("ApiKey {}", api_key))
        } else if let Some(ref username) = self.config.username {
            request.basic_auth(username, self.config.password.as_ref())
        } else {
            request
        }
    }
}

/// 💀 Turn a non-2xx into an error that carries the status AND the body.
/// Elasticsearch error bodies are poetry. Dark poetry. We include the whole poem.
async fn ensure_success(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    anyhow::bail!(
        "💀 Tried to {}, and Elasticsearch said '{}'. The body of the response read: '{}'.",
        what,
        status,
        body
    )
}

#[async_trait]
impl SearchBackend for ElasticsearchBackend {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        let response = self
            .authorize(self.client.head(self.endpoint(index)))
            .send()
            .await
            .with_context(|| format!("💀 Asked whether index '{}' exists. Got ghosted by the network.", index))?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            // -- HEAD has no body, so the status is all the poetry we get
            other => anyhow::bail!(
                "💀 Existence check for index '{}' came back '{}'. Neither yes nor no. Schrodinger's index.",
                index,
                other
            ),
        }
    }

    async fn create_index(&self, descriptor: &CollectionDescriptor) -> Result<IndexCreation> {
        let the_body = descriptor.create_index_body();
        trace!("🏗️ PUT /{} {}", descriptor.name, the_body);
        let response = self
            .authorize(self.client.put(self.endpoint(&descriptor.name)))
            .json(&the_body)
            .send()
            .await
            .with_context(|| {
                format!(
                    "💀 The create request for index '{}' never made it to Elasticsearch.",
                    descriptor.name
                )
            })?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST {
            // 🏠 a 400 may just mean somebody beat us to it. anything else in a 400 is a real error.
            let body = response.text().await.unwrap_or_default();
            let the_error_type = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|parsed| parsed["error"]["type"].as_str().map(str::to_owned));
            if the_error_type.as_deref() == Some("resource_already_exists_exception") {
                debug!("🏠 Index '{}' appeared while we were creating it. Fine by us.", descriptor.name);
                return Ok(IndexCreation::AlreadyExists);
            }
            anyhow::bail!(
                "💀 Tried to create index '{}', and Elasticsearch said '{}'. The body of the response read: '{}'. Probably the mapping. It's always the mapping.",
                descriptor.name,
                status,
                body
            );
        }

        let response = ensure_success(response, &format!("create index '{}'", descriptor.name)).await?;
        let ack: CreateIndexAck = response
            .json()
            .await
            .context("💀 The index was created, probably, but the acknowledgement was unreadable.")?;
        Ok(IndexCreation::Created(ack))
    }

    async fn index_document(&self, index: &str, document: &Value) -> Result<WriteReceipt> {
        let response = self
            .authorize(self.client.post(self.endpoint(&format!("{}/_doc", index))))
            .json(document)
            .send()
            .await
            .with_context(|| {
                format!("💀 The document never made it to index '{}'. The network was not vibing with it.", index)
            })?;
        let response = ensure_success(response, &format!("index a document into '{}'", index)).await?;
        response
            .json()
            .await
            .context("💀 Elasticsearch took our document and handed back a receipt we cannot read.")
    }

    async fn search_by_ids(&self, index: &str, ids: &[String]) -> Result<Vec<SearchHit>> {
        let the_query = json!({ "query": { "ids": { "values": ids } } });
        let response = self
            .authorize(self.client.post(self.endpoint(&format!("{}/_search", index))))
            .json(&the_query)
            .send()
            .await
            .with_context(|| format!("💀 The search against index '{}' never made it out the door.", index))?;
        let response = ensure_success(response, &format!("search index '{}'", index)).await?;
        let the_response: SearchResponse = response
            .json()
            .await
            .context("💀 The search came back, but the hits were in a shape we do not recognize.")?;

        if let Some(total) = the_response.hits.total {
            trace!("🔍 {} total hit(s) in '{}' for {:?}", total.value, index, ids);
        }
        Ok(the_response.hits.hits)
    }

    /// 🗑️ reqwest drops its pool on its own. We just say goodbye properly.
    async fn close(&self) -> Result<()> {
        debug!("🗑️ Closing the Elasticsearch connection to {}", self.config.url);
        Ok(())
    }
}
