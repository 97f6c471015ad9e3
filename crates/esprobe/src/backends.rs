//! 🔌 Backends: where the real I/O happens.
//!
//! 🎭 This module is the casting agency for search services. Need a real cluster that
//! answers over HTTP? We've got one. Need a cluster that lives in RAM and pretends to be
//! slow about refreshing? We've got that too. Same four lines, different actors.
//!
//! ⚠️ The singularity will arrive before we add a third backend variant.
//!
//! 🦆 The duck is here because every file must have one. This is law.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::common::{CollectionDescriptor, IndexCreation, SearchHit, WriteReceipt};

pub(crate) mod elasticsearch;
pub(crate) mod in_mem;

pub use elasticsearch::ElasticsearchConfig;
pub(crate) use elasticsearch::ElasticsearchBackend;
pub(crate) use in_mem::InMemoryBackend;

/// 📡 The search/index service, as seen from the outside.
///
/// # Contract
/// - `index_exists` is a pure question. It never creates anything.
/// - `create_index` reports [`IndexCreation::AlreadyExists`] when it loses a creation race,
///   every other failure is an `Err`.
/// - `index_document` lets the service pick the id. We never supply one.
/// - `search_by_ids` is a fresh query every call. No cursors, no scrolls, no memories.
/// - `close` releases the connection. Call it once, at the very end.
#[async_trait]
pub(crate) trait SearchBackend: std::fmt::Debug {
    async fn index_exists(&self, index: &str) -> Result<bool>;
    async fn create_index(&self, descriptor: &CollectionDescriptor) -> Result<IndexCreation>;
    async fn index_document(&self, index: &str, document: &Value) -> Result<WriteReceipt>;
    async fn search_by_ids(&self, index: &str, ids: &[String]) -> Result<Vec<SearchHit>>;
    async fn close(&self) -> Result<()>;
}

/// 🎭 The many faces of a search service, dispatched by hand.
///
/// Callers hold a `Backend` and never need to know whether the documents are flying over
/// the network or sitting in a `BTreeMap`. Ancient proverb: "He who hardcodes the backend,
/// tests only in production."
#[derive(Debug)]
pub(crate) enum Backend {
    Elasticsearch(ElasticsearchBackend),
    InMemory(InMemoryBackend),
}

#[async_trait]
impl SearchBackend for Backend {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        match self {
            Backend::Elasticsearch(es) => es.index_exists(index).await,
            Backend::InMemory(mem) => mem.index_exists(index).await,
        }
    }

    async fn create_index(&self, descriptor: &CollectionDescriptor) -> Result<IndexCreation> {
        match self {
            Backend::Elasticsearch(es) => es.create_index(descriptor).await,
            Backend::InMemory(mem) => mem.create_index(descriptor).await,
        }
    }

    async fn index_document(&self, index: &str, document: &Value) -> Result<WriteReceipt> {
        match self {
            Backend::Elasticsearch(es) => es.index_document(index, document).await,
            Backend::InMemory(mem) => mem.index_document(index, document).await,
        }
    }

    async fn search_by_ids(&self, index: &str, ids: &[String]) -> Result<Vec<SearchHit>> {
        match self {
            Backend::Elasticsearch(es) => es.search_by_ids(index, ids).await,
            Backend::InMemory(mem) => mem.search_by_ids(index, ids).await,
        }
    }

    async fn close(&self) -> Result<()> {
        match self {
            Backend::Elasticsearch(es) => es.close().await,
            Backend::InMemory(mem) => mem.close().await,
        }
    }
}
