//! # Previously, on esprobe...
//!
//! 🎬 The cluster was down. Or on a plane. Or behind a VPN that needed a hardware token
//! that was, at that moment, in a drawer at home. Someone still had to run the tests.
//!
//! `in_mem` is a search service that lives entirely in RAM. It keeps indices in a
//! `BTreeMap`, hands out ids from a counter, and (this is the important part) can be
//! told to keep a fresh document invisible for the first N searches. That's the refresh
//! interval, cosplayed by an integer. 🦆
//!
//! ⚠️ This is for tests and `--dry-run`. If you're deploying this to prod, please also
//! deploy a therapist.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::backends::SearchBackend;
use crate::common::{
    CollectionDescriptor, CreateIndexAck, FieldType, IndexCreation, SearchHit, WriteReceipt,
    WriteResult,
};

#[derive(Debug)]
struct StoredDocument {
    id: String,
    source: Value,
    // -- 🙈 how many more searches this document sits out before it shows up
    searches_until_visible: usize,
}

#[derive(Debug)]
struct StoredIndex {
    // -- 📐 the mapping every incoming document is checked against
    descriptor: CollectionDescriptor,
    documents: Vec<StoredDocument>,
}

#[derive(Debug, Default)]
struct InMemoryState {
    indices: BTreeMap<String, StoredIndex>,
    next_id: u64,
}

/// 📦 A pretend cluster with a configurable refresh lag.
///
/// Clone-able: clones share the same state through the `Arc`, so a test can keep a handle
/// and peek inside after handing the backend to a session.
#[derive(Debug, Default, Clone)]
pub(crate) struct InMemoryBackend {
    state: Arc<Mutex<InMemoryState>>,
    hidden_for_searches: usize,
}

impl InMemoryBackend {
    /// 🚀 Documents are visible to the very first search. A refresh interval of zero. Bliss.
    #[cfg(test)]
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// 🙈 Every new document stays hidden from the first `searches` searches that would
    /// have matched it.
    pub(crate) fn with_visibility_lag(searches: usize) -> Self {
        Self {
            hidden_for_searches: searches,
            ..Self::default()
        }
    }

    /// 📊 How many documents an index holds, visible or not. `None` if there's no such index.
    #[cfg(test)]
    pub(crate) async fn document_count(&self, index: &str) -> Option<usize> {
        let state = self.state.lock().await;
        state.indices.get(index).map(|stored| stored.documents.len())
    }
}

/// 🥊 The first mapped field whose value can't live under its declared type, as a dotted path.
///
/// Scalars go into `text` and `date` fields (the cluster coerces them), objects only into
/// `object` fields, arrays anywhere. Nulls and unmapped fields always pass: dynamic mapping has their back.
fn mapping_conflict(properties: &BTreeMap<String, FieldType>, document: &Value, prefix: &str) -> Option<String> {
    for (name, field_type) in properties {
        let Some(value) = document.get(name).filter(|value| !value.is_null()) else {
            continue;
        };
        let the_path = format!("{}{}", prefix, name);
        match (field_type, value) {
            (FieldType::Object(nested), Value::Object(_)) => {
                if let Some(conflict) = mapping_conflict(nested, value, &format!("{}.", the_path)) {
                    return Some(conflict);
                }
            }
            // -- 📚 arrays are legal under any mapping. we don't look inside.
            (_, Value::Array(_)) => {}
            (FieldType::Object(_), _) | (FieldType::Text | FieldType::Date, Value::Object(_)) => {
                return Some(the_path);
            }
            _ => {}
        }
    }
    None
}

#[async_trait]
impl SearchBackend for InMemoryBackend {
    async fn index_exists(&self, index: &str) -> Result<bool> {
        Ok(self.state.lock().await.indices.contains_key(index))
    }

    async fn create_index(&self, descriptor: &CollectionDescriptor) -> Result<IndexCreation> {
        let mut state = self.state.lock().await;
        if state.indices.contains_key(&descriptor.name) {
            return Ok(IndexCreation::AlreadyExists);
        }
        state.indices.insert(
            descriptor.name.clone(),
            StoredIndex {
                descriptor: descriptor.clone(),
                documents: Vec::new(),
            },
        );
        debug!("🏗️ [in-mem] created index '{}'", descriptor.name);
        Ok(IndexCreation::Created(CreateIndexAck {
            index: descriptor.name.clone(),
            acknowledged: true,
        }))
    }

    async fn index_document(&self, index: &str, document: &Value) -> Result<WriteReceipt> {
        if !document.is_object() {
            anyhow::bail!(
                "💀 [in-mem] index '{}' only accepts JSON objects, got: {}",
                index,
                document
            );
        }

        let mut state = self.state.lock().await;
        // -- 🔍 a mapping fight is rejected before an id is spent on it, like the real thing
        if let Some(stored) = state.indices.get(index) {
            if let Some(conflict) = mapping_conflict(&stored.descriptor.properties, document, "") {
                anyhow::bail!(
                    "💀 [in-mem] mapper_parsing_exception: failed to parse field [{}] in index [{}]",
                    conflict,
                    index
                );
            }
        }
        state.next_id += 1;
        let the_id = format!("mem-{:08}", state.next_id);

        // 🏗️ writing into a missing index creates it, same as the real thing does with dynamic mapping
        let stored = state
            .indices
            .entry(index.to_string())
            .or_insert_with(|| StoredIndex {
                descriptor: CollectionDescriptor::new(index),
                documents: Vec::new(),
            });
        stored.documents.push(StoredDocument {
            id: the_id.clone(),
            source: document.clone(),
            searches_until_visible: self.hidden_for_searches,
        });

        Ok(WriteReceipt {
            id: the_id,
            index: index.to_string(),
            result: WriteResult::Created,
        })
    }

    async fn search_by_ids(&self, index: &str, ids: &[String]) -> Result<Vec<SearchHit>> {
        let mut state = self.state.lock().await;
        let Some(stored) = state.indices.get_mut(index) else {
            anyhow::bail!("💀 [in-mem] index_not_found_exception: no such index [{}]", index);
        };

        let mut the_hits = Vec::new();
        for document in stored.documents.iter_mut().filter(|doc| ids.contains(&doc.id)) {
            if document.searches_until_visible > 0 {
                document.searches_until_visible -= 1;
                continue;
            }
            the_hits.push(SearchHit {
                id: document.id.clone(),
                index: index.to_string(),
                source: document.source.clone(),
            });
        }
        Ok(the_hits)
    }

    async fn close(&self) -> Result<()> {
        // -- 🗑️ nothing to release. we live in RAM. the OS will tidy up.
        Ok(())
    }
}
