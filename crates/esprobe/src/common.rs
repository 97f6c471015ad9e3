//! 📦 Common data structures: the nouns that travel between us and the search service.
//!
//! 🎬 COLD OPEN: INT. SEARCH CLUSTER, SHARD 0, 3:47 AM
//!
//! A document arrives. It has no name yet. The cluster gives it one, twenty characters
//! of base64 that nobody will ever read out loud. A receipt is printed. The document
//! waits for the next refresh, invisible, like a new hire on their first morning
//! before IT sets up their account. 🦆
//!
//! This module holds the humble types that describe that journey:
//! - [`CollectionDescriptor`] + [`FieldType`]: what an index should look like before we write to it
//! - [`IndexCreation`] / [`CreateIndexAck`]: what the cluster said when we asked it to make one
//! - [`WriteReceipt`] / [`WriteResult`]: what the cluster said when we handed it a document
//! - [`SearchHit`]: what the cluster hands back when we come looking for it
//!
//! ⚠️ Every backend speaks these types. The HTTP backend deserializes them from the wire,
//! the in-memory backend builds them by hand. Neither is allowed to invent new ones.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value, json};

/// 🏷️ The type of a mapped field. Three flavors, like a very limited ice cream shop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    /// 📝 Full-text analyzed string.
    Text,
    /// 🕰️ A timestamp. The service parses it, we just promise it's RFC 3339.
    Date,
    /// 🪆 A structured object with its own named sub-fields. Nesting dolls, but for JSON.
    Object(BTreeMap<String, FieldType>),
}

impl FieldType {
    /// 🔧 Build an object field from `(name, type)` pairs.
    pub fn object<I, S>(properties: I) -> Self
    where
        I: IntoIterator<Item = (S, FieldType)>,
        S: Into<String>,
    {
        FieldType::Object(
            properties
                .into_iter()
                .map(|(name, field_type)| (name.into(), field_type))
                .collect(),
        )
    }

    /// 📐 Render this field as an Elasticsearch mapping property.
    pub fn to_mapping(&self) -> Value {
        match self {
            FieldType::Text => json!({ "type": "text" }),
            FieldType::Date => json!({ "type": "date" }),
            FieldType::Object(properties) => json!({
                "type": "object",
                "properties": properties_to_mapping(properties),
            }),
        }
    }
}

fn properties_to_mapping(properties: &BTreeMap<String, FieldType>) -> Value {
    let the_rendered_properties: Map<String, Value> = properties
        .iter()
        .map(|(name, field_type)| (name.clone(), field_type.to_mapping()))
        .collect();
    Value::Object(the_rendered_properties)
}

/// 📦 Everything we need to know to create an index: its name, its schema, its retention fate.
///
/// Created once per index if absent. Never mutated. Never deleted by us.
/// The index outlives the process, the process outlives the coffee.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionDescriptor {
    /// 📡 Index name. Lowercase, no spaces, no regrets.
    pub name: String,
    /// 📐 Field name → type. Only the fields we care about; the rest is dynamic mapping's problem.
    pub properties: BTreeMap<String, FieldType>,
    /// 🗑️ Lifecycle (ILM) policy name, if the index should age out gracefully.
    pub lifecycle_policy: Option<String>,
}

impl CollectionDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: BTreeMap::new(),
            lifecycle_policy: None,
        }
    }

    /// ➕ Add a mapped field. Last write wins if you add the same name twice.
    pub fn with_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.properties.insert(name.into(), field_type);
        self
    }

    pub fn with_lifecycle_policy(mut self, policy: impl Into<String>) -> Self {
        self.lifecycle_policy = Some(policy.into());
        self
    }

    /// 🏗️ The body of `PUT /{index}`.
    ///
    /// ```text
    /// {"settings":{"index":{"lifecycle":{"name":"logs"}}},
    ///  "mappings":{"properties":{"message":{"type":"text"}, ...}}}
    /// ```
    ///
    /// `settings` is left out entirely when there is no lifecycle policy.
    pub fn create_index_body(&self) -> Value {
        let mut the_body = Map::new();
        if let Some(ref policy) = self.lifecycle_policy {
            the_body.insert(
                "settings".to_string(),
                json!({ "index": { "lifecycle": { "name": policy } } }),
            );
        }
        the_body.insert(
            "mappings".to_string(),
            json!({ "properties": properties_to_mapping(&self.properties) }),
        );
        Value::Object(the_body)
    }
}

/// ✅ The cluster's answer to "please make this index".
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CreateIndexAck {
    pub index: String,
    #[serde(default)]
    pub acknowledged: bool,
}

/// 🎭 How an index creation request ended. Losing a creation race is not a tragedy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexCreation {
    Created(CreateIndexAck),
    /// 🏠 Someone else built the house while we were filling out the permit.
    AlreadyExists,
}

/// 🧾 What the write said happened. Mirrors the service's `result` string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum WriteResult {
    Created,
    Updated,
    Deleted,
    NotFound,
    Noop,
    /// 🤷 A result string from a future version we have not met yet.
    Other(String),
}

impl From<String> for WriteResult {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "created" => WriteResult::Created,
            "updated" => WriteResult::Updated,
            "deleted" => WriteResult::Deleted,
            "not_found" => WriteResult::NotFound,
            "noop" => WriteResult::Noop,
            _ => WriteResult::Other(raw),
        }
    }
}

impl WriteResult {
    /// ✅ Did the document actually land? `created` and `updated` say yes. Everything else shrugs.
    pub fn is_accepted(&self) -> bool {
        matches!(self, WriteResult::Created | WriteResult::Updated)
    }
}

impl std::fmt::Display for WriteResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let the_label = match self {
            WriteResult::Created => "created",
            WriteResult::Updated => "updated",
            WriteResult::Deleted => "deleted",
            WriteResult::NotFound => "not_found",
            WriteResult::Noop => "noop",
            WriteResult::Other(raw) => raw.as_str(),
        };
        f.write_str(the_label)
    }
}

/// 🧾 Proof of write. The id is the cluster's, not ours.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WriteReceipt {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_index")]
    pub index: String,
    pub result: WriteResult,
}

/// 🎯 One hit from an identifier query. Source comes back as the cluster stored it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_source", default)]
    pub source: Value,
}

impl std::fmt::Display for SearchHit {
    /// `id (index): source`, the exact shape a human greps for in the logs.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({}): {}", self.id, self.index, self.source)
    }
}
