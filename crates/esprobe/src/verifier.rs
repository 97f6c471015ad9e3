//! 🔍 The Read-After-Write Verifier.
//!
//! 🎬 *[a document is written. the cluster says "created". the search bar says nothing.]*
//! *["give it a second," says the senior engineer. it has been four hundred milliseconds.]*
//!
//! Three steps, always in this order:
//! 1. [`Verifier::ensure_collection`]: make sure the index exists with the right mapping
//! 2. [`Verifier::write_record`]: hand the cluster a document, get an id back
//! 3. [`Verifier::await_visibility`]: ask for that id until it shows up or we run out of asks
//!
//! ```text
//!            hits > 0
//!   Polling ───────────▶ Found      (terminal, success)
//!      │ ▲
//!      │ └── no hits, attempts < bound: sleep, ask again
//!      │
//!      └───────────────▶ Exhausted  (terminal, explicit failure)
//!        attempts == bound
//! ```
//!
//! [`Verifier::verify_round_trip`] does steps 2 and 3 and then checks that what came back
//! is, field for field, what went in. 🦆

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info};

use crate::backends::{Backend, SearchBackend};
use crate::common::{CollectionDescriptor, IndexCreation, SearchHit, WriteReceipt};
use crate::poll::{PollOutcome, PollPolicy, poll_until};

/// 🏗️ What `ensure_collection` ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureOutcome {
    /// 🏠 It was already there. We touched nothing.
    AlreadyExists,
    /// ✅ We built it. `acknowledged` is the cluster's word on it.
    Created { acknowledged: bool },
}

/// 🏁 How the visibility wait ended.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationOutcome {
    Found {
        hits: Vec<SearchHit>,
        attempts: u32,
    },
    Exhausted {
        index: String,
        id: String,
        attempts: u32,
    },
}

impl VerificationOutcome {
    /// ✅ The hits, or an error that says out loud that we never saw the document.
    pub fn into_hits(self) -> Result<(Vec<SearchHit>, u32)> {
        match self {
            VerificationOutcome::Found { hits, attempts } => Ok((hits, attempts)),
            VerificationOutcome::Exhausted { index, id, attempts } => anyhow::bail!(
                "💀 Document '{}' in index '{}' never became visible after {} attempt(s). \
                 The cluster said 'created'. The search said nothing. One of them is lying, \
                 or the refresh interval is longer than our patience.",
                id,
                index,
                attempts
            ),
        }
    }
}

/// 📦 Proof that a record made the full round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedRecord {
    pub receipt: WriteReceipt,
    pub hit: SearchHit,
    pub attempts: u32,
}

/// 🔍 Borrows a backend, carries a poll policy. Cheap to make, made per scenario.
#[derive(Debug)]
pub(crate) struct Verifier<'a> {
    backend: &'a Backend,
    policy: PollPolicy,
}

impl<'a> Verifier<'a> {
    pub(crate) fn new(backend: &'a Backend, policy: PollPolicy) -> Self {
        Self { backend, policy }
    }

    /// 🏗️ Create the index if it's missing. A no-op if it's already there.
    ///
    /// Creation errors are fatal and never retried.
    pub(crate) async fn ensure_collection(&self, descriptor: &CollectionDescriptor) -> Result<EnsureOutcome> {
        // -- 🔍 look before we build. HEAD is cheap, PUT on an existing index is a 400.
        let exists = self
            .backend
            .index_exists(&descriptor.name)
            .await
            .with_context(|| format!("💀 Could not check whether index '{}' exists", descriptor.name))?;
        if exists {
            debug!("🏠 Index '{}' already exists, leaving it alone", descriptor.name);
            return Ok(EnsureOutcome::AlreadyExists);
        }

        // -- 🏗️ no retries. a failed create is a config problem, and config problems don't heal.
        let creation = self
            .backend
            .create_index(descriptor)
            .await
            .with_context(|| format!("💀 Could not create index '{}'", descriptor.name))?;
        match creation {
            IndexCreation::Created(ack) => {
                info!("🏗️ CREATED: {} - acknowledged={}", ack.index, ack.acknowledged);
                Ok(EnsureOutcome::Created {
                    acknowledged: ack.acknowledged,
                })
            }
            // -- 🏁 someone beat us between the HEAD and the PUT. same result, less work.
            IndexCreation::AlreadyExists => Ok(EnsureOutcome::AlreadyExists),
        }
    }

    /// 📝 Hand one document to the cluster. The cluster picks the id.
    pub(crate) async fn write_record(&self, index: &str, record: &Value) -> Result<WriteReceipt> {
        let receipt = self
            .backend
            .index_document(index, record)
            .await
            .with_context(|| format!("💀 Could not write a document into index '{}'", index))?;
        // -- 🏷️ the id is the only handle we get. no id, no search, no point.
        if receipt.id.is_empty() {
            anyhow::bail!(
                "💀 Index '{}' accepted our document and gave it no name. An empty id cannot be searched for.",
                index
            );
        }
        info!(
            "📝 Created document {} in {} - result {}",
            receipt.id, receipt.index, receipt.result
        );
        Ok(receipt)
    }

    /// 🔄 Ask for `id` until the cluster admits it has it, or until the poll policy runs out.
    ///
    /// Every attempt is a fresh `ids` query. Transport and server errors are not retried.
    pub(crate) async fn await_visibility(&self, index: &str, id: &str) -> Result<VerificationOutcome> {
        // -- 📦 copies and borrows the closure can carry into each async attempt
        let backend = self.backend;
        let the_ids = [id.to_string()];
        let the_ids: &[String] = &the_ids;
        let max_attempts = self.policy.max_attempts;

        let outcome = poll_until(self.policy, |attempt| async move {
            let hits = backend
                .search_by_ids(index, the_ids)
                .await
                .with_context(|| format!("💀 Search for document '{}' in index '{}' failed", id, index))?;
            // -- ⏳ empty means "not yet", which is the one answer worth asking again about
            if hits.is_empty() {
                info!(
                    "⏳ Wait for document to be available for read... ({}/{})",
                    attempt, max_attempts
                );
                Ok::<_, anyhow::Error>(None)
            } else {
                Ok(Some(hits))
            }
        })
        .await?;

        Ok(match outcome {
            PollOutcome::Found { value: hits, attempts } => {
                for hit in &hits {
                    info!("🎯 {}", hit);
                }
                VerificationOutcome::Found { hits, attempts }
            }
            PollOutcome::Exhausted { attempts } => VerificationOutcome::Exhausted {
                index: index.to_string(),
                id: id.to_string(),
                attempts,
            },
        })
    }

    /// 🔁 Write, wait, compare. The whole read-after-write contract in one call.
    ///
    /// Fails if the write isn't accepted, if the document never shows up, if the query
    /// returns anything other than exactly one hit with our id, or if the stored source
    /// differs from what we wrote.
    pub(crate) async fn verify_round_trip(&self, index: &str, record: &Value) -> Result<VerifiedRecord> {
        let receipt = self.write_record(index, record).await?;
        if !receipt.result.is_accepted() {
            anyhow::bail!(
                "💀 Index '{}' answered our write with result '{}'. That is not a yes.",
                index,
                receipt.result
            );
        }

        // -- 🚨 exhaustion becomes an error here, out loud, with the id in it
        let (hits, attempts) = self.await_visibility(index, &receipt.id).await?.into_hits()?;
        // -- 🎯 exactly one of ours. zero is a stranger, two is a bug in someone's cluster.
        let mut ours = hits.into_iter().filter(|hit| hit.id == receipt.id);
        let hit = match (ours.next(), ours.next()) {
            (Some(hit), None) => hit,
            (None, _) => anyhow::bail!(
                "💀 The search for '{}' in '{}' returned hits, just none of them ours.",
                receipt.id,
                index
            ),
            (Some(_), Some(_)) => anyhow::bail!(
                "💀 The search for '{}' in '{}' returned the same id more than once. Ids are supposed to be unique. Supposed to be.",
                receipt.id,
                index
            ),
        };

        // -- 🔬 field for field. serde_json compares objects without caring about key order.
        if &hit.source != record {
            anyhow::bail!(
                "💀 Document '{}' in '{}' came back different from how it went in.\n  wrote: {}\n  read:  {}",
                receipt.id,
                index,
                record,
                hit.source
            );
        }

        Ok(VerifiedRecord {
            receipt,
            hit,
            attempts,
        })
    }
}
