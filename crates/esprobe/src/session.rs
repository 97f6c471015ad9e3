//! 🔌 The Session: one backend connection, opened once per run, closed once at the end.
//!
//! Every scenario borrows the same session. Nobody opens their own connection, nobody
//! closes it early. `close()` consumes the session, so "use after close" doesn't compile,
//! which is the nicest thing the borrow checker has ever done for us. 🦆

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::app_config::AppConfig;
use crate::backends::{Backend, ElasticsearchBackend, InMemoryBackend, SearchBackend};
use crate::poll::PollPolicy;
use crate::verifier::Verifier;

#[derive(Debug)]
pub(crate) struct Session {
    backend: Backend,
    policy: PollPolicy,
}

impl Session {
    /// 🚀 Open the run's one and only connection.
    ///
    /// `dry_run` swaps the cluster for the in-memory backend. The config is still required,
    /// and the poll policy still comes from it.
    pub(crate) async fn open(app_config: &AppConfig, dry_run: bool) -> Result<Self> {
        let policy = app_config.verifier.poll_policy();
        let backend = if dry_run {
            info!("🧪 Dry run: using the in-memory backend, no cluster will be harmed");
            // -- 🙈 one hidden search, so even a dry run takes the scenic route through the poll loop
            Backend::InMemory(InMemoryBackend::with_visibility_lag(1))
        } else {
            info!("📡 Connecting to {}", app_config.elasticsearch.url);
            Backend::Elasticsearch(
                ElasticsearchBackend::connect(app_config.elasticsearch.clone())
                    .await
                    .context("💀 Could not open a session with the cluster")?,
            )
        };
        Ok(Self::from_backend(backend, policy))
    }

    pub(crate) fn from_backend(backend: Backend, policy: PollPolicy) -> Self {
        Self { backend, policy }
    }

    pub(crate) fn verifier(&self) -> Verifier<'_> {
        Verifier::new(&self.backend, self.policy)
    }

    /// 🗑️ Release the connection. Consumes the session: there is no after.
    pub(crate) async fn close(self) -> Result<()> {
        debug!("🗑️ Closing session");
        self.backend
            .close()
            .await
            .context("💀 The session refused to close politely")
    }
}
