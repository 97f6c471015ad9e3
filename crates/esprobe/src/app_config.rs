//! 🔧 App Configuration: the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." Every developer, at 3am. 🦆
//!
//! 🏗️ Powered by Figment, because manually parsing env vars is a form of
//! self-harm that even the borrow checker wouldn't approve of.
//!
//! A minimal file looks like this (dotted keys are plain TOML, no sections required):
//!
//! ```toml
//! elasticsearch.url = "https://localhost:9200"
//! elasticsearch.username = "elastic"
//! elasticsearch.password = "changeme"
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

use crate::poll::PollPolicy;

pub use crate::backends::ElasticsearchConfig;

/// 🏷️ Every environment variable starting with this is fair game. `__` separates nesting,
/// so `ESPROBE_ELASTICSEARCH__URL` lands on `elasticsearch.url`.
pub const ENV_PREFIX: &str = "ESPROBE_";

/// 📦 The AppConfig: one struct to rule them all, one struct to find them,
/// one struct to bring them all, and in the Figment bind them.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    /// 📡 Where the cluster lives and who we are to it. Required. No cluster, no probe.
    pub elasticsearch: ElasticsearchConfig,
    /// 🔄 How patiently we wait for a write to become searchable.
    #[serde(default)]
    pub verifier: VerifierConfig,
    /// 🏷️ Per-run knobs: index naming, mostly.
    #[serde(default)]
    pub run: RunConfig,
}

/// 🔄 The knobs on the read-after-write loop.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct VerifierConfig {
    /// 🔢 How many times we ask before we give up and file a complaint.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// 💤 Nap length between asks, in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    10
}

fn default_delay_ms() -> u64 {
    100
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
        }
    }
}

impl VerifierConfig {
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            max_attempts: self.max_attempts,
            delay: Duration::from_millis(self.delay_ms),
        }
    }
}

/// 🏷️ Run-scoped settings.
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct RunConfig {
    /// 🧼 Append a per-run suffix to every index name, so yesterday's run can't haunt today's.
    /// Off by default: the fixed names are what the log dashboards point at.
    #[serde(default)]
    pub unique_index_names: bool,
}

/// 🚀 Load the config from a TOML file, with `ESPROBE_*` env vars layered on top.
///
/// 📐 The file is mandatory. A missing file is a fatal startup condition, not a shrug:
/// we'd rather die at line one than probe `localhost` with nobody's password.
/// Env vars win over the file on conflicts, so CI can inject secrets without editing it.
///
/// 💀 Returns an error if the file is missing or the merged config is unparseable.
pub fn load_config(config_file: &Path) -> anyhow::Result<AppConfig> {
    load_config_with_env_prefix(config_file, ENV_PREFIX)
}

pub(crate) fn load_config_with_env_prefix(
    config_file: &Path,
    env_prefix: &str,
) -> anyhow::Result<AppConfig> {
    info!("🔧 Loading configuration: {}", config_file.display());

    let the_file_is_there = config_file.try_exists().with_context(|| {
        format!(
            "💀 Couldn't even check whether '{}' exists. The filesystem is having a moment.",
            config_file.display()
        )
    })?;
    if !the_file_is_there {
        anyhow::bail!(
            "💀 Configuration file '{}' not found. We looked everywhere. Under the couch. Behind the fridge. \
             If it's a relative path, double check your working directory, or use an absolute path.",
            config_file.display()
        );
    }

    Figment::new()
        .merge(Toml::file(config_file))
        .merge(Env::prefixed(env_prefix).split("__"))
        .extract()
        .with_context(|| {
            format!(
                "💀 Failed to parse configuration from file '{}' and environment variables ({}*). \
                 The file exists, but it and the environment could not agree on what it means.",
                config_file.display(),
                env_prefix
            )
        })
}
