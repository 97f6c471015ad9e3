//! 🎬 Scenarios: the two stories we tell the cluster, every run.
//!
//! | scenario         | index                         | lifecycle        | `message` mapping         |
//! |------------------|-------------------------------|------------------|---------------------------|
//! | `text-message`   | `logs_with_message_as_text`   | `7-days-default` | `text`                    |
//! | `object-message` | `logs_with_message_as_object` | `logs`           | `object` of three `text`s |
//!
//! Each one ensures its index, writes one record stamped with "now", waits for it to be
//! searchable by id, and checks the message came back exactly as it went in.
//! The index names are fixed unless `run.unique_index_names` asks for a per-run suffix.

use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::app_config::RunConfig;
use crate::common::{CollectionDescriptor, FieldType, SearchHit};
use crate::records::{LogMessage, LogRecord, StructuredMessage, now_timestamp};
use crate::session::Session;
use crate::verifier::EnsureOutcome;

const THE_AUTHOR: &str = "Cyrille";

/// 🎭 The cast. Two scenarios. No sequels planned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scenario {
    /// 📝 `message` is a plain text field.
    TextMessage,
    /// 🪆 `message` is an object with `subMessage`, `availabilityZone`, `system`.
    ObjectMessage,
}

impl Scenario {
    pub const ALL: [Scenario; 2] = [Scenario::TextMessage, Scenario::ObjectMessage];

    pub fn name(self) -> &'static str {
        match self {
            Scenario::TextMessage => "text-message",
            Scenario::ObjectMessage => "object-message",
        }
    }

    pub fn base_index_name(self) -> &'static str {
        match self {
            Scenario::TextMessage => "logs_with_message_as_text",
            Scenario::ObjectMessage => "logs_with_message_as_object",
        }
    }

    fn lifecycle_policy(self) -> &'static str {
        match self {
            Scenario::TextMessage => "7-days-default",
            Scenario::ObjectMessage => "logs",
        }
    }

    /// 📐 The index this scenario needs, under the given name.
    pub fn descriptor(self, index_name: &str) -> CollectionDescriptor {
        let message_field = match self {
            Scenario::TextMessage => FieldType::Text,
            Scenario::ObjectMessage => FieldType::object([
                ("subMessage", FieldType::Text),
                ("availabilityZone", FieldType::Text),
                ("system", FieldType::Text),
            ]),
        };
        CollectionDescriptor::new(index_name)
            .with_lifecycle_policy(self.lifecycle_policy())
            .with_field("message", message_field)
            .with_field("@timestamp", FieldType::Date)
    }

    /// 📝 The record this scenario writes, stamped with `timestamp`.
    pub fn build_record(self, timestamp: &str) -> LogRecord {
        let message = match self {
            Scenario::TextMessage => LogMessage::Text(format!("log message {}", timestamp)),
            Scenario::ObjectMessage => LogMessage::Structured(StructuredMessage {
                sub_message: format!("log sub message {}", timestamp),
                availability_zone: "eu-west-1".to_string(),
                system: "my-system".to_string(),
            }),
        };
        LogRecord {
            timestamp: timestamp.to_string(),
            message,
            author: THE_AUTHOR.to_string(),
        }
    }

    /// 🎯 The scenario-specific assertion on the hit we found.
    fn check_hit(self, written: &LogRecord, hit: &SearchHit) -> Result<()> {
        match (self, &written.message) {
            (Scenario::TextMessage, LogMessage::Text(expected)) => {
                let the_stored_message = hit.source["message"].as_str();
                if the_stored_message != Some(expected.as_str()) {
                    anyhow::bail!(
                        "💀 Expected source.message == '{}', found {}",
                        expected,
                        hit.source["message"]
                    );
                }
            }
            // -- 🪆 structured messages go back through serde, so a renamed key can't sneak past
            _ => {
                let the_stored = LogRecord::from_document(&hit.source)?;
                if the_stored.message != written.message {
                    anyhow::bail!(
                        "💀 The nested message did not round-trip.\n  wrote: {:?}\n  read:  {:?}",
                        written.message,
                        the_stored.message
                    );
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        Scenario::ALL
            .into_iter()
            .find(|scenario| scenario.name() == raw)
            .with_context(|| {
                format!(
                    "💀 Unknown scenario '{}'. We only know: {}",
                    raw,
                    Scenario::ALL.map(Scenario::name).join(", ")
                )
            })
    }
}

/// 🏷️ Turns a scenario into the index name for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexNaming {
    suffix: Option<String>,
}

impl IndexNaming {
    /// 🪨 The literal names. Same index every run.
    pub fn fixed() -> Self {
        Self { suffix: None }
    }

    /// 🧼 `<base>-<run_id>`. Index names must be lowercase, so keep `run_id` lowercase too.
    pub fn unique(run_id: impl Into<String>) -> Self {
        Self {
            suffix: Some(run_id.into()),
        }
    }

    pub fn from_run_config(run_config: &RunConfig) -> Self {
        if run_config.unique_index_names {
            Self::unique(chrono::Utc::now().format("%Y%m%d%H%M%S%3f").to_string())
        } else {
            Self::fixed()
        }
    }

    pub fn index_name(&self, scenario: Scenario) -> String {
        match self.suffix {
            Some(ref suffix) => format!("{}-{}", scenario.base_index_name(), suffix),
            None => scenario.base_index_name().to_string(),
        }
    }
}

/// 📊 What one successful scenario leaves behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioReport {
    pub scenario: Scenario,
    pub index: String,
    pub id: String,
    pub attempts: u32,
}

/// 🎬 Ensure, write, wait, check. One scenario, start to finish, on the shared session.
pub(crate) async fn run_scenario(
    session: &Session,
    scenario: Scenario,
    naming: &IndexNaming,
) -> Result<ScenarioReport> {
    let index = naming.index_name(scenario);
    info!("🎬 Scenario '{}' against index '{}'", scenario, index);
    let verifier = session.verifier();

    // -- 🏗️ step one: the index, with this scenario's mapping and lifecycle
    let ensured = verifier.ensure_collection(&scenario.descriptor(&index)).await?;
    if let EnsureOutcome::Created { acknowledged: false } = ensured {
        warn!(
            "⚠️ Index '{}' was created but the cluster did not acknowledge it in time. Carrying on.",
            index
        );
    }

    // -- 🕰️ stamped with "now", so every run writes a document nobody has seen before
    let record = scenario.build_record(&now_timestamp());
    let verified = verifier
        .verify_round_trip(&index, &record.to_document()?)
        .await
        .with_context(|| format!("💀 Scenario '{}' could not read back its own write", scenario))?;
    // -- 🎭 the generic round trip passed. now the scenario's own, pickier opinion.
    scenario.check_hit(&record, &verified.hit)?;

    info!(
        "✅ Scenario '{}' saw document {} after {} attempt(s)",
        scenario, verified.receipt.id, verified.attempts
    );
    Ok(ScenarioReport {
        scenario,
        index,
        id: verified.receipt.id,
        attempts: verified.attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{Backend, InMemoryBackend};
    use crate::poll::PollPolicy;
    use serde_json::json;
    use std::time::Duration;

    fn a_session_with_lag(lag: usize) -> Session {
        Session::from_backend(
            Backend::InMemory(InMemoryBackend::with_visibility_lag(lag)),
            PollPolicy {
                max_attempts: 10,
                delay: Duration::from_millis(1),
            },
        )
    }

    #[test]
    fn the_one_where_scenario_names_go_both_ways() -> Result<()> {
        for scenario in Scenario::ALL {
            assert_eq!(scenario.name().parse::<Scenario>()?, scenario);
        }
        assert!("interpretive-dance".parse::<Scenario>().is_err());
        Ok(())
    }

    #[test]
    fn the_one_where_the_text_record_matches_the_classic_shape() -> Result<()> {
        let the_record = Scenario::TextMessage.build_record("2024-05-01T10:00:00.000+02:00");
        assert_eq!(
            the_record.to_document()?,
            json!({
                "@timestamp": "2024-05-01T10:00:00.000+02:00",
                "message": "log message 2024-05-01T10:00:00.000+02:00",
                "author": "Cyrille"
            })
        );
        Ok(())
    }

    #[test]
    fn the_one_where_the_object_schema_nests_three_text_fields() {
        let the_body = Scenario::ObjectMessage
            .descriptor("logs_with_message_as_object")
            .create_index_body();
        assert_eq!(the_body["settings"]["index"]["lifecycle"]["name"], "logs");
        assert_eq!(
            the_body["mappings"]["properties"]["message"]["properties"]["availabilityZone"],
            json!({ "type": "text" })
        );
        assert_eq!(
            the_body["mappings"]["properties"]["@timestamp"],
            json!({ "type": "date" })
        );
    }

    #[test]
    fn the_one_where_unique_names_get_a_suffix() {
        assert_eq!(
            IndexNaming::fixed().index_name(Scenario::TextMessage),
            "logs_with_message_as_text"
        );
        assert_eq!(
            IndexNaming::unique("20240501").index_name(Scenario::ObjectMessage),
            "logs_with_message_as_object-20240501"
        );
        let the_naming = IndexNaming::from_run_config(&RunConfig {
            unique_index_names: true,
        });
        assert_ne!(the_naming, IndexNaming::fixed());
    }

    #[tokio::test]
    async fn the_one_where_the_text_scenario_reads_its_own_write() -> Result<()> {
        let session = a_session_with_lag(2);
        let the_report =
            run_scenario(&session, Scenario::TextMessage, &IndexNaming::fixed()).await?;

        assert_eq!(the_report.index, "logs_with_message_as_text");
        assert!(!the_report.id.is_empty());
        assert_eq!(the_report.attempts, 3);
        session.close().await
    }

    #[tokio::test]
    async fn the_one_where_the_object_scenario_keeps_its_nesting() -> Result<()> {
        let session = a_session_with_lag(0);
        let the_report =
            run_scenario(&session, Scenario::ObjectMessage, &IndexNaming::unique("run1")).await?;

        assert_eq!(the_report.index, "logs_with_message_as_object-run1");
        assert_eq!(the_report.attempts, 1);
        session.close().await
    }

    #[tokio::test]
    async fn the_one_where_running_twice_reuses_the_index() -> Result<()> {
        let session = a_session_with_lag(0);
        let first = run_scenario(&session, Scenario::TextMessage, &IndexNaming::fixed()).await?;
        let second = run_scenario(&session, Scenario::TextMessage, &IndexNaming::fixed()).await?;

        assert_eq!(first.index, second.index);
        assert_ne!(first.id, second.id);
        session.close().await
    }

    #[test]
    fn the_one_where_a_mangled_nested_message_is_caught() -> Result<()> {
        let the_written = Scenario::ObjectMessage.build_record("T");
        let mut the_source = the_written.to_document()?;
        the_source["message"]["system"] = json!("someone-elses-system");
        let the_hit = SearchHit {
            id: "x".to_string(),
            index: "logs_with_message_as_object".to_string(),
            source: the_source,
        };

        assert!(Scenario::ObjectMessage.check_hit(&the_written, &the_hit).is_err());
        Ok(())
    }
}
