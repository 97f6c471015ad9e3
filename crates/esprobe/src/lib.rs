//! 🔍 esprobe: write a log document, then prove the cluster can find it.
//!
//! The library end of the workspace. `esprobe-cli` loads an [`AppConfig`], picks the
//! scenarios, and hands both to [`run`], which does the rest with one shared session.

pub mod app_config;
mod backends;
pub mod common;
pub mod poll;
pub mod records;
pub mod scenarios;
mod session;
mod verifier;

use anyhow::Result;
use tracing::{error, info};

pub use app_config::AppConfig;
pub use scenarios::{IndexNaming, Scenario, ScenarioReport};

use crate::session::Session;

/// 🎛️ What to run, and against what.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub scenarios: Vec<Scenario>,
    /// 🧪 Use the in-memory backend instead of the configured cluster.
    pub dry_run: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            scenarios: Scenario::ALL.to_vec(),
            dry_run: false,
        }
    }
}

/// 🚀 Open one session, run every scenario on it in order, close it no matter what.
///
/// A failing scenario doesn't stop the next one from running. If any failed, the first
/// failure is returned (with a count of the rest) after the session is closed.
pub async fn run(app_config: AppConfig, options: RunOptions) -> Result<Vec<ScenarioReport>> {
    let session = Session::open(&app_config, options.dry_run).await?;
    let naming = IndexNaming::from_run_config(&app_config.run);

    let mut reports = Vec::with_capacity(options.scenarios.len());
    let mut failures = Vec::new();
    for scenario in options.scenarios.iter().copied() {
        match scenarios::run_scenario(&session, scenario, &naming).await {
            Ok(report) => reports.push(report),
            Err(err) => {
                error!("💀 Scenario '{}' failed: {:#}", scenario, err);
                failures.push((scenario, err));
            }
        }
    }

    // 🗑️ teardown runs on every path, pass or fail
    let closed = session.close().await;
    settle_run(reports, failures, options.scenarios.len(), closed)
}

/// ⚖️ The verdict: every report if all passed and the session closed, otherwise the first
/// scenario failure. A close failure is never dropped: it is logged, and it rides along on
/// the scenario error as outer context.
fn settle_run(
    reports: Vec<ScenarioReport>,
    failures: Vec<(Scenario, anyhow::Error)>,
    the_scenario_count: usize,
    closed: Result<()>,
) -> Result<Vec<ScenarioReport>> {
    let the_failure_count = failures.len();
    let Some((scenario, first_error)) = failures.into_iter().next() else {
        closed?;
        info!("✅ All {} scenario(s) read back their writes", reports.len());
        return Ok(reports);
    };

    let the_error = first_error.context(format!(
        "💀 {} of {} scenario(s) failed, starting with '{}'",
        the_failure_count, the_scenario_count, scenario
    ));
    match closed {
        Ok(()) => Err(the_error),
        Err(close_error) => {
            // -- 🧯 two fires. the scenario one is the headline, the teardown one is not forgotten.
            error!("💀 The session also failed to close: {:#}", close_error);
            Err(the_error.context(format!(
                "💀 ...and the session failed to close afterwards: {:#}",
                close_error
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn a_report(scenario: Scenario) -> ScenarioReport {
        ScenarioReport {
            scenario,
            index: scenario.base_index_name().to_string(),
            id: "mem-00000001".to_string(),
            attempts: 1,
        }
    }

    #[test]
    fn the_one_where_everything_passed_and_closed() -> Result<()> {
        let the_reports = settle_run(vec![a_report(Scenario::TextMessage)], Vec::new(), 1, Ok(()))?;
        assert_eq!(the_reports.len(), 1);
        Ok(())
    }

    #[test]
    fn the_one_where_only_the_teardown_failed() {
        let the_error = settle_run(
            vec![a_report(Scenario::TextMessage)],
            Vec::new(),
            1,
            Err(anyhow::anyhow!("socket already gone")),
        )
        .expect_err("a failed close fails the run");
        assert!(format!("{the_error:#}").contains("socket already gone"));
    }

    #[test]
    fn the_one_where_the_teardown_failure_is_not_swallowed() {
        let the_error = settle_run(
            Vec::new(),
            vec![(Scenario::ObjectMessage, anyhow::anyhow!("never became visible"))],
            2,
            Err(anyhow::anyhow!("socket already gone")),
        )
        .expect_err("a scenario failed");

        let the_message = format!("{the_error:#}");
        assert!(the_message.contains("1 of 2 scenario(s) failed, starting with 'object-message'"));
        assert!(the_message.contains("never became visible"));
        assert!(the_message.contains("socket already gone"));
    }
}
