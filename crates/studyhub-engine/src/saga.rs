//! Step runner for cascading deletes.
//!
//! A cascade is a set of named, idempotent steps. Steps already recorded in the
//! [`CascadeLog`] are skipped; the rest run concurrently and every outcome is
//! collected. One step failing never stops its siblings.

use futures_util::future::{join_all, BoxFuture};
use serde::Serialize;
use studyhub_db::repository::cascades::{self, CascadeLog};
use studyhub_db::Database;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Done { affected: usize },
    /// Already completed by an earlier run.
    Skipped,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub step: String,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

/// Aggregate result of one cascade run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeReport {
    pub target_id: Uuid,
    pub steps: Vec<StepReport>,
    /// Notifications written by this run.
    pub notified: usize,
    /// This run picked up a log left unfinished by an earlier one.
    pub resumed: bool,
}

impl CascadeReport {
    pub fn new(target_id: Uuid, resumed: bool) -> Self {
        Self {
            target_id,
            steps: Vec::new(),
            notified: 0,
            resumed,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepReport> {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Failed { .. }))
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn outcome_of(&self, step: &str) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.step == step).map(|s| &s.outcome)
    }

    pub(crate) fn record(&mut self, step: impl Into<String>, outcome: StepOutcome) {
        self.steps.push(StepReport {
            step: step.into(),
            outcome,
        });
    }

    pub(crate) fn absorb(&mut self, prefix: &str, other: CascadeReport) {
        self.notified += other.notified;
        for s in other.steps {
            self.record(format!("{prefix}/{}", s.step), s.outcome);
        }
    }
}

/// A named step. The future reports how many records it affected.
pub(crate) struct Step<'a> {
    pub name: String,
    pub run: BoxFuture<'a, Result<usize, String>>,
}

impl<'a> Step<'a> {
    pub fn new(name: impl Into<String>, run: BoxFuture<'a, Result<usize, String>>) -> Self {
        Self {
            name: name.into(),
            run,
        }
    }
}

/// Run every step the log has not completed, concurrently, and record the outcomes.
pub(crate) async fn run_group(log: &mut CascadeLog, report: &mut CascadeReport, steps: Vec<Step<'_>>) {
    let mut pending = Vec::new();
    for step in steps {
        if log.is_done(&step.name) {
            report.record(step.name, StepOutcome::Skipped);
        } else {
            pending.push(step);
        }
    }

    let (names, futures): (Vec<String>, Vec<_>) = pending.into_iter().map(|s| (s.name, s.run)).unzip();
    let results = join_all(futures).await;

    for (name, result) in names.into_iter().zip(results) {
        match result {
            Ok(affected) => {
                log.mark_done(name.clone());
                report.record(name, StepOutcome::Done { affected });
            }
            Err(error) => {
                tracing::warn!(target_id = %log.target_id, step = %name, %error, "Cascade step failed");
                report.record(name, StepOutcome::Failed { error });
            }
        }
    }
}

/// Persist the step log; a failed save only costs idempotence on a later re-run.
pub(crate) async fn checkpoint(db: &Database, log: &CascadeLog) {
    if let Err(e) = cascades::save(db, log).await {
        tracing::warn!(target_id = %log.target_id, error = %e, "Cascade log save failed");
    }
}
