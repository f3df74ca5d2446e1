//! Best-effort comparison runs across several explainers.
//!
//! Every requested explainer is attempted independently. Unknown names and
//! failing explainers are logged and left out; whatever succeeded is merged
//! into one table with a column per explainer.

use crate::data::{AttributionTable, FeatureMatrix};
use crate::error::XaiError;
use crate::factory::ExplainerFactory;
use serde::Serialize;
use std::any::Any;
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{info, warn};

/// Which explainers a comparison should run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ExplainerSelection {
    /// The factory's configured default set.
    #[default]
    Default,
    One(String),
    Many(Vec<String>),
}

impl ExplainerSelection {
    /// Requested names in order, with repeats removed.
    ///
    /// Names are compared case-insensitively, ignoring surrounding
    /// whitespace; the first spelling wins.
    pub fn resolve(&self, factory: &ExplainerFactory) -> Vec<String> {
        let names: Vec<String> = match self {
            ExplainerSelection::Default => factory
                .default_explainers()
                .iter()
                .map(|kind| kind.as_str().to_string())
                .collect(),
            ExplainerSelection::One(name) => vec![name.clone()],
            ExplainerSelection::Many(names) => names.clone(),
        };
        let mut seen = HashSet::new();
        names
            .into_iter()
            .filter(|name| seen.insert(name.trim().to_ascii_lowercase()))
            .collect()
    }
}

impl From<&str> for ExplainerSelection {
    fn from(name: &str) -> Self {
        ExplainerSelection::One(name.to_string())
    }
}

impl From<String> for ExplainerSelection {
    fn from(name: String) -> Self {
        ExplainerSelection::One(name)
    }
}

impl From<Vec<String>> for ExplainerSelection {
    fn from(names: Vec<String>) -> Self {
        ExplainerSelection::Many(names)
    }
}

impl From<&[&str]> for ExplainerSelection {
    fn from(names: &[&str]) -> Self {
        ExplainerSelection::Many(names.iter().map(|n| n.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ExplainerSelection {
    fn from(names: [&str; N]) -> Self {
        ExplainerSelection::Many(names.iter().map(|n| n.to_string()).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Succeeded,
    Unrecognized,
    Failed(String),
}

/// What happened to one requested explainer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExplainerOutcome {
    /// The name as requested.
    pub explainer: String,
    pub status: OutcomeStatus,
}

impl ExplainerOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == OutcomeStatus::Succeeded
    }
}

/// Merged table plus a per-explainer account of the run.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub table: AttributionTable,
    pub outcomes: Vec<ExplainerOutcome>,
}

impl ComparisonReport {
    pub fn failures(&self) -> impl Iterator<Item = &ExplainerOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }
}

type Contribution = Option<(String, AttributionTable)>;

/// Run one explainer; a panic inside it becomes a failed outcome.
fn run_one(
    factory: &ExplainerFactory,
    name: &str,
    data: &FeatureMatrix,
) -> (OutcomeStatus, Contribution) {
    match panic::catch_unwind(AssertUnwindSafe(|| attempt(factory, name, data))) {
        Ok(result) => result,
        Err(payload) => {
            let reason = panic_message(payload.as_ref());
            warn!(explainer = name, panic = %reason, "explainer panicked, skipping");
            (
                OutcomeStatus::Failed(format!("explainer panicked: {}", reason)),
                None,
            )
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn attempt(
    factory: &ExplainerFactory,
    name: &str,
    data: &FeatureMatrix,
) -> (OutcomeStatus, Contribution) {
    let explainer = match factory.create(name) {
        Ok(explainer) => explainer,
        Err(XaiError::UnrecognizedExplainer(_)) => {
            warn!(explainer = name, "no explainer available for type, skipping");
            return (OutcomeStatus::Unrecognized, None);
        }
        Err(err) => {
            warn!(explainer = name, error = %err, "could not create explainer, skipping");
            return (OutcomeStatus::Failed(err.to_string()), None);
        }
    };

    let key = explainer.kind().as_str();
    match explainer.explain_global(data) {
        Ok(table) => {
            info!(explainer = key, features = table.features().len(), "explanation complete");
            (OutcomeStatus::Succeeded, Some((key.to_string(), table)))
        }
        Err(err) => {
            warn!(explainer = key, error = %err, "explanation failed, skipping");
            (OutcomeStatus::Failed(err.to_string()), None)
        }
    }
}

fn assemble(
    data: &FeatureMatrix,
    results: Vec<(String, OutcomeStatus, Contribution)>,
) -> ComparisonReport {
    let mut parts = Vec::new();
    let mut outcomes = Vec::with_capacity(results.len());
    for (explainer, status, contribution) in results {
        parts.extend(contribution);
        outcomes.push(ExplainerOutcome { explainer, status });
    }
    let table = AttributionTable::merge_aligned(data.names(), &parts);
    info!(
        requested = outcomes.len(),
        succeeded = parts.len(),
        "comparison finished"
    );
    ComparisonReport { table, outcomes }
}

/// Run the selected explainers one after another.
pub fn run_and_report(
    factory: &ExplainerFactory,
    data: &FeatureMatrix,
    selection: impl Into<ExplainerSelection>,
) -> ComparisonReport {
    let names = selection.into().resolve(factory);
    info!(explainers = ?names, rows = data.n_rows(), "running explainers");
    let results = names
        .into_iter()
        .map(|name| {
            let (status, contribution) = run_one(factory, &name, data);
            (name, status, contribution)
        })
        .collect();
    assemble(data, results)
}

/// Merged global explanations of the selected explainers.
///
/// Never fails: if nothing succeeds the table is empty.
pub fn run_and_collect(
    factory: &ExplainerFactory,
    data: &FeatureMatrix,
    selection: impl Into<ExplainerSelection>,
) -> AttributionTable {
    run_and_report(factory, data, selection).table
}

/// Like [`run_and_report`], with each explainer on its own blocking worker.
///
/// Results are merged in request order regardless of which finishes first.
/// A worker that panics or is cancelled counts as a failed explainer.
pub async fn run_and_report_concurrent(
    factory: Arc<ExplainerFactory>,
    data: Arc<FeatureMatrix>,
    selection: impl Into<ExplainerSelection>,
) -> ComparisonReport {
    let names = selection.into().resolve(&factory);
    info!(explainers = ?names, rows = data.n_rows(), "running explainers concurrently");

    let handles: Vec<_> = names
        .into_iter()
        .map(|name| {
            let factory = Arc::clone(&factory);
            let data = Arc::clone(&data);
            let task_name = name.clone();
            let handle =
                tokio::task::spawn_blocking(move || run_one(&factory, &task_name, &data));
            (name, handle)
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for (name, handle) in handles {
        let (status, contribution) = match handle.await {
            Ok(result) => result,
            Err(err) => {
                warn!(explainer = %name, error = %err, "explainer worker did not complete");
                (OutcomeStatus::Failed(format!("worker did not complete: {}", err)), None)
            }
        };
        results.push((name, status, contribution));
    }
    assemble(&data, results)
}

pub async fn run_and_collect_concurrent(
    factory: Arc<ExplainerFactory>,
    data: Arc<FeatureMatrix>,
    selection: impl Into<ExplainerSelection>,
) -> AttributionTable {
    run_and_report_concurrent(factory, data, selection)
        .await
        .table
}
