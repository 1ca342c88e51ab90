//! Best-run selection by primary metric

use std::cmp::Ordering;

use crate::domain::run::{MetricGoal, PrimaryMetric, Run, RunStatus};

/// Which run wins when several share the best metric value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TieBreak {
    /// The run submitted first wins
    #[default]
    EarliestSubmitted,
    /// The run submitted last wins
    LatestSubmitted,
}

/// Completed runs with a finite value for the metric, in submission order
fn candidates<'a>(runs: &'a [Run], metric: &PrimaryMetric) -> Vec<(&'a Run, f64)> {
    let mut candidates: Vec<(&Run, f64)> = runs
        .iter()
        .filter(|run| run.status == RunStatus::Completed)
        .filter_map(|run| {
            run.metric(&metric.name)
                .filter(|value| value.is_finite())
                .map(|value| (run, value))
        })
        .collect();
    // Stable: equal timestamps keep input order
    candidates.sort_by_key(|(run, _)| run.submitted_at);
    candidates
}

/// `Greater` when `a` is better than `b` under `goal`
fn compare(goal: MetricGoal, a: f64, b: f64) -> Ordering {
    match goal {
        MetricGoal::Maximize => a.total_cmp(&b),
        MetricGoal::Minimize => b.total_cmp(&a),
    }
}

/// Pick the best run by the primary metric
///
/// Only `Completed` runs that logged a finite value for the metric are
/// considered. Returns `None` when no run qualifies.
pub fn select_best<'a>(
    runs: &'a [Run],
    metric: &PrimaryMetric,
    tie_break: TieBreak,
) -> Option<&'a Run> {
    let mut best: Option<(&Run, f64)> = None;

    for (run, value) in candidates(runs, metric) {
        let replace = match best {
            None => true,
            Some((_, best_value)) => match compare(metric.goal, value, best_value) {
                Ordering::Greater => true,
                Ordering::Equal => tie_break == TieBreak::LatestSubmitted,
                Ordering::Less => false,
            },
        };
        if replace {
            best = Some((run, value));
        }
    }

    best.map(|(run, _)| run)
}

/// Runs ordered best-first by the primary metric
///
/// Ties keep submission order. Runs that are not completed or lack the
/// metric follow, in their original order.
pub fn sort_by_primary_metric<'a>(runs: &'a [Run], metric: &PrimaryMetric) -> Vec<&'a Run> {
    let mut ranked = candidates(runs, metric);
    ranked.sort_by(|(_, a), (_, b)| compare(metric.goal, *b, *a));

    let mut ordered: Vec<&Run> = ranked.iter().map(|(run, _)| *run).collect();
    ordered.extend(
        runs.iter()
            .filter(|run| !ranked.iter().any(|(ranked_run, _)| ranked_run.id == run.id)),
    );
    ordered
}
