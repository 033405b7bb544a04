use nodefit_core::Node;
use std::fmt;

/// Committed CPU on one node, rebuilt for every fit evaluation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceUsage {
    /// CPU in millicores (1000 = 1 core)
    pub cpu_millicores: i64,
}

/// A node rejected by the fit check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterResult {
    /// Node name
    pub node_name: String,
    /// Why the node was rejected
    pub reason: String,
}

impl FilterResult {
    /// Create a failing filter result
    pub fn fail(node_name: String, reason: String) -> Self {
        Self { node_name, reason }
    }
}

/// Outcome of evaluating one pod against every node
#[derive(Debug, Clone, Default)]
pub struct FitReport {
    /// Total CPU requested by the pod, in millicores
    pub demand_millicores: i64,
    /// Nodes with enough free CPU, in input order
    pub candidates: Vec<Node>,
    /// One failing result per rejected node, in input order
    pub failures: Vec<FilterResult>,
}

impl FitReport {
    pub fn has_candidates(&self) -> bool {
        !self.candidates.is_empty()
    }

    pub fn failure_reasons(&self) -> Vec<String> {
        self.failures.iter().map(|f| f.reason.clone()).collect()
    }
}

/// Where a scheduling request came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// An ADDED event on the pod watch
    Watch,
    /// A periodic sweep of unscheduled pods
    Reconcile,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Watch => write!(f, "watch"),
            Origin::Reconcile => write!(f, "reconcile"),
        }
    }
}

/// Why a submission did not run the scheduling pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The pod already has a node
    AlreadyAssigned,
    /// The pod names a different scheduler
    NotClaimed,
    /// This process bound the pod earlier
    AlreadyBound,
    /// Shutdown was requested before the attempt started
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SkipReason::AlreadyAssigned => "already assigned",
            SkipReason::NotClaimed => "not claimed by this scheduler",
            SkipReason::AlreadyBound => "already bound by this scheduler",
            SkipReason::Cancelled => "shutdown in progress",
        };
        f.write_str(s)
    }
}

/// Result of one scheduling submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleOutcome {
    /// The pod was bound to `node`
    Scheduled { node: String },
    /// No node had enough free CPU
    NoFit,
    /// The pipeline did not run
    Skipped(SkipReason),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_report_reasons() {
        let report = FitReport {
            demand_millicores: 500,
            candidates: vec![],
            failures: vec![
                FilterResult::fail("a".to_string(), "first".to_string()),
                FilterResult::fail("b".to_string(), "second".to_string()),
            ],
        };
        assert!(!report.has_candidates());
        assert_eq!(report.failure_reasons(), vec!["first", "second"]);
    }
}
