//! Dashboard aggregates.
//!
//! Built from grouped `COUNT(*)` queries, never from materialized task lists.

use serde::{Deserialize, Serialize};

use super::task::{TaskStatus, TaskSummary};

/// Counters shown on the supporter dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    // ─── Per status ──────────────────────────────────────────────
    /// Sum of the three status counters
    pub total_tasks: i64,
    pub completed_tasks: i64,
    pub pending_tasks: i64,
    pub review_tasks: i64,

    // ─── People and discussion ───────────────────────────────────
    /// Distinct users owning at least one task
    pub active_users: i64,
    pub total_comments: i64,
}

impl TaskStats {
    /// Folds grouped `(status, count)` rows into the counters.
    ///
    /// `total_tasks` is derived from the same rows, so
    /// `completed + pending + review == total` holds by construction.
    pub fn from_status_counts(
        counts: &[(TaskStatus, i64)],
        active_users: i64,
        total_comments: i64,
    ) -> Self {
        let mut stats = TaskStats {
            active_users,
            total_comments,
            ..Default::default()
        };

        for (status, count) in counts {
            match status {
                TaskStatus::Pending => stats.pending_tasks += count,
                TaskStatus::Review => stats.review_tasks += count,
                TaskStatus::Completed => stats.completed_tasks += count,
            }
        }

        stats.total_tasks = stats.pending_tasks + stats.review_tasks + stats.completed_tasks;
        stats
    }

    pub fn is_consistent(&self) -> bool {
        self.completed_tasks + self.pending_tasks + self.review_tasks == self.total_tasks
    }
}

/// Stats plus the most recent submissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    pub stats: TaskStats,
    pub recent_tasks: Vec<TaskSummary>,
}
