//! Dashboard statistics for supporters and admins.

use sqlx::PgPool;

use crate::auth::authorization::can_view_stats;
use crate::auth::middleware::AuthContext;
use crate::error::{ServiceError, ServiceResult};
use crate::models::comment::Comment;
use crate::models::stats::{StatsReport, TaskStats};
use crate::models::task::Task;

/// Number of recent tasks included in the report
pub const RECENT_TASK_LIMIT: i64 = 5;

/// Aggregate counters plus the most recent submissions
///
/// The four queries run concurrently on separate pool connections.
pub async fn compute_stats(pool: &PgPool, actor: &AuthContext) -> ServiceResult<StatsReport> {
    if !can_view_stats(actor) {
        return Err(ServiceError::Forbidden(
            "Only supporters and admins can view statistics".to_string(),
        ));
    }

    let (status_counts, active_users, total_comments, recent_tasks) = tokio::try_join!(
        Task::count_by_status(pool),
        Task::count_distinct_owners(pool),
        Comment::count(pool),
        Task::list_summaries(pool, None, Some(RECENT_TASK_LIMIT)),
    )?;

    let stats = TaskStats::from_status_counts(&status_counts, active_users, total_comments);

    tracing::debug!(
        user_id = %actor.user_id,
        total_tasks = stats.total_tasks,
        active_users = stats.active_users,
        "Computed dashboard stats"
    );

    Ok(StatsReport {
        stats,
        recent_tasks,
    })
}
