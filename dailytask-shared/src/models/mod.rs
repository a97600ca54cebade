/// Database models
///
/// Each model owns its SQL as static methods taking a pool (or any executor
/// where the call has to join a transaction).
///
/// # Models
///
/// - `user`: accounts, roles and external identity links
/// - `task`: daily submissions and their review status
/// - `comment`: review comments on tasks
/// - `stats`: dashboard aggregates
///
/// # Example
///
/// ```no_run
/// use dailytask_shared::models::task::{Task, TaskStatus};
/// use dailytask_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let completed = Task::list_summaries(&pool, Some(TaskStatus::Completed), None).await?;
/// println!("{} completed tasks", completed.len());
/// # Ok(())
/// # }
/// ```

pub mod comment;
pub mod stats;
pub mod task;
pub mod user;
