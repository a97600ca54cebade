/// Daily reminder job
///
/// Once a day the scheduler wakes at the configured UTC hour, asks the
/// database for users who have not submitted a task inside the look-back
/// window, and hands one [`ReminderMessage`] per user to the [`Mailer`].
///
/// # Architecture
///
/// ```text
/// ReminderScheduler
///   └─> ReminderJob (once per day)
///         ├─> ReminderCandidates: users due a reminder
///         └─> Mailer: one send per user
/// ```
///
/// # Example
///
/// ```no_run
/// use dailytask_worker::mailer::LogMailer;
/// use dailytask_worker::reminder::{DatabaseCandidates, ReminderJob, ReminderScheduler};
/// use sqlx::PgPool;
/// use std::sync::Arc;
///
/// # async fn example(pool: PgPool) {
/// let job = ReminderJob::new(
///     Arc::new(DatabaseCandidates::new(pool)),
///     Arc::new(LogMailer),
///     chrono::Duration::hours(24),
/// );
///
/// let scheduler = ReminderScheduler::new(job, 7);
/// let shutdown = scheduler.shutdown_token();
///
/// tokio::spawn(async move { scheduler.run().await });
/// shutdown.cancel();
/// # }
/// ```

use crate::mailer::{Mailer, ReminderMessage};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use dailytask_shared::models::user::{User, UserRole};
use sqlx::PgPool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Source of users who are due a reminder
#[async_trait]
pub trait ReminderCandidates: Send + Sync {
    /// Users with at least `min_role` and no submission since `since`
    async fn users_due(
        &self,
        since: DateTime<Utc>,
        min_role: UserRole,
    ) -> Result<Vec<User>, sqlx::Error>;
}

pub struct DatabaseCandidates {
    pool: PgPool,
}

impl DatabaseCandidates {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReminderCandidates for DatabaseCandidates {
    async fn users_due(
        &self,
        since: DateTime<Utc>,
        min_role: UserRole,
    ) -> Result<Vec<User>, sqlx::Error> {
        User::list_without_submission_since(&self.pool, since, min_role).await
    }
}

/// Outcome of one scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub candidates: usize,
    pub sent: usize,
    pub failed: usize,
}

pub struct ReminderJob {
    candidates: Arc<dyn ReminderCandidates>,
    mailer: Arc<dyn Mailer>,
    window: Duration,
}

impl ReminderJob {
    pub fn new(
        candidates: Arc<dyn ReminderCandidates>,
        mailer: Arc<dyn Mailer>,
        window: Duration,
    ) -> Self {
        Self {
            candidates,
            mailer,
            window,
        }
    }

    /// Runs one scan as of `now`
    ///
    /// A failed send is logged and counted; the remaining users still get
    /// their reminder.
    ///
    /// # Errors
    ///
    /// Returns an error only when the candidate query fails.
    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<ScanReport, sqlx::Error> {
        let since = now - self.window;
        let users = self.candidates.users_due(since, UserRole::User).await?;

        let mut report = ScanReport {
            candidates: users.len(),
            ..ScanReport::default()
        };

        for user in &users {
            let message = ReminderMessage::for_user(user, self.window.num_hours());

            match self.mailer.send(&message).await {
                Ok(()) => report.sent += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        user_id = %user.id,
                        mailer = self.mailer.name(),
                        error = %e,
                        "Reminder delivery failed"
                    );
                }
            }
        }

        tracing::info!(
            candidates = report.candidates,
            sent = report.sent,
            failed = report.failed,
            "Reminder scan complete"
        );

        Ok(report)
    }
}

/// First occurrence of `hour`:00 UTC strictly after `now`
pub fn next_run_after(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let at = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or_default();
    let today = now.date_naive().and_time(at).and_utc();

    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Runs [`ReminderJob`] once a day until cancelled
pub struct ReminderScheduler {
    job: ReminderJob,
    hour: u32,
    shutdown: CancellationToken,
}

impl ReminderScheduler {
    pub fn new(job: ReminderJob, hour: u32) -> Self {
        Self {
            job,
            hour,
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancelling this token stops the loop before the next scan
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub async fn run(&self) {
        self.run_from(Utc::now()).await
    }

    /// Runs the loop as if the wall clock read `start` right now
    ///
    /// Sleeps are measured on the tokio clock from this call, so paused-time
    /// tests can drive the schedule.
    pub async fn run_from(&self, start: DateTime<Utc>) {
        let anchor = tokio::time::Instant::now();
        let mut target = next_run_after(start, self.hour);

        tracing::info!(next_run = %target, hour = self.hour, "Reminder scheduler starting");

        loop {
            let delay = (target - start).to_std().unwrap_or_default();

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Reminder scheduler shut down");
                    break;
                }
                _ = tokio::time::sleep_until(anchor + delay) => {
                    if let Err(e) = self.job.run_once(target).await {
                        tracing::error!(error = %e, "Reminder scan failed");
                    }
                    target += Duration::days(1);
                    tracing::debug!(next_run = %target, "Next reminder scan scheduled");
                }
            }
        }
    }
}
