/// Worker configuration
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 2)
/// - `REMINDER_HOUR_UTC`: hour of day the scan runs, 0-23 (default: 7)
/// - `REMINDER_WINDOW_HOURS`: users without a submission in this many hours
///   get a reminder (default: 24)

use std::env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub database_url: String,
    pub max_connections: u32,

    /// UTC hour at which the daily scan runs
    pub reminder_hour_utc: u32,

    /// Look-back window for "has submitted recently"
    pub window_hours: i64,
}

impl WorkerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "2".to_string())
            .parse::<u32>()?;

        let reminder_hour_utc = env::var("REMINDER_HOUR_UTC")
            .unwrap_or_else(|_| "7".to_string())
            .parse::<u32>()?;

        let window_hours = env::var("REMINDER_WINDOW_HOURS")
            .unwrap_or_else(|_| "24".to_string())
            .parse::<i64>()?;

        let config = Self {
            database_url,
            max_connections,
            reminder_hour_utc,
            window_hours,
        };
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.reminder_hour_utc > 23 {
            anyhow::bail!("REMINDER_HOUR_UTC must be between 0 and 23");
        }

        if self.window_hours <= 0 {
            anyhow::bail!("REMINDER_WINDOW_HOURS must be positive");
        }

        Ok(())
    }
}
