//! Monthly scheduled sweeps.
//!
//! Requires the `background-jobs` feature.
//!
//! # Jobs
//!
//! - **Overdue deactivation** (default: day 3 at 02:00): disables and marks
//!   inactive every overdue account, then notifies it
//! - **Payment reminders** (default: day 30 at 10:00): reminds every overdue
//!   account of its monthly fee
//!
//! Both run in the configured timezone and call the same sweep functions as the
//! `/cron/*` endpoints, in-process.
//!
//! # Usage
//!
//! ```rust,ignore
//! use aurora_mentis::jobs::{JobConfig, JobScheduler};
//!
//! let mut scheduler = JobScheduler::new(state.clone(), JobConfig::from_config(&config.jobs)?).await?;
//! scheduler.start().await?;
//! ```

use std::future::Future;
use std::str::FromStr;

use chrono_tz::Tz;
use tokio_cron_scheduler::{Job, JobScheduler as TokioJobScheduler};
use tracing::info;

use crate::config::JobsConfig;
use crate::server::cron::{
    schedule_overdue_deactivations, schedule_payment_reminders, SweepOutcome,
};
use crate::server::handlers::AppState;

/// Configuration for the scheduled sweeps.
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Cron expression for the deactivation sweep (default: day 3 at 02:00)
    pub deactivation_cron: String,
    /// Cron expression for the reminder sweep (default: day 30 at 10:00)
    pub reminder_cron: String,
    /// Timezone the expressions are evaluated in
    pub timezone: Tz,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            deactivation_cron: "0 0 2 3 * *".to_string(),
            reminder_cron: "0 0 10 30 * *".to_string(),
            timezone: chrono_tz::America::Lima,
        }
    }
}

impl JobConfig {
    pub fn from_config(config: &JobsConfig) -> Result<Self, JobError> {
        let timezone = Tz::from_str(&config.timezone)
            .map_err(|_| JobError::ConfigError(format!("unknown timezone '{}'", config.timezone)))?;
        Ok(Self {
            deactivation_cron: config.deactivation_cron.clone(),
            reminder_cron: config.reminder_cron.clone(),
            timezone,
        })
    }
}

/// Runs the sweeps on their schedule.
pub struct JobScheduler {
    scheduler: TokioJobScheduler,
    state: AppState,
    config: JobConfig,
}

impl JobScheduler {
    pub async fn new(state: AppState, config: JobConfig) -> Result<Self, JobError> {
        let scheduler = TokioJobScheduler::new()
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        Ok(Self {
            scheduler,
            state,
            config,
        })
    }

    /// Register both sweeps and start ticking.
    pub async fn start(&self) -> Result<(), JobError> {
        info!(timezone = %self.config.timezone, "Starting sweep scheduler");

        self.add_sweep(
            "overdue_deactivation",
            &self.config.deactivation_cron,
            |state| async move { schedule_overdue_deactivations(&state).await },
        )
        .await?;

        self.add_sweep(
            "payment_reminders",
            &self.config.reminder_cron,
            |state| async move { schedule_payment_reminders(&state).await },
        )
        .await?;

        self.scheduler
            .start()
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        info!("Sweep scheduler started");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), JobError> {
        info!("Shutting down sweep scheduler");
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))
    }

    async fn add_sweep<F, Fut>(&self, name: &'static str, cron: &str, sweep: F) -> Result<(), JobError>
    where
        F: Fn(AppState) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = SweepOutcome> + Send + 'static,
    {
        let state = self.state.clone();

        let job = Job::new_async_tz(cron, self.config.timezone, move |_uuid, _l| {
            let state = state.clone();
            let sweep = sweep.clone();
            Box::pin(async move {
                let outcome = sweep(state).await;
                info!(
                    job = name,
                    selected = outcome.selected,
                    scheduled = outcome.scheduled,
                    "Scheduled sweep ran"
                );
            })
        })
        .map_err(|e| JobError::SchedulerError(format!("{name} ({cron}): {e}")))?;

        self.scheduler
            .add(job)
            .await
            .map_err(|e| JobError::SchedulerError(e.to_string()))?;

        info!(job = name, schedule = %cron, "Added sweep job");
        Ok(())
    }

    /// Run the reminder sweep immediately.
    pub async fn run_reminders_now(&self) -> SweepOutcome {
        schedule_payment_reminders(&self.state).await
    }

    /// Run the deactivation sweep immediately.
    pub async fn run_deactivations_now(&self) -> SweepOutcome {
        schedule_overdue_deactivations(&self.state).await
    }
}

/// Errors that can occur in the job scheduler.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Scheduler error: {0}")]
    SchedulerError(String),

    #[error("Job configuration error: {0}")]
    ConfigError(String),
}
