//! Cron-driven refresh of the location cache
//!
//! The scheduler wakes every `check_interval`, asks whether a firing of the
//! cron expression fell between the previous firing and now (evaluated in the
//! configured time zone), and if so spawns a load. Loads never run on the
//! ticker task itself, so a slow upstream cannot delay shutdown.

use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::location_loader::LocationCacheLoader;
use crate::config::SchedulerConfig;
use crate::errors::{AppError, AppResult};
use crate::models::{LoadOutcome, LoadTrigger};
use crate::utils::cron_helper::{next_scheduled_time, parse_schedule, parse_timezone, should_run};

/// Spawn a load on a background task and log how it ended
///
/// With `refresh` set a full generation is rebuilt even if one already
/// completed; the existing guard stays until the rebuild succeeds.
pub fn spawn_load(
    loader: Arc<LocationCacheLoader>,
    trigger: LoadTrigger,
    refresh: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = if refresh {
            loader.refresh_by(trigger).await
        } else {
            loader.ensure_loaded_by(trigger).await
        };

        match result {
            Ok(LoadOutcome::Loaded(report)) => debug!(
                "{} load finished with {} cached records",
                trigger,
                report.cached_records()
            ),
            Ok(outcome) => debug!("{} load finished: {:?}", trigger, outcome),
            Err(e) => error!("{} load failed: {}", trigger, e),
        }
    })
}

pub struct LocationScheduler {
    loader: Arc<LocationCacheLoader>,
    config: SchedulerConfig,
    schedule: Schedule,
    timezone: Tz,
}

impl LocationScheduler {
    pub fn new(loader: Arc<LocationCacheLoader>, config: SchedulerConfig) -> AppResult<Self> {
        let schedule = parse_schedule(&config.cron).map_err(AppError::configuration)?;
        let timezone = parse_timezone(&config.timezone).map_err(AppError::configuration)?;

        Ok(Self {
            loader,
            config,
            schedule,
            timezone,
        })
    }

    /// Fire the startup trigger if it is enabled
    pub fn spawn_startup_load(&self) -> Option<JoinHandle<()>> {
        if !self.config.load_on_startup {
            debug!("Startup location load disabled");
            return None;
        }

        info!("Triggering startup location load");
        Some(spawn_load(self.loader.clone(), LoadTrigger::Startup, false))
    }

    pub fn next_run(&self) -> Option<DateTime<Utc>> {
        next_scheduled_time(&self.schedule, self.timezone)
    }

    /// Run the schedule loop until the token is cancelled
    pub async fn run(&self, cancellation_token: CancellationToken) -> Result<()> {
        info!(
            "Starting location scheduler: cron '{}' in {}, next run at {:?}",
            self.config.cron,
            self.timezone,
            self.next_run()
        );

        let mut schedule_check = interval(self.config.check_interval);
        schedule_check.tick().await;
        let mut last_run = Utc::now();

        loop {
            tokio::select! {
                _ = schedule_check.tick() => {
                    let now = Utc::now();
                    if should_run(&self.schedule, self.timezone, last_run, now) {
                        last_run = now;
                        info!("Scheduled location load due (force_refresh: {})", self.config.force_refresh);
                        spawn_load(self.loader.clone(), LoadTrigger::Scheduler, self.config.force_refresh);
                        debug!("Next scheduled location load at {:?}", self.next_run());
                    }
                }
                _ = cancellation_token.cancelled() => {
                    info!("Location scheduler received cancellation signal, shutting down");
                    break;
                }
            }
        }

        info!("Location scheduler stopped");
        Ok(())
    }
}
