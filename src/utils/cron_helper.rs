//! Cron helpers for the refresh schedule
//!
//! Schedules are evaluated in a named time zone so that an expression such as
//! `0 0 3 * * *` means 03:00 local time wherever the service runs.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use std::str::FromStr;

/// Parse a cron expression, with a message naming the offending expression
pub fn parse_schedule(cron_expression: &str) -> Result<Schedule, String> {
    Schedule::from_str(cron_expression)
        .map_err(|e| format!("Invalid cron expression '{cron_expression}': {e}"))
}

/// Parse an IANA time zone name such as `Asia/Ho_Chi_Minh`
pub fn parse_timezone(name: &str) -> Result<Tz, String> {
    Tz::from_str(name).map_err(|e| format!("Invalid time zone '{name}': {e}"))
}

/// Next firing time strictly after now, in UTC
pub fn next_scheduled_time(schedule: &Schedule, tz: Tz) -> Option<DateTime<Utc>> {
    schedule
        .upcoming(tz)
        .next()
        .map(|next| next.with_timezone(&Utc))
}

/// Whether a firing of `schedule` falls in `(last_run, now]`
pub fn should_run(
    schedule: &Schedule,
    tz: Tz,
    last_run: DateTime<Utc>,
    now: DateTime<Utc>,
) -> bool {
    schedule
        .after(&last_run.with_timezone(&tz))
        .next()
        .map(|next| now >= next.with_timezone(&Utc))
        .unwrap_or(false)
}
