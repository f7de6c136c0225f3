// src/core/backup/schedule.rs

//! Schedule parsing: a `BackupJob.schedule` string is validated
//! at create time, not at tick time, so a malformed expression is rejected
//! before it ever reaches the scheduler loop.

use crate::core::errors::{FleetError, FleetResult};
use chrono::{DateTime, Utc};
use cron::Schedule;
use std::str::FromStr;
use std::time::Duration;

/// A validated schedule: either a bare interval (`every <n> s`, the shorthand
/// used throughout test fixtures) or a standard cron expression.
#[derive(Debug, Clone)]
pub enum JobSchedule {
    Interval(Duration),
    Cron(Schedule),
}

impl JobSchedule {
    pub fn parse(expr: &str) -> FleetResult<Self> {
        let trimmed = expr.trim();
        if let Some(rest) = trimmed.strip_prefix("every ") {
            let secs_str = rest.trim().strip_suffix('s').unwrap_or(rest).trim();
            let secs: u64 = secs_str
                .parse()
                .map_err(|_| FleetError::Validation(format!("invalid interval schedule: {expr}")))?;
            if secs == 0 {
                return Err(FleetError::Validation("schedule interval must be > 0".into()));
            }
            return Ok(JobSchedule::Interval(Duration::from_secs(secs)));
        }

        Schedule::from_str(trimmed)
            .map(JobSchedule::Cron)
            .map_err(|e| FleetError::Validation(format!("invalid cron schedule {expr:?}: {e}")))
    }

    /// Whether a tick at `now` should fire, given the last fire time (`None`
    /// means never fired). For `Interval`, fires once `now - last >= interval`.
    /// For `Cron`, fires if a scheduled occurrence falls in `(last, now]`.
    pub fn should_fire(&self, now: DateTime<Utc>, last_fired: Option<DateTime<Utc>>) -> bool {
        match self {
            JobSchedule::Interval(interval) => match last_fired {
                None => true,
                Some(last) => (now - last).to_std().map(|d| d >= *interval).unwrap_or(false),
            },
            JobSchedule::Cron(schedule) => {
                let after = last_fired.unwrap_or(now - chrono::Duration::seconds(1));
                schedule.after(&after).take(1).any(|occurrence| occurrence <= now)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_expressions() {
        assert!(JobSchedule::parse("not a schedule").is_err());
        assert!(JobSchedule::parse("every 0 s").is_err());
    }

    #[test]
    fn accepts_interval_shorthand() {
        let s = JobSchedule::parse("every 5 s").unwrap();
        assert!(matches!(s, JobSchedule::Interval(d) if d == Duration::from_secs(5)));
    }

    #[test]
    fn interval_fires_after_elapsed_duration() {
        let schedule = JobSchedule::parse("every 5 s").unwrap();
        let t0 = Utc::now();
        assert!(schedule.should_fire(t0, None));
        assert!(!schedule.should_fire(t0 + chrono::Duration::seconds(2), Some(t0)));
        assert!(schedule.should_fire(t0 + chrono::Duration::seconds(6), Some(t0)));
    }

    #[test]
    fn accepts_standard_cron_expressions() {
        assert!(JobSchedule::parse("0 0 * * * * *").is_ok());
    }
}
