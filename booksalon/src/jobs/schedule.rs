//! Minimal cron-style schedules and the job loop.
//!
//! Only the two shapes the jobs need are accepted: `M H * * *` (daily at
//! H:M) and `M * * * *` (hourly at minute M), evaluated in a fixed offset.

use std::{future::Future, str::FromStr};

use chrono::{Duration, FixedOffset, Timelike, Utc};
use log::{error, info};
use thiserror::Error;

use crate::{config::JobSettings, store::DocumentStore, timestamp::Timestamp};

use super::{leaderboard, metrics};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("expected 5 fields, found {0}")]
    FieldCount(usize),
    #[error("invalid {field} '{value}'")]
    InvalidField { field: &'static str, value: String },
    #[error("only '*' is supported for day, month and weekday")]
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub minute: u32,
    /// `None` fires every hour.
    pub hour: Option<u32>,
}

fn parse_field(field: &'static str, value: &str, max: u32) -> Result<u32, ScheduleError> {
    value
        .parse::<u32>()
        .ok()
        .filter(|parsed| *parsed <= max)
        .ok_or_else(|| ScheduleError::InvalidField {
            field,
            value: value.to_string(),
        })
}

impl FromStr for Schedule {
    type Err = ScheduleError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = value.split_whitespace().collect();
        let [minute, hour, day, month, weekday] = fields.as_slice() else {
            return Err(ScheduleError::FieldCount(fields.len()));
        };
        if [day, month, weekday].iter().any(|field| **field != "*") {
            return Err(ScheduleError::Unsupported);
        }
        let minute = parse_field("minute", minute, 59)?;
        let hour = match *hour {
            "*" => None,
            hour => Some(parse_field("hour", hour, 23)?),
        };
        Ok(Self { minute, hour })
    }
}

impl Schedule {
    /// First fire instant strictly after `now`.
    pub fn next_after(&self, now: Timestamp, offset: FixedOffset) -> Timestamp {
        let local = now.as_datetime().with_timezone(&offset);
        let base = local
            .with_second(0)
            .and_then(|at| at.with_nanosecond(0))
            .and_then(|at| at.with_minute(self.minute))
            .unwrap_or(local);
        let (candidate, step) = match self.hour {
            Some(hour) => (base.with_hour(hour).unwrap_or(base), Duration::days(1)),
            None => (base, Duration::hours(1)),
        };
        let candidate = Timestamp::from_datetime(candidate.with_timezone(&Utc));
        if candidate > now { candidate } else { candidate.plus(step) }
    }
}

/// Runs the daily metrics and leaderboard jobs on their schedules until
/// `shutdown` resolves. A failing run is logged and retried at the next slot.
pub async fn run_scheduler<S, F>(store: &S, settings: &JobSettings, shutdown: F) -> anyhow::Result<()>
where
    S: DocumentStore,
    F: Future<Output = ()>,
{
    let offset = settings.offset()?;
    let daily = settings.daily_schedule()?;
    let hourly = settings.leaderboard_schedule()?;
    tokio::pin!(shutdown);

    loop {
        let now = Timestamp::now();
        let next_daily = daily.next_after(now, offset);
        let next_hourly = hourly.next_after(now, offset);
        let next = next_daily.min(next_hourly);
        let wait = (next.as_datetime() - now.as_datetime()).to_std().unwrap_or_default();
        info!("next job run at {next}");

        tokio::select! {
            _ = &mut shutdown => {
                info!("scheduler stopping");
                return Ok(());
            }
            _ = tokio::time::sleep(wait) => {}
        }

        let fired_at = Timestamp::now();
        if next_daily == next {
            if let Err(err) = metrics::run_daily_metrics(store, fired_at, offset).await {
                error!("daily metrics failed: {err}");
            }
        }
        if next_hourly == next {
            if let Err(err) = leaderboard::run_popular_forums(store, fired_at).await {
                error!("popular forums failed: {err}");
            }
            if let Err(err) = leaderboard::run_popular_posts(store, fired_at).await {
                error!("popular posts failed: {err}");
            }
        }
    }
}
