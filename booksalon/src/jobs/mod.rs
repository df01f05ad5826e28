//! Server-side aggregation: write triggers, daily metrics, leaderboards and the scheduler.

pub mod leaderboard;
pub mod metrics;
pub mod schedule;
pub mod triggers;

pub use leaderboard::{run_popular_forums, run_popular_posts};
pub use metrics::{DayWindow, run_daily_metrics};
pub use schedule::{Schedule, ScheduleError, run_scheduler};
pub use triggers::{TriggerEvent, TriggerKind, TriggerOutcome, Triggers};
