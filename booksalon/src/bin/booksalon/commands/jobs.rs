use anyhow::Result;
use booksalon::{
    Timestamp,
    jobs::{run_daily_metrics, run_popular_forums, run_popular_posts, run_scheduler},
};
use clap::{Subcommand, ValueEnum};

use crate::context::AppContext;
use crate::examples::ExampleGroup;
use crate::output::OutputManager;

pub const EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "One-off Runs",
        commands: &[
            "booksalon jobs run daily-metrics      # Aggregate yesterday's activity",
            "booksalon jobs run popular-forums     # Rebuild the forum leaderboard",
            "booksalon jobs run all                # Run every job once",
        ],
    },
    ExampleGroup {
        title: "Scheduler",
        commands: &["booksalon jobs schedule               # Run jobs on their cron schedules until Ctrl-C"],
    },
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum JobName {
    /// Yesterday's counts written to dailyMetrics/{date}
    DailyMetrics,
    /// Top forums written to aggregates/popularForums
    PopularForums,
    /// Top posts written to aggregates/popularPosts
    PopularPosts,
    /// Every job above
    All,
}

#[derive(Subcommand)]
pub enum JobCommands {
    /// Run one aggregation job now
    #[command(name = "run")]
    Run {
        #[arg(value_enum)]
        job: JobName,
    },

    /// Run the jobs on their configured schedules until interrupted
    #[command(name = "schedule")]
    Schedule,
}

pub async fn handle_job_commands(command: JobCommands, ctx: &AppContext, output: &OutputManager) -> Result<()> {
    let salon = ctx.salon().await?;
    let store = salon.store();

    match command {
        JobCommands::Run { job } => {
            let now = Timestamp::now();
            if matches!(job, JobName::DailyMetrics | JobName::All) {
                output.progress("Aggregating daily metrics");
                let metrics = run_daily_metrics(store, now, ctx.config.jobs.offset()?).await?;
                output.clear_line();
                output.heading(&format!("Daily metrics for {}", metrics.date));
                output.display(&metrics)?;
            }
            if matches!(job, JobName::PopularForums | JobName::All) {
                output.progress("Ranking forums");
                let board = run_popular_forums(store, now).await?;
                output.clear_line();
                output.heading("Popular forums");
                output.display(&board)?;
            }
            if matches!(job, JobName::PopularPosts | JobName::All) {
                output.progress("Ranking posts");
                let board = run_popular_posts(store, now).await?;
                output.clear_line();
                output.heading("Popular posts");
                output.display(&board)?;
            }
            output.success("Jobs finished");
        }
        JobCommands::Schedule => {
            output.info(&format!(
                "Daily metrics at '{}', leaderboards at '{}' ({})",
                ctx.config.jobs.daily_metrics, ctx.config.jobs.leaderboards, ctx.config.jobs.utc_offset
            ));
            output.info("Press Ctrl-C to stop");
            run_scheduler(store, &ctx.config.jobs, async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;
            output.success("Scheduler stopped");
        }
    }
    Ok(())
}
