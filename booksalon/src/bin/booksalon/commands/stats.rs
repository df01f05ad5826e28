use anyhow::Result;
use booksalon::{
    DocumentStore, Query, SortOrder,
    keys::{AGGREGATES, DAILY_METRICS, POPULAR_FORUMS_DOC, POPULAR_POSTS_DOC, STATS, TOTALS_DOC},
    models::{DailyMetrics, Leaderboard, PopularForum, PopularPost, Totals},
};

use crate::context::AppContext;
use crate::examples::ExampleGroup;
use crate::output::{OutputFormat, OutputManager};

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Community Stats",
    commands: &[
        "booksalon stats                   # Totals, latest metrics and leaderboards",
        "booksalon --output json stats     # Totals only, as JSON",
    ],
}];

pub async fn handle_stats(ctx: &AppContext, output: &OutputManager) -> Result<()> {
    let salon = ctx.salon().await?;
    let store = salon.store();

    let totals: Totals = store.fetch(STATS, TOTALS_DOC).await?.unwrap_or_default();
    output.heading("Totals");
    output.display(&totals)?;
    if output.options.output_format == OutputFormat::Json {
        return Ok(());
    }

    let latest: Vec<DailyMetrics> = store
        .fetch_all(&Query::collection(DAILY_METRICS).order_by("date", SortOrder::Desc).limit(1))
        .await?;
    match latest.first() {
        Some(metrics) => {
            output.heading(&format!("Latest daily metrics ({})", metrics.date));
            output.display(metrics)?;
        }
        None => output.bullet("No daily metrics yet; run 'booksalon jobs run daily-metrics'"),
    }

    match store.fetch::<Leaderboard<PopularForum>>(AGGREGATES, POPULAR_FORUMS_DOC).await? {
        Some(board) => {
            output.heading(&format!("Popular forums (updated {})", board.updated_at));
            output.display(&board)?;
        }
        None => output.bullet("No forum leaderboard yet"),
    }
    match store.fetch::<Leaderboard<PopularPost>>(AGGREGATES, POPULAR_POSTS_DOC).await? {
        Some(board) => {
            output.heading(&format!("Popular posts (updated {})", board.updated_at));
            output.display(&board)?;
        }
        None => output.bullet("No post leaderboard yet"),
    }
    Ok(())
}
