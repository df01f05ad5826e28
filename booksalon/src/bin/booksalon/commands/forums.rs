use anyhow::{Result, bail};
use booksalon::BookCategory;
use clap::Subcommand;

use crate::context::AppContext;
use crate::examples::ExampleGroup;
use crate::output::OutputManager;

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Browse Forums",
    commands: &[
        "booksalon forums list                      # Most recently active forums",
        "booksalon forums list --popular --limit 5  # Ranked by popularity",
        "booksalon forums list --category 소설       # One category",
    ],
}];

#[derive(Subcommand)]
pub enum ForumCommands {
    /// List forums
    #[command(name = "list")]
    List {
        /// Only forums of this category (e.g. 소설, 에세이, 과학/기술)
        #[arg(long)]
        category: Option<String>,

        /// Rank by popularity instead of recent activity
        #[arg(long, conflicts_with = "category")]
        popular: bool,

        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

pub async fn handle_forum_commands(command: ForumCommands, ctx: &AppContext, output: &OutputManager) -> Result<()> {
    let salon = ctx.salon().await?;
    let forums = salon.forums();

    match command {
        ForumCommands::List {
            category,
            popular,
            limit,
        } => {
            let listed = match (category, popular) {
                (Some(label), _) => {
                    let Some(category) = BookCategory::parse(label.trim()) else {
                        let known: Vec<&str> = BookCategory::ALL.iter().map(|category| category.as_str()).collect();
                        bail!("unknown category '{label}'; expected one of {}", known.join(", "));
                    };
                    forums.forums_by_category(category, limit).await?
                }
                (None, true) => forums.popular_forums(limit).await?,
                (None, false) => forums.recent_forums(limit).await?,
            };
            if listed.is_empty() {
                output.info("No forums yet");
                return Ok(());
            }
            output.display(&listed)?;
        }
    }
    Ok(())
}
