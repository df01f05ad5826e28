use anyhow::Result;
use booksalon::{BookLookup, SearchTarget};
use clap::{Subcommand, ValueEnum};

use crate::context::AppContext;
use crate::examples::ExampleGroup;
use crate::output::OutputManager;

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Book Lookup",
    commands: &[
        "booksalon books search 데미안                 # Search by title",
        "booksalon books search 9788937460449 --by isbn # Look up one ISBN",
        "booksalon --output json books search 코스모스   # JSON for scripting",
    ],
}];

#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum SearchBy {
    #[default]
    Title,
    Isbn,
}

impl From<SearchBy> for SearchTarget {
    fn from(value: SearchBy) -> Self {
        match value {
            SearchBy::Title => SearchTarget::Title,
            SearchBy::Isbn => SearchTarget::Isbn,
        }
    }
}

#[derive(Subcommand)]
pub enum BookCommands {
    /// Search the external book API
    #[command(name = "search")]
    Search {
        /// Title words or an ISBN
        query: String,

        /// Field to match the query against
        #[arg(long, value_enum, default_value = "title")]
        by: SearchBy,
    },
}

pub async fn handle_book_commands(command: BookCommands, ctx: &AppContext, output: &OutputManager) -> Result<()> {
    match command {
        BookCommands::Search { query, by } => {
            let client = ctx.book_client()?;
            output.verbose(&format!("querying {}", ctx.config.books.base_url));
            output.progress("Searching books");
            let books = client.search(&query, by.into()).await;
            output.clear_line();
            let books = books?;
            if books.is_empty() {
                output.warning(&format!("No books found for '{query}'"));
                return Ok(());
            }
            output.display(&books)?;
        }
    }
    Ok(())
}
