use anyhow::Result;
use booksalon::{
    categorize_book,
    models::{Book, DailyMetrics, Forum, Leaderboard, PopularForum, PopularPost, Totals},
};
use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{Attribute, Cell, CellAlignment, Color as TableColor, Table, presets};
use serde::Serialize;
use std::io::Write;

use crate::theme::{ICONS, THEME};

/// Output format options for CLI commands
#[derive(Clone, Debug, ValueEnum, Default, PartialEq)]
pub enum OutputFormat {
    /// Formatted table output (default)
    #[default]
    Table,
    /// JSON output for scripting
    Json,
    /// Compact single-line output
    Compact,
}

/// Global CLI options that affect output
#[derive(Clone, Debug, Default)]
pub struct GlobalOptions {
    pub output_format: OutputFormat,
    pub quiet: bool,
    pub verbose: bool,
    pub no_color: bool,
}

/// Data that can be displayed as a table
pub trait TableDisplay {
    fn to_table(&self, options: &GlobalOptions) -> Table;
    fn to_compact(&self) -> String;
}

pub struct OutputManager {
    pub options: GlobalOptions,
}

impl OutputManager {
    pub fn new(options: GlobalOptions) -> Self {
        Self { options }
    }

    /// Display data according to the configured output format
    pub fn display<T>(&self, data: &T) -> Result<()>
    where
        T: Serialize + TableDisplay,
    {
        if self.options.quiet {
            return Ok(());
        }

        match self.options.output_format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(data)?;
                println!("{json}");
            }
            OutputFormat::Table => {
                let table = data.to_table(&self.options);
                println!("{table}");
            }
            OutputFormat::Compact => {
                println!("{}", data.to_compact());
            }
        }
        Ok(())
    }

    fn line(&self, icon: &str, message: &str, color: colored::Color) -> String {
        if self.options.no_color {
            format!("{icon} {message}")
        } else {
            format!("{} {}", icon.color(color), message.color(color))
        }
    }

    pub fn success(&self, message: &str) {
        if !self.options.quiet && self.options.output_format != OutputFormat::Json {
            println!("{}", self.line(ICONS.success, message, THEME.success));
        }
    }

    pub fn warning(&self, message: &str) {
        if !self.options.quiet {
            eprintln!("{}", self.line(ICONS.warning, message, THEME.warning));
        }
    }

    pub fn info(&self, message: &str) {
        if !self.options.quiet && self.options.output_format != OutputFormat::Json {
            println!("{}", self.line(ICONS.info, message, THEME.info));
        }
    }

    /// Only shown with `--verbose`
    pub fn verbose(&self, message: &str) {
        if self.options.verbose && !self.options.quiet {
            eprintln!("{}", self.line(ICONS.arrow, message, THEME.muted));
        }
    }

    pub fn heading(&self, text: &str) {
        if self.options.quiet || self.options.output_format == OutputFormat::Json {
            return;
        }
        let output = if self.options.no_color {
            format!("\n{text}\n{}", "=".repeat(text.chars().count()))
        } else {
            format!("\n{} {}", ICONS.book, text.color(THEME.primary).bold())
        };
        println!("{output}");
    }

    pub fn key_value(&self, key: &str, value: &str) {
        if self.options.quiet || self.options.output_format == OutputFormat::Json {
            return;
        }
        let output = if self.options.no_color {
            format!("{key}: {value}")
        } else {
            format!("{}: {}", key.color(THEME.key).bold(), value.color(THEME.value))
        };
        println!("{output}");
    }

    pub fn bullet(&self, text: &str) {
        if self.options.quiet || self.options.output_format == OutputFormat::Json {
            return;
        }
        let output = if self.options.no_color {
            format!("  {} {text}", ICONS.bullet)
        } else {
            format!("  {} {text}", ICONS.bullet.color(THEME.muted))
        };
        println!("{output}");
    }

    pub fn progress(&self, message: &str) {
        if self.options.quiet || self.options.output_format == OutputFormat::Json {
            return;
        }
        let output = if self.options.no_color {
            format!("{} {message}...", ICONS.loading)
        } else {
            format!(
                "{} {}...",
                ICONS.loading.color(THEME.highlight).bold(),
                message.color(THEME.highlight)
            )
        };
        print!("\r{output}");
        std::io::stdout().flush().ok();
    }

    pub fn clear_line(&self) {
        if self.options.quiet || self.options.output_format == OutputFormat::Json {
            return;
        }
        print!("\r{}\r", " ".repeat(80));
        std::io::stdout().flush().ok();
    }
}

fn new_table(options: &GlobalOptions, headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.load_preset(if options.no_color {
        presets::ASCII_FULL
    } else {
        presets::UTF8_FULL_CONDENSED
    });
    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|header| {
            let cell = Cell::new(header).add_attribute(Attribute::Bold);
            if options.no_color { cell } else { cell.fg(TableColor::Cyan) }
        })
        .collect();
    table.set_header(header_cells);
    table
}

fn number(value: impl ToString) -> Cell {
    Cell::new(value.to_string()).set_alignment(CellAlignment::Right)
}

fn key_value_table(options: &GlobalOptions, rows: &[(&str, String)]) -> Table {
    let mut table = new_table(options, &["Field", "Value"]);
    for (key, value) in rows {
        table.add_row(vec![Cell::new(key), Cell::new(value)]);
    }
    table
}

impl TableDisplay for Vec<Book> {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = new_table(options, &["ISBN", "Title", "Authors", "Publisher", "Category"]);
        for book in self {
            table.add_row(vec![
                Cell::new(&book.isbn),
                Cell::new(&book.title),
                Cell::new(book.authors.join(", ")),
                Cell::new(&book.publisher),
                Cell::new(categorize_book(book).as_str()),
            ]);
        }
        table
    }

    fn to_compact(&self) -> String {
        self.iter()
            .map(|book| format!("{} {}", book.isbn, book.title))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl TableDisplay for Vec<Forum> {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = new_table(options, &["ISBN", "Title", "Category", "Posts", "Rating", "Popularity"]);
        for forum in self {
            table.add_row(vec![
                Cell::new(&forum.isbn),
                Cell::new(&forum.book.title),
                Cell::new(&forum.category),
                number(forum.post_count),
                number(format!("{:.1} ({})", forum.average_rating, forum.total_ratings)),
                number(forum.popularity),
            ]);
        }
        table
    }

    fn to_compact(&self) -> String {
        self.iter()
            .map(|forum| format!("{} posts={} popularity={}", forum.isbn, forum.post_count, forum.popularity))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl TableDisplay for DailyMetrics {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        key_value_table(
            options,
            &[
                ("Date", self.date.clone()),
                ("New users", self.new_users.to_string()),
                ("New forums", self.new_forums.to_string()),
                ("New posts", self.new_posts.to_string()),
                ("New comments", self.new_comments.to_string()),
                ("New reports", self.new_reports.to_string()),
                ("Total users", self.total_users.to_string()),
                ("Total forums", self.total_forums.to_string()),
            ],
        )
    }

    fn to_compact(&self) -> String {
        format!(
            "{} users={} forums={} posts={} comments={} reports={}",
            self.date, self.new_users, self.new_forums, self.new_posts, self.new_comments, self.new_reports
        )
    }
}

impl TableDisplay for Leaderboard<PopularForum> {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = new_table(options, &["#", "ISBN", "Title", "Score", "Posts", "Comments", "Likes"]);
        for (rank, entry) in self.entries.iter().enumerate() {
            table.add_row(vec![
                number(rank + 1),
                Cell::new(&entry.isbn),
                Cell::new(&entry.title),
                number(entry.score),
                number(entry.post_count),
                number(entry.comment_count),
                number(entry.like_count),
            ]);
        }
        table
    }

    fn to_compact(&self) -> String {
        self.entries
            .iter()
            .map(|entry| format!("{}={}", entry.isbn, entry.score))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl TableDisplay for Leaderboard<PopularPost> {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = new_table(options, &["#", "ISBN", "Post", "Title", "Score", "Likes", "Comments"]);
        for (rank, entry) in self.entries.iter().enumerate() {
            table.add_row(vec![
                number(rank + 1),
                Cell::new(&entry.isbn),
                Cell::new(&entry.post_id),
                Cell::new(&entry.title),
                number(entry.score),
                number(entry.like_count),
                number(entry.comment_count),
            ]);
        }
        table
    }

    fn to_compact(&self) -> String {
        self.entries
            .iter()
            .map(|entry| format!("{}/{}={}", entry.isbn, entry.post_id, entry.score))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl TableDisplay for Totals {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        key_value_table(
            options,
            &[
                ("Forums", self.total_forums.to_string()),
                ("Posts", self.total_posts.to_string()),
                ("Comments", self.total_comments.to_string()),
            ],
        )
    }

    fn to_compact(&self) -> String {
        format!(
            "forums={} posts={} comments={}",
            self.total_forums, self.total_posts, self.total_comments
        )
    }
}
