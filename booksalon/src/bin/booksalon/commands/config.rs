use anyhow::Result;
use clap::Subcommand;

use crate::context::AppContext;
use crate::examples::ExampleGroup;
use crate::output::OutputManager;

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Configuration",
    commands: &[
        "booksalon config show                       # Print the effective configuration",
        "booksalon --config prod.toml config check   # Validate a config file",
    ],
}];

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration as TOML (API key masked)
    #[command(name = "show")]
    Show,

    /// Validate the configuration file
    #[command(name = "check")]
    Check,
}

pub fn handle_config_commands(command: ConfigCommands, ctx: &AppContext, output: &OutputManager) -> Result<()> {
    match command {
        ConfigCommands::Show => {
            let mut config = ctx.config.clone();
            if !config.books.api_key.is_empty() {
                config.books.api_key = "********".to_string();
            }
            println!("{}", config.to_toml()?);
        }
        ConfigCommands::Check => {
            if !ctx.config_exists() {
                output.warning(&format!("{} not found; defaults are in use", ctx.config_path.display()));
            }
            output.key_value("store", &format!("{:?}", ctx.config.store.backend));
            output.key_value("prefix", &ctx.config.store.prefix);
            output.key_value("utc offset", &ctx.config.jobs.utc_offset);
            output.success("Configuration is valid");
        }
    }
    Ok(())
}
