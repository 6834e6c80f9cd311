pub mod commands;
pub mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use winquote_core::config::{AppConfig, LoadOptions};

#[derive(Debug, Parser)]
#[command(
    name = "winquote",
    about = "Window and door quote configurator",
    long_about = "Price window configurations, inspect and reset the product catalog, and import supplier profile catalogs from PDF.",
    after_help = "Examples:\n  winquote quote --width 120 --height 140 --select material=pvc\n  winquote catalog import listino.pdf\n  winquote config"
)]
pub struct Cli {
    #[arg(long, global = true, value_name = "PATH", help = "Read settings from this TOML file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Walk the configuration wizard and print the summary with its estimate")]
    Quote {
        #[arg(long, help = "Window width in centimetres")]
        width: Option<Decimal>,
        #[arg(long, help = "Window height in centimetres")]
        height: Option<Decimal>,
        #[arg(
            long = "select",
            value_name = "CATEGORY=OPTION",
            help = "Choose an option for a category; repeatable"
        )]
        selections: Vec<String>,
        #[arg(long, default_value_t = 0, help = "Step back this many times after advancing")]
        back: usize,
    },
    #[command(subcommand, about = "Inspect, import into, or reset the product catalog")]
    Catalog(CatalogCommand),
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
}

#[derive(Debug, Subcommand)]
enum CatalogCommand {
    #[command(about = "Print every category, or one category with its options")]
    Show { category: Option<String> },
    #[command(about = "Extract frame and sash profiles from a supplier PDF and merge them")]
    Import {
        file: PathBuf,
        #[arg(long, help = "Declared MIME type; inferred from the extension when omitted")]
        mime: Option<String>,
    },
    #[command(about = "Discard imported options and restore the built-in catalog")]
    Reset {
        #[arg(long, help = "Confirm that imported options may be discarded")]
        yes: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = LoadOptions { config_path: cli.config, ..LoadOptions::default() };

    // Config errors are reported by the command itself.
    if let Ok(config) = AppConfig::load(options.clone()) {
        logging::init_logging(&config.logging);
    }

    let result = match cli.command {
        Command::Quote { width, height, selections, back } => commands::quote::run(
            &options,
            commands::quote::QuoteArgs { width, height, selections, back },
        ),
        Command::Catalog(CatalogCommand::Show { category }) => {
            commands::catalog::show(&options, category.as_deref())
        }
        Command::Catalog(CatalogCommand::Import { file, mime }) => {
            commands::catalog::import(&options, &file, mime)
        }
        Command::Catalog(CatalogCommand::Reset { yes }) => commands::catalog::reset(&options, yes),
        Command::Config => commands::config::run(&options),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
