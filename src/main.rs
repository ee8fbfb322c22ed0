mod cli;
mod commands;
mod config;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use config::Settings;
use std::io;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };
    let prefix = cli.prefix.as_deref();

    match cli.command {
        Command::Facts(args) => commands::facts::run(&ctx, &Settings::load()?, prefix, args),
        Command::Apply(args) => commands::apply::run(&ctx, &Settings::load()?, prefix, args),
        Command::Diff(args) => commands::diff::run(&ctx, &Settings::load()?, args),
        Command::Validate(args) => commands::validate::run(&ctx, args),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "dsconverge", &mut io::stdout());
            Ok(())
        }
    }
}
