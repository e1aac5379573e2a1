mod cli;
mod commands;
mod config;
mod paths;
mod progress;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command};
use colored::Colorize;
use config::DotConfig;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub verbose: u8,
    pub quiet: bool,
    pub dry_run: bool,
    pub config: DotConfig,
    /// `--dir`, overriding `directories.package`
    pub dir: Option<PathBuf>,
    /// `--target`, overriding `directories.target`
    pub target: Option<PathBuf>,
}

fn main() -> ExitCode {
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

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Command::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "dot", &mut io::stdout());
        return Ok(());
    }

    let ctx = Context {
        verbose: cli.verbose,
        quiet: cli.quiet,
        dry_run: cli.dry_run,
        config: DotConfig::load(cli.config.as_deref())?,
        dir: cli.dir,
        target: cli.target,
    };

    match cli.command {
        Command::Manage(args) => commands::manage::run(&ctx, args),
        Command::Unmanage(args) => commands::unmanage::run(&ctx, args),
        Command::Remanage(args) => commands::remanage::run(&ctx, args),
        Command::Adopt(args) => commands::adopt::run(&ctx, args),
        Command::Status(args) => commands::status::run(&ctx, args),
        Command::List(args) => commands::status::list(&ctx, args.json),
        Command::Doctor(args) => commands::doctor::run(&ctx, args),
        Command::Completions { .. } => Ok(()),
    }
}

/// Print an error with its cause chain and, for core errors, advice
fn report(err: &anyhow::Error) {
    ui::status(ui::Mark::Fail, &err.to_string());
    for cause in err.chain().skip(1) {
        eprintln!("  {} {cause}", "caused by:".dimmed());
    }

    if let Some(farm_err) = err.downcast_ref::<farm::Error>() {
        if let farm::Error::Conflicts(conflicts) = farm_err {
            commands::print_conflicts(conflicts);
        }
        let category = farm_err.category();
        eprintln!(
            "  {} {}: {}",
            "hint:".cyan(),
            category.description(),
            category.advice()
        );
    }
}
