//! Command implementations
//!
//! Each command builds a [`farm::Client`] from the loaded config plus its
//! own flags, then either renders a plan (`--dry-run`) or executes it.

pub mod adopt;
pub mod doctor;
pub mod manage;
pub mod remanage;
pub mod status;
pub mod unmanage;

use anyhow::{Context as _, Result};
use colored::Colorize;
use farm::{
    Client, ClientConfig, DotfileTranslator, ExecuteOptions, ExecutionResult, FilePath, IgnoreSet,
    LinkMode, PackagePath, Plan, ResolutionPolicies, ResolutionPolicy, TargetPath, WarningSeverity,
};
use std::path::PathBuf;

use crate::Context;
use crate::config::{self, DotConfig};
use crate::paths;
use crate::ui::{self, Mark};

/// Per-command settings that override the config file
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub policy: Option<ResolutionPolicy>,
    pub link_mode: Option<LinkMode>,
    pub jobs: Option<usize>,
}

/// Resolve package and target directories: flags first, then config
pub fn directories(ctx: &Context) -> Result<(PathBuf, PathBuf)> {
    let package = match &ctx.dir {
        Some(dir) => config::absolute(dir)?,
        None => ctx.config.package_dir()?,
    };
    let target = match &ctx.target {
        Some(dir) => config::absolute(dir)?,
        None => ctx.config.target_dir()?,
    };
    Ok((package, target))
}

/// Merge config and flags into a [`ClientConfig`]
pub fn client_config(ctx: &Context, overrides: Overrides) -> Result<ClientConfig> {
    let (package, target) = directories(ctx)?;
    let package_dir = PackagePath::new(&package)
        .with_context(|| format!("Invalid package directory: {}", package.display()))?;
    let target_dir = TargetPath::new(&target)
        .with_context(|| format!("Invalid target directory: {}", target.display()))?;

    let config: &DotConfig = &ctx.config;
    let mut client_config = ClientConfig::new(package_dir, target_dir);

    let policy = overrides.policy.unwrap_or(config.symlinks.on_conflict);
    client_config.planner.policies = ResolutionPolicies::uniform(policy);
    client_config.planner.translator = if config.dotfile.translate {
        DotfileTranslator::new(config.dotfile.prefix.clone())
    } else {
        DotfileTranslator::disabled()
    };

    let mut ignore = if config.ignore.use_defaults {
        IgnoreSet::with_defaults()
    } else {
        IgnoreSet::new()
    };
    for pattern in &config.ignore.patterns {
        ignore
            .add(pattern)
            .with_context(|| format!("Invalid ignore pattern '{pattern}'"))?;
    }
    client_config.planner.ignore = ignore;

    client_config
        .planner
        .backup_suffix
        .clone_from(&config.symlinks.backup_suffix);
    if let Some(dir) = &config.symlinks.backup_dir {
        let dir = config::absolute(&paths::expand(dir))?;
        client_config.planner.backup_dir = Some(
            FilePath::new(&dir)
                .with_context(|| format!("Invalid backup directory: {}", dir.display()))?,
        );
    }

    let jobs = overrides.jobs.unwrap_or(config.operations.max_parallel);
    client_config.execute = ExecuteOptions {
        jobs: if jobs == 0 {
            farm::executor::default_jobs()
        } else {
            jobs
        },
        link_mode: overrides.link_mode.unwrap_or(config.symlinks.mode),
        ..ExecuteOptions::default()
    };
    client_config.scan = config.doctor.scan_config();

    log::debug!(
        "client_config package={} target={} policy={:?} jobs={}",
        package.display(),
        target.display(),
        policy,
        client_config.execute.jobs
    );
    Ok(client_config)
}

pub fn client(ctx: &Context, overrides: Overrides) -> Result<Client> {
    let config = client_config(ctx, overrides)?;
    Ok(Client::new(config)?)
}

/// Render a plan without executing it
pub fn print_plan(plan: &Plan, verb: &str) {
    ui::title(&format!("Dry run: {verb}"));

    if plan.is_empty() {
        ui::status(Mark::Note, "Nothing to do");
    } else {
        for package in plan.package_names() {
            let ops = plan.operations_for_package(package);
            if ops.is_empty() {
                continue;
            }
            ui::group(package);
            for op in ops {
                println!("  {} {}", ui::op_kind(op.kind()), op);
            }
        }
    }

    print_warnings(plan);

    if let Some(batches) = &plan.batches
        && batches.len() > 1
    {
        ui::group("Batches");
        for (i, batch) in batches.iter().enumerate() {
            ui::field(&format!("#{}", i + 1), &ui::plural(batch.len(), "operation"));
        }
    }

    println!();
    ui::muted(&format!(
        "{} across {}, {}",
        ui::plural(plan.metadata.operation_count, "operation"),
        ui::plural(plan.metadata.package_count, "package"),
        ui::plural(plan.metadata.link_count, "link")
    ));
}

fn print_warnings(plan: &Plan) {
    let meta = &plan.metadata;
    if meta.warnings.is_empty() && meta.conflicts.is_empty() {
        return;
    }
    ui::group("Warnings");
    for conflict in &meta.conflicts {
        println!("  {} {conflict}", ui::warning_mark(WarningSeverity::Caution));
    }
    for warning in &meta.warnings {
        println!("  {} {}", ui::warning_mark(warning.severity), warning.message);
    }
}

/// Summarize a finished execution
pub fn print_result(ctx: &Context, result: &ExecutionResult, done: &str) {
    if ctx.quiet {
        return;
    }
    if result.executed.is_empty() {
        ui::status(Mark::Note, "Nothing to do");
    } else {
        ui::status(
            Mark::Ok,
            &format!("{done} ({})", ui::plural(result.executed.len(), "operation")),
        );
    }
}

/// Print conflicts with their suggestions
pub fn print_conflicts(conflicts: &[farm::Conflict]) {
    let label = if conflicts.len() == 1 {
        "Conflict"
    } else {
        "Conflicts"
    };
    ui::title(&format!("{} {label} Found", conflicts.len()));
    for (i, conflict) in conflicts.iter().enumerate() {
        ui::finding(i + 1, &conflict.path.display().to_string(), &conflict.kind.to_string());
        println!("      {}", conflict.details.dimmed());
        for suggestion in &conflict.suggestions {
            ui::fix(&suggestion.action, Some(&suggestion.explanation));
        }
        println!();
    }
}
