use anyhow::{Context as _, Result};
use colored::Colorize;
use farm::PackageStatus;
use manifest::PackageSource;

use super::Overrides;
use crate::Context;
use crate::cli::StatusArgs;
use crate::ui::{self, Mark};

pub fn run(ctx: &Context, args: StatusArgs) -> Result<()> {
    let client = super::client(ctx, Overrides::default())?;
    let statuses = client.status(&args.packages)?;

    if args.json {
        return print_json(&statuses);
    }

    if statuses.is_empty() {
        if args.packages.is_empty() {
            ui::status(Mark::Note, "No packages are installed");
        } else {
            ui::status(
                Mark::Warn,
                &format!("Not installed: {}", args.packages.join(", ")),
            );
        }
        return Ok(());
    }

    ui::title("Package Status");
    for status in &statuses {
        print_status(ctx, status);
    }

    let unknown: Vec<&str> = args
        .packages
        .iter()
        .map(String::as_str)
        .filter(|name| !statuses.iter().any(|s| s.name == *name))
        .collect();
    if !unknown.is_empty() {
        println!();
        ui::status(Mark::Warn, &format!("Not installed: {}", unknown.join(", ")));
    }
    Ok(())
}

/// One line per installed package
pub fn list(ctx: &Context, json: bool) -> Result<()> {
    let client = super::client(ctx, Overrides::default())?;
    let packages = client.list()?;

    if json {
        return print_json(&packages);
    }

    if packages.is_empty() {
        ui::status(Mark::Note, "No packages are installed");
        return Ok(());
    }

    for status in &packages {
        println!(
            "{} {:<20} {}",
            ui::health(status.health.is_healthy()),
            status.name.bold(),
            ui::plural(status.link_count, "link").dimmed()
        );
    }
    if !ctx.quiet {
        println!();
        ui::muted(&ui::plural(packages.len(), "package"));
    }
    Ok(())
}

fn print_json(statuses: &[PackageStatus]) -> Result<()> {
    let json = serde_json::to_string_pretty(statuses).context("Could not serialize status")?;
    println!("{json}");
    Ok(())
}

fn print_status(ctx: &Context, status: &PackageStatus) {
    let health = &status.health;
    let state = if health.is_healthy() {
        "healthy".green()
    } else {
        "degraded".yellow()
    };
    ui::group(&status.name);
    ui::field("state", &state.to_string());
    ui::field(
        "installed",
        &status.installed_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    );
    ui::field(
        "source",
        match status.source {
            PackageSource::Managed => "managed",
            PackageSource::Adopted => "adopted",
        },
    );
    ui::field(
        "links",
        &format!(
            "{} ({} ok, {} broken, {} missing)",
            status.link_count, health.correct, health.broken, health.missing
        ),
    );
    if let Some(hash) = &status.hash {
        ui::field("hash", hash.get(..12).unwrap_or(hash));
    }
    if ctx.verbose > 0 {
        for link in &status.links {
            ui::muted(link);
        }
    }
}
