use anyhow::{Context as _, Result, bail};
use colored::Colorize;
use farm::{DiagnosticReport, HealthStatus, Issue, IssueSeverity};

use super::Overrides;
use crate::Context;
use crate::cli::DoctorArgs;
use crate::ui::{self, Mark};

pub fn run(ctx: &Context, args: DoctorArgs) -> Result<()> {
    let client = super::client(ctx, Overrides::default())?;

    let mut scan = client.config().scan.clone();
    if let Some(mode) = args.scan_mode {
        scan.mode = mode.into();
    }
    if let Some(depth) = args.max_depth {
        scan.max_depth = depth;
    }
    scan.skip_patterns.extend(args.skip);
    if let Some(max) = args.max_issues {
        scan.max_issues = max;
    }
    log::debug!(
        "doctor_scan mode={} max_depth={} max_issues={}",
        scan.mode,
        scan.max_depth,
        scan.max_issues
    );

    let report = client.doctor_with_scan(&scan)?;

    if args.json {
        let json =
            serde_json::to_string_pretty(&report).context("Could not serialize doctor report")?;
        println!("{json}");
        return match report.health {
            HealthStatus::Errors => bail!("doctor found errors"),
            HealthStatus::Warnings | HealthStatus::Ok => Ok(()),
        };
    }

    ui::title("Link Health Check");
    print_stats(&report);

    println!();
    if report.issues.is_empty() {
        ui::status(Mark::Ok, "All links healthy!");
    } else {
        print_issue_summary(&report.issues);
    }
    if report.truncated {
        ui::status(
            Mark::Warn,
            &format!(
                "Orphan scan stopped after {}; raise --max-issues to see more",
                ui::plural(scan.max_issues, "issue")
            ),
        );
    }

    match report.health {
        HealthStatus::Errors => bail!(
            "{} found",
            ui::plural(report.count(IssueSeverity::Error), "error")
        ),
        HealthStatus::Warnings | HealthStatus::Ok => Ok(()),
    }
}

fn print_stats(report: &DiagnosticReport) {
    let stats = &report.stats;
    ui::field("recorded", &ui::plural(stats.total_links, "link"));
    ui::field("managed", &ui::plural(stats.managed_links, "link"));
    ui::field("broken", &ui::plural(stats.broken_links, "link"));
    ui::field("orphaned", &ui::plural(stats.orphaned_links, "link"));
}

fn print_issue_summary(issues: &[Issue]) {
    let count = issues.len();
    let label = if count == 1 { "Issue" } else { "Issues" };
    ui::title(&format!("{count} {label} Found"));

    for (i, issue) in issues.iter().enumerate() {
        ui::finding(
            i + 1,
            &format!("{} {}", issue.path.display(), ui::issue_severity(issue.severity)),
            &issue.kind.to_string(),
        );
        for line in issue.message.lines() {
            println!("      {}", line.dimmed());
        }
        if let Some(fix) = &issue.suggestion {
            ui::fix(fix, None);
        }
        println!();
    }

    let fixes: Vec<&str> = issues
        .iter()
        .filter_map(|i| i.suggestion.as_deref())
        .filter_map(|s| s.strip_prefix("Run '").and_then(|s| s.split('\'').next()))
        .collect();
    if !fixes.is_empty() {
        let mut fixes = fixes;
        fixes.sort_unstable();
        fixes.dedup();
        ui::group("Quick Fixes");
        println!(
            "  {}",
            "Run these commands to resolve the issues above:".dimmed()
        );
        println!();
        for cmd in &fixes {
            println!("    {}", cmd.bold());
        }
    }
}
