//! Terminal progress for plan execution

use crate::ui;
use colored::Colorize;
use farm::{ExecutionResult, Operation, ProgressCallback};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

const BAR_TEMPLATE: &str = "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}";

/// Progress bar over the operations of one execution
pub struct ExecProgress {
    bar: ProgressBar,
    hidden: bool,
}

impl ExecProgress {
    pub fn new(quiet: bool) -> Self {
        let bar = ProgressBar::hidden();
        Self { bar, hidden: quiet }
    }
}

impl ProgressCallback for ExecProgress {
    fn on_start(&mut self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        if !self.hidden {
            self.bar.set_draw_target(ProgressDrawTarget::stderr());
        }
        let style = ProgressStyle::default_bar()
            .template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        self.bar.set_style(style);
    }

    fn on_operation_complete(&mut self, operation: &Operation, success: bool) {
        let path = operation.primary_path().as_path().to_string_lossy();
        let msg = ui::truncate_path(&path, 40);
        if success {
            self.bar.set_message(msg);
        } else {
            self.bar
                .println(format!("{} {}", "✗".red(), operation));
            self.bar.set_message(msg.red().to_string());
        }
        self.bar.inc(1);
    }

    fn on_rollback(&mut self, count: usize) {
        self.bar
            .println(format!("{} rolling back {}", "↺".yellow(), ui::plural(count, "operation")));
    }

    fn on_finish(&mut self, result: &ExecutionResult) {
        log::debug!(
            "execution_finished executed={} failed={} rolled_back={}",
            result.executed.len(),
            result.failed.len(),
            result.rolled_back.len()
        );
        self.bar.finish_and_clear();
    }
}
