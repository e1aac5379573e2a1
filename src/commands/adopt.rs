use anyhow::{Context as _, Result};
use std::path::PathBuf;

use super::Overrides;
use crate::Context;
use crate::cli::AdoptArgs;
use crate::progress::ExecProgress;

/// Files named on the command line are relative to the target directory
/// unless absolute.
pub fn run(ctx: &Context, args: AdoptArgs) -> Result<()> {
    let client = super::client(ctx, Overrides::default())?;
    let target = client.config().target_dir.as_path().to_path_buf();
    let files: Vec<PathBuf> = args
        .files
        .iter()
        .map(|file| {
            if file.is_absolute() {
                file.clone()
            } else {
                target.join(file)
            }
        })
        .collect();

    if ctx.dry_run {
        let plan = client
            .plan_adopt(&files, &args.package)
            .with_context(|| format!("Could not plan adopting into '{}'", args.package))?;
        super::print_plan(&plan, "adopt");
        return Ok(());
    }

    let mut progress = ExecProgress::new(ctx.quiet);
    let result = client
        .adopt(&files, &args.package, &mut progress)
        .with_context(|| format!("Could not adopt into '{}'", args.package))?;
    super::print_result(
        ctx,
        &result,
        &format!("Adopted {} into {}", crate::ui::plural(files.len(), "file"), args.package),
    );
    Ok(())
}
