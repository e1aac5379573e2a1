use anyhow::Result;

use super::Overrides;
use crate::Context;
use crate::cli::PackagesArgs;
use crate::progress::ExecProgress;

pub fn run(ctx: &Context, args: PackagesArgs) -> Result<()> {
    let overrides = Overrides {
        policy: args.conflicts.policy(),
        jobs: args.jobs,
        ..Overrides::default()
    };
    let client = super::client(ctx, overrides)?;

    if ctx.dry_run {
        let plan = client.plan_remanage(&args.packages)?;
        super::print_plan(&plan, "remanage");
        return Ok(());
    }

    let mut progress = ExecProgress::new(ctx.quiet);
    let result = client.remanage(&args.packages, &mut progress)?;
    super::print_result(
        ctx,
        &result,
        &format!("Remanaged {}", args.packages.join(", ")),
    );
    Ok(())
}
