use anyhow::Result;
use farm::LinkMode;

use super::Overrides;
use crate::Context;
use crate::cli::ManageArgs;
use crate::progress::ExecProgress;

pub fn run(ctx: &Context, args: ManageArgs) -> Result<()> {
    let overrides = Overrides {
        policy: args.conflicts.policy(),
        link_mode: args.absolute.then_some(LinkMode::Absolute),
        jobs: args.jobs,
    };
    let client = super::client(ctx, overrides)?;

    if ctx.dry_run {
        let plan = client.plan_manage(&args.packages)?;
        super::print_plan(&plan, "manage");
        return Ok(());
    }

    let mut progress = ExecProgress::new(ctx.quiet);
    let result = client.manage(&args.packages, &mut progress)?;
    super::print_result(
        ctx,
        &result,
        &format!("Managed {}", args.packages.join(", ")),
    );
    Ok(())
}
