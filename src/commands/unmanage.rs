use anyhow::Result;

use super::Overrides;
use crate::Context;
use crate::cli::UnmanageArgs;
use crate::progress::ExecProgress;
use crate::ui;

pub fn run(ctx: &Context, args: UnmanageArgs) -> Result<()> {
    let client = super::client(ctx, Overrides::default())?;

    let packages = if args.all {
        let installed: Vec<String> = client.list()?.into_iter().map(|s| s.name).collect();
        if installed.is_empty() {
            if !ctx.quiet {
                ui::status(ui::Mark::Note, "No packages are installed");
            }
            return Ok(());
        }
        installed
    } else {
        args.packages
    };

    if ctx.dry_run {
        let plan = client.plan_unmanage(&packages)?;
        super::print_plan(&plan, "unmanage");
        return Ok(());
    }

    let mut progress = ExecProgress::new(ctx.quiet);
    let result = if args.all {
        client.unmanage_all(&mut progress)?
    } else {
        client.unmanage(&packages, &mut progress)?
    };
    super::print_result(ctx, &result, &format!("Unmanaged {}", packages.join(", ")));
    Ok(())
}
