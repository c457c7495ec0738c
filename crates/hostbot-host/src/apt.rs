//! Package manager (apt).

use hostbot_core::Result;
use tracing::info;

use crate::command::{run_checked, CommandRunner, Invocation};

fn apt<const N: usize>(args: [&str; N]) -> Invocation {
    Invocation::new("apt", args).privileged()
}

/// Refresh the package index, then return the raw upgradable listing.
/// A failed refresh aborts before the listing is taken.
pub async fn check_updates(runner: &dyn CommandRunner) -> Result<String> {
    run_checked(runner, &apt(["update"])).await?;
    run_checked(runner, &apt(["list", "--upgradable"])).await
}

pub async fn upgrade(runner: &dyn CommandRunner) -> Result<()> {
    let out = run_checked(runner, &apt(["upgrade", "-y"])).await?;
    info!(output_lines = out.lines().count(), "apt upgrade finished");
    Ok(())
}
