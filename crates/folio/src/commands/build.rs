//! `folio build` command implementation.

use clap::Args;
use folio_site::CheckOutcome;

use super::{ProjectArgs, print_outcome, print_report, watch};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the build command.
#[derive(Args)]
pub(crate) struct BuildArgs {
    /// Render every page, not just the changed ones.
    #[arg(short, long)]
    force: bool,
}

impl BuildArgs {
    /// Execute the build command.
    ///
    /// Keeps watching afterwards when `[watch] enabled` is set.
    pub(crate) fn execute(self, project_args: &ProjectArgs) -> Result<(), CliError> {
        let output = Output::new();
        let (config, project) = project_args.open()?;

        output.info(&format!(
            "Source directory: {}",
            config.project_resolved.root_path.display()
        ));
        output.info(&format!(
            "Build directory: {}",
            config.project_resolved.build_path.display()
        ));

        let failures = if self.force {
            let report = project.rebuild_all()?;
            print_report(&output, &report);
            report.failures.len()
        } else {
            let outcome = project.refresh()?;
            print_outcome(&output, &outcome);
            match outcome {
                CheckOutcome::Completed(report) => report.failures.len(),
                CheckOutcome::Coalesced | CheckOutcome::Scheduled => 0,
            }
        };

        if config.watch.enabled {
            return watch::watch_until_interrupted(&output, &config, &project);
        }
        if failures > 0 {
            return Err(CliError::RenderFailed(failures));
        }
        Ok(())
    }
}
