//! `folio watch` command implementation.

use folio_config::Config;
use folio_site::{CheckOutcome, LiveProject};

use super::{ProjectArgs, print_outcome, print_report};
use crate::error::CliError;
use crate::output::Output;

/// Execute the watch command.
pub(crate) fn execute(project_args: &ProjectArgs) -> Result<(), CliError> {
    let output = Output::new();
    let (config, project) = project_args.open()?;

    print_outcome(&output, &project.refresh()?);
    watch_until_interrupted(&output, &config, &project)
}

/// Rebuild on every source change until the process is interrupted.
pub(crate) fn watch_until_interrupted(
    output: &Output,
    config: &Config,
    project: &LiveProject,
) -> Result<(), CliError> {
    let _watch = project.watch(config.watch.debounce(), |result| {
        let output = Output::new();
        match result {
            Ok(CheckOutcome::Completed(report)) => print_report(&output, &report),
            Ok(CheckOutcome::Coalesced | CheckOutcome::Scheduled) => {}
            Err(e) => output.error(&format!("Rebuild failed: {e}")),
        }
    })?;

    output.info(&format!(
        "Watching {} (press Ctrl-C to stop)",
        config.project_resolved.root_path.display()
    ));
    loop {
        std::thread::park();
    }
}
