//! `folio status` command implementation.

use clap::Args;

use super::{ProjectArgs, display_id};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the status command.
#[derive(Args)]
pub(crate) struct StatusArgs {
    /// List every known page.
    #[arg(short, long)]
    pages: bool,
}

impl StatusArgs {
    /// Execute the status command.
    ///
    /// Compares the source tree against the last build without rendering.
    pub(crate) fn execute(self, project_args: &ProjectArgs) -> Result<(), CliError> {
        let output = Output::new();
        let (_config, project) = project_args.open()?;

        let pages = project.pages();
        let failed = project.failed_pages();
        output.info(&format!(
            "{} page(s) in last build, {} failed",
            pages.len(),
            failed.len()
        ));
        if self.pages {
            for page in &pages {
                output.detail(&format!("  {}", display_id(page.id.as_str())));
            }
        }
        for id in &failed {
            output.error(&format!("  failed   {}", display_id(id.as_str())));
        }

        let (affected, warnings) = project.pending_changes()?;
        for warning in &warnings {
            output.warning(&format!("Warning: {warning}"));
        }
        if affected.is_empty() {
            output.success("Up to date");
            return Ok(());
        }

        output.warning(&format!("{} page(s) need rebuilding", affected.len()));
        let changes = [
            ("added", &affected.added),
            ("modified", &affected.modified),
            ("removed", &affected.removed),
            ("retry", &affected.retried),
        ];
        for (label, ids) in changes {
            for id in ids {
                output.info(&format!("  {label:<8} {}", display_id(id.as_str())));
            }
        }
        Ok(())
    }
}
