//! `folio get` command implementation.

use clap::Args;

use super::ProjectArgs;
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the get command.
#[derive(Args)]
pub(crate) struct GetArgs {
    /// Page identifier (e.g. "chapter 1/1.1. Welcome") or unique page title.
    title: String,
}

impl GetArgs {
    /// Execute the get command.
    pub(crate) fn execute(self, project_args: &ProjectArgs) -> Result<(), CliError> {
        let output = Output::new();
        let (_config, project) = project_args.open()?;

        let content = project
            .get_rendered_content(&self.title)?
            .ok_or(CliError::NotFound(self.title))?;
        output.content(&content)?;
        Ok(())
    }
}
