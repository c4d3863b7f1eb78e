//! CLI command implementations.

pub(crate) mod build;
pub(crate) mod get;
pub(crate) mod status;
pub(crate) mod watch;

pub(crate) use build::BuildArgs;
pub(crate) use get::GetArgs;
pub(crate) use status::StatusArgs;

use std::path::{Path, PathBuf};

use clap::Args;
use folio_config::{CliSettings, Config, Policy};
use folio_site::{
    CheckOutcome, FreshnessPolicy, LiveProject, PassthroughRenderer, ProjectConfig, RebuildReport,
};

use crate::error::CliError;
use crate::output::Output;

/// Options shared by every command.
#[derive(Args, Debug, Default)]
pub(crate) struct ProjectArgs {
    /// Path to configuration file (default: auto-discover folio.toml).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Page source directory (overrides config).
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Build output directory (overrides config).
    #[arg(long, global = true)]
    build_dir: Option<PathBuf>,

    /// Glob selecting page sources (overrides config).
    #[arg(long, global = true)]
    glob: Option<String>,

    /// Serve current content and rebuild in the background.
    #[arg(long, global = true)]
    non_blocking: bool,

    /// Enable verbose output (rebuild progress logs).
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl ProjectArgs {
    /// Load configuration with command-line overrides applied.
    pub(crate) fn load_config(&self) -> Result<Config, CliError> {
        let cli_settings = CliSettings {
            root_path: self.root.clone(),
            build_path: self.build_dir.clone(),
            glob: self.glob.clone(),
            policy: self.non_blocking.then_some(Policy::NonBlocking),
        };
        Ok(Config::load(self.config.as_deref(), Some(&cli_settings))?)
    }

    /// Load configuration and open the project it describes.
    pub(crate) fn open(&self) -> Result<(Config, LiveProject), CliError> {
        let config = self.load_config()?;
        ensure_build_dir(&config.project_resolved.build_path)?;
        let project = LiveProject::open(project_config(&config), PassthroughRenderer)?;
        Ok((config, project))
    }
}

fn project_config(config: &Config) -> ProjectConfig {
    let project = &config.project_resolved;
    ProjectConfig {
        root_path: project.root_path.clone(),
        build_path: project.build_path.clone(),
        glob: project.glob.clone(),
        output_extension: project.output_extension.clone(),
        policy: match config.freshness.policy {
            Policy::Blocking => FreshnessPolicy::Blocking,
            Policy::NonBlocking => FreshnessPolicy::NonBlocking,
        },
        retry_failed: config.freshness.retry_failed,
    }
}

/// Ensure the build directory exists with a `.gitignore`.
fn ensure_build_dir(build_dir: &Path) -> Result<(), CliError> {
    std::fs::create_dir_all(build_dir)?;

    let gitignore_path = build_dir.join(".gitignore");
    if !gitignore_path.exists() {
        let _ = std::fs::write(&gitignore_path, "# Automatically created by folio\n*\n");
    }

    Ok(())
}

/// Print a freshness check outcome.
pub(crate) fn print_outcome(output: &Output, outcome: &CheckOutcome) {
    match outcome {
        CheckOutcome::Completed(report) => print_report(output, report),
        CheckOutcome::Coalesced => {
            output.info("Already up to date (covered by a concurrent rebuild)");
        }
        CheckOutcome::Scheduled => output.info("Rebuild scheduled in the background"),
    }
}

/// Print a rebuild pass summary.
pub(crate) fn print_report(output: &Output, report: &RebuildReport) {
    for warning in &report.warnings {
        output.warning(&format!("Warning: {warning}"));
    }

    if report.is_noop() {
        output.success("Up to date");
        return;
    }

    output.success(&summary(report));
    for id in &report.rendered {
        output.detail(&format!("  rendered {}", display_id(id.as_str())));
    }
    for id in &report.evicted {
        output.detail(&format!("  removed  {}", display_id(id.as_str())));
    }
    for failure in &report.failures {
        output.error(&format!("  {failure}"));
    }
}

fn summary(report: &RebuildReport) -> String {
    let affected = &report.affected;
    format!(
        "Rendered {} page(s) in {:.1?} ({} added, {} modified, {} removed, {} failed)",
        report.rendered.len(),
        report.elapsed,
        affected.added.len(),
        affected.modified.len(),
        report.evicted.len(),
        report.failures.len(),
    )
}

/// Page identifier as shown to users; the root page has an empty id.
pub(crate) fn display_id(id: &str) -> &str {
    if id.is_empty() { "(root)" } else { id }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_site::{AffectedSet, PageId};
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn test_non_blocking_flag_sets_policy() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("folio.toml");
        std::fs::write(&path, "").unwrap();
        let args = ProjectArgs {
            config: Some(path),
            non_blocking: true,
            ..ProjectArgs::default()
        };

        let config = args.load_config().unwrap();

        assert_eq!(config.freshness.policy, Policy::NonBlocking);
        assert_eq!(project_config(&config).policy, FreshnessPolicy::NonBlocking);
    }

    #[test]
    fn test_flags_override_paths() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("folio.toml");
        std::fs::write(&path, "[freshness]\nretry_failed = true\n").unwrap();
        let args = ProjectArgs {
            config: Some(path),
            root: Some(PathBuf::from("/srv/book")),
            glob: Some("**/*.htm".to_owned()),
            ..ProjectArgs::default()
        };

        let project = project_config(&args.load_config().unwrap());

        assert_eq!(project.root_path, PathBuf::from("/srv/book"));
        assert_eq!(project.build_path, dir.path().join(".folio/build"));
        assert_eq!(project.glob, "**/*.htm");
        assert!(project.retry_failed);
    }

    #[test]
    fn test_ensure_build_dir_writes_gitignore() {
        let dir = tempfile::TempDir::new().unwrap();
        let build = dir.path().join(".folio/build");

        ensure_build_dir(&build).unwrap();

        let gitignore = std::fs::read_to_string(build.join(".gitignore")).unwrap();
        assert!(gitignore.ends_with("*\n"));
    }

    #[test]
    fn test_summary() {
        let report = RebuildReport {
            affected: AffectedSet {
                added: vec![PageId::new("a")],
                modified: vec![PageId::new("b")],
                ..AffectedSet::default()
            },
            rendered: vec![PageId::new("a")],
            evicted: vec![PageId::new("c")],
            elapsed: Duration::from_millis(12),
            ..RebuildReport::default()
        };

        assert_eq!(
            summary(&report),
            "Rendered 1 page(s) in 12.0ms (1 added, 1 modified, 1 removed, 0 failed)"
        );
    }

    #[test]
    fn test_display_id() {
        assert_eq!(display_id(""), "(root)");
        assert_eq!(display_id("chapter 1"), "chapter 1");
    }
}
