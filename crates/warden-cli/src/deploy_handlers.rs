//! Handler functions for `warden deploy`, `warden validate` and `warden plan`.

use std::io::Write;

use warden_catalog::{Catalog, ValidationResult};
use warden_core::{Error, Result};
use warden_deploy::{
    DeploymentReport, Deployer, ItemResult, Observer, Stage, StageReport, Statement, plan,
};

use crate::cli::{DeployArgs, StageArg};
use crate::config::WardenConfig;

const RULE: &str = "============================================================";

// ============================================================================
// Console progress
// ============================================================================

/// Prints per-stage headings, one line per rule and a per-stage tally.
pub struct ConsoleProgress<W: Write> {
    out: W,
    quiet: bool,
    stage: Stage,
}

impl<W: Write> ConsoleProgress<W> {
    /// Progress written to `out`. `quiet` keeps only the tallies.
    pub fn new(out: W, quiet: bool) -> Self {
        Self {
            out,
            quiet,
            stage: Stage::Buckets,
        }
    }

    /// The underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn verb(&self) -> &'static str {
        match self.stage {
            Stage::Buckets => "Creating",
            Stage::StorageAcl | Stage::Policies => "Applying",
        }
    }
}

// Console writes are best effort; a closed pipe must not abort a deployment.
impl<W: Write> Observer for ConsoleProgress<W> {
    fn stage_started(&mut self, stage: Stage, total: usize) {
        self.stage = stage;
        let _ = writeln!(self.out, "\nApplying {total} {}...", stage.label());
        let _ = writeln!(self.out, "{RULE}");
    }

    fn item_started(&mut self, index: usize, total: usize, name: &str) {
        if !self.quiet {
            let _ = write!(self.out, "[{index}/{total}] {}: {name}... ", self.verb());
            let _ = self.out.flush();
        }
    }

    fn item_finished(&mut self, result: &ItemResult) {
        if self.quiet {
            return;
        }
        let mark = match (result.success, result.already_present) {
            (true, false) => "✓",
            (true, true) => "✓ (already present)",
            (false, _) => "✗",
        };
        let _ = writeln!(self.out, "{mark}");
    }

    fn stage_finished(&mut self, report: &StageReport) {
        let _ = writeln!(self.out, "{RULE}");
        let _ = writeln!(
            self.out,
            "Results: {}/{} {} applied successfully",
            report.succeeded(),
            report.total(),
            report.stage.label()
        );
    }
}

/// Lists every failure with its truncated error text.
pub fn render_summary(report: &DeploymentReport, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out)?;
    for warning in &report.warnings {
        writeln!(out, "warning: {warning}")?;
    }
    if report.is_success() {
        writeln!(
            out,
            "All {} statement(s) applied successfully.",
            report.total()
        )?;
        return Ok(());
    }

    writeln!(
        out,
        "{} of {} statement(s) failed:",
        report.failed(),
        report.total()
    )?;
    for (stage, item) in report.failures() {
        writeln!(
            out,
            "  - [{}] {}: {}",
            stage.label(),
            item.name,
            item.error.as_deref().unwrap_or("unknown error")
        )?;
    }
    Ok(())
}

// ============================================================================
// Command handlers
// ============================================================================

/// Validate, then deploy the standard catalog.
///
/// Returns [`Error::Deployment`] when any statement failed, after the full
/// report has been printed.
pub async fn handle_deploy(config: &WardenConfig, args: DeployArgs, quiet: bool) -> Result<()> {
    let mut config = config.clone();
    if let Some(project_id) = args.project_id {
        config.target.project_id = project_id;
    }
    if let Some(timeout) = args.timeout {
        config.deploy.timeout_secs = timeout;
    }

    let catalog = Catalog::standard();
    let target = config.build_target(args.dry_run, !args.no_retry)?;
    log::info!(
        "Deploying {} bucket(s) and {} polic(ies) via {}",
        catalog.buckets.len(),
        catalog.policy_count(),
        target.name()
    );
    let deployer = Deployer::new(target).with_options(config.engine_options());

    let report = if args.json {
        deployer.deploy(&catalog, &mut warden_deploy::Silent).await?
    } else {
        let mut progress = ConsoleProgress::new(std::io::stdout(), quiet);
        let report = deployer.deploy(&catalog, &mut progress).await?;
        render_summary(&report, &mut progress.into_inner())?;
        report
    };

    if args.json {
        let json = serde_json::to_string_pretty(&report)
            .map_err(|e| Error::serialization(e.to_string()))?;
        println!("{json}");
    }

    report.into_result().map(|_| ())
}

/// Validate the standard catalog and print the findings.
pub fn handle_validate(json: bool) -> Result<()> {
    let result = Catalog::standard().validate();
    if json {
        let text = serde_json::to_string_pretty(&result)
            .map_err(|e| Error::serialization(e.to_string()))?;
        println!("{text}");
    } else {
        render_validation(&result, &mut std::io::stdout().lock())?;
    }
    result.into_result().map(|_| ())
}

fn render_validation(result: &ValidationResult, out: &mut impl Write) -> std::io::Result<()> {
    for (label, issues) in [
        ("error", &result.errors),
        ("warning", &result.warnings),
        ("info", &result.info),
    ] {
        for issue in issues {
            writeln!(out, "{label}: {issue}")?;
        }
    }
    writeln!(
        out,
        "{} ({} error(s), {} warning(s))",
        if result.valid { "Catalog is valid" } else { "Catalog is invalid" },
        result.errors.len(),
        result.warnings.len()
    )
}

/// Print the statements a deployment would send.
pub fn handle_plan(stage: Option<StageArg>) -> Result<()> {
    let statements = plan_for(&Catalog::standard(), stage.map(Stage::from));
    let mut out = std::io::stdout().lock();
    for statement in statements {
        writeln!(out, "-- {}", statement.name())?;
        writeln!(out, "{}", statement.to_sql())?;
    }
    Ok(())
}

fn plan_for(catalog: &Catalog, stage: Option<Stage>) -> Vec<Statement> {
    plan(catalog)
        .into_iter()
        .filter(|s| stage.is_none_or(|wanted| s.stage() == wanted))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
