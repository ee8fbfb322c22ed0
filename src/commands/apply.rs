use super::{is_stdin, load_desired, render};
use crate::cli::ApplyArgs;
use crate::config::{OutputFormat, Settings};
use crate::{Context, ui};
use anyhow::{Context as _, Result, bail};
use declarative::{ApplyContext, LogReporter, MemoryReporter, Reporter};
use dirsrv::{DesiredState, FileHost, Reconciler};
use serde::Serialize;
use std::path::Path;

/// What a pass changed, printed on stdout
#[derive(Debug, Serialize)]
pub struct Outcome {
    pub changed: bool,
    pub changes: Vec<String>,
}

pub fn run(ctx: &Context, settings: &Settings, prefix: Option<&Path>, args: ApplyArgs) -> Result<()> {
    let desired = load_desired(&args.file)?;
    let prefix = settings.resolve_prefix(prefix, desired.prefix());
    log::info!("Converging instances under {}", prefix.display());
    let mut host = FileHost::open(&prefix)
        .with_context(|| format!("Could not open instances under {}", prefix.display()))?;

    let format = args.format.unwrap_or(settings.format);

    if !args.check && settings.confirm && !args.yes {
        if is_stdin(&args.file) {
            bail!("Desired state was read from stdin; pass --yes to apply without a prompt");
        }
        let (preview, result) = converge(&mut host, &desired, true, &mut MemoryReporter::default());
        result.context("Could not plan the changes")?;
        if !preview.changed {
            return print_outcome(&preview, format);
        }
        if !ctx.quiet {
            ui::header(&format!("{} planned change(s)", preview.changes.len()));
            for change in &preview.changes {
                ui::dim(change);
            }
            eprintln!();
        }
        if !confirm_proceed()? {
            ui::warn("Nothing applied");
            return Ok(());
        }
    }

    let (outcome, result) = converge(&mut host, &desired, args.check, &mut LogReporter);
    if !args.check {
        // Whatever converged before a failure is kept on disk.
        host.flush()
            .with_context(|| format!("Could not write instances under {}", prefix.display()))?;
    }
    if let Err(err) = result {
        if !ctx.quiet && outcome.changed {
            ui::warn(&format!("Stopped after {} change(s)", outcome.changes.len()));
        }
        print_outcome(&outcome, format)?;
        return Err(err).context("Convergence failed");
    }
    if !args.check && !ctx.quiet && outcome.changed {
        ui::success(&format!("Applied {} change(s)", outcome.changes.len()));
    }
    print_outcome(&outcome, format)
}

/// One reconciliation pass; `check` reports without writing.
///
/// The outcome lists the changes made before any failure.
pub fn converge(
    host: &mut FileHost,
    desired: &DesiredState,
    check: bool,
    reporter: &mut dyn Reporter,
) -> (Outcome, dirsrv::Result<()>) {
    let mut apply_ctx = ApplyContext::new(check, reporter);
    let mut reconciler = Reconciler::new(host);
    let result = reconciler.update(desired, &mut apply_ctx).map(drop);
    let summary = reconciler.summary().clone();
    let outcome = Outcome {
        changed: summary.changed(),
        changes: summary.into_vec(),
    };
    (outcome, result)
}

fn print_outcome(outcome: &Outcome, format: OutputFormat) -> Result<()> {
    let document = serde_json::to_value(outcome)?;
    print!("{}", render(&document, format)?);
    Ok(())
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Apply these changes?")
        .default(false)
        .interact()?;

    Ok(confirmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirsrv::{DirectoryHost, Format};

    const SITE: &str = r"
instances:
  - name: i1
    port: 3389
    backends:
      - name: userroot
        suffix: dc=example,dc=com
";

    #[test]
    fn test_check_then_apply_then_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let desired = DesiredState::parse(SITE, Format::Yaml).unwrap();
        let mut host = FileHost::open(dir.path()).unwrap();

        let (preview, result) = converge(&mut host, &desired, true, &mut MemoryReporter::default());
        result.unwrap();
        assert!(preview.changed);
        assert!(host.instances().unwrap().is_empty());

        let (applied, result) = converge(&mut host, &desired, false, &mut MemoryReporter::default());
        result.unwrap();
        assert!(applied.changed);
        assert!(applied.changes.contains(&"Creating instance slapd-i1".to_string()));
        host.flush().unwrap();

        let mut reopened = FileHost::open(dir.path()).unwrap();
        assert_eq!(reopened.instances().unwrap(), vec!["i1".to_string()]);
        let (again, result) = converge(&mut reopened, &desired, false, &mut MemoryReporter::default());
        result.unwrap();
        assert!(!again.changed, "{:?}", again.changes);
    }

    #[test]
    fn test_failed_pass_keeps_earlier_changes() {
        let dir = tempfile::tempdir().unwrap();
        let mut host = FileHost::open(dir.path()).unwrap();
        let existing = DesiredState::parse(
            "instances: [{name: i2, backends: [{name: userroot, suffix: dc=a}]}]",
            Format::Yaml,
        )
        .unwrap();
        converge(&mut host, &existing, false, &mut MemoryReporter::default()).1.unwrap();
        host.flush().unwrap();

        // i1 converges, then i2 fails: its suffix cannot move while running.
        let desired = DesiredState::parse(
            "instances: [{name: i1}, {name: i2, backends: [{name: userroot, suffix: dc=b}]}]",
            Format::Yaml,
        )
        .unwrap();
        let (outcome, result) = converge(&mut host, &desired, false, &mut MemoryReporter::default());
        assert!(result.is_err());
        assert!(outcome.changed);
        assert!(outcome.changes.contains(&"Creating instance slapd-i1".to_string()));
        host.flush().unwrap();

        let reopened = FileHost::open(dir.path()).unwrap();
        assert_eq!(reopened.instances().unwrap(), vec!["i1".to_string(), "i2".to_string()]);
    }

    #[test]
    fn test_outcome_shape() {
        let outcome = Outcome {
            changed: false,
            changes: vec![],
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json, serde_json::json!({"changed": false, "changes": []}));
    }
}
