use super::render;
use crate::cli::DiffArgs;
use crate::config::Settings;
use crate::{Context, ui};
use anyhow::{Context as _, Result};
use dse::{DiffResult, Snapshot, ldif};
use std::fs;
use std::path::Path;

pub fn run(ctx: &Context, settings: &Settings, args: DiffArgs) -> Result<()> {
    if args.text {
        return text_diff(ctx, &args.a, &args.b);
    }

    let changes = structural_diff(&read_snapshot(&args.a)?, &read_snapshot(&args.b)?);
    if changes.is_empty() {
        if !ctx.quiet {
            ui::success("Snapshots are equivalent");
        }
        return Ok(());
    }
    if ctx.verbose > 0 {
        for op in changes.operations() {
            ui::dim(&op.to_string());
        }
    }
    let document = serde_json::to_value(&changes)?;
    print!("{}", render(&document, args.format.unwrap_or(settings.format))?);
    Ok(())
}

fn read_snapshot(path: &Path) -> Result<Snapshot> {
    ldif::parse_file(path).with_context(|| format!("Could not read {}", path.display()))
}

/// Changes turning snapshot `a` into snapshot `b`.
pub fn structural_diff(a: &Snapshot, b: &Snapshot) -> DiffResult {
    dse::diff(b, a)
}

/// Show a text diff between two files using the `similar` crate
fn text_diff(ctx: &Context, a: &Path, b: &Path) -> Result<()> {
    let text_a = fs::read_to_string(a).with_context(|| format!("Could not read {}", a.display()))?;
    let text_b = fs::read_to_string(b).with_context(|| format!("Could not read {}", b.display()))?;

    let diff = similar::TextDiff::from_lines(&text_a, &text_b);
    let groups = diff.grouped_ops(3);
    if groups.is_empty() {
        if !ctx.quiet {
            ui::success("Files are identical");
        }
        return Ok(());
    }

    println!("--- {}", a.display());
    println!("+++ {}", b.display());
    for group in groups {
        println!("@@");
        for op in &group {
            for change in diff.iter_changes(op) {
                let sign = match change.tag() {
                    similar::ChangeTag::Delete => '-',
                    similar::ChangeTag::Insert => '+',
                    similar::ChangeTag::Equal => ' ',
                };
                ui::diff_line(sign, change.value());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dse::ChangeKind;

    #[test]
    fn test_structural_diff_direction() {
        let a = ldif::parse_string("dn: cn=config\nnsslapd-port: 389\n").unwrap();
        let b = ldif::parse_string(
            "dn: cn=config\nnsslapd-port: 3389\n\ndn: cn=extra,cn=config\ncn: extra\n",
        )
        .unwrap();

        let changes = structural_diff(&a, &b);
        let kinds: Vec<ChangeKind> = changes.iter().map(dse::Change::kind).collect();
        assert!(kinds.contains(&ChangeKind::ReplaceValue));
        assert!(kinds.contains(&ChangeKind::AddEntry));
        assert!(structural_diff(&a, &a).is_empty());
    }

    #[test]
    fn test_read_snapshot_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_snapshot(&dir.path().join("dse.ldif")).unwrap_err();
        assert!(err.to_string().contains("dse.ldif"));
    }
}
