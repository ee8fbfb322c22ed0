use super::render;
use crate::Context;
use crate::cli::FactsArgs;
use crate::config::Settings;
use anyhow::{Context as _, Result};
use dirsrv::{FileHost, facts, to_record};
use serde_json::Value as Json;
use std::path::Path;

pub fn run(ctx: &Context, settings: &Settings, prefix: Option<&Path>, args: FactsArgs) -> Result<()> {
    let prefix = settings.resolve_prefix(prefix, None);
    let host = FileHost::open(&prefix)
        .with_context(|| format!("Could not open instances under {}", prefix.display()))?;
    let record = observe(&host, args.instance.as_deref())?;
    if !ctx.quiet && record.get("instances").is_none() {
        crate::ui::info(&format!("No instances under {}", prefix.display()));
    }
    print!("{}", render(&record, args.format.unwrap_or(settings.format))?);
    Ok(())
}

/// Facts as a nested record, optionally for one instance only.
pub fn observe(host: &FileHost, instance: Option<&str>) -> Result<Json> {
    let tree = match instance {
        Some(name) => facts::observe_one(host, name)?
            .with_context(|| format!("Instance {name} not found under {}", host.config_dir().display()))?,
        None => facts::observe(host)?,
    };
    Ok(to_record(&tree, tree.root()))
}
