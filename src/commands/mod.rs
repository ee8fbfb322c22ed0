pub mod apply;
pub mod diff;
pub mod facts;
pub mod validate;

use crate::config::OutputFormat;
use anyhow::{Context, Result};
use dirsrv::{DesiredState, Format};
use serde_json::Value as Json;
use std::io::Read;
use std::path::Path;

/// Render a document for stdout.
pub fn render(document: &Json, format: OutputFormat) -> Result<String> {
    let mut out = match format {
        OutputFormat::Yaml => serde_yaml::to_string(document)?,
        OutputFormat::Json => serde_json::to_string_pretty(document)?,
        OutputFormat::Toml => toml::to_string_pretty(document).context("Document cannot be rendered as TOML")?,
    };
    if !out.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}

/// Whether the input path means stdin
pub fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Load a desired-state file; `-` reads YAML or JSON from stdin.
pub fn load_desired(path: &Path) -> Result<DesiredState> {
    if is_stdin(path) {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("Could not read desired state from stdin")?;
        return DesiredState::parse(&content, Format::Yaml).context("Invalid desired state on stdin");
    }
    log::debug!("Loading {} as {}", path.display(), Format::from_path(path));
    DesiredState::load(path).with_context(|| format!("Invalid desired state in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_formats() {
        let doc = json!({"changed": true, "changes": ["Creating instance i1"]});
        assert_eq!(
            render(&doc, OutputFormat::Yaml).unwrap(),
            "changed: true\nchanges:\n- Creating instance i1\n"
        );
        assert!(render(&doc, OutputFormat::Json).unwrap().contains("\"changed\": true"));
        let toml = render(&doc, OutputFormat::Toml).unwrap();
        assert!(toml.contains("changed = true"));
        assert!(toml.ends_with('\n'));
    }

    #[test]
    fn test_load_desired_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.json");
        std::fs::write(&path, r#"{"instances": [{"name": "i1", "port": 3389}]}"#).unwrap();
        let desired = load_desired(&path).unwrap();
        let tree = desired.tree();
        assert_eq!(tree.children(tree.root()).len(), 1);
    }

    #[test]
    fn test_load_desired_error_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site.yaml");
        std::fs::write(&path, "instances: [{name: i1, colour: red}]\n").unwrap();
        let err = load_desired(&path).unwrap_err();
        assert!(format!("{err:#}").contains("site.yaml"));
        assert!(format!("{err:#}").contains("unknown field 'colour'"));
    }
}
