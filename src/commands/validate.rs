use super::load_desired;
use crate::cli::ValidateArgs;
use crate::{Context, ui};
use anyhow::{Context as _, Result};
use declarative::NodeId;
use dirsrv::{DesiredState, EntityTree, model};

pub fn run(ctx: &Context, args: ValidateArgs) -> Result<()> {
    let desired = load_desired(&args.file)?;
    let entities = check(&desired)
        .with_context(|| format!("{} is not a consistent desired state", args.file.display()))?;

    if !ctx.quiet {
        ui::success(&format!("{} is valid ({} entities)", args.file.display(), entities.len()));
    }
    if ctx.verbose > 0 {
        for entity in &entities {
            ui::dim(entity);
        }
    }
    Ok(())
}

/// Run the cross-entity checks and list the declared entities.
pub fn check(desired: &DesiredState) -> Result<Vec<String>> {
    desired.validate()?;
    let tree = desired.tree();
    let mut paths = Vec::new();
    collect(tree, tree.root(), &mut paths);
    Ok(paths)
}

fn collect(tree: &EntityTree, id: NodeId, paths: &mut Vec<String>) {
    for child in tree.children(id) {
        paths.push(format!("{} ({})", model::path(tree, child), tree.get(child).state()));
        collect(tree, child, paths);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirsrv::Format;

    #[test]
    fn test_check_lists_entities() {
        let desired = DesiredState::parse(
            "instances: [{name: i1, backends: [{name: userroot, suffix: dc=example,dc=com}]}]",
            Format::Yaml,
        )
        .unwrap();
        let paths = check(&desired).unwrap();
        assert_eq!(
            paths,
            vec![
                "instance i1 (present)".to_string(),
                "instance i1 / backend userroot (present)".to_string(),
            ]
        );
    }

    #[test]
    fn test_check_rejects_supplier_without_replica_id() {
        let desired = DesiredState::parse(
            "instances: [{name: i1, backends: [{name: userroot, suffix: dc=example,dc=com, replicarole: supplier}]}]",
            Format::Yaml,
        )
        .unwrap();
        assert!(check(&desired).is_err());
    }
}
