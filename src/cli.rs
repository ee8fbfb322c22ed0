use crate::config::OutputFormat;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dsconverge")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Converge 389 Directory Server configuration to a desired state", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Installation prefix holding etc/dirsrv (overrides settings and input)
    #[arg(long, global = true, env = "DSCONVERGE_PREFIX")]
    pub prefix: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the observed state of the instances on this host
    Facts(FactsArgs),

    /// Converge instances to a desired-state file
    Apply(ApplyArgs),

    /// Compare two dse.ldif files
    Diff(DiffArgs),

    /// Check a desired-state file without touching any instance
    Validate(ValidateArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Arguments
// ============================================================================

#[derive(Parser)]
pub struct FactsArgs {
    /// Only this instance
    pub instance: Option<String>,

    /// Output format (defaults to the settings file, then yaml)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,
}

#[derive(Parser)]
pub struct ApplyArgs {
    /// Desired-state file (.yaml, .json or .toml; "-" reads stdin)
    pub file: PathBuf,

    /// Report what would change without writing anything
    #[arg(long)]
    pub check: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Output format (defaults to the settings file, then yaml)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,
}

#[derive(Parser)]
pub struct DiffArgs {
    /// Baseline dse.ldif
    pub a: PathBuf,

    /// Target dse.ldif
    pub b: PathBuf,

    /// Show a line-based text diff instead of the structural one
    #[arg(long)]
    pub text: bool,

    /// Output format (defaults to the settings file, then yaml)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,
}

#[derive(Parser)]
pub struct ValidateArgs {
    /// Desired-state file (.yaml, .json or .toml; "-" reads stdin)
    pub file: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_apply() {
        let cli = Cli::try_parse_from(["dsconverge", "-vv", "apply", "site.yaml", "--check"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Apply(args) => {
                assert_eq!(args.file, PathBuf::from("site.yaml"));
                assert!(args.check);
                assert!(!args.yes);
                assert!(args.format.is_none());
            }
            _ => panic!("expected apply"),
        }
    }

    #[test]
    fn test_parse_global_prefix_after_subcommand() {
        let cli = Cli::try_parse_from(["dsconverge", "facts", "i1", "--prefix", "/srv/ds", "-f", "json"]).unwrap();
        assert_eq!(cli.prefix, Some(PathBuf::from("/srv/ds")));
        match cli.command {
            Command::Facts(args) => {
                assert_eq!(args.instance.as_deref(), Some("i1"));
                assert_eq!(args.format, Some(OutputFormat::Json));
            }
            _ => panic!("expected facts"),
        }
    }

    #[test]
    fn test_diff_needs_two_files() {
        assert!(Cli::try_parse_from(["dsconverge", "diff", "a.ldif"]).is_err());
    }
}
