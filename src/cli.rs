use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dot")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Symlink farm manager for dotfiles", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: <config dir>/config.toml)
    #[arg(long, global = true, env = "DOT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Package directory
    #[arg(short = 'd', long = "dir", global = true, env = "DOT_PACKAGE_DIR")]
    pub dir: Option<PathBuf>,

    /// Target directory
    #[arg(short, long, global = true, env = "DOT_TARGET_DIR")]
    pub target: Option<PathBuf>,

    /// Show what would happen without changing anything
    #[arg(short = 'n', long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Install packages by linking them into the target directory
    Manage(ManageArgs),

    /// Remove installed packages
    Unmanage(UnmanageArgs),

    /// Re-install packages whose content changed
    Remanage(PackagesArgs),

    /// Move existing files into a package and link them back
    Adopt(AdoptArgs),

    /// Show installed packages
    Status(StatusArgs),

    /// List installed packages
    List(ListArgs),

    /// Check installed links and look for orphans
    Doctor(DoctorArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Conflict handling chosen on the command line
#[derive(Args, Clone, Copy, Default)]
#[group(multiple = false)]
pub struct ConflictArgs {
    /// Move conflicting files aside before linking
    #[arg(long)]
    pub backup: bool,

    /// Replace conflicting links (files are backed up instead)
    #[arg(long)]
    pub overwrite: bool,

    /// Leave conflicting targets alone
    #[arg(long)]
    pub skip_conflicts: bool,
}

impl ConflictArgs {
    /// Policy selected by the flags, if any
    pub fn policy(self) -> Option<farm::ResolutionPolicy> {
        if self.backup {
            Some(farm::ResolutionPolicy::Backup)
        } else if self.overwrite {
            Some(farm::ResolutionPolicy::Overwrite)
        } else if self.skip_conflicts {
            Some(farm::ResolutionPolicy::Skip)
        } else {
            None
        }
    }
}

#[derive(Args)]
pub struct ManageArgs {
    /// Packages to install
    #[arg(required = true)]
    pub packages: Vec<String>,

    #[command(flatten)]
    pub conflicts: ConflictArgs,

    /// Write absolute link targets
    #[arg(long)]
    pub absolute: bool,

    /// Parallel operations (0 = number of cores)
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Args)]
pub struct UnmanageArgs {
    /// Packages to remove
    #[arg(required_unless_present = "all")]
    pub packages: Vec<String>,

    /// Remove every installed package
    #[arg(long, conflicts_with = "packages")]
    pub all: bool,
}

#[derive(Args)]
pub struct PackagesArgs {
    /// Packages to process
    #[arg(required = true)]
    pub packages: Vec<String>,

    #[command(flatten)]
    pub conflicts: ConflictArgs,

    /// Parallel operations (0 = number of cores)
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Args)]
pub struct AdoptArgs {
    /// Package to adopt into
    pub package: String,

    /// Files or directories to adopt (relative to the target directory)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Packages to show (default: all)
    pub packages: Vec<String>,

    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct ListArgs {
    /// Print JSON instead of text
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ScanModeArg {
    Off,
    Scoped,
    Deep,
}

impl From<ScanModeArg> for farm::ScanMode {
    fn from(mode: ScanModeArg) -> Self {
        match mode {
            ScanModeArg::Off => Self::Off,
            ScanModeArg::Scoped => Self::Scoped,
            ScanModeArg::Deep => Self::Deep,
        }
    }
}

#[derive(Args)]
pub struct DoctorArgs {
    /// Orphaned link scan
    #[arg(long, value_enum)]
    pub scan_mode: Option<ScanModeArg>,

    /// Deepest directory level scanned (0 = unlimited)
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Directory names never scanned (repeatable)
    #[arg(long = "skip")]
    pub skip: Vec<String>,

    /// Stop after this many orphans (0 = unlimited)
    #[arg(long)]
    pub max_issues: Option<usize>,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_manage_with_backup() {
        let cli = Cli::parse_from(["dot", "-vv", "manage", "vim", "zsh", "--backup"]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Manage(args) => {
                assert_eq!(args.packages, vec!["vim", "zsh"]);
                assert!(args.conflicts.backup);
                assert!(!args.conflicts.overwrite);
            }
            _ => panic!("expected manage"),
        }
    }

    #[test]
    fn conflict_flags_are_exclusive() {
        let result = Cli::try_parse_from(["dot", "manage", "vim", "--backup", "--overwrite"]);
        assert!(result.is_err());
    }

    #[test]
    fn conflict_flags_map_to_policy() {
        let cli = Cli::parse_from(["dot", "remanage", "vim", "--skip-conflicts"]);
        match cli.command {
            Command::Remanage(args) => {
                assert_eq!(args.conflicts.policy(), Some(farm::ResolutionPolicy::Skip));
            }
            _ => panic!("expected remanage"),
        }
        assert_eq!(ConflictArgs::default().policy(), None);
    }

    #[test]
    fn unmanage_all_needs_no_packages() {
        let cli = Cli::parse_from(["dot", "unmanage", "--all"]);
        assert!(matches!(cli.command, Command::Unmanage(UnmanageArgs { all: true, .. })));
    }

    #[test]
    fn doctor_scan_flags() {
        let cli = Cli::parse_from([
            "dot", "doctor", "--scan-mode", "deep", "--max-depth", "3", "--skip", "node_modules",
            "--json",
        ]);
        match cli.command {
            Command::Doctor(args) => {
                assert!(matches!(args.scan_mode, Some(ScanModeArg::Deep)));
                assert_eq!(args.max_depth, Some(3));
                assert_eq!(args.skip, vec!["node_modules"]);
                assert!(args.json);
            }
            _ => panic!("expected doctor"),
        }
    }

    #[test]
    fn adopt_takes_package_first() {
        let cli = Cli::parse_from(["dot", "--dry-run", "adopt", "vim", ".vimrc", ".gvimrc"]);
        assert!(cli.dry_run);
        match cli.command {
            Command::Adopt(args) => {
                assert_eq!(args.package, "vim");
                assert_eq!(args.files.len(), 2);
            }
            _ => panic!("expected adopt"),
        }
    }
}
