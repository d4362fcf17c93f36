//! CLI argument definitions using clap derive

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

/// kvinstall - cluster installer
///
/// Generates manifests, certificates and Ignition configs from
/// install-config.yaml, and tears down clusters hosted on KubeVirt.
#[derive(Parser, Debug)]
#[command(name = "kvinstall")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "KVINSTALL_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate install assets
    Create(CreateArgs),

    /// Validate install-config.yaml and the infra cluster
    Validate(AssetDirArgs),

    /// Tear down a cluster
    Destroy(DestroyArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Options shared by commands that work on an asset directory
#[derive(Args, Debug, Clone, Default)]
pub struct AssetDirArgs {
    /// Asset directory (defaults to assets.dir from the config)
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// Skip the checks against the KubeVirt infra cluster
    #[arg(long)]
    pub skip_infra_validation: bool,
}

/// Arguments for the create command
#[derive(Parser, Debug)]
pub struct CreateArgs {
    /// What to generate
    #[command(subcommand)]
    pub target: CreateTarget,
}

/// Create targets
#[derive(Subcommand, Debug)]
pub enum CreateTarget {
    /// Cluster manifests and machine configs
    Manifests(AssetDirArgs),

    /// Bootstrap, master and worker Ignition configs
    IgnitionConfigs(AssetDirArgs),

    /// All-in-one Ignition config for a single node cluster
    SingleNodeIgnitionConfig(AssetDirArgs),
}

impl CreateTarget {
    pub fn dir_args(&self) -> &AssetDirArgs {
        match self {
            Self::Manifests(args)
            | Self::IgnitionConfigs(args)
            | Self::SingleNodeIgnitionConfig(args) => args,
        }
    }
}

/// Arguments for the destroy command
#[derive(Parser, Debug)]
pub struct DestroyArgs {
    /// What to destroy
    #[command(subcommand)]
    pub target: DestroyTarget,
}

/// Destroy targets
#[derive(Subcommand, Debug)]
pub enum DestroyTarget {
    /// Delete every infra resource owned by the cluster
    Cluster {
        /// Asset directory holding metadata.json
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_create_manifests() {
        let cli = Cli::parse_from(["kvinstall", "create", "manifests", "--dir", "/tmp/c"]);
        match cli.command {
            Commands::Create(args) => match args.target {
                CreateTarget::Manifests(dir) => {
                    assert_eq!(dir.dir, Some(PathBuf::from("/tmp/c")));
                    assert!(!dir.skip_infra_validation);
                }
                _ => panic!("expected manifests target"),
            },
            _ => panic!("expected Create command"),
        }
    }

    #[test]
    fn cli_parses_create_ignition_configs() {
        let cli = Cli::parse_from([
            "kvinstall",
            "create",
            "ignition-configs",
            "--skip-infra-validation",
        ]);
        match cli.command {
            Commands::Create(args) => {
                assert!(matches!(args.target, CreateTarget::IgnitionConfigs(_)));
                assert!(args.target.dir_args().skip_infra_validation);
                assert!(args.target.dir_args().dir.is_none());
            }
            _ => panic!("expected Create command"),
        }
    }

    #[test]
    fn cli_parses_single_node() {
        let cli = Cli::parse_from(["kvinstall", "create", "single-node-ignition-config"]);
        match cli.command {
            Commands::Create(args) => {
                assert!(matches!(args.target, CreateTarget::SingleNodeIgnitionConfig(_)))
            }
            _ => panic!("expected Create command"),
        }
    }

    #[test]
    fn cli_parses_destroy_cluster() {
        let cli = Cli::parse_from(["kvinstall", "destroy", "cluster", "-d", "assets"]);
        match cli.command {
            Commands::Destroy(args) => match args.target {
                DestroyTarget::Cluster { dir } => assert_eq!(dir, Some(PathBuf::from("assets"))),
            },
            _ => panic!("expected Destroy command"),
        }
    }

    #[test]
    fn cli_parses_config_init_force() {
        let cli = Cli::parse_from(["kvinstall", "config", "init", "--force"]);
        match cli.command {
            Commands::Config(args) => {
                assert!(matches!(args.action, Some(ConfigAction::Init { force: true })))
            }
            _ => panic!("expected Config command"),
        }
    }

    #[test]
    fn cli_rejects_unknown_target() {
        assert!(Cli::try_parse_from(["kvinstall", "create", "cluster"]).is_err());
    }

    #[test]
    fn cli_verbose_levels() {
        let cli = Cli::parse_from(["kvinstall", "validate"]);
        assert_eq!(cli.verbose, 0);

        let cli = Cli::parse_from(["kvinstall", "-v", "validate"]);
        assert_eq!(cli.verbose, 1);

        let cli = Cli::parse_from(["kvinstall", "-vv", "validate"]);
        assert_eq!(cli.verbose, 2);
    }
}
