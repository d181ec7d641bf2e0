use anyhow::Result;
use clap::Parser;
use pkgplan::commands::{self, Config, ConfigOverrides};
use pkgplan::planner::PlanOptions;
use pkgplan::resolver::DependencyVersion;
use std::path::PathBuf;

/// pkgplan - Package dependency resolver and operation planner
///
/// Installs, updates, reinstalls and removes packages from local feeds of
/// JSON manifests, keeping every consumer's dependency closure consistent.
///
/// Examples:
///   pkgplan --source main=./feed --consumer web install Newtonsoft.Json
///   pkgplan --consumer web update --safe
#[derive(Parser, Debug)]
#[command(author, version = env!("PKGPLAN_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Install root directory (overrides defaults; also via PKGPLAN_ROOT)
    #[arg(
        long = "root",
        short = 'r',
        env = "PKGPLAN_ROOT",
        value_name = "PATH",
        global = true
    )]
    pub install_root: Option<PathBuf>,

    /// Package source as NAME=PATH; may be repeated (defaults to <root>/feed)
    #[arg(long = "source", short = 's', value_name = "NAME=PATH", global = true)]
    pub sources: Vec<String>,

    /// Source to look packages up in first (defaults to the first source)
    #[arg(long = "active", value_name = "NAME", global = true)]
    pub active: Option<String>,

    /// Consumer (project) the command applies to
    #[arg(long = "consumer", short = 'c', env = "PKGPLAN_CONSUMER", global = true)]
    pub consumer: Option<String>,

    /// Target framework of the consumer, e.g. net45
    #[arg(long = "framework", short = 'f', global = true)]
    pub framework: Option<String>,

    /// Print the planned operations without executing them
    #[arg(long = "dry-run", global = true)]
    pub dry_run: bool,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Install a package and its dependencies
    Install(InstallArgs),

    /// Uninstall a package
    Uninstall(UninstallArgs),

    /// Update installed packages to newer versions
    Update(UpdateArgs),

    /// Reinstall installed packages at their current versions
    Reinstall(ReinstallArgs),

    /// Restore files of recorded packages missing from disk
    Restore,

    /// List installed packages
    List,
}

#[derive(clap::Args, Debug)]
pub struct ResolveArgs {
    /// Allow pre-release versions
    #[arg(long)]
    pub prerelease: bool,

    /// Version picked among those satisfying a dependency
    #[arg(long, value_name = "POLICY", default_value = "lowest")]
    pub dependency_version: DependencyVersion,
}

#[derive(clap::Args, Debug)]
pub struct InstallArgs {
    /// Package id
    #[arg(value_name = "ID")]
    pub id: String,

    /// Exact version to install (defaults to the latest)
    #[arg(long = "version", short = 'v', value_name = "VERSION")]
    pub exact_version: Option<String>,

    /// Install the package without its dependencies
    #[arg(long)]
    pub ignore_dependencies: bool,

    #[command(flatten)]
    pub resolve: ResolveArgs,
}

#[derive(clap::Args, Debug)]
pub struct UninstallArgs {
    /// Package id
    #[arg(value_name = "ID")]
    pub id: String,

    /// Uninstall even if other packages depend on it
    #[arg(long)]
    pub force: bool,

    /// Also uninstall dependencies nothing else needs
    #[arg(long)]
    pub remove_dependencies: bool,
}

#[derive(clap::Args, Debug)]
pub struct UpdateArgs {
    /// Package id (defaults to all installed packages)
    #[arg(value_name = "ID")]
    pub id: Option<String>,

    /// Only update within the installed major.minor line
    #[arg(long)]
    pub safe: bool,

    /// Keep dependency versions unless the update requires otherwise
    #[arg(long)]
    pub no_dependency_updates: bool,

    #[command(flatten)]
    pub resolve: ResolveArgs,
}

#[derive(clap::Args, Debug)]
pub struct ReinstallArgs {
    /// Package id (defaults to all installed packages)
    #[arg(value_name = "ID")]
    pub id: Option<String>,

    /// Keep the recorded dependency sets even for a new framework
    #[arg(long)]
    pub no_dependency_updates: bool,
}

impl ResolveArgs {
    fn options(&self) -> PlanOptions {
        PlanOptions {
            allow_prerelease: self.prerelease,
            dependency_version: self.dependency_version,
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    let runtime = pkgplan::runtime::RealRuntime;
    let config = Config::new(
        &runtime,
        ConfigOverrides {
            root: cli.install_root,
            sources: cli.sources,
            active: cli.active,
            consumer: cli.consumer,
            framework: cli.framework,
            dry_run: cli.dry_run,
        },
    )?;

    match cli.command {
        Commands::Install(args) => {
            let options = PlanOptions {
                ignore_dependencies: args.ignore_dependencies,
                ..args.resolve.options()
            };
            commands::install(runtime, config, &args.id, args.exact_version.as_deref(), options).await?
        }
        Commands::Uninstall(args) => {
            let options = PlanOptions {
                force: args.force,
                remove_dependencies: args.remove_dependencies,
                ..Default::default()
            };
            commands::uninstall(runtime, config, &args.id, options).await?
        }
        Commands::Update(args) => {
            let options = PlanOptions {
                update_dependencies: !args.no_dependency_updates,
                ..args.resolve.options()
            };
            commands::update(runtime, config, args.id.as_deref(), args.safe, options).await?
        }
        Commands::Reinstall(args) => {
            let options = PlanOptions {
                update_dependencies: !args.no_dependency_updates,
                ..Default::default()
            };
            commands::reinstall(runtime, config, args.id.as_deref(), options).await?
        }
        Commands::Restore => commands::restore(runtime, config).await?,
        Commands::List => commands::list(runtime, config)?,
    }
    Ok(())
}
