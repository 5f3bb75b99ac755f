mod cmd;
mod global;
mod output;
mod prompts;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hoist_lib::config::InstallerConfig;

use cmd::{cmd_check, cmd_install, cmd_update, cmd_versions, exit_code};
use output::{OutputFormat, print_error};

#[derive(Parser)]
#[command(name = "hoist")]
#[command(author, version, about = "Install and update a manifest-driven set of components", long_about = None)]
struct Cli {
  /// Enable debug logging (same as HOIST_DEBUG=1)
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Install root. Defaults to HOIST_ROOT, then the directory above the executable's own
  #[arg(long, global = true, value_name = "DIR")]
  root: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Install the components listed in the active manifest
  ///
  /// Also repairs an interrupted install or update.
  Install {
    /// Don't offer to create shortcuts under the global prefix
    #[arg(long)]
    no_global: bool,
  },

  /// Apply an update staged by `check`
  Update,

  /// Look for a newer release and stage it for `update`
  Check {
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// List the installed component versions
  Versions {
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let mut config = InstallerConfig::from_env();
  if let Some(root) = cli.root {
    config = config.with_root(root);
  }
  config.verbose |= cli.verbose;

  let default_level = if config.verbose { "debug" } else { "warn" };
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let result = match cli.command {
    Commands::Install { no_global } => cmd_install(&config, no_global),
    Commands::Update => cmd_update(&config),
    Commands::Check { output } => cmd_check(&config, output),
    Commands::Versions { output } => cmd_versions(&config, output),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      print_error(&format!("{:#}", e));
      ExitCode::from(exit_code(&e))
    }
  }
}
