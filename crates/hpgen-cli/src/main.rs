//! hpgen CLI: run a named scenario against a log directory.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use hpgen_cli::scenarios::{self, Scenario};
use hpgen_cli::{report, AutoConfirm, ScenarioContext};
use hpgen_core::{opdef, storage, GuildFile};

#[derive(Parser)]
#[command(
    name = "hpgen",
    about = "Generate TensorBoard hparams logs for viewer test scenarios",
    version,
    author
)]
struct Cli {
    /// Scenario to run ("help" lists them)
    scenario: String,
    /// Log directory (default: a new temporary directory)
    logdir: Option<PathBuf>,
    /// Guild file declaring the operation and its flags (default: guild.yml
    /// in the current directory)
    #[arg(long)]
    guildfile: Option<PathBuf>,
    /// Operation whose flags become the experiment's hparams
    #[arg(long, default_value = "noisy")]
    operation: String,
    /// YAML file of flag values for runs that use the sample flags
    #[arg(long)]
    flags: Option<PathBuf>,
    /// Seed for random flags and metric perturbation
    #[arg(long)]
    seed: Option<u64>,
    /// Number of runs generated by the `runs` scenario
    #[arg(long, default_value_t = 10)]
    runs: usize,
    /// Label appended to the group name of every run
    #[arg(long)]
    label: Option<String>,
    /// Continue at pause points without waiting for Enter
    #[arg(long, short)]
    yes: bool,
    /// Print a table of the records written
    #[arg(long)]
    show: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    if cli.scenario == "help" {
        print!("{}", scenarios::help_text());
        return ExitCode::SUCCESS;
    }

    let Some(scenario) = scenarios::find(&cli.scenario) else {
        eprintln!(
            "hpgen: invalid scenario '{}'\nTry 'hpgen help' for a list of scenarios.",
            cli.scenario
        );
        return ExitCode::from(2);
    };

    match run(cli, scenario) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("hpgen: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, scenario: &Scenario) -> Result<()> {
    let gf = match &cli.guildfile {
        Some(path) => GuildFile::from_path(path)?,
        None => GuildFile::from_dir(Path::new("."))?,
    };
    let opdef = gf.operation(&cli.operation)?;
    let flags = cli
        .flags
        .as_deref()
        .map(opdef::load_flag_values)
        .transpose()
        .context("loading flag values")?;

    let logdir = init_logdir(cli.logdir)?;
    debug!(logdir = %logdir.display(), scenario = scenario.name, "starting");

    let mut ctx = ScenarioContext::new(&logdir, opdef)
        .with_flags(flags)
        .with_run_count(cli.runs)
        .with_label(cli.label);
    if let Some(seed) = cli.seed {
        ctx = ctx.with_seed(seed);
    }
    if cli.yes {
        ctx = ctx.with_console(AutoConfirm);
    }

    (scenario.run)(&mut ctx)?;
    println!("Wrote summaries to {}", logdir.display());

    if cli.show {
        println!("{}", report::render(&logdir)?);
    }
    Ok(())
}

fn init_logdir(logdir: Option<PathBuf>) -> Result<PathBuf> {
    match logdir {
        Some(dir) => {
            storage::ensure_dir(&dir)?;
            Ok(dir)
        }
        None => {
            let tmp = tempfile::Builder::new()
                .prefix("guild-summaries-")
                .tempdir()
                .context("creating log directory")?;
            Ok(tmp.into_path())
        }
    }
}
