//! Scenario catalog.
//!
//! Each scenario is a fixed sequence of run lifecycle transitions and record
//! writes producing one on-disk fixture. The ones marked "(fails)" produce
//! logs TensorBoard is known to display inconsistently.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use anyhow::Result;
use rand::Rng;
use tracing::info;

use hpgen_core::storage;
use hpgen_core::summary::{
    add_experiment, add_observed_experiment, add_scalars, add_session_end_info,
    add_session_start_info, collect_hparams, scalar_tags,
};
use hpgen_core::{FlagValue, RunStatus, SampleRun, ScalarPoint, SummarySink};

use crate::context::ScenarioContext;

pub type ScenarioFn = fn(&mut ScenarioContext) -> Result<()>;

pub struct Scenario {
    pub name: &'static str,
    pub run: ScenarioFn,
    pub description: &'static str,
}

pub const CATALOG: &[Scenario] = &[
    Scenario {
        name: "default",
        run: default,
        description: "default scenario",
    },
    Scenario {
        name: "status-change-session",
        run: status_change_session,
        description: "update run status by session (fails)",
    },
    Scenario {
        name: "status-change-experiment",
        run: status_change_experiment,
        description: "update run status by experiment (fails)",
    },
    Scenario {
        name: "status-change-summary",
        run: status_change_summary,
        description: "update run status by summary (fails)",
    },
    Scenario {
        name: "status-change-replace",
        run: status_change_replace,
        description: "update run status by replace (fails)",
    },
    Scenario {
        name: "no-session",
        run: no_session,
        description: "log only an experiment and scalars",
    },
    Scenario {
        name: "no-experiment",
        run: no_experiment,
        description: "log only session",
    },
    Scenario {
        name: "check-status",
        run: check_status,
        description: "pause to check status before setting",
    },
    Scenario {
        name: "latent-metrics",
        run: latent_metrics,
        description: "add metrics after adding experiment (fails)",
    },
    Scenario {
        name: "runs",
        run: runs,
        description: "generate multiple runs",
    },
    Scenario {
        name: "add-run",
        run: add_run,
        description: "add run to logdir",
    },
    Scenario {
        name: "latent-metrics-2",
        run: latent_metrics_2,
        description: "add metrics after adding experiment v2 (fails)",
    },
    Scenario {
        name: "latent-metrics-3",
        run: latent_metrics_3,
        description: "add metrics by adding multiple experiments",
    },
    Scenario {
        name: "summaries",
        run: summaries,
        description: "one experiment derived from several runs",
    },
    Scenario {
        name: "grid",
        run: grid,
        description: "lr x bsize x n_hidden grid with accuracy and loss",
    },
];

pub fn find(name: &str) -> Option<&'static Scenario> {
    CATALOG.iter().find(|s| s.name == name)
}

/// One line per scenario: padded name, then description.
pub fn help_text() -> String {
    let width = CATALOG.iter().map(|s| s.name.len()).max().unwrap_or(0) + 1;
    CATALOG
        .iter()
        .map(|s| format!("{:<width$} {}\n", s.name, s.description))
        .collect()
}

// ─── Scenarios ────────────────────────────────────────────────────────────────

fn default(ctx: &mut ScenarioContext) -> Result<()> {
    info!("Running default scenario");
    let mut run = ctx.new_run(None);
    run.start(ctx.clock.as_ref());
    let scalars = run_scalars();
    let mut writer = ctx.open_writer(&ctx.logdir)?;
    add_experiment(&mut writer, &ctx.opdef.flags, &scalar_tags(&scalars), None)?;
    add_session_start_info(&mut writer, &run)?;
    add_scalars(&mut writer, &scalars)?;
    run.stop(ctx.clock.as_ref(), RunStatus::Completed);
    add_session_end_info(&mut writer, &run)?;
    writer.close()?;
    Ok(())
}

fn write_session(writer: &mut dyn SummarySink, run: &SampleRun) -> Result<()> {
    add_session_start_info(writer, run)?;
    add_session_end_info(writer, run)?;
    Ok(())
}

fn write_experiment_and_session(
    ctx: &ScenarioContext,
    writer: &mut dyn SummarySink,
    run: &SampleRun,
    tags: &[String],
) -> Result<()> {
    add_experiment(writer, &ctx.opdef.flags, tags, None)?;
    write_session(writer, run)
}

/// Write experiment and session with a fresh writer on the root log dir.
fn write_summary(ctx: &ScenarioContext, run: &SampleRun, tags: &[String]) -> Result<()> {
    let mut writer = ctx.open_writer(&ctx.logdir)?;
    write_experiment_and_session(ctx, &mut writer, run, tags)?;
    writer.close()?;
    Ok(())
}

fn status_change_session(ctx: &mut ScenarioContext) -> Result<()> {
    info!("Running status change 'by session' scenario (fails)");
    let mut run = ctx.new_run(None);
    let tags = scalar_tags(&run_scalars());
    let mut writer = ctx.open_writer(&ctx.logdir)?;
    add_experiment(&mut writer, &ctx.opdef.flags, &tags, None)?;
    write_session(&mut writer, &run)?;
    info!(" - Starting run");
    run.start(ctx.clock.as_ref());
    write_session(&mut writer, &run)?;
    info!(" - Stopping run");
    run.stop(ctx.clock.as_ref(), RunStatus::Completed);
    write_session(&mut writer, &run)?;
    writer.close()?;
    Ok(())
}

fn status_change_experiment(ctx: &mut ScenarioContext) -> Result<()> {
    info!("Running status change 'by experiment' scenario (fails)");
    let mut run = ctx.new_run(None);
    let tags = scalar_tags(&run_scalars());
    let mut writer = ctx.open_writer(&ctx.logdir)?;
    write_experiment_and_session(ctx, &mut writer, &run, &tags)?;
    info!(" - Starting run");
    run.start(ctx.clock.as_ref());
    write_experiment_and_session(ctx, &mut writer, &run, &tags)?;
    info!(" - Stopping run");
    run.stop(ctx.clock.as_ref(), RunStatus::Completed);
    write_experiment_and_session(ctx, &mut writer, &run, &tags)?;
    writer.close()?;
    Ok(())
}

fn status_change_summary(ctx: &mut ScenarioContext) -> Result<()> {
    info!("Running status change 'by summary' scenario (fails)");
    let mut run = ctx.new_run(None);
    let tags = scalar_tags(&run_scalars());
    ctx.wait_for_new_timestamp();
    write_summary(ctx, &run, &tags)?;
    info!(" - Starting run");
    run.start(ctx.clock.as_ref());
    ctx.wait_for_new_timestamp();
    write_summary(ctx, &run, &tags)?;
    info!(" - Stopping run");
    run.stop(ctx.clock.as_ref(), RunStatus::Completed);
    ctx.wait_for_new_timestamp();
    write_summary(ctx, &run, &tags)?;
    Ok(())
}

fn replace_summary(ctx: &ScenarioContext, run: &SampleRun, tags: &[String]) -> Result<()> {
    info!(" - Clearing log dir of event files");
    storage::ensure_dir(&ctx.logdir)?;
    storage::clear_dir(&ctx.logdir)?;
    write_summary(ctx, run, tags)
}

fn status_change_replace(ctx: &mut ScenarioContext) -> Result<()> {
    info!("Running status change 'by replace' scenario (fails)");
    info!("Check status in {}", ctx.logdir.display());
    let mut run = ctx.new_run(None);
    let tags = scalar_tags(&run_scalars());
    replace_summary(ctx, &run, &tags)?;
    ctx.pause("Run status should be UNKNOWN - press Enter to replace")?;
    info!(" - Starting run");
    run.start(ctx.clock.as_ref());
    replace_summary(ctx, &run, &tags)?;
    ctx.pause("Run status should be RUNNING - press Enter to replace")?;
    info!(" - Stopping run");
    run.stop(ctx.clock.as_ref(), RunStatus::Completed);
    replace_summary(ctx, &run, &tags)?;
    Ok(())
}

fn no_session(ctx: &mut ScenarioContext) -> Result<()> {
    info!("Running no-session scenario");
    let scalars = run_scalars();
    let mut writer = ctx.open_writer(&ctx.logdir)?;
    add_experiment(&mut writer, &ctx.opdef.flags, &scalar_tags(&scalars), None)?;
    add_scalars(&mut writer, &scalars)?;
    writer.close()?;
    Ok(())
}

fn no_experiment(ctx: &mut ScenarioContext) -> Result<()> {
    info!("Running no-experiment scenario");
    let run = ctx.new_run(None);
    let mut writer = ctx.open_writer(&ctx.logdir)?;
    add_session_start_info(&mut writer, &run)?;
    writer.close()?;
    Ok(())
}

fn check_status(ctx: &mut ScenarioContext) -> Result<()> {
    info!("Running check-status scenario");
    info!("Check status in {}", ctx.logdir.display());
    let mut run = ctx.new_run(None);
    let scalars = run_scalars();
    // The running status is never logged; start only keeps the lifecycle honest.
    run.start(ctx.clock.as_ref());
    let mut writer = ctx.open_writer(&ctx.logdir)?;
    add_experiment(&mut writer, &ctx.opdef.flags, &scalar_tags(&scalars), None)?;
    add_session_start_info(&mut writer, &run)?;
    writer.flush()?;
    ctx.pause("Run status should be UNKNOWN - press Enter to set")?;
    run.stop(ctx.clock.as_ref(), RunStatus::Completed);
    add_session_end_info(&mut writer, &run)?;
    writer.close()?;
    Ok(())
}

fn latent_metrics(ctx: &mut ScenarioContext) -> Result<()> {
    info!("Running latent metrics scenario (fails)");
    let mut writer = ctx.open_writer(&ctx.logdir)?;
    add_experiment(&mut writer, &ctx.opdef.flags, &[], None)?;
    add_experiment(&mut writer, &[], &["loss".to_string()], None)?;
    writer.close()?;
    Ok(())
}

fn runs(ctx: &mut ScenarioContext) -> Result<()> {
    info!("Running runs scenario");
    for _ in 0..ctx.run_count {
        let flags = random_noisy_flags(&mut ctx.rng);
        let run = ctx.new_run(Some(flags));
        add_run_default(ctx, &run, None)?;
    }
    Ok(())
}

fn add_run(ctx: &mut ScenarioContext) -> Result<()> {
    info!("Running add-run scenario");
    let flags = random_noisy_flags(&mut ctx.rng);
    let run = ctx.new_run(Some(flags));
    add_run_default(ctx, &run, None)?;
    Ok(())
}

fn latent_metrics_2(ctx: &mut ScenarioContext) -> Result<()> {
    info!("Running latent metrics v2 scenario (fails)");
    info!("Check status in {}", ctx.logdir.display());
    let flags = random_noisy_flags(&mut ctx.rng);
    let run = ctx.new_run(Some(flags));
    let run_logdir = add_run_default(ctx, &run, Some(vec![]))?;
    ctx.pause(&format!(
        "Added run {} without metrics - press Enter to update",
        run.short_id()
    ))?;
    storage::clear_dir(&run_logdir)?;
    add_run_default(ctx, &run, None)?;
    Ok(())
}

fn latent_metrics_3(ctx: &mut ScenarioContext) -> Result<()> {
    info!("Running latent metrics v3 scenario (fails)");
    let scalars = run_scalars();
    let mut writer = ctx.open_writer(&ctx.logdir)?;
    add_experiment(&mut writer, &ctx.opdef.flags, &[], Some("1"))?;
    add_experiment(&mut writer, &ctx.opdef.flags, &scalar_tags(&scalars), Some("2"))?;
    writer.close()?;
    Ok(())
}

fn summaries(ctx: &mut ScenarioContext) -> Result<()> {
    info!("Running summaries scenario");
    let trials = summary_trials();
    let hparams = collect_hparams(trials.iter().map(|t| &t.flags));
    let metrics: BTreeSet<String> = trials
        .iter()
        .flat_map(|t| scalar_tags(&t.metrics))
        .collect();
    let metrics: Vec<String> = metrics.into_iter().collect();

    let mut writer = ctx.open_writer(&ctx.logdir)?;
    add_observed_experiment(&mut writer, &hparams, &metrics)?;
    writer.close()?;

    // Session start only, no end: the trials never report a status.
    for trial in trials {
        info!(" - Adding trial {}", trial.id);
        let mut run = ctx.new_run(Some(trial.flags)).with_label(trial.id);
        run.start(ctx.clock.as_ref());
        let mut writer = ctx.open_writer(&ctx.logdir.join(trial.id))?;
        add_session_start_info(&mut writer, &run)?;
        add_scalars(&mut writer, &trial.metrics)?;
        writer.close()?;
    }
    Ok(())
}

fn grid(ctx: &mut ScenarioContext) -> Result<()> {
    info!("Running grid scenario");
    let trials = grid_flags();
    let hparams = collect_hparams(trials.iter());
    let metrics = vec!["accuracy".to_string(), "loss".to_string()];
    for flags in trials {
        let mut run = ctx.new_run(Some(flags));
        run.start(ctx.clock.as_ref());
        let accuracy: f64 = ctx.rng.gen();
        let points = vec![
            ScalarPoint::new("accuracy", accuracy, 0),
            ScalarPoint::new("loss", accuracy * 5.0, 0),
        ];
        run.stop(ctx.clock.as_ref(), RunStatus::Completed);

        let mut writer = ctx.open_writer(&run_dir(&ctx.logdir, &run))?;
        add_observed_experiment(&mut writer, &hparams, &metrics)?;
        write_session(&mut writer, &run)?;
        add_scalars(&mut writer, &points)?;
        writer.close()?;
    }
    Ok(())
}

// ─── Scenario support ─────────────────────────────────────────────────────────

/// Write one run into its own sub-directory of the log dir. Without explicit
/// `scalars` the standard loss curve is perturbed.
pub fn add_run_default(
    ctx: &mut ScenarioContext,
    run: &SampleRun,
    scalars: Option<Vec<ScalarPoint>>,
) -> Result<PathBuf> {
    info!(" - Adding run {}", run.short_id());
    let run_logdir = run_dir(&ctx.logdir, run);
    storage::ensure_dir(&run_logdir)?;
    let scalars = match scalars {
        Some(s) => s,
        None => perturb_scalars(&run_scalars(), &mut ctx.rng),
    };
    let mut writer = ctx.open_writer(&run_logdir)?;
    add_scalars(&mut writer, &scalars)?;
    add_experiment(&mut writer, &ctx.opdef.flags, &scalar_tags(&scalars), None)?;
    write_session(&mut writer, run)?;
    writer.close()?;
    Ok(run_logdir)
}

pub fn run_dir(logdir: &Path, run: &SampleRun) -> PathBuf {
    logdir.join(run.label_text())
}

pub fn run_scalars() -> Vec<ScalarPoint> {
    vec![
        ScalarPoint::new("loss", 1.0, 1),
        ScalarPoint::new("loss", -0.4, 2),
        ScalarPoint::new("loss", -0.6, 3),
        ScalarPoint::new("loss", -0.7, 4),
    ]
}

struct Trial {
    id: &'static str,
    flags: BTreeMap<String, FlagValue>,
    metrics: Vec<ScalarPoint>,
}

fn trial(id: &'static str, flags: Vec<(&str, FlagValue)>, metrics: &[(&str, f64)]) -> Trial {
    Trial {
        id,
        flags: flags
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect(),
        metrics: metrics
            .iter()
            .map(|(tag, value)| ScalarPoint::new(*tag, *value, 0))
            .collect(),
    }
}

/// Trials with overlapping but unequal hparam and metric sets.
fn summary_trials() -> Vec<Trial> {
    use FlagValue::{Float, Int, Text};
    vec![
        trial(
            "aaaa",
            vec![("x", Float(1.0)), ("y", Int(0)), ("z", Text("cat".into()))],
            &[("loss", -1.0), ("acc", 0.2)],
        ),
        trial(
            "bbbb",
            vec![("x", Float(1.1)), ("y", Int(1)), ("z", Text("dog".into()))],
            &[("loss", -1.1), ("acc", 0.3)],
        ),
        trial(
            "cccc",
            vec![("x", Float(1.2)), ("y", Int(2)), ("z", Text("bird".into()))],
            &[("loss", -1.2), ("acc", 0.4)],
        ),
        trial(
            "dddd",
            vec![("w", Text("cow".into())), ("x", Float(1.3))],
            &[("loss", -1.2), ("mAP", 0.2)],
        ),
    ]
}

/// Every combination of `lr`, `bsize` and `n_hidden`.
pub fn grid_flags() -> Vec<BTreeMap<String, FlagValue>> {
    let mut grid = vec![];
    for lr in [0.1, 0.01, 0.001] {
        for bsize in [1, 2, 4] {
            for n_hidden in [100, 200] {
                grid.push(BTreeMap::from([
                    ("lr".to_string(), FlagValue::Float(lr)),
                    ("bsize".to_string(), FlagValue::Int(bsize)),
                    ("n_hidden".to_string(), FlagValue::Int(n_hidden)),
                ]));
            }
        }
    }
    grid
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

pub fn random_noisy_flags(rng: &mut impl Rng) -> BTreeMap<String, FlagValue> {
    BTreeMap::from([
        (
            "noise".to_string(),
            FlagValue::Float(round4(0.1 + rng.gen_range(-0.1..0.2))),
        ),
        (
            "x".to_string(),
            FlagValue::Float(round4(rng.gen_range(-3.0..3.0))),
        ),
    ])
}

pub fn perturb_scalars(points: &[ScalarPoint], rng: &mut impl Rng) -> Vec<ScalarPoint> {
    points
        .iter()
        .map(|p| ScalarPoint::new(&p.tag, p.value + rng.gen_range(-0.5..0.5), p.step))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn catalog_names_are_unique() {
        let mut names: Vec<_> = CATALOG.iter().map(|s| s.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), CATALOG.len());
        assert_eq!(CATALOG.len(), 15);
    }

    #[test]
    fn help_text_pads_names() {
        let help = help_text();
        assert_eq!(help.lines().count(), CATALOG.len());
        let width = "status-change-experiment".len() + 1;
        assert!(help.starts_with(&format!("{:<width$} default scenario\n", "default")));
    }

    #[test]
    fn seeded_flags_are_reproducible() {
        let a = random_noisy_flags(&mut StdRng::seed_from_u64(7));
        let b = random_noisy_flags(&mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
        let FlagValue::Float(x) = a["x"] else {
            panic!("x should be a float");
        };
        assert!((-3.0..=3.0).contains(&x));
    }

    #[test]
    fn perturbation_keeps_tags_and_steps() {
        let mut rng = StdRng::seed_from_u64(1);
        let base = run_scalars();
        let perturbed = perturb_scalars(&base, &mut rng);
        for (a, b) in base.iter().zip(&perturbed) {
            assert_eq!(a.tag, b.tag);
            assert_eq!(a.step, b.step);
            assert!((a.value - b.value).abs() <= 0.5);
        }
    }

    #[test]
    fn grid_covers_every_combination() {
        let grid = grid_flags();
        assert_eq!(grid.len(), 18);
        let distinct: BTreeSet<String> = grid
            .iter()
            .map(|flags| format!("{flags:?}"))
            .collect();
        assert_eq!(distinct.len(), 18);
    }
}
