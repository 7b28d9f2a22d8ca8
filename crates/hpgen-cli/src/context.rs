//! Everything a scenario needs, passed explicitly.

use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use hpgen_core::{
    Clock, EventFileWriter, FlagValue, OperationDef, SampleRun, SystemClock,
};

/// Where pause prompts go.
pub trait Console {
    /// Show `prompt` and wait for the operator to confirm.
    fn pause(&mut self, prompt: &str) -> Result<()>;
}

/// Prints the prompt and blocks until a line is read from stdin.
pub struct StdinConsole;

impl Console for StdinConsole {
    fn pause(&mut self, prompt: &str) -> Result<()> {
        print!("{prompt} ");
        io::stdout().flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(())
    }
}

/// Logs the prompt and continues immediately.
pub struct AutoConfirm;

impl Console for AutoConfirm {
    fn pause(&mut self, prompt: &str) -> Result<()> {
        info!("{prompt} (continuing)");
        Ok(())
    }
}

pub struct ScenarioContext {
    /// Root log directory the scenario writes to.
    pub logdir: PathBuf,
    /// Operation whose flags make up the experiment's hparams.
    pub opdef: OperationDef,
    pub console: Box<dyn Console>,
    pub clock: Box<dyn Clock>,
    pub rng: StdRng,
    /// Wait before opening another writer on the same directory, so the new
    /// event file gets a later timestamp in its name.
    pub file_delay: Duration,
    /// Flag values for runs that would otherwise use the sample flags.
    pub flags: Option<BTreeMap<String, FlagValue>>,
    /// Number of runs generated by the `runs` scenario.
    pub run_count: usize,
    /// Label given to every run the scenario creates.
    pub label: Option<String>,
}

impl ScenarioContext {
    pub fn new(logdir: impl Into<PathBuf>, opdef: OperationDef) -> Self {
        Self {
            logdir: logdir.into(),
            opdef,
            console: Box::new(StdinConsole),
            clock: Box::new(SystemClock),
            rng: StdRng::from_entropy(),
            file_delay: Duration::from_secs(1),
            flags: None,
            run_count: 10,
            label: None,
        }
    }

    pub fn with_console(mut self, console: impl Console + 'static) -> Self {
        self.console = Box::new(console);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn with_file_delay(mut self, delay: Duration) -> Self {
        self.file_delay = delay;
        self
    }

    pub fn with_flags(mut self, flags: Option<BTreeMap<String, FlagValue>>) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_run_count(mut self, n: usize) -> Self {
        self.run_count = n;
        self
    }

    pub fn with_label(mut self, label: Option<String>) -> Self {
        self.label = label;
        self
    }

    /// A pending run of the context's operation. Explicit `flags` win over
    /// the context's flag values, which win over the sample flags.
    pub fn new_run(&self, flags: Option<BTreeMap<String, FlagValue>>) -> SampleRun {
        let run = SampleRun::new(self.opdef.opref(), flags.or_else(|| self.flags.clone()));
        match &self.label {
            Some(label) => run.with_label(label),
            None => run,
        }
    }

    pub fn open_writer(&self, dir: &Path) -> Result<EventFileWriter> {
        Ok(EventFileWriter::open(dir)?)
    }

    pub fn pause(&mut self, prompt: &str) -> Result<()> {
        self.console.pause(prompt)
    }

    pub fn wait_for_new_timestamp(&self) {
        if !self.file_delay.is_zero() {
            thread::sleep(self.file_delay);
        }
    }
}
