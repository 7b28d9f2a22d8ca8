//! The sample run model: one synthetic trial and its lifecycle.
//!
//! A run moves `pending -> running -> {completed, error, terminated}`. The
//! transitions are not guarded: several scenarios drive runs out of order on
//! purpose, so a misuse is only reported through `tracing`.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::fmt;

use chrono::Utc;
use tracing::warn;
use uuid::Uuid;

use crate::models::{sample_flags, FlagValue, RunStatus};

/// Length of [`SampleRun::short_id`].
pub const SHORT_ID_LEN: usize = 8;

/// Source of microsecond timestamps.
pub trait Clock {
    fn now_micros(&self) -> i64;
}

/// Wall clock backed by chrono.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_micros(&self) -> i64 {
        Utc::now().timestamp_micros()
    }
}

/// A strictly increasing clock: every reading advances by `step` microseconds.
#[derive(Debug)]
pub struct ManualClock {
    next: Cell<i64>,
    step: i64,
}

impl ManualClock {
    pub fn new(start: i64, step: i64) -> Self {
        Self {
            next: Cell::new(start),
            step,
        }
    }
}

impl Clock for ManualClock {
    fn now_micros(&self) -> i64 {
        let now = self.next.get();
        self.next.set(now + self.step);
        now
    }
}

/// Generate a new opaque run id.
pub fn new_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Reference to the operation a run was generated for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpRef {
    pub model: String,
    pub operation: String,
}

impl OpRef {
    pub fn new(model: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            operation: operation.into(),
        }
    }
}

impl fmt::Display for OpRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.model.is_empty() {
            write!(f, "{}", self.operation)
        } else {
            write!(f, "{}:{}", self.model, self.operation)
        }
    }
}

/// One synthetic trial.
#[derive(Debug, Clone)]
pub struct SampleRun {
    id: String,
    opref: OpRef,
    label: Option<String>,
    status: RunStatus,
    flags: BTreeMap<String, FlagValue>,
    started: Option<i64>,
    stopped: Option<i64>,
}

impl SampleRun {
    /// Create a pending run. Without explicit values the run gets
    /// [`sample_flags`].
    pub fn new(opref: OpRef, flags: Option<BTreeMap<String, FlagValue>>) -> Self {
        Self {
            id: new_id(),
            opref,
            label: None,
            status: RunStatus::Pending,
            flags: flags.unwrap_or_else(sample_flags),
            started: None,
            stopped: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Mark the run as running and record its start time.
    pub fn start(&mut self, clock: &dyn Clock) {
        if self.status != RunStatus::Pending {
            warn!(run = %self.short_id(), status = %self.status, "starting a run that is not pending");
        }
        self.started = Some(clock.now_micros());
        self.status = RunStatus::Running;
    }

    /// Record the stop time and move the run to `status`.
    pub fn stop(&mut self, clock: &dyn Clock, status: RunStatus) {
        if self.status != RunStatus::Running {
            warn!(run = %self.short_id(), status = %self.status, "stopping a run that is not running");
        }
        if !status.is_terminal() {
            warn!(run = %self.short_id(), %status, "stopping a run with a non-terminal status");
        }
        self.stopped = Some(clock.now_micros());
        self.status = status;
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn short_id(&self) -> &str {
        &self.id[..SHORT_ID_LEN.min(self.id.len())]
    }

    pub fn opref(&self) -> &OpRef {
        &self.opref
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn flags(&self) -> &BTreeMap<String, FlagValue> {
        &self.flags
    }

    pub fn started(&self) -> Option<i64> {
        self.started
    }

    pub fn stopped(&self) -> Option<i64> {
        self.stopped
    }

    /// Display label: short id and operation, then the run label if any.
    pub fn label_text(&self) -> String {
        match &self.label {
            Some(label) => format!("{} {} {}", self.short_id(), self.opref, label),
            None => format!("{} {}", self.short_id(), self.opref),
        }
    }
}
