//! hpgen-cli: scenario runner writing hparams fixtures for TensorBoard.
//!
//! A scenario drives one or more [`hpgen_core::SampleRun`]s through their
//! lifecycle and writes the matching hparams records to a log directory.
//! [`report`] renders what ended up on disk.

pub mod context;
pub mod report;
pub mod scenarios;

pub use context::{AutoConfirm, Console, ScenarioContext, StdinConsole};
pub use scenarios::{Scenario, CATALOG};
