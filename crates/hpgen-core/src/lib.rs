//! hpgen-core: sample runs, hparams summary records and event-file I/O.
//!
//! Scenarios build [`SampleRun`]s, turn them into hparams plugin records with
//! the pure functions in [`summary`], and hand the records to a
//! [`SummarySink`]. The on-disk sink is [`EventFileWriter`], which produces
//! TensorBoard event files; [`reader`] reads them back.

pub mod error;
pub mod models;
pub mod opdef;
pub mod proto;
pub mod reader;
pub mod run;
pub mod storage;
pub mod summary;
pub mod writer;

pub use error::{HpgenError, Result};
pub use models::{FlagDef, FlagType, FlagValue, RunStatus, ScalarPoint};
pub use opdef::{GuildFile, OperationDef};
pub use reader::{LoggedRecord, RecordKind};
pub use run::{Clock, ManualClock, OpRef, SampleRun, SystemClock};
pub use writer::{EventFileWriter, SummarySink};
