//! Event-file writer.
//!
//! Records are framed as TFRecords: little-endian `u64` length, masked
//! CRC32C of the length bytes, the serialized `Event`, masked CRC32C of the
//! payload. Every file starts with a `brain.Event:2` file-version event.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use prost::Message;
use tracing::{debug, error};

use crate::error::Result;
use crate::proto::{event, summary, Event, Summary, FILE_VERSION};
use crate::storage;

const CRC_MASK_DELTA: u32 = 0xa282_ead8;

/// Destination for summary records.
pub trait SummarySink {
    fn add_summary(&mut self, summary: Summary, step: i64) -> Result<()>;

    fn add_scalar(&mut self, tag: &str, value: f64, step: i64) -> Result<()> {
        self.add_summary(scalar_summary(tag, value), step)
    }

    fn flush(&mut self) -> Result<()>;

    /// Flush and release the destination. Further writes fail.
    fn close(&mut self) -> Result<()>;
}

pub fn scalar_summary(tag: &str, value: f64) -> Summary {
    Summary {
        value: vec![summary::Value {
            tag: tag.to_string(),
            metadata: None,
            value: Some(summary::value::Value::SimpleValue(value as f32)),
        }],
    }
}

pub fn masked_crc(data: &[u8]) -> u32 {
    crc32c::crc32c(data).rotate_right(15).wrapping_add(CRC_MASK_DELTA)
}

pub fn write_record<W: Write>(w: &mut W, data: &[u8]) -> io::Result<()> {
    let len = (data.len() as u64).to_le_bytes();
    w.write_all(&len)?;
    w.write_all(&masked_crc(&len).to_le_bytes())?;
    w.write_all(data)?;
    w.write_all(&masked_crc(data).to_le_bytes())?;
    Ok(())
}

fn wall_time() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

fn host_name() -> String {
    gethostname::gethostname()
        .into_string()
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Pick an unused `events.out.tfevents.<secs>.<host>` name in `logdir`.
///
/// Names taken within the same second get a zero-padded `.NNNN` suffix so
/// that sorting by name keeps creation order.
fn event_file_path(logdir: &Path) -> PathBuf {
    let base = format!(
        "events.out.tfevents.{:010}.{}",
        Utc::now().timestamp(),
        host_name()
    );
    let mut path = logdir.join(&base);
    let mut n = 1;
    while path.exists() {
        path = logdir.join(format!("{base}.{n:04}"));
        n += 1;
    }
    path
}

/// Writes one event file in a log directory.
pub struct EventFileWriter {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl EventFileWriter {
    /// Create `logdir` if needed and start a new event file in it.
    pub fn open(logdir: &Path) -> Result<Self> {
        storage::ensure_dir(logdir)?;
        let path = event_file_path(logdir);
        let file = OpenOptions::new().write(true).create_new(true).open(&path)?;
        debug!(path = %path.display(), "opened event file");
        let mut writer = Self {
            path,
            writer: Some(BufWriter::new(file)),
        };
        writer.add_event(&Event {
            wall_time: wall_time(),
            step: 0,
            what: Some(event::What::FileVersion(FILE_VERSION.to_string())),
        })?;
        Ok(writer)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn add_event(&mut self, event: &Event) -> Result<()> {
        let w = self
            .writer
            .as_mut()
            .ok_or_else(|| io::Error::other("event writer is closed"))?;
        write_record(w, &event.encode_to_vec())?;
        Ok(())
    }
}

impl SummarySink for EventFileWriter {
    fn add_summary(&mut self, summary: Summary, step: i64) -> Result<()> {
        self.add_event(&Event {
            wall_time: wall_time(),
            step,
            what: Some(event::What::Summary(summary)),
        })
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(w) = self.writer.as_mut() {
            w.flush()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut w) = self.writer.take() {
            w.flush()?;
            w.get_ref().sync_all()?;
        }
        Ok(())
    }
}

impl Drop for EventFileWriter {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!("Failed to close event file {}: {}", self.path.display(), e);
        }
    }
}
