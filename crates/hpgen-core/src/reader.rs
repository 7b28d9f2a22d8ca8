//! Reads event files back into typed records.

use std::fs;
use std::path::{Path, PathBuf};

use prost::Message;

use crate::error::{HpgenError, Result};
use crate::proto::{
    event, h_params_plugin_data, summary, Event, Experiment, HParamsPluginData, SessionEndInfo,
    SessionStartInfo, HPARAMS_PLUGIN_NAME,
};
use crate::storage;
use crate::writer::masked_crc;

/// What a logged summary value holds.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordKind {
    Experiment(Experiment),
    SessionStart(SessionStartInfo),
    SessionEnd(SessionEndInfo),
    Scalar { tag: String, value: f32 },
    Other(String),
}

impl RecordKind {
    pub fn name(&self) -> &'static str {
        match self {
            RecordKind::Experiment(_) => "experiment",
            RecordKind::SessionStart(_) => "session_start",
            RecordKind::SessionEnd(_) => "session_end",
            RecordKind::Scalar { .. } => "scalar",
            RecordKind::Other(_) => "other",
        }
    }
}

/// One summary value found in an event file.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedRecord {
    pub file: PathBuf,
    pub wall_time: f64,
    pub step: i64,
    pub kind: RecordKind,
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(buf)
}

/// Read every event of one file, checking both record checksums.
pub fn read_events(path: &Path) -> Result<Vec<Event>> {
    let data = fs::read(path)?;
    let corrupt = |what: &str, pos: usize| {
        HpgenError::CorruptRecord(format!("{what} at byte {pos} of {}", path.display()))
    };
    let mut events = vec![];
    let mut pos = 0;
    while pos < data.len() {
        if data.len() - pos < 12 {
            return Err(corrupt("truncated header", pos));
        }
        let len_bytes = &data[pos..pos + 8];
        if read_u32(&data[pos + 8..]) != masked_crc(len_bytes) {
            return Err(corrupt("length checksum mismatch", pos));
        }
        let mut len_buf = [0u8; 8];
        len_buf.copy_from_slice(len_bytes);
        let len = u64::from_le_bytes(len_buf) as usize;
        let start = pos + 12;
        let end = start
            .checked_add(len)
            .filter(|end| end.checked_add(4).is_some_and(|e| e <= data.len()))
            .ok_or_else(|| corrupt("truncated payload", pos))?;
        let payload = &data[start..end];
        if read_u32(&data[end..]) != masked_crc(payload) {
            return Err(corrupt("payload checksum mismatch", pos));
        }
        events.push(Event::decode(payload)?);
        pos = end + 4;
    }
    Ok(events)
}

fn classify(value: summary::Value) -> Result<RecordKind> {
    let plugin = value
        .metadata
        .and_then(|m| m.plugin_data)
        .filter(|p| p.plugin_name == HPARAMS_PLUGIN_NAME);
    if let Some(plugin) = plugin {
        let data = HParamsPluginData::decode(plugin.content.as_slice())?;
        return Ok(match data.data {
            Some(h_params_plugin_data::Data::Experiment(e)) => RecordKind::Experiment(e),
            Some(h_params_plugin_data::Data::SessionStartInfo(s)) => RecordKind::SessionStart(s),
            Some(h_params_plugin_data::Data::SessionEndInfo(s)) => RecordKind::SessionEnd(s),
            None => RecordKind::Other(value.tag),
        });
    }
    Ok(match value.value {
        Some(summary::value::Value::SimpleValue(v)) => RecordKind::Scalar {
            tag: value.tag,
            value: v,
        },
        None => RecordKind::Other(value.tag),
    })
}

/// Summary records of one event file, in append order. The file-version
/// header is skipped.
pub fn read_records(path: &Path) -> Result<Vec<LoggedRecord>> {
    let mut records = vec![];
    for ev in read_events(path)? {
        let Some(event::What::Summary(summary)) = ev.what else {
            continue;
        };
        for value in summary.value {
            records.push(LoggedRecord {
                file: path.to_path_buf(),
                wall_time: ev.wall_time,
                step: ev.step,
                kind: classify(value)?,
            });
        }
    }
    Ok(records)
}

/// Records of all event files directly inside `dir`, files in name order.
pub fn read_log_dir(dir: &Path) -> Result<Vec<LoggedRecord>> {
    let mut records = vec![];
    for file in storage::list_event_files(dir)? {
        records.extend(read_records(&file)?);
    }
    Ok(records)
}
