//! Table report of the records written under a log directory.

use std::path::Path;

use anyhow::Result;
use comfy_table::{presets::UTF8_FULL, Table};
use serde_json::{json, Map, Value};

use hpgen_core::proto::{h_param_value, SessionStartInfo, Status};
use hpgen_core::reader::read_log_dir;
use hpgen_core::{storage, RecordKind};

fn hparams_json(info: &SessionStartInfo) -> Value {
    let mut map = Map::new();
    for (name, value) in &info.hparams {
        let v = match &value.kind {
            Some(h_param_value::Kind::NumberValue(n)) => json!(n),
            Some(h_param_value::Kind::StringValue(s)) => json!(s),
            Some(h_param_value::Kind::BoolValue(b)) => json!(b),
            None => Value::Null,
        };
        map.insert(name.clone(), v);
    }
    Value::Object(map)
}

fn secs(t: Option<f64>) -> String {
    t.map(|t| format!("{t:.6}")).unwrap_or_else(|| "-".to_string())
}

fn detail(kind: &RecordKind) -> String {
    match kind {
        RecordKind::Experiment(exp) => {
            let metrics: Vec<_> = exp
                .metric_infos
                .iter()
                .filter_map(|m| m.name.as_ref().map(|n| n.tag.as_str()))
                .collect();
            let name = if exp.name.is_empty() { "-" } else { &exp.name };
            format!(
                "name={} hparams={} metrics=[{}]",
                name,
                exp.hparam_infos.len(),
                metrics.join(", ")
            )
        }
        RecordKind::SessionStart(info) => format!(
            "group={} start={} hparams={}",
            info.group_name,
            secs(info.start_time_secs),
            hparams_json(info)
        ),
        RecordKind::SessionEnd(info) => {
            let status = Status::try_from(info.status)
                .map(|s| format!("{s:?}"))
                .unwrap_or_else(|_| info.status.to_string());
            format!("status={} end={}", status, secs(info.end_time_secs))
        }
        RecordKind::Scalar { tag, value } => format!("{tag}={value}"),
        RecordKind::Other(tag) => tag.clone(),
    }
}

/// Render every record found at or below `logdir`.
pub fn render(logdir: &Path) -> Result<String> {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(["Directory", "Record", "Step", "Detail"]);

    for dir in storage::list_log_dirs(logdir)? {
        let rel = dir.strip_prefix(logdir).unwrap_or(&dir);
        let rel = if rel.as_os_str().is_empty() {
            ".".to_string()
        } else {
            rel.display().to_string()
        };
        for record in read_log_dir(&dir)? {
            table.add_row([
                rel.clone(),
                record.kind.name().to_string(),
                record.step.to_string(),
                detail(&record.kind),
            ]);
        }
    }
    Ok(table.to_string())
}
