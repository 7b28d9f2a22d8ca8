//! Summary builder: maps sample runs and flag definitions onto hparams records.
//!
//! Every function here is pure. The `*_summary` wrappers package a record as
//! `HParamsPluginData` inside a `Summary` value carrying the plugin metadata,
//! which is what a [`SummarySink`] writes.

use std::collections::BTreeMap;

use prost::Message;
use tracing::info;

use crate::error::Result;
use crate::models::{FlagDef, FlagType, FlagValue, RunStatus, ScalarPoint};
use crate::proto::{
    h_param_info, h_param_value, h_params_plugin_data, summary, summary_metadata, DataType,
    Experiment, HParamInfo, HParamValue, HParamsPluginData, Interval, ListValue, MetricInfo,
    MetricName,
    SessionEndInfo, SessionStartInfo, Status, Summary, SummaryMetadata, EXPERIMENT_TAG,
    HPARAMS_DATA_VERSION, HPARAMS_PLUGIN_NAME, SESSION_END_INFO_TAG, SESSION_START_INFO_TAG,
};
use crate::run::SampleRun;
use crate::writer::SummarySink;

/// Value domain of a flag as shown by the hparams dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Continuous,
    Discrete,
    String,
}

impl ValueKind {
    fn data_type(self) -> DataType {
        match self {
            ValueKind::Continuous | ValueKind::Discrete => DataType::Float64,
            ValueKind::String => DataType::String,
        }
    }
}

pub fn value_kind(flag: &FlagDef) -> ValueKind {
    match flag.flag_type {
        Some(FlagType::Float) => ValueKind::Continuous,
        Some(FlagType::Int) => ValueKind::Discrete,
        _ => ValueKind::String,
    }
}

/// Interval domain of a flag, present when it declares `min` or `max`.
///
/// A flag declaring only one bound still gets an interval; the other bound
/// is 0.0.
pub fn interval(flag: &FlagDef) -> Option<Interval> {
    if flag.min.is_none() && flag.max.is_none() {
        return None;
    }
    Some(Interval {
        min_value: flag.min.unwrap_or_default(),
        max_value: flag.max.unwrap_or_default(),
    })
}

fn hparam_info(flag: &FlagDef) -> HParamInfo {
    HParamInfo {
        name: flag.name.clone(),
        description: flag.description.clone(),
        r#type: value_kind(flag).data_type() as i32,
        domain: interval(flag).map(h_param_info::Domain::DomainInterval),
        ..Default::default()
    }
}

fn metric_info(tag: &str) -> MetricInfo {
    MetricInfo {
        name: Some(MetricName {
            tag: tag.to_string(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn build_experiment(flags: &[FlagDef], metric_tags: &[String], name: Option<&str>) -> Experiment {
    Experiment {
        name: name.unwrap_or_default().to_string(),
        hparam_infos: flags.iter().map(hparam_info).collect(),
        metric_infos: metric_tags.iter().map(|t| metric_info(t)).collect(),
        ..Default::default()
    }
}

/// Distinct values of each hparam across a set of runs, in first-seen order.
pub fn collect_hparams<'a>(
    runs: impl IntoIterator<Item = &'a BTreeMap<String, FlagValue>>,
) -> BTreeMap<String, Vec<FlagValue>> {
    let mut all: BTreeMap<String, Vec<FlagValue>> = BTreeMap::new();
    for flags in runs {
        for (name, value) in flags {
            let seen = all.entry(name.clone()).or_default();
            if !seen.contains(value) {
                seen.push(value.clone());
            }
        }
    }
    all
}

fn as_number(value: &FlagValue) -> Option<f64> {
    match value {
        FlagValue::Int(i) => Some(*i as f64),
        FlagValue::Float(f) => Some(*f),
        FlagValue::Bool(_) | FlagValue::Text(_) => None,
    }
}

/// Domain implied by the values a hparam took: an interval spanning them
/// when all are numbers, otherwise the list of distinct values.
pub fn observed_domain(values: &[FlagValue]) -> Option<h_param_info::Domain> {
    if values.is_empty() {
        return None;
    }
    let numbers: Option<Vec<f64>> = values.iter().map(as_number).collect();
    Some(match numbers {
        Some(ns) => h_param_info::Domain::DomainInterval(Interval {
            min_value: ns.iter().copied().fold(f64::INFINITY, f64::min),
            max_value: ns.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }),
        None => h_param_info::Domain::DomainDiscrete(ListValue {
            values: values.iter().map(hparam_value).collect(),
        }),
    })
}

fn observed_data_type(values: &[FlagValue]) -> DataType {
    if values.iter().all(|v| as_number(v).is_some()) {
        DataType::Float64
    } else if values.iter().all(|v| matches!(v, FlagValue::Bool(_))) {
        DataType::Bool
    } else {
        DataType::String
    }
}

/// Experiment whose hparam domains come from observed run values rather
/// than from flag declarations.
pub fn build_observed_experiment(
    hparams: &BTreeMap<String, Vec<FlagValue>>,
    metric_tags: &[String],
) -> Experiment {
    Experiment {
        hparam_infos: hparams
            .iter()
            .map(|(name, values)| HParamInfo {
                name: name.clone(),
                r#type: observed_data_type(values) as i32,
                domain: observed_domain(values),
                ..Default::default()
            })
            .collect(),
        metric_infos: metric_tags.iter().map(|t| metric_info(t)).collect(),
        ..Default::default()
    }
}

pub fn micros_to_secs(micros: i64) -> f64 {
    micros as f64 / 1_000_000.0
}

fn hparam_value(value: &FlagValue) -> HParamValue {
    let kind = match value {
        FlagValue::Int(i) => h_param_value::Kind::NumberValue(*i as f64),
        FlagValue::Float(f) => h_param_value::Kind::NumberValue(*f),
        FlagValue::Text(s) => h_param_value::Kind::StringValue(s.clone()),
        FlagValue::Bool(b) => h_param_value::Kind::BoolValue(*b),
    };
    HParamValue { kind: Some(kind) }
}

pub fn build_session_start(run: &SampleRun) -> SessionStartInfo {
    let hparams: BTreeMap<String, HParamValue> = run
        .flags()
        .iter()
        .map(|(name, value)| (name.clone(), hparam_value(value)))
        .collect();
    SessionStartInfo {
        hparams,
        group_name: run.label_text(),
        start_time_secs: run.started().map(micros_to_secs),
        ..Default::default()
    }
}

pub fn status_code(status: RunStatus) -> Status {
    match status {
        RunStatus::Completed | RunStatus::Terminated => Status::Success,
        RunStatus::Error => Status::Failure,
        RunStatus::Running => Status::Running,
        RunStatus::Pending => Status::Unknown,
    }
}

pub fn build_session_end(run: &SampleRun) -> SessionEndInfo {
    SessionEndInfo {
        status: status_code(run.status()) as i32,
        end_time_secs: run.stopped().map(micros_to_secs),
    }
}

/// Distinct tags of `points`, in first-seen order.
pub fn scalar_tags(points: &[ScalarPoint]) -> Vec<String> {
    let mut tags: Vec<String> = vec![];
    for p in points {
        if !tags.contains(&p.tag) {
            tags.push(p.tag.clone());
        }
    }
    tags
}

fn hparams_summary(tag: &str, data: h_params_plugin_data::Data) -> Summary {
    let plugin_data = HParamsPluginData {
        version: HPARAMS_DATA_VERSION,
        data: Some(data),
    };
    let metadata = SummaryMetadata {
        plugin_data: Some(summary_metadata::PluginData {
            plugin_name: HPARAMS_PLUGIN_NAME.to_string(),
            content: plugin_data.encode_to_vec(),
        }),
    };
    Summary {
        value: vec![summary::Value {
            tag: tag.to_string(),
            metadata: Some(metadata),
            value: None,
        }],
    }
}

pub fn experiment_summary(flags: &[FlagDef], metric_tags: &[String], name: Option<&str>) -> Summary {
    hparams_summary(
        EXPERIMENT_TAG,
        h_params_plugin_data::Data::Experiment(build_experiment(flags, metric_tags, name)),
    )
}

pub fn observed_experiment_summary(
    hparams: &BTreeMap<String, Vec<FlagValue>>,
    metric_tags: &[String],
) -> Summary {
    hparams_summary(
        EXPERIMENT_TAG,
        h_params_plugin_data::Data::Experiment(build_observed_experiment(hparams, metric_tags)),
    )
}

pub fn session_start_summary(run: &SampleRun) -> Summary {
    hparams_summary(
        SESSION_START_INFO_TAG,
        h_params_plugin_data::Data::SessionStartInfo(build_session_start(run)),
    )
}

pub fn session_end_summary(run: &SampleRun) -> Summary {
    hparams_summary(
        SESSION_END_INFO_TAG,
        h_params_plugin_data::Data::SessionEndInfo(build_session_end(run)),
    )
}

// ─── Sink helpers ────────────────────────────────────────────────────────────

pub fn add_experiment(
    sink: &mut dyn SummarySink,
    flags: &[FlagDef],
    metric_tags: &[String],
    name: Option<&str>,
) -> Result<()> {
    info!(
        " - Experiment with {} flag(s) and {} metric(s)",
        flags.len(),
        metric_tags.len()
    );
    sink.add_summary(experiment_summary(flags, metric_tags, name), 0)
}

pub fn add_observed_experiment(
    sink: &mut dyn SummarySink,
    hparams: &BTreeMap<String, Vec<FlagValue>>,
    metric_tags: &[String],
) -> Result<()> {
    info!(
        " - Experiment with {} observed hparam(s) and {} metric(s)",
        hparams.len(),
        metric_tags.len()
    );
    sink.add_summary(observed_experiment_summary(hparams, metric_tags), 0)
}

pub fn add_session_start_info(sink: &mut dyn SummarySink, run: &SampleRun) -> Result<()> {
    info!(" - Session start info for run '{}'", run.opref());
    sink.add_summary(session_start_summary(run), 0)
}

pub fn add_session_end_info(sink: &mut dyn SummarySink, run: &SampleRun) -> Result<()> {
    info!(
        " - Session end info for run '{}' (status={})",
        run.opref(),
        run.status()
    );
    sink.add_summary(session_end_summary(run), 0)
}

/// Forward each point to the sink, in order.
pub fn add_scalars(sink: &mut dyn SummarySink, points: &[ScalarPoint]) -> Result<()> {
    info!(" - Scalars for {} value(s)", points.len());
    for p in points {
        sink.add_scalar(&p.tag, p.value, p.step)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::{ManualClock, OpRef};

    fn run_with(flags: Vec<(&str, FlagValue)>) -> SampleRun {
        let flags = flags
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        SampleRun::new(OpRef::new("", "noisy"), Some(flags))
    }

    #[test]
    fn interval_uses_declared_bounds() {
        let flag = FlagDef::new("x").with_range(Some(-3.0), Some(3.0));
        assert_eq!(
            interval(&flag),
            Some(Interval {
                min_value: -3.0,
                max_value: 3.0
            })
        );
    }

    #[test]
    fn interval_with_one_bound_defaults_other_to_zero() {
        let flag = FlagDef::new("lr").with_range(None, Some(0.5));
        assert_eq!(
            interval(&flag),
            Some(Interval {
                min_value: 0.0,
                max_value: 0.5
            })
        );
        let flag = FlagDef::new("lr").with_range(Some(-2.0), None);
        assert_eq!(interval(&flag).unwrap().max_value, 0.0);
        assert!(interval(&FlagDef::new("lr")).is_none());
    }

    #[test]
    fn flag_types_map_to_value_kinds() {
        assert_eq!(
            value_kind(&FlagDef::new("a").with_type(FlagType::Float)),
            ValueKind::Continuous
        );
        assert_eq!(
            value_kind(&FlagDef::new("a").with_type(FlagType::Int)),
            ValueKind::Discrete
        );
        assert_eq!(
            value_kind(&FlagDef::new("a").with_type(FlagType::Other)),
            ValueKind::String
        );
        assert_eq!(value_kind(&FlagDef::new("a")), ValueKind::String);
    }

    #[test]
    fn status_mapping_is_exact() {
        assert_eq!(status_code(RunStatus::Completed), Status::Success);
        assert_eq!(status_code(RunStatus::Terminated), Status::Success);
        assert_eq!(status_code(RunStatus::Error), Status::Failure);
        assert_eq!(status_code(RunStatus::Running), Status::Running);
        assert_eq!(status_code(RunStatus::Pending), Status::Unknown);
    }

    #[test]
    fn scalar_tags_are_deduplicated() {
        let points = vec![
            ScalarPoint::new("loss", 1.0, 1),
            ScalarPoint::new("loss", -0.4, 2),
        ];
        assert_eq!(scalar_tags(&points), vec!["loss".to_string()]);
    }

    #[test]
    fn session_start_classifies_values() {
        let run = run_with(vec![
            ("flag", FlagValue::Bool(true)),
            ("n", FlagValue::Int(3)),
            ("lr", FlagValue::Float(0.5)),
            ("name", FlagValue::Text("cat".into())),
        ]);
        let info = build_session_start(&run);
        assert_eq!(
            info.hparams["flag"].kind,
            Some(h_param_value::Kind::BoolValue(true))
        );
        assert_eq!(
            info.hparams["n"].kind,
            Some(h_param_value::Kind::NumberValue(3.0))
        );
        assert_eq!(
            info.hparams["lr"].kind,
            Some(h_param_value::Kind::NumberValue(0.5))
        );
        assert_eq!(
            info.hparams["name"].kind,
            Some(h_param_value::Kind::StringValue("cat".into()))
        );
        assert_eq!(info.start_time_secs, None);
        assert_eq!(info.group_name, format!("{} noisy", run.short_id()));
    }

    #[test]
    fn session_times_are_seconds() {
        let clock = ManualClock::new(2_500_000, 1_000_000);
        let mut run = run_with(vec![]);
        run.start(&clock);
        run.stop(&clock, RunStatus::Error);
        assert_eq!(build_session_start(&run).start_time_secs, Some(2.5));
        let end = build_session_end(&run);
        assert_eq!(end.end_time_secs, Some(3.5));
        assert_eq!(end.status, Status::Failure as i32);
    }

    #[test]
    fn pending_run_has_no_end_time() {
        let end = build_session_end(&run_with(vec![]));
        assert_eq!(end.status, Status::Unknown as i32);
        assert_eq!(end.end_time_secs, None);
    }

    #[test]
    fn experiment_summary_carries_plugin_data() {
        let flags = vec![FlagDef::new("x").with_type(FlagType::Float)];
        let summary = experiment_summary(&flags, &["loss".to_string()], Some("1"));
        let value = &summary.value[0];
        assert_eq!(value.tag, EXPERIMENT_TAG);
        let plugin = value.metadata.as_ref().unwrap().plugin_data.as_ref().unwrap();
        assert_eq!(plugin.plugin_name, HPARAMS_PLUGIN_NAME);
        let data = HParamsPluginData::decode(plugin.content.as_slice()).unwrap();
        let Some(h_params_plugin_data::Data::Experiment(exp)) = data.data else {
            panic!("expected experiment data");
        };
        assert_eq!(exp.name, "1");
        assert_eq!(exp.hparam_infos.len(), 1);
        assert_eq!(exp.hparam_infos[0].r#type, DataType::Float64 as i32);
        assert_eq!(
            exp.metric_infos[0].name.as_ref().map(|n| n.tag.as_str()),
            Some("loss")
        );
    }

    #[test]
    fn collected_hparams_keep_distinct_values() {
        let a = BTreeMap::from([("x".to_string(), FlagValue::Float(1.0))]);
        let b = BTreeMap::from([
            ("x".to_string(), FlagValue::Float(1.0)),
            ("z".to_string(), FlagValue::Text("cat".into())),
        ]);
        let c = BTreeMap::from([("x".to_string(), FlagValue::Float(1.2))]);
        let all = collect_hparams([&a, &b, &c]);
        assert_eq!(all["x"], vec![FlagValue::Float(1.0), FlagValue::Float(1.2)]);
        assert_eq!(all["z"], vec![FlagValue::Text("cat".into())]);
    }

    #[test]
    fn numeric_values_span_an_interval() {
        let values = vec![FlagValue::Int(2), FlagValue::Float(0.5), FlagValue::Int(1)];
        assert_eq!(
            observed_domain(&values),
            Some(h_param_info::Domain::DomainInterval(Interval {
                min_value: 0.5,
                max_value: 2.0
            }))
        );
        assert_eq!(observed_data_type(&values), DataType::Float64);
    }

    #[test]
    fn mixed_values_become_discrete() {
        let values = vec![FlagValue::Text("cat".into()), FlagValue::Bool(true)];
        let Some(h_param_info::Domain::DomainDiscrete(list)) = observed_domain(&values) else {
            panic!("expected a discrete domain");
        };
        assert_eq!(
            list.values.iter().map(|v| v.kind.clone()).collect::<Vec<_>>(),
            vec![
                Some(h_param_value::Kind::StringValue("cat".into())),
                Some(h_param_value::Kind::BoolValue(true)),
            ]
        );
        assert_eq!(observed_data_type(&values), DataType::String);
        assert_eq!(
            observed_data_type(&[FlagValue::Bool(false)]),
            DataType::Bool
        );
        assert!(observed_domain(&[]).is_none());
    }
}
