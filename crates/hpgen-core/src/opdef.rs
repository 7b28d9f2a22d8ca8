//! Operation and flag definitions loaded from a YAML guild file.
//!
//! Two layouts are accepted. A list of models:
//!
//! ```yaml
//! - model: quad
//!   operations:
//!     noisy:
//!       flags:
//!         noise: {type: float, min: 0.0, max: 0.3}
//!         x: 1.0
//! ```
//!
//! or a bare mapping of operations, which is read as one anonymous model.
//! A flag given as a plain scalar is shorthand for its default value.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::error::{HpgenError, Result};
use crate::models::{FlagDef, FlagType, FlagValue};
use crate::run::OpRef;

/// File name looked up by [`GuildFile::from_dir`].
pub const GUILD_FILE_NAME: &str = "guild.yml";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GuildFileData {
    Models(Vec<ModelData>),
    Operations(BTreeMap<String, OperationData>),
}

#[derive(Debug, Deserialize)]
struct ModelData {
    #[serde(default)]
    model: String,
    #[serde(default)]
    operations: BTreeMap<String, OperationData>,
}

#[derive(Debug, Default, Deserialize)]
struct OperationData {
    #[serde(default)]
    description: String,
    #[serde(default)]
    flags: Mapping,
}

#[derive(Debug, Default, Deserialize)]
struct FlagAttrs {
    #[serde(rename = "type")]
    flag_type: Option<FlagType>,
    description: Option<String>,
    default: Option<Value>,
    min: Option<f64>,
    max: Option<f64>,
}

/// A parsed guild file.
#[derive(Debug, Clone)]
pub struct GuildFile {
    pub src: Option<PathBuf>,
    pub models: Vec<ModelDef>,
}

#[derive(Debug, Clone)]
pub struct ModelDef {
    pub name: String,
    pub operations: BTreeMap<String, OperationDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationDef {
    pub model: String,
    pub name: String,
    pub description: String,
    /// Flags in declaration order.
    pub flags: Vec<FlagDef>,
}

impl GuildFile {
    /// Load `guild.yml` from `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        Self::from_path(&dir.join(GUILD_FILE_NAME))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(HpgenError::Config(format!(
                "guild file not found: {}",
                path.display()
            )));
        }
        let content = fs::read_to_string(path)?;
        let mut gf = Self::parse(&content)?;
        gf.src = Some(path.to_path_buf());
        Ok(gf)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let data: GuildFileData = serde_yaml::from_str(content)?;
        let models = match data {
            GuildFileData::Models(models) => models
                .into_iter()
                .map(|m| ModelDef::resolve(m.model, m.operations))
                .collect::<Result<Vec<_>>>()?,
            GuildFileData::Operations(ops) => vec![ModelDef::resolve(String::new(), ops)?],
        };
        Ok(Self { src: None, models })
    }

    /// The first model in the file.
    pub fn default_model(&self) -> Option<&ModelDef> {
        self.models.first()
    }

    /// Look up an operation of the default model; a missing operation is a
    /// configuration error.
    pub fn operation(&self, name: &str) -> Result<OperationDef> {
        self.default_model()
            .and_then(|m| m.get_operation(name))
            .cloned()
            .ok_or_else(|| HpgenError::OperationNotFound(name.to_string()))
    }
}

impl ModelDef {
    fn resolve(name: String, ops: BTreeMap<String, OperationData>) -> Result<Self> {
        let mut operations = BTreeMap::new();
        for (op_name, data) in ops {
            let flags = flag_defs(&data.flags)?;
            operations.insert(
                op_name.clone(),
                OperationDef {
                    model: name.clone(),
                    name: op_name,
                    description: data.description,
                    flags,
                },
            );
        }
        Ok(Self { name, operations })
    }

    pub fn get_operation(&self, name: &str) -> Option<&OperationDef> {
        self.operations.get(name)
    }
}

impl OperationDef {
    pub fn opref(&self) -> OpRef {
        OpRef::new(&self.model, &self.name)
    }

    pub fn flag(&self, name: &str) -> Option<&FlagDef> {
        self.flags.iter().find(|f| f.name == name)
    }
}

fn flag_defs(flags: &Mapping) -> Result<Vec<FlagDef>> {
    let mut defs = Vec::with_capacity(flags.len());
    for (key, value) in flags {
        let name = key
            .as_str()
            .ok_or_else(|| HpgenError::Config(format!("flag name must be a string: {key:?}")))?;
        let attrs = match value {
            Value::Mapping(_) => serde_yaml::from_value::<FlagAttrs>(value.clone())?,
            Value::Null => FlagAttrs::default(),
            other => FlagAttrs {
                default: Some(other.clone()),
                ..Default::default()
            },
        };
        let flag_type = attrs
            .flag_type
            .or_else(|| attrs.default.as_ref().and_then(inferred_type));
        defs.push(FlagDef {
            name: name.to_string(),
            flag_type,
            description: attrs.description.unwrap_or_default(),
            min: attrs.min,
            max: attrs.max,
        });
    }
    Ok(defs)
}

/// Type implied by a default value when a flag declares none.
fn inferred_type(default: &Value) -> Option<FlagType> {
    match default {
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(FlagType::Int),
        Value::Number(_) => Some(FlagType::Float),
        Value::String(_) => Some(FlagType::String),
        Value::Bool(_) => Some(FlagType::Other),
        _ => None,
    }
}

/// Load flag values for a run from a YAML mapping of `name: value`.
pub fn load_flag_values(path: &Path) -> Result<BTreeMap<String, FlagValue>> {
    let content = fs::read_to_string(path)?;
    parse_flag_values(&content)
}

pub fn parse_flag_values(content: &str) -> Result<BTreeMap<String, FlagValue>> {
    let value: Value = serde_yaml::from_str(content)?;
    let Value::Mapping(map) = value else {
        return Err(HpgenError::Config(
            "flag values must be a mapping of name to value".to_string(),
        ));
    };
    let mut flags = BTreeMap::new();
    for (key, value) in &map {
        let name = key
            .as_str()
            .ok_or_else(|| HpgenError::Config(format!("flag name must be a string: {key:?}")))?;
        flags.insert(name.to_string(), FlagValue::from_yaml(name, value)?);
    }
    Ok(flags)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODELS: &str = r#"
- model: quad
  operations:
    noisy:
      description: Noisy quadratic
      flags:
        x:
          type: float
          description: Input
          min: -3.0
          max: 3.0
        noise: 0.1
        layers: 2
        label:
"#;

    #[test]
    fn model_list_keeps_flag_order() {
        let gf = GuildFile::parse(MODELS).unwrap();
        let op = gf.operation("noisy").unwrap();
        assert_eq!(op.model, "quad");
        assert_eq!(op.description, "Noisy quadratic");
        let names: Vec<_> = op.flags.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["x", "noise", "layers", "label"]);
        assert_eq!(op.flags[0].min, Some(-3.0));
        assert_eq!(op.flags[0].description, "Input");
        assert_eq!(op.opref().to_string(), "quad:noisy");
    }

    #[test]
    fn shorthand_defaults_infer_type() {
        let gf = GuildFile::parse(MODELS).unwrap();
        let op = gf.operation("noisy").unwrap();
        assert_eq!(op.flag("noise").unwrap().flag_type, Some(FlagType::Float));
        assert_eq!(op.flag("layers").unwrap().flag_type, Some(FlagType::Int));
        assert_eq!(op.flag("label").unwrap().flag_type, None);
    }

    #[test]
    fn operation_only_file_is_anonymous_model() {
        let gf = GuildFile::parse("noisy:\n  flags:\n    x: 1.0\n").unwrap();
        let op = gf.operation("noisy").unwrap();
        assert_eq!(op.model, "");
        assert_eq!(op.opref().to_string(), "noisy");
    }

    #[test]
    fn missing_operation_is_config_error() {
        let gf = GuildFile::parse(MODELS).unwrap();
        let err = gf.operation("train").unwrap_err();
        assert!(matches!(err, HpgenError::OperationNotFound(ref n) if n == "train"));
    }

    #[test]
    fn flag_values_reject_lists() {
        let flags = parse_flag_values("x: 2\nnoise: 0.5\nname: cat\nfast: true\n").unwrap();
        assert_eq!(flags["x"], FlagValue::Int(2));
        assert_eq!(flags["fast"], FlagValue::Bool(true));
        let err = parse_flag_values("x: [1, 2]\n").unwrap_err();
        assert!(matches!(err, HpgenError::ContractViolation { .. }));
    }
}
