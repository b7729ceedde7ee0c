use super::{Properties, ToolType};
use crate::error::ConfigError;
use std::fmt;
use std::str::FromStr;

/// Typed tool configuration, parsed from raw [`Properties`] according to the tool type.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolConfig {
    Input {
        location: DataLocation,
        header: bool,
    },
    TextInput {
        fields: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    Output {
        location: DataLocation,
        mode: String,
    },
    Filter {
        expression: String,
    },
    Formula {
        /// `(target column, formula)` in evaluation order.
        fields: Vec<(String, String)>,
    },
    Sort {
        keys: Vec<SortKey>,
    },
    Sample {
        n: u64,
        mode: SampleMode,
        seed: Option<u64>,
    },
    Unique {
        fields: Vec<String>,
    },
    FindReplace {
        field: String,
        find: String,
        replace: String,
        regex: bool,
    },
    /// Shared by `Join` and `InDbJoin`.
    Join {
        left_keys: Vec<String>,
        right_keys: Vec<String>,
    },
    Union {
        by_name: bool,
    },
    Summarize {
        group_by: Vec<String>,
        aggregations: Vec<Aggregation>,
    },
    CrossTab {
        group_by: Vec<String>,
        header: String,
        value: String,
        method: AggregateAction,
    },
    TextToColumns {
        field: String,
        delimiter: String,
        columns: u32,
        root_name: String,
    },
    RegEx {
        field: String,
        pattern: String,
        mode: RegexMode,
    },
    InDbSelect {
        query: String,
    },
    InDbFilter {
        expression: String,
    },
    /// Browse and InDbStreamOut carry no configuration.
    Empty,
    /// Macro and Unsupported tools.
    Stub {
        reason: String,
    },
    /// The properties did not match the tool type's schema.
    Malformed(ConfigError),
}

impl ToolConfig {
    /// Parses `properties` against the schema of `tool_type`.
    pub fn parse(tool_type: ToolType, properties: &Properties) -> Result<ToolConfig, ConfigError> {
        let config = match tool_type {
            ToolType::Input => ToolConfig::Input {
                location: DataLocation::from_properties(properties)?,
                header: flag(properties, "header", true)?,
            },
            ToolType::TextInput => ToolConfig::TextInput {
                fields: required_list(properties, "fields")?,
                rows: properties
                    .get("data")
                    .map(|data| {
                        data.split(';')
                            .filter(|row| !row.trim().is_empty())
                            .map(|row| row.split(',').map(|c| c.trim().to_string()).collect())
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            ToolType::Output => ToolConfig::Output {
                location: DataLocation::from_properties(properties)?,
                mode: properties.get("mode").unwrap_or("overwrite").to_string(),
            },
            ToolType::Filter => ToolConfig::Filter {
                expression: required(properties, "expression")?,
            },
            ToolType::Formula => {
                let fields: Vec<(String, String)> = properties
                    .iter()
                    .filter_map(|(k, v)| {
                        k.strip_prefix("field.")
                            .map(|name| (name.to_string(), v.to_string()))
                    })
                    .collect();
                if fields.is_empty() {
                    return Err(ConfigError::MissingKey("field.<name>".to_string()));
                }
                ToolConfig::Formula { fields }
            }
            ToolType::Sort => ToolConfig::Sort {
                keys: required_list(properties, "fields")?
                    .iter()
                    .map(|spec| spec.parse())
                    .collect::<Result<_, _>>()?,
            },
            ToolType::Sample => ToolConfig::Sample {
                n: number(properties, "n")?,
                mode: match properties.get("mode") {
                    Some(raw) => raw.parse()?,
                    None => SampleMode::First,
                },
                seed: properties
                    .get("seed")
                    .map(|_| number(properties, "seed"))
                    .transpose()?,
            },
            ToolType::Unique => ToolConfig::Unique {
                fields: required_list(properties, "fields")?,
            },
            ToolType::FindReplace => ToolConfig::FindReplace {
                field: required(properties, "field")?,
                find: required(properties, "find")?,
                replace: properties.get("replace").unwrap_or_default().to_string(),
                regex: flag(properties, "regex", false)?,
            },
            ToolType::Join | ToolType::InDbJoin => {
                let left_keys = required_list(properties, "left_keys")?;
                let right_keys = required_list(properties, "right_keys")?;
                if left_keys.len() != right_keys.len() {
                    return Err(ConfigError::InvalidValue {
                        key: "right_keys".to_string(),
                        value: right_keys.join(","),
                        reason: format!(
                            "expected {} key(s) to match left_keys",
                            left_keys.len()
                        ),
                    });
                }
                ToolConfig::Join {
                    left_keys,
                    right_keys,
                }
            }
            ToolType::Union => ToolConfig::Union {
                by_name: match properties.get("mode").unwrap_or("name") {
                    "name" => true,
                    "position" => false,
                    other => return Err(invalid("mode", other, "expected 'name' or 'position'")),
                },
            },
            ToolType::Summarize => ToolConfig::Summarize {
                group_by: list(properties, "group_by"),
                aggregations: required_list(properties, "aggregations")?
                    .iter()
                    .map(|spec| spec.parse())
                    .collect::<Result<_, _>>()?,
            },
            ToolType::CrossTab => ToolConfig::CrossTab {
                group_by: list(properties, "group_by"),
                header: required(properties, "header")?,
                value: required(properties, "value")?,
                method: match properties.get("method") {
                    Some(raw) => raw.parse()?,
                    None => AggregateAction::Sum,
                },
            },
            ToolType::TextToColumns => {
                let field = required(properties, "field")?;
                ToolConfig::TextToColumns {
                    root_name: properties.get("root_name").unwrap_or(&field).to_string(),
                    delimiter: required(properties, "delimiter")?,
                    columns: number(properties, "columns")?,
                    field,
                }
            }
            ToolType::RegEx => {
                let pattern = required(properties, "pattern")?;
                if let Err(e) = regex::Regex::new(&pattern) {
                    return Err(invalid("pattern", &pattern, &e.to_string()));
                }
                let field = required(properties, "field")?;
                let output = properties
                    .get("output")
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("{}_parsed", field));
                let mode = match properties.get("mode").unwrap_or("parse") {
                    "match" => RegexMode::Match { output },
                    "parse" => RegexMode::Parse { output },
                    "replace" => RegexMode::Replace {
                        replacement: properties.get("replace").unwrap_or_default().to_string(),
                    },
                    other => {
                        return Err(invalid(
                            "mode",
                            other,
                            "expected 'match', 'parse' or 'replace'",
                        ));
                    }
                };
                ToolConfig::RegEx {
                    field,
                    pattern,
                    mode,
                }
            }
            ToolType::InDbSelect => ToolConfig::InDbSelect {
                query: required(properties, "query")?,
            },
            ToolType::InDbFilter => ToolConfig::InDbFilter {
                expression: required(properties, "expression")?,
            },
            ToolType::Browse | ToolType::InDbStreamOut => ToolConfig::Empty,
            ToolType::Macro => ToolConfig::Stub {
                reason: match properties.get("plugin") {
                    Some(name) => format!("macro '{}' must be converted manually", name),
                    None => "macros must be converted manually".to_string(),
                },
            },
            ToolType::Unsupported => ToolConfig::Stub {
                reason: properties
                    .get("reason")
                    .map(str::to_string)
                    .or_else(|| {
                        properties
                            .get("plugin")
                            .map(|p| format!("plugin '{}' has no dataframe equivalent", p))
                    })
                    .unwrap_or_else(|| "tool type has no dataframe equivalent".to_string()),
            },
        };
        Ok(config)
    }
}

/// Where an Input reads from or an Output writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataLocation {
    Table(String),
    File { path: String, format: String },
}

impl DataLocation {
    fn from_properties(properties: &Properties) -> Result<Self, ConfigError> {
        if let Some(table) = properties.get("table").filter(|t| !t.trim().is_empty()) {
            return Ok(DataLocation::Table(table.trim().to_string()));
        }
        let path = properties
            .get("file")
            .filter(|f| !f.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingKey("table".to_string()))?
            .trim();
        let format = match properties.get("format") {
            Some(format) => format.to_ascii_lowercase(),
            None => match path.rsplit_once('.') {
                Some((_, "yxdb")) => return Err(invalid("file", path, "yxdb files must be exported first")),
                Some((_, ext)) if !ext.contains('/') => ext.to_ascii_lowercase(),
                _ => return Err(ConfigError::MissingKey("format".to_string())),
            },
        };
        Ok(DataLocation::File {
            path: path.to_string(),
            format,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl FromStr for SortKey {
    type Err = ConfigError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let mut parts = spec.split_whitespace();
        let field = parts
            .next()
            .ok_or_else(|| invalid("fields", spec, "empty sort key"))?
            .to_string();
        let descending = match parts.next().map(str::to_ascii_uppercase).as_deref() {
            None | Some("ASC") | Some("ASCENDING") => false,
            Some("DESC") | Some("DESCENDING") => true,
            Some(_) => return Err(invalid("fields", spec, "expected ASC or DESC")),
        };
        Ok(SortKey { field, descending })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleMode {
    First,
    Random,
    Percent,
}

impl FromStr for SampleMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "first" => Ok(SampleMode::First),
            "random" => Ok(SampleMode::Random),
            "percent" => Ok(SampleMode::Percent),
            _ => Err(invalid("mode", s, "expected 'first', 'random' or 'percent'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegexMode {
    Match { output: String },
    Parse { output: String },
    Replace { replacement: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateAction {
    Sum,
    Avg,
    Min,
    Max,
    Count,
    CountDistinct,
    First,
    Last,
    Concat,
}

impl AggregateAction {
    /// Renders the PySpark aggregate call over an already-rendered column.
    pub fn render(&self, column: &str) -> String {
        match self {
            AggregateAction::Sum => format!("F.sum({})", column),
            AggregateAction::Avg => format!("F.avg({})", column),
            AggregateAction::Min => format!("F.min({})", column),
            AggregateAction::Max => format!("F.max({})", column),
            AggregateAction::Count => format!("F.count({})", column),
            AggregateAction::CountDistinct => format!("F.countDistinct({})", column),
            AggregateAction::First => format!("F.first({}, ignorenulls=True)", column),
            AggregateAction::Last => format!("F.last({}, ignorenulls=True)", column),
            AggregateAction::Concat => format!("F.concat_ws(\",\", F.collect_list({}))", column),
        }
    }
}

impl fmt::Display for AggregateAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl FromStr for AggregateAction {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(AggregateAction::Sum),
            "avg" | "average" | "mean" => Ok(AggregateAction::Avg),
            "min" => Ok(AggregateAction::Min),
            "max" => Ok(AggregateAction::Max),
            "count" => Ok(AggregateAction::Count),
            "countdistinct" => Ok(AggregateAction::CountDistinct),
            "first" => Ok(AggregateAction::First),
            "last" => Ok(AggregateAction::Last),
            "concat" | "concatenate" => Ok(AggregateAction::Concat),
            _ => Err(invalid("aggregations", s, "unknown aggregate action")),
        }
    }
}

/// One `Action(Field) [AS Alias]` entry of a Summarize tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    pub action: AggregateAction,
    /// `None` stands for `*`.
    pub field: Option<String>,
    pub alias: String,
}

impl FromStr for Aggregation {
    type Err = ConfigError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let (call, alias) = match spec.to_ascii_uppercase().find(" AS ") {
            Some(idx) => (&spec[..idx], Some(spec[idx + 4..].trim())),
            None => (spec, None),
        };
        let (action, rest) = call
            .trim()
            .split_once('(')
            .ok_or_else(|| invalid("aggregations", spec, "expected Action(Field)"))?;
        let field = rest
            .strip_suffix(')')
            .ok_or_else(|| invalid("aggregations", spec, "missing closing parenthesis"))?
            .trim();
        let action: AggregateAction = action.parse()?;
        let field = match field {
            "" | "*" => None,
            name => Some(name.to_string()),
        };
        let alias = match (alias, &field) {
            (Some(alias), _) if !alias.is_empty() => alias.to_string(),
            (_, Some(name)) => format!("{}_{}", action, name),
            (_, None) => action.to_string(),
        };
        Ok(Aggregation {
            action,
            field,
            alias,
        })
    }
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn required(properties: &Properties, key: &str) -> Result<String, ConfigError> {
    properties
        .get(key)
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
        .ok_or_else(|| ConfigError::MissingKey(key.to_string()))
}

fn list(properties: &Properties, key: &str) -> Vec<String> {
    properties
        .get(key)
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn required_list(properties: &Properties, key: &str) -> Result<Vec<String>, ConfigError> {
    let items = list(properties, key);
    if items.is_empty() {
        Err(ConfigError::MissingKey(key.to_string()))
    } else {
        Ok(items)
    }
}

fn number<T: FromStr>(properties: &Properties, key: &str) -> Result<T, ConfigError> {
    let raw = required(properties, key)?;
    raw.trim()
        .parse()
        .map_err(|_| invalid(key, &raw, "expected a non-negative integer"))
}

fn flag(properties: &Properties, key: &str, default: bool) -> Result<bool, ConfigError> {
    match properties.get(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if v == "true" || v == "1" || v == "yes" => Ok(true),
        Some(v) if v == "false" || v == "0" || v == "no" => Ok(false),
        Some(v) => Err(invalid(key, &v, "expected a boolean")),
    }
}
