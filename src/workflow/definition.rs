use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub type ToolId = u32;
pub type ContainerId = u32;

/// The complete, structured record set of one workflow, as produced by the markup parser.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    #[serde(default)]
    pub name: String,
    pub tools: Vec<Tool>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub containers: Vec<Container>,
    #[serde(default)]
    pub constants: Vec<Constant>,
}

/// One processing node in the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    pub id: ToolId,
    pub tool_type: ToolType,
    #[serde(default)]
    pub container: Option<ContainerId>,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub annotation: Option<String>,
}

impl Tool {
    pub fn new(id: ToolId, tool_type: ToolType) -> Self {
        Self {
            id,
            tool_type,
            container: None,
            properties: Properties::default(),
            annotation: None,
        }
    }

    pub fn with_property(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key, value);
        self
    }

    pub fn in_container(mut self, container: ContainerId) -> Self {
        self.container = Some(container);
        self
    }
}

/// A directed, port-qualified edge between two tools.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub source: ToolId,
    #[serde(default)]
    pub source_port: OutputPort,
    pub destination: ToolId,
    #[serde(default)]
    pub destination_port: InputPort,
}

impl Connection {
    pub fn new(source: ToolId, destination: ToolId) -> Self {
        Self {
            source,
            source_port: OutputPort::Default,
            destination,
            destination_port: InputPort::Default,
        }
    }

    pub fn from_port(mut self, port: OutputPort) -> Self {
        self.source_port = port;
        self
    }

    pub fn to_port(mut self, port: InputPort) -> Self {
        self.destination_port = port;
        self
    }
}

/// A flat, named grouping of tools. Purely organizational.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Container {
    pub id: ContainerId,
    pub name: String,
    #[serde(default)]
    pub tools: Vec<ToolId>,
}

/// A user-defined constant captured from the workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constant {
    pub name: String,
    pub value: String,
    /// `None` for workflow-wide constants.
    #[serde(default)]
    pub scope: Option<ContainerId>,
}

/// The closed set of tool types the generator knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ToolType {
    Input,
    TextInput,
    Output,
    Filter,
    Formula,
    Sort,
    Sample,
    Unique,
    FindReplace,
    Join,
    Union,
    Summarize,
    CrossTab,
    TextToColumns,
    RegEx,
    Browse,
    InDbSelect,
    InDbFilter,
    InDbJoin,
    InDbStreamOut,
    Macro,
    Unsupported,
}

impl ToolType {
    /// Maps a plugin name to a tool type.
    ///
    /// Accepts short names (`Filter`) as well as dotted plugin identifiers
    /// (`AlteryxBasePluginsGui.Filter.Filter`), in which case the last segment is used.
    /// Anything unknown becomes [`ToolType::Unsupported`].
    pub fn from_plugin_name(plugin: &str) -> ToolType {
        let short = plugin.rsplit('.').next().unwrap_or(plugin);
        match short.to_ascii_lowercase().as_str() {
            "input" | "dbfileinput" | "inputdata" => ToolType::Input,
            "textinput" => ToolType::TextInput,
            "output" | "dbfileoutput" | "outputdata" => ToolType::Output,
            "filter" => ToolType::Filter,
            "formula" => ToolType::Formula,
            "sort" => ToolType::Sort,
            "sample" => ToolType::Sample,
            "unique" => ToolType::Unique,
            "findreplace" => ToolType::FindReplace,
            "join" => ToolType::Join,
            "union" => ToolType::Union,
            "summarize" => ToolType::Summarize,
            "crosstab" => ToolType::CrossTab,
            "texttocolumns" => ToolType::TextToColumns,
            "regex" => ToolType::RegEx,
            "browse" | "browsev2" => ToolType::Browse,
            "indbselect" | "dbconnect" | "connectindb" => ToolType::InDbSelect,
            "indbfilter" => ToolType::InDbFilter,
            "indbjoin" => ToolType::InDbJoin,
            "indbstreamout" | "datastreamout" => ToolType::InDbStreamOut,
            "macro" => ToolType::Macro,
            _ => ToolType::Unsupported,
        }
    }

    /// The output ports this tool type declares, in emission order.
    pub fn output_ports(&self) -> &'static [OutputPort] {
        match self {
            ToolType::Output | ToolType::Browse => &[],
            ToolType::Filter => &[OutputPort::True, OutputPort::False],
            ToolType::Join => &[OutputPort::Join, OutputPort::Left, OutputPort::Right],
            ToolType::Unique => &[OutputPort::Unique, OutputPort::Duplicate],
            _ => &[OutputPort::Default],
        }
    }

    /// Whether a connection may arrive on `port`.
    pub fn accepts_input(&self, port: &InputPort) -> bool {
        match self {
            ToolType::Input | ToolType::TextInput | ToolType::InDbSelect => false,
            ToolType::Join | ToolType::InDbJoin => {
                matches!(port, InputPort::Left | InputPort::Right)
            }
            ToolType::Union => matches!(port, InputPort::Numbered(_) | InputPort::Default),
            // Stubs swallow whatever the original tool accepted.
            ToolType::Macro | ToolType::Unsupported => true,
            _ => matches!(port, InputPort::Default),
        }
    }

    /// Tools that legitimately have no producer.
    pub fn is_source(&self) -> bool {
        matches!(
            self,
            ToolType::Input | ToolType::TextInput | ToolType::InDbSelect
        )
    }

    /// Tools that legitimately have no consumer.
    pub fn is_sink(&self) -> bool {
        matches!(self, ToolType::Output | ToolType::Browse)
    }
}

impl fmt::Display for ToolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A named output channel of a tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OutputPort {
    #[default]
    Default,
    True,
    False,
    Join,
    Left,
    Right,
    Unique,
    Duplicate,
}

impl OutputPort {
    pub fn label(&self) -> &'static str {
        match self {
            OutputPort::Default => "",
            OutputPort::True => "True",
            OutputPort::False => "False",
            OutputPort::Join => "Join",
            OutputPort::Left => "Left",
            OutputPort::Right => "Right",
            OutputPort::Unique => "Unique",
            OutputPort::Duplicate => "Duplicate",
        }
    }
}

impl fmt::Display for OutputPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for OutputPort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "Output" => Ok(OutputPort::Default),
            "True" => Ok(OutputPort::True),
            "False" => Ok(OutputPort::False),
            "Join" => Ok(OutputPort::Join),
            "Left" => Ok(OutputPort::Left),
            "Right" => Ok(OutputPort::Right),
            "Unique" => Ok(OutputPort::Unique),
            "Duplicate" | "Duplicates" => Ok(OutputPort::Duplicate),
            other => Err(other.to_string()),
        }
    }
}

/// A named input channel of a tool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum InputPort {
    #[default]
    Default,
    Left,
    Right,
    /// Union inputs, `#1`, `#2`, ...
    Numbered(u32),
}

impl fmt::Display for InputPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputPort::Default => Ok(()),
            InputPort::Left => write!(f, "Left"),
            InputPort::Right => write!(f, "Right"),
            InputPort::Numbered(n) => write!(f, "#{}", n),
        }
    }
}

impl FromStr for InputPort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "Input" => Ok(InputPort::Default),
            "Left" => Ok(InputPort::Left),
            "Right" => Ok(InputPort::Right),
            other => other
                .strip_prefix('#')
                .and_then(|n| n.parse().ok())
                .map(InputPort::Numbered)
                .ok_or_else(|| other.to_string()),
        }
    }
}

macro_rules! label_serde {
    ($port:ty) => {
        impl Serialize for $port {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $port {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let label = String::deserialize(deserializer)?;
                label.parse().map_err(|bad: String| {
                    serde::de::Error::custom(format!("unknown port label '{}'", bad))
                })
            }
        }
    };
}

label_serde!(OutputPort);
label_serde!(InputPort);

/// Raw tool configuration: string keys to raw string values, in source order.
///
/// Order matters for tools such as Formula, where later fields may reference earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties(Vec<(String, String)>);

impl Properties {
    /// Inserts or replaces a value, keeping the original position on replace.
    pub fn insert(&mut self, key: &str, value: &str) {
        match self.0.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.0.push((key.to_string(), value.to_string())),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut properties = Properties::default();
        for (k, v) in iter {
            properties.insert(&k.into(), &v.into());
        }
        properties
    }
}

impl Serialize for Properties {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct PropertiesVisitor;

impl<'de> Visitor<'de> for PropertiesVisitor {
    type Value = Properties;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of property names to string values")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Properties, A::Error> {
        let mut properties = Properties::default();
        while let Some((key, value)) = access.next_entry::<String, serde_json::Value>()? {
            // Scalars are accepted and stringified, since parsers disagree on quoting numbers.
            let raw = match value {
                serde_json::Value::String(s) => s,
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            };
            properties.insert(&key, &raw);
        }
        Ok(properties)
    }
}

impl<'de> Deserialize<'de> for Properties {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(PropertiesVisitor)
    }
}
