use crate::workflow::{OutputPort, ToolId};
use std::collections::BTreeMap;
use std::fmt;

/// The Python variable holding one tool output.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DataframeHandle(String);

impl DataframeHandle {
    /// `<prefix>_<id>` for the default port, `<prefix>_<id>_<port>` otherwise.
    pub fn name(prefix: &str, tool: ToolId, port: OutputPort) -> Self {
        match port {
            OutputPort::Default => Self(format!("{}_{}", prefix, tool)),
            port => Self(format!(
                "{}_{}_{}",
                prefix,
                tool,
                port.label().to_ascii_lowercase()
            )),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DataframeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handles bound so far, keyed by `(tool, port)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandleMap {
    prefix: String,
    bound: BTreeMap<(ToolId, OutputPort), DataframeHandle>,
}

impl HandleMap {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            bound: BTreeMap::new(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The name a port will have once bound. Does not bind it.
    pub fn name_for(&self, tool: ToolId, port: OutputPort) -> DataframeHandle {
        DataframeHandle::name(&self.prefix, tool, port)
    }

    pub fn bind(&mut self, tool: ToolId, port: OutputPort) -> DataframeHandle {
        let handle = self.name_for(tool, port);
        self.bound.insert((tool, port), handle.clone());
        handle
    }

    pub fn get(&self, tool: ToolId, port: OutputPort) -> Option<&DataframeHandle> {
        self.bound.get(&(tool, port))
    }

    /// Bound ports of one tool, in port order.
    pub fn ports_of(&self, tool: ToolId) -> impl Iterator<Item = (OutputPort, &DataframeHandle)> {
        self.bound
            .range((tool, OutputPort::Default)..=(tool, OutputPort::Duplicate))
            .map(|((_, port), handle)| (*port, handle))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(ToolId, OutputPort), &DataframeHandle)> {
        self.bound.iter()
    }

    pub fn len(&self) -> usize {
        self.bound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }
}
