use crate::graph::CyclePolicy;
use serde::{Deserialize, Serialize};

/// Unity Catalog coordinates used to resolve table names and file paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableLocation {
    pub catalog: String,
    pub schema: String,
    pub volume: String,
}

impl Default for TableLocation {
    fn default() -> Self {
        Self {
            catalog: "main".to_string(),
            schema: "default".to_string(),
            volume: "files".to_string(),
        }
    }
}

impl TableLocation {
    /// Qualifies a table name: three-part names pass through, two-part names get the
    /// catalog, bare names get `catalog.schema.`.
    pub fn resolve_table(&self, name: &str) -> String {
        let name = name.trim();
        match name.split('.').count() {
            1 => format!("{}.{}.{}", self.catalog, self.schema, name),
            2 => format!("{}.{}", self.catalog, name),
            _ => name.to_string(),
        }
    }

    /// Maps a file path into the configured volume.
    ///
    /// POSIX-absolute paths and URIs pass through. Windows paths keep only their file name;
    /// relative paths keep their directories.
    pub fn resolve_file(&self, path: &str) -> String {
        let path = path.trim();
        if path.starts_with('/') || path.contains("://") || path.starts_with("dbfs:") {
            return path.to_string();
        }
        let relative = if is_windows_absolute(path) {
            path.rsplit(['\\', '/']).next().unwrap_or(path).to_string()
        } else {
            path.trim_start_matches("./").replace('\\', "/")
        };
        format!(
            "/Volumes/{}/{}/{}/{}",
            self.catalog, self.schema, self.volume, relative
        )
    }
}

fn is_windows_absolute(path: &str) -> bool {
    let bytes = path.as_bytes();
    path.starts_with("\\\\")
        || (bytes.len() >= 3
            && bytes[0].is_ascii_alphabetic()
            && bytes[1] == b':'
            && (bytes[2] == b'\\' || bytes[2] == b'/'))
}

/// Settings threaded through one generation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Where Input tools read from.
    pub input: TableLocation,
    /// Where Output tools write to.
    pub output: TableLocation,
    pub dataframe_prefix: String,
    /// Applied when the graph is built by the transpiler.
    pub cycle_policy: CyclePolicy,
    /// Lines copied verbatim into the configuration cell.
    pub preamble: Vec<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            input: TableLocation::default(),
            output: TableLocation::default(),
            dataframe_prefix: "df".to_string(),
            cycle_policy: CyclePolicy::default(),
            preamble: Vec::new(),
        }
    }
}
