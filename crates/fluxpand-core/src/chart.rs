//! Chart definition and loading

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{CoreError, Result};

/// Chart metadata, parsed from `Chart.yaml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    /// API version (v1 or v2)
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Chart name (required)
    pub name: String,

    /// Chart version (required)
    pub version: String,

    /// Application version
    #[serde(default)]
    pub app_version: Option<String>,

    /// Description
    #[serde(default)]
    pub description: Option<String>,

    /// Declared dependencies
    #[serde(default)]
    pub dependencies: Vec<DependencySpec>,
}

fn default_api_version() -> String {
    "v2".to_string()
}

/// A dependency declared in `Chart.yaml`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencySpec {
    /// Dependency chart name
    pub name: String,

    /// Version constraint (semver)
    #[serde(default)]
    pub version: String,

    /// Repository URL, relative path, or empty for bundled subcharts
    #[serde(default)]
    pub repository: String,

    /// Enable condition: a dot-separated path into the merged values
    ///
    /// A missing path leaves the dependency enabled; only a present falsy
    /// value disables it.
    #[serde(default)]
    pub condition: Option<String>,

    /// Alias name (overrides the dependency name for value scoping)
    #[serde(default)]
    pub alias: Option<String>,

    /// Tags for conditional inclusion
    #[serde(default)]
    pub tags: Vec<String>,
}

impl DependencySpec {
    /// Get the effective name (alias if set, otherwise name)
    #[inline]
    pub fn effective_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    /// Evaluate the enable condition against merged values
    pub fn is_enabled(&self, values: &JsonValue) -> bool {
        let Some(condition) = &self.condition else {
            return true;
        };
        match lookup_path(values, condition) {
            Some(value) => is_truthy(value),
            None => true,
        }
    }
}

/// Walk a dot-separated path into a values tree
fn lookup_path<'a>(values: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    let mut current = values;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    Some(current)
}

fn is_truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Bool(b) => *b,
        JsonValue::Null => false,
        JsonValue::String(s) => !s.is_empty() && s != "false" && s != "0",
        JsonValue::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        JsonValue::Array(a) => !a.is_empty(),
        JsonValue::Object(o) => !o.is_empty(),
    }
}

/// A template file within a chart
#[derive(Debug, Clone)]
pub struct TemplateFile {
    /// Path relative to the chart root, e.g. `templates/configmap.yaml`
    pub name: String,

    /// Raw template text
    pub data: String,
}

/// A raw file handed to the chart loader
#[derive(Debug, Clone)]
pub struct ChartFile {
    /// Path relative to the chart root, slash-separated
    pub name: String,

    /// File contents
    pub data: Vec<u8>,
}

/// A loaded chart with its resolved subcharts
///
/// Subcharts are either bundled (found under `charts/` in the source tree or
/// archive) or attached later by the dependency loader. The tree is a DAG
/// flattened into an owned structure; rendering clones it per release so
/// cached charts are never mutated.
#[derive(Debug, Clone)]
pub struct Chart {
    /// Parsed `Chart.yaml`
    pub metadata: ChartMetadata,

    /// Template files under `templates/`
    pub templates: Vec<TemplateFile>,

    /// Default values from `values.yaml`
    pub values: JsonValue,

    /// Resolved subcharts
    pub subcharts: Vec<Chart>,
}

impl Chart {
    /// Chart name shorthand
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Chart version shorthand
    pub fn version(&self) -> &str {
        &self.metadata.version
    }

    /// Find the dependency declaration matching a subchart name
    pub fn dependency_spec(&self, chart_name: &str) -> Option<&DependencySpec> {
        self.metadata
            .dependencies
            .iter()
            .find(|d| d.name == chart_name)
    }

    /// Attach a fetched dependency as a subchart
    pub fn add_subchart(&mut self, chart: Chart) {
        self.subcharts.push(chart);
    }

    /// Load a chart from a directory tree
    pub fn load_dir<P: AsRef<Path>>(path: P) -> Result<Self> {
        let root = path.as_ref();
        if !root.is_dir() {
            return Err(CoreError::ChartNotFound {
                path: root.display().to_string(),
            });
        }

        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.path().is_file() {
                continue;
            }
            let rel = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if rel.split('/').any(|part| part.starts_with('.')) {
                continue;
            }
            let data = std::fs::read(entry.path())?;
            files.push(ChartFile { name: rel, data });
        }

        Self::from_files(files).map_err(|e| match e {
            CoreError::InvalidChart { message } => CoreError::InvalidChart {
                message: format!("{}: {}", root.display(), message),
            },
            other => other,
        })
    }

    /// Build a chart from a list of files relative to the chart root
    ///
    /// This is the common path for both directory and archive loading. Files
    /// under `charts/` become bundled subcharts; anything that is neither
    /// metadata, values, nor a template is ignored.
    pub fn from_files(files: Vec<ChartFile>) -> Result<Self> {
        let mut metadata: Option<ChartMetadata> = None;
        let mut values = JsonValue::Object(serde_json::Map::new());
        let mut templates = Vec::new();
        let mut subchart_files: BTreeMap<String, Vec<ChartFile>> = BTreeMap::new();
        let mut subchart_archives: Vec<(String, Vec<u8>)> = Vec::new();

        for file in files {
            match file.name.as_str() {
                "Chart.yaml" => {
                    metadata = Some(serde_yaml::from_slice(&file.data)?);
                }
                "values.yaml" => {
                    if !file.data.is_empty() {
                        let parsed: JsonValue = serde_yaml::from_slice(&file.data)?;
                        if !parsed.is_null() {
                            values = parsed;
                        }
                    }
                }
                name if name.starts_with("templates/") => {
                    let data = String::from_utf8_lossy(&file.data).into_owned();
                    templates.push(TemplateFile {
                        name: name.to_string(),
                        data,
                    });
                }
                name if name.starts_with("charts/") => {
                    let rest = &name["charts/".len()..];
                    match rest.split_once('/') {
                        Some((subchart, sub_path)) => {
                            subchart_files
                                .entry(subchart.to_string())
                                .or_default()
                                .push(ChartFile {
                                    name: sub_path.to_string(),
                                    data: file.data,
                                });
                        }
                        None if rest.ends_with(".tgz") => {
                            subchart_archives.push((rest.to_string(), file.data));
                        }
                        None => {}
                    }
                }
                _ => {}
            }
        }

        let metadata = metadata.ok_or_else(|| CoreError::InvalidChart {
            message: "Chart.yaml not found".to_string(),
        })?;
        if metadata.name.is_empty() {
            return Err(CoreError::InvalidChart {
                message: "chart name is empty".to_string(),
            });
        }

        templates.sort_by(|a, b| a.name.cmp(&b.name));

        let mut subcharts = Vec::new();
        for (name, sub_files) in subchart_files {
            let subchart = Self::from_files(sub_files).map_err(|e| CoreError::InvalidChart {
                message: format!("bundled subchart {}: {}", name, e),
            })?;
            subcharts.push(subchart);
        }
        for (name, data) in subchart_archives {
            let subchart =
                crate::archive::load_archive(&data[..]).map_err(|e| CoreError::InvalidChart {
                    message: format!("bundled subchart archive {}: {}", name, e),
                })?;
            subcharts.push(subchart);
        }

        Ok(Self {
            metadata,
            templates,
            values,
            subcharts,
        })
    }
}
