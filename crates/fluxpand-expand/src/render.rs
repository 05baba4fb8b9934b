//! Per-release expansion
//!
//! Turns one paired release into generated documents: prune disabled
//! subcharts, coalesce values, compose capabilities and release identity,
//! render, split multi-document output, and assign namespaces.

use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;

use fluxpand_core::{
    coalesce_values, deep_merge, Capabilities, Chart, KubeVersion, ReleaseInfo, TemplateContext,
};
use fluxpand_engine::Engine;
use fluxpand_repo::{loader_for_document, LoaderConfig, RepositoryDocument};

use crate::error::{ExpandError, Result};
use crate::release::HelmRelease;

/// A generated output document with its template of origin
#[derive(Debug, Clone)]
pub struct GeneratedDocument {
    /// Template key, e.g. `test-chart/templates/configmap.yaml`
    pub source: String,

    pub value: YamlValue,
}

impl GeneratedDocument {
    /// Serialize with the `# Source:` head comment
    pub fn to_yaml(&self) -> Result<String> {
        let body = serde_yaml::to_string(&self.value).map_err(|e| ExpandError::ManifestParse {
            key: self.source.clone(),
            message: e.to_string(),
        })?;
        Ok(format!("# Source: {}\n{}", self.source, body))
    }
}

/// Rendering knobs shared by all releases of a run
#[derive(Debug, Clone, Default)]
pub struct RenderSettings {
    pub kube_version: Option<KubeVersion>,
    pub api_versions: Vec<String>,
}

/// Expand one release against its resolved repository
pub fn expand_release(
    config: LoaderConfig<'_>,
    engine: &Engine,
    release: &HelmRelease,
    repo_doc: &RepositoryDocument,
    settings: &RenderSettings,
) -> Result<Vec<GeneratedDocument>> {
    let loader = loader_for_document(repo_doc, config);
    let mut chart = loader
        .load_repository_chart(
            Some(repo_doc),
            None,
            None,
            &release.spec.chart.spec.chart,
            &release.spec.chart.spec.version,
        )
        .map_err(|e| ExpandError::ChartLoad {
            repo: repo_doc.identity(),
            source: e,
        })?;

    let user_values = release.values();

    // Remove subcharts disabled by conditions before values coalesce.
    prune_disabled_subcharts(&mut chart, &user_values);

    let values = coalesce_values(&chart, &user_values);

    let mut capabilities = Capabilities::default();
    if let Some(kube_version) = &settings.kube_version {
        capabilities = capabilities.with_kube_version(kube_version.clone());
    }
    capabilities = capabilities.with_api_versions(&settings.api_versions);

    let release_info =
        ReleaseInfo::for_install(&release.release_name(), release.target_namespace());
    let context =
        TemplateContext::new(values, release_info, &chart.metadata).with_capabilities(capabilities);

    let manifests = engine
        .render_chart(&chart, &context)
        .map_err(|e| ExpandError::Render {
            chart: chart.name().to_string(),
            version: chart.version().to_string(),
            source: e,
        })?;

    let mut generated = Vec::new();
    for (key, manifest) in &manifests {
        if manifest.trim().is_empty() {
            continue;
        }
        if key.rsplit('/').next() == Some("NOTES.txt") {
            continue;
        }
        for document in serde_yaml::Deserializer::from_str(manifest) {
            let value: YamlValue =
                serde::Deserialize::deserialize(document).map_err(|e| {
                    ExpandError::ManifestParse {
                        key: key.clone(),
                        message: e.to_string(),
                    }
                })?;
            if value.is_null() {
                continue;
            }
            generated.push(GeneratedDocument {
                source: key.clone(),
                value,
            });
        }
    }

    assign_namespaces(&mut generated, &release.namespace);
    Ok(generated)
}

/// Remove subcharts whose enable condition evaluates to false
///
/// Conditions are evaluated against user values merged over the chart's
/// defaults, scoped per subchart while descending.
pub fn prune_disabled_subcharts(chart: &mut Chart, user_values: &JsonValue) {
    let mut merged = if chart.values.is_object() {
        chart.values.clone()
    } else {
        JsonValue::Object(serde_json::Map::new())
    };
    deep_merge(&mut merged, user_values);

    let specs = chart.metadata.dependencies.clone();
    chart.subcharts.retain(|subchart| {
        specs
            .iter()
            .find(|d| d.name == subchart.name())
            .map(|d| d.is_enabled(&merged))
            .unwrap_or(true)
    });

    for subchart in &mut chart.subcharts {
        let name = specs
            .iter()
            .find(|d| d.name == subchart.name())
            .map(|d| d.effective_name().to_string())
            .unwrap_or_else(|| subchart.name().to_string());
        let scoped = merged
            .get(&name)
            .cloned()
            .unwrap_or_else(|| JsonValue::Object(serde_json::Map::new()));
        prune_disabled_subcharts(subchart, &scoped);
    }
}

/// Set `metadata.namespace` on generated documents that lack one
///
/// The namespace lands after the existing metadata attributes; other
/// references are left untouched.
fn assign_namespaces(documents: &mut [GeneratedDocument], namespace: &str) {
    for document in documents {
        let Some(mapping) = document.value.as_mapping_mut() else {
            continue;
        };
        let metadata_key = YamlValue::String("metadata".to_string());
        let metadata = mapping
            .entry(metadata_key)
            .or_insert_with(|| YamlValue::Mapping(serde_yaml::Mapping::new()));
        let Some(metadata) = metadata.as_mapping_mut() else {
            continue;
        };
        let namespace_key = YamlValue::String("namespace".to_string());
        let unset = match metadata.get(&namespace_key) {
            None => true,
            Some(YamlValue::Null) => true,
            Some(YamlValue::String(s)) => s.is_empty(),
            Some(_) => false,
        };
        if unset {
            metadata.insert(namespace_key, YamlValue::String(namespace.to_string()));
        }
    }
}
