//! The two-pass expansion pipeline

use std::io::Write;

use fluxpand_core::{docmeta, CancellationToken, KubeVersion};
use fluxpand_engine::Engine;
use fluxpand_repo::{
    ChartCache, Clients, Credentials, LoaderConfig, RepositoryDocument,
};

use crate::document::{split_documents, write_stream, Document};
use crate::error::{ExpandError, Result};
use crate::release::HelmRelease;
use crate::render::{expand_release, GeneratedDocument, RenderSettings};

const HELM_RELEASE_GROUP: &str = "helm.toolkit.fluxcd.io";
const HELM_RELEASE_KIND: &str = "HelmRelease";

/// Run configuration
#[derive(Debug, Clone, Default)]
pub struct ExpandOptions {
    /// `Capabilities.KubeVersion` override
    pub kube_version: Option<KubeVersion>,

    /// Extra `Capabilities.APIVersions` entries
    pub api_versions: Vec<String>,

    /// Enable the in-memory chart cache for the run
    pub enable_chart_cache: bool,
}

/// Expands HelmRelease objects in a YAML stream
pub struct Expander {
    ctx: CancellationToken,
    clients: Clients,
}

impl Expander {
    pub fn new(ctx: CancellationToken, clients: Clients) -> Self {
        Self { ctx, clients }
    }

    /// Expander with production transports
    pub fn with_default_clients(ctx: CancellationToken) -> Result<Self> {
        Ok(Self::new(ctx, Clients::with_defaults()?))
    }

    /// Expand every HelmRelease in `input`, writing the augmented stream
    ///
    /// Input documents are emitted verbatim in their original order,
    /// followed by the generated documents in stable
    /// `(kind, apiVersion, namespace, name)` order.
    pub fn expand_helm_releases(
        &self,
        credentials: Credentials,
        input: &str,
        output: &mut dyn Write,
        options: &ExpandOptions,
    ) -> Result<()> {
        let documents = split_documents(input)?;

        // Pass 1: pair each release with the repository it references.
        let pairs = pair_releases(&documents)?;
        tracing::debug!(releases = pairs.len(), "paired releases with repositories");

        // Pass 2: expand each pair. The cache root lives for the run and is
        // removed on every exit path.
        let cache_root = tempfile::tempdir()?;
        let cache = options.enable_chart_cache.then(ChartCache::new);
        let engine = Engine::new();
        let settings = RenderSettings {
            kube_version: options.kube_version.clone(),
            api_versions: options.api_versions.clone(),
        };

        let mut generated: Vec<GeneratedDocument> = Vec::new();
        for (release, repo_doc) in &pairs {
            self.ctx.check()?;
            let config = LoaderConfig {
                ctx: &self.ctx,
                cache_root: cache_root.path(),
                cache: cache.as_ref(),
                credentials: &credentials,
                clients: &self.clients,
            };
            let expanded = expand_release(config, &engine, release, repo_doc, &settings)
                .map_err(|e| ExpandError::for_release(&release.namespace, &release.name, e))?;
            generated.extend(expanded);
        }

        generated.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));

        let mut chunks: Vec<String> = documents.iter().map(|d| d.raw.clone()).collect();
        for document in &generated {
            chunks.push(document.to_yaml()?);
        }
        write_stream(output, &chunks)
    }
}

type Pair = (HelmRelease, RepositoryDocument);

/// Find every HelmRelease and resolve its repository document
fn pair_releases(documents: &[Document]) -> Result<Vec<Pair>> {
    let mut pairs = Vec::new();

    for document in documents {
        if docmeta::group(&document.value) != HELM_RELEASE_GROUP
            || docmeta::kind(&document.value) != HELM_RELEASE_KIND
        {
            continue;
        }

        let release = HelmRelease::from_value(&document.value)?;
        let repo_value = find_repository(documents, &release).ok_or_else(|| {
            ExpandError::MissingRepository {
                namespace: release.namespace.clone(),
                name: release.name.clone(),
            }
        })?;
        let repo_doc = RepositoryDocument::from_value(repo_value)?;
        pairs.push((release, repo_doc));
    }
    Ok(pairs)
}

/// Locate the document a release's sourceRef points at
///
/// Matches kind, name, and namespace (defaulting to the release's own), and
/// apiVersion only when the sourceRef specifies one. The first match wins.
fn find_repository<'a>(
    documents: &'a [Document],
    release: &HelmRelease,
) -> Option<&'a serde_yaml::Value> {
    let source_ref = &release.spec.chart.spec.source_ref;
    let namespace = release.source_ref_namespace();

    documents
        .iter()
        .map(|d| &d.value)
        .find(|value| {
            docmeta::kind(value) == source_ref.kind
                && docmeta::name(value) == source_ref.name
                && docmeta::namespace(value) == namespace
                && source_ref
                    .api_version
                    .as_deref()
                    .map(|v| docmeta::api_version(value) == v)
                    .unwrap_or(true)
        })
}

/// Stable sort key for generated documents
fn sort_key(document: &GeneratedDocument) -> (String, String, String, String) {
    let value = &document.value;
    (
        docmeta::kind(value).to_string(),
        docmeta::api_version(value).to_string(),
        docmeta::namespace(value).to_string(),
        docmeta::name(value).to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn documents(yaml: &str) -> Vec<Document> {
        split_documents(yaml).unwrap()
    }

    const RELEASE_AND_REPO: &str = r#"
apiVersion: helm.toolkit.fluxcd.io/v2beta2
kind: HelmRelease
metadata:
  namespace: testns
  name: test
spec:
  chart:
    spec:
      chart: test-chart
      sourceRef:
        kind: HelmRepository
        name: local
---
apiVersion: source.toolkit.fluxcd.io/v1beta2
kind: HelmRepository
metadata:
  namespace: testns
  name: local
spec:
  url: http://localhost:8080
"#;

    #[test]
    fn test_pairing_resolves_repository() {
        let pairs = pair_releases(&documents(RELEASE_AND_REPO)).unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0.identity(), "testns/test");
        assert_eq!(pairs[0].1.identity(), "HelmRepository testns/local");
    }

    #[test]
    fn test_pairing_missing_repository_is_fatal() {
        let input = r#"
apiVersion: helm.toolkit.fluxcd.io/v2beta2
kind: HelmRelease
metadata: {namespace: testns, name: test}
spec:
  chart:
    spec:
      chart: test-chart
      sourceRef: {kind: HelmRepository, name: nonexistent}
"#;
        let err = pair_releases(&documents(input)).unwrap_err();
        assert!(err
            .to_string()
            .contains("missing chart repository for Helm release testns/test"));
    }

    #[test]
    fn test_pairing_respects_namespace() {
        let input = r#"
apiVersion: helm.toolkit.fluxcd.io/v2beta2
kind: HelmRelease
metadata: {namespace: testns, name: test}
spec:
  chart:
    spec:
      chart: test-chart
      sourceRef: {kind: HelmRepository, name: local}
---
apiVersion: source.toolkit.fluxcd.io/v1beta2
kind: HelmRepository
metadata: {namespace: otherns, name: local}
spec: {url: "http://localhost"}
"#;
        let err = pair_releases(&documents(input)).unwrap_err();
        assert!(matches!(err, ExpandError::MissingRepository { .. }));
    }

    #[test]
    fn test_pairing_respects_api_version() {
        let input = r#"
apiVersion: helm.toolkit.fluxcd.io/v2beta2
kind: HelmRelease
metadata: {namespace: testns, name: test}
spec:
  chart:
    spec:
      chart: test-chart
      sourceRef:
        kind: HelmRepository
        name: local
        apiVersion: source.toolkit.fluxcd.io/v1
---
apiVersion: source.toolkit.fluxcd.io/v1beta2
kind: HelmRepository
metadata: {namespace: testns, name: local}
spec: {url: "http://localhost"}
"#;
        let err = pair_releases(&documents(input)).unwrap_err();
        assert!(matches!(err, ExpandError::MissingRepository { .. }));
    }

    #[test]
    fn test_sort_key_ordering() {
        let make = |yaml: &str| GeneratedDocument {
            source: "s".to_string(),
            value: serde_yaml::from_str(yaml).unwrap(),
        };
        let mut docs = vec![
            make("apiVersion: v1\nkind: Service\nmetadata: {namespace: b, name: x}\n"),
            make("apiVersion: v1\nkind: ConfigMap\nmetadata: {namespace: b, name: y}\n"),
            make("apiVersion: v1\nkind: ConfigMap\nmetadata: {namespace: a, name: z}\n"),
        ];
        docs.sort_by(|a, b| sort_key(a).cmp(&sort_key(b)));

        let kinds: Vec<_> = docs
            .iter()
            .map(|d| docmeta::kind(&d.value).to_string())
            .collect();
        assert_eq!(kinds, ["ConfigMap", "ConfigMap", "Service"]);
        assert_eq!(docmeta::namespace(&docs[0].value), "a");
    }
}
