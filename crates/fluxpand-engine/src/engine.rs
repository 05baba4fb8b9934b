//! Chart tree rendering

use indexmap::IndexMap;
use minijinja::Environment;
use serde_json::Value as JsonValue;

use fluxpand_core::{Chart, TemplateContext};

use crate::error::{EngineError, Result};
use crate::filters;

/// Prefix character for helper templates (loaded, never emitted)
const HELPER_TEMPLATE_PREFIX: char = '_';

/// The template engine
///
/// Undefined values behave like Helm's Go templates: chaining through an
/// undefined value yields undefined instead of an error, so optional values
/// render as empty output.
#[derive(Debug, Default)]
pub struct Engine;

impl Engine {
    pub fn new() -> Self {
        Self
    }

    /// Render a chart and all of its subcharts
    ///
    /// `context.values` must already be coalesced for the whole tree; each
    /// subchart renders against its scoped section. Keys in the returned map
    /// are template paths (`chart/templates/foo.yaml`,
    /// `chart/charts/dep/templates/foo.yaml`), with dependency aliases
    /// replacing chart names in the path.
    pub fn render_chart(
        &self,
        chart: &Chart,
        context: &TemplateContext,
    ) -> Result<IndexMap<String, String>> {
        let mut manifests = IndexMap::new();
        self.render_node(chart, context, chart.name(), &mut manifests)?;
        Ok(manifests)
    }

    fn render_node(
        &self,
        chart: &Chart,
        context: &TemplateContext,
        key_prefix: &str,
        manifests: &mut IndexMap<String, String>,
    ) -> Result<()> {
        tracing::debug!(chart = chart.name(), prefix = key_prefix, "rendering chart");

        let mut env = self.create_environment();
        for template in &chart.templates {
            env.add_template_owned(template.name.clone(), template.data.clone())
                .map_err(|e| EngineError::Template {
                    template: format!("{}/{}", key_prefix, template.name),
                    source: e,
                })?;
        }

        let ctx = minijinja::context! {
            values => &context.values,
            release => &context.release,
            chart => &context.chart,
            capabilities => &context.capabilities,
        };

        for template in &chart.templates {
            if template_basename(&template.name).starts_with(HELPER_TEMPLATE_PREFIX) {
                continue;
            }

            let key = format!("{}/{}", key_prefix, template.name);
            let tmpl = env
                .get_template(&template.name)
                .map_err(|e| EngineError::Template {
                    template: key.clone(),
                    source: e,
                })?;
            let rendered = tmpl.render(&ctx).map_err(|e| EngineError::Template {
                template: key.clone(),
                source: e,
            })?;
            manifests.insert(key, rendered);
        }

        for subchart in &chart.subcharts {
            let name = chart
                .dependency_spec(subchart.name())
                .map(|d| d.effective_name().to_string())
                .unwrap_or_else(|| subchart.name().to_string());

            let scoped = context
                .values
                .get(&name)
                .cloned()
                .unwrap_or_else(|| JsonValue::Object(serde_json::Map::new()));
            let sub_context = context.for_subchart(scoped, &subchart.metadata);
            let sub_prefix = format!("{}/charts/{}", key_prefix, name);
            self.render_node(subchart, &sub_context, &sub_prefix, manifests)?;
        }

        Ok(())
    }

    fn create_environment(&self) -> Environment<'static> {
        let mut env = Environment::new();
        env.set_undefined_behavior(minijinja::UndefinedBehavior::Chainable);

        env.add_filter("toyaml", filters::toyaml);
        env.add_filter("tojson", filters::tojson);
        env.add_filter("nindent", filters::nindent);
        env.add_filter("indent", filters::indent);
        env.add_filter("quote", filters::quote);
        env.add_filter("squote", filters::squote);
        env.add_filter("b64encode", filters::b64encode);
        env.add_filter("b64decode", filters::b64decode);
        env.add_filter("required", filters::required);
        env.add_filter("trunc", filters::trunc);
        env.add_filter("trimprefix", filters::trimprefix);
        env.add_filter("trimsuffix", filters::trimsuffix);
        env.add_filter("sha256", filters::sha256sum);

        env
    }
}

fn template_basename(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}
