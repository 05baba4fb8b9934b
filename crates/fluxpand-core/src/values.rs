//! Values handling: deep merge and chart-tree coalescing

use serde_json::Value as JsonValue;

use crate::chart::Chart;
use crate::error::Result;

/// Parse a values tree from YAML
///
/// An empty document yields an empty mapping.
pub fn values_from_yaml(yaml: &str) -> Result<JsonValue> {
    let value: JsonValue = serde_yaml::from_str(yaml)?;
    if value.is_null() {
        return Ok(JsonValue::Object(serde_json::Map::new()));
    }
    Ok(value)
}

/// Deep merge two JSON values, overlay winning
///
/// Scalars and arrays from the overlay replace the base; objects merge
/// recursively.
pub fn deep_merge(base: &mut JsonValue, overlay: &JsonValue) {
    match (base, overlay) {
        (JsonValue::Object(base_map), JsonValue::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

/// Coalesce release values over a chart tree
///
/// Produces the single values tree templates render against:
///
/// 1. User-supplied values override the chart's defaults.
/// 2. Each subchart's section (under its effective name) is coalesced with
///    the subchart's own defaults, recursively.
/// 3. `global` propagates downward, parent values winning over subchart
///    defaults.
pub fn coalesce_values(chart: &Chart, overrides: &JsonValue) -> JsonValue {
    let mut base = if chart.values.is_object() {
        chart.values.clone()
    } else {
        JsonValue::Object(serde_json::Map::new())
    };
    deep_merge(&mut base, overrides);

    for subchart in &chart.subcharts {
        let name = chart
            .dependency_spec(subchart.name())
            .map(|d| d.effective_name().to_string())
            .unwrap_or_else(|| subchart.name().to_string());

        let sub_overrides = base
            .get(&name)
            .cloned()
            .unwrap_or_else(|| JsonValue::Object(serde_json::Map::new()));
        let mut sub_values = coalesce_values(subchart, &sub_overrides);

        if let Some(global) = base.get("global").cloned() {
            let mut child_global = sub_values
                .get("global")
                .cloned()
                .unwrap_or_else(|| JsonValue::Object(serde_json::Map::new()));
            deep_merge(&mut child_global, &global);
            if let Some(map) = sub_values.as_object_mut() {
                map.insert("global".to_string(), child_global);
            }
        }

        if let Some(map) = base.as_object_mut() {
            map.insert(name, sub_values);
        }
    }

    base
}
