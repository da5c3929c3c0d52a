//! Prometheus text exposition format.
//!
//! Renders registry series with a `sipdrain_` prefix; metric and dimension
//! names are converted from CamelCase to snake_case and counters gain the
//! conventional `_total` suffix.

use sipdrain_core::MetricKind;

use crate::registry::Series;

/// Render series into Prometheus text format.
pub fn render_prometheus(series: &[Series]) -> String {
    let mut out = String::new();
    let mut current: Option<&str> = None;

    for s in series {
        let name = exposition_name(s);
        if current != Some(s.name) {
            let kind = match s.kind {
                MetricKind::Counter => "counter",
                MetricKind::Gauge => "gauge",
            };
            out.push_str(&format!("# TYPE {name} {kind}\n"));
            current = Some(s.name);
        }

        let labels: Vec<String> = s
            .dimensions
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", snake_case(k), escape_label(v)))
            .collect();
        if labels.is_empty() {
            out.push_str(&format!("{name} {}\n", s.value));
        } else {
            out.push_str(&format!("{name}{{{}}} {}\n", labels.join(","), s.value));
        }
    }

    out
}

fn exposition_name(s: &Series) -> String {
    let base = format!("sipdrain_{}", snake_case(s.name));
    match s.kind {
        MetricKind::Counter => format!("{base}_total"),
        MetricKind::Gauge => base,
    }
}

/// `ScaleInSkipped` → `scale_in_skipped`, `TargetIP` → `target_ip`.
fn snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            if prev.is_ascii_lowercase() || (prev.is_ascii_uppercase() && next_lower) {
                out.push('_');
            }
        }
        out.push(c.to_ascii_lowercase());
    }
    out
}

fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
