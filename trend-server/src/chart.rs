//! Standalone interactive chart page
//!
//! Renders a merged table as a self-contained HTML page driving Plotly.
//! Figure data is embedded as JSON; the Plotly bundle is loaded from a
//! pinned CDN URL.

use serde_json::{json, Value};
use trend_common::time::format_timestamp;

use crate::merge::MergedTable;

pub const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";
pub const DEFAULT_TITLE: &str = "CW Loop";
pub const DEFAULT_Y1_MIN: f64 = 0.0;
pub const DEFAULT_Y1_MAX: f64 = 100.0;

/// Well-known setpoint tags, matched case-insensitively in this order
const SETPOINT_CANDIDATES: &[&str] = &[
    "Plant Pumps.Active CW Flow Setpoint",
    "Active CW Flow Setpoint",
    "CW Flow Setpoint",
];

/// Chart presentation options
#[derive(Debug, Clone)]
pub struct ChartOptions {
    pub title: String,
    pub y1_min: f64,
    pub y1_max: f64,
    /// Series drawn against the secondary axis; auto-detected when `None`
    pub setpoint_name: Option<String>,
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            y1_min: DEFAULT_Y1_MIN,
            y1_max: DEFAULT_Y1_MAX,
            setpoint_name: None,
        }
    }
}

/// Indices of columns with at least one numeric cell
pub fn plotted_columns(merged: &MergedTable) -> Vec<usize> {
    (0..merged.columns.len())
        .filter(|&i| merged.is_numeric_column(i))
        .collect()
}

/// Auto-detect the setpoint series among the plotted column names.
pub fn find_setpoint<'a>(names: &[&'a str]) -> Option<&'a str> {
    for candidate in SETPOINT_CANDIDATES {
        if let Some(name) = names.iter().copied().find(|n| n.eq_ignore_ascii_case(candidate)) {
            return Some(name);
        }
    }
    names.iter().copied().find(|n| {
        let lower = n.to_lowercase();
        lower.contains("flow") && lower.contains("setpoint")
    })
}

/// Carry the last seen value forward over gaps. Leading gaps stay empty.
pub fn forward_fill(values: Vec<Option<f64>>) -> Vec<Option<f64>> {
    let mut last = None;
    values
        .into_iter()
        .map(|v| {
            if v.is_some() {
                last = v;
            }
            last
        })
        .collect()
}

/// Build the Plotly figure (`{"data": [...], "layout": {...}}`).
pub fn build_figure(merged: &MergedTable, options: &ChartOptions) -> Value {
    let plotted = plotted_columns(merged);
    let names: Vec<&str> = plotted.iter().map(|&i| merged.columns[i].as_str()).collect();

    let setpoint: Option<String> = options
        .setpoint_name
        .clone()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| find_setpoint(&names).map(str::to_string));

    let x: Vec<String> = merged
        .timestamps
        .iter()
        .map(|ts| format_timestamp(*ts))
        .collect();

    let traces: Vec<Value> = plotted
        .iter()
        .map(|&i| {
            let name = &merged.columns[i];
            let on_secondary = setpoint.as_deref() == Some(name.as_str());
            json!({
                "type": "scatter",
                "mode": "lines",
                "name": name,
                "x": x,
                "y": forward_fill(merged.numeric_column(i)),
                "yaxis": if on_secondary { "y2" } else { "y" },
                "hovertemplate": format!("{}: %{{y:.2f}}<extra></extra>", name),
            })
        })
        .collect();

    let layout = json!({
        "title": { "text": options.title },
        "xaxis": {
            "title": { "text": merged.time_column },
            "rangeslider": { "visible": true },
            "type": "date",
            "showspikes": true,
            "spikemode": "across",
            "spikesnap": "cursor",
        },
        "yaxis": {
            "title": { "text": "Percent" },
            "range": [options.y1_min, options.y1_max],
        },
        "yaxis2": {
            "title": { "text": setpoint.as_deref().unwrap_or("Setpoint") },
            "overlaying": "y",
            "side": "right",
            "showgrid": false,
            "autorange": true,
        },
        "legend": {
            "orientation": "h",
            "yanchor": "bottom",
            "y": 1.02,
            "xanchor": "left",
            "x": 0,
        },
        "margin": { "l": 60, "r": 80, "t": 60, "b": 40 },
        "hovermode": "x unified",
        "hoverdistance": 30,
        "height": 800,
    });

    json!({ "data": traces, "layout": layout })
}

/// Render the full standalone HTML page.
pub fn render_chart(merged: &MergedTable, options: &ChartOptions) -> String {
    let figure = build_figure(merged, options).to_string().replace("</", "<\\/");
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<script src="{cdn}" charset="utf-8"></script>
<style>
  html, body {{ margin: 0; padding: 0; font-family: 'Segoe UI', Tahoma, sans-serif; }}
  #trend-chart {{ width: 100%; height: 800px; }}
</style>
</head>
<body>
<div id="trend-chart"></div>
<script>
(function () {{
  var figure = {figure};
  Plotly.newPlot("trend-chart", figure.data, figure.layout, {{ responsive: true }});
}})();
</script>
</body>
</html>
"#,
        title = escape_html(&options.title),
        cdn = PLOTLY_CDN,
        figure = figure,
    )
}

/// Minimal HTML text escaping
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::{merge_align, MergeOptions, NamedTable};

    fn merged(csv: &str) -> MergedTable {
        let original = NamedTable::parse("o.csv", csv.as_bytes()).unwrap();
        merge_align(&original, &[], &MergeOptions::default()).unwrap()
    }

    #[test]
    fn test_forward_fill() {
        let filled = forward_fill(vec![None, Some(1.0), None, Some(2.0), None]);
        assert_eq!(filled, vec![None, Some(1.0), Some(1.0), Some(2.0), Some(2.0)]);
    }

    #[test]
    fn test_find_setpoint_candidates_first() {
        let names = ["Flow Setpoint Aux", "active cw flow setpoint", "Valve"];
        assert_eq!(find_setpoint(&names), Some("active cw flow setpoint"));
    }

    #[test]
    fn test_find_setpoint_fallback_and_none() {
        assert_eq!(
            find_setpoint(&["Valve", "Chiller Flow Setpoint"]),
            Some("Chiller Flow Setpoint")
        );
        assert_eq!(find_setpoint(&["Valve", "Flow"]), None);
    }

    #[test]
    fn test_figure_places_setpoint_on_secondary_axis() {
        let m = merged(
            "Time,Valve,CW Flow Setpoint,Mode\n\
             2024-01-01 00:00:00,10,500,Auto\n\
             2024-01-01 00:00:05,,510,Auto\n",
        );
        let fig = build_figure(&m, &ChartOptions::default());
        let data = fig["data"].as_array().unwrap();
        // Mode is not numeric and is not plotted
        assert_eq!(data.len(), 2);
        assert_eq!(data[0]["name"], "Valve");
        assert_eq!(data[0]["yaxis"], "y");
        assert_eq!(data[0]["y"], json!([10.0, 10.0]));
        assert_eq!(data[1]["yaxis"], "y2");
        assert_eq!(data[1]["hovertemplate"], "CW Flow Setpoint: %{y:.2f}<extra></extra>");
        assert_eq!(fig["layout"]["yaxis2"]["title"]["text"], "CW Flow Setpoint");
        assert_eq!(fig["layout"]["yaxis"]["range"], json!([0.0, 100.0]));
        assert_eq!(fig["layout"]["xaxis"]["title"]["text"], "Time");
        assert_eq!(data[0]["x"][1], "2024-01-01 00:00:05");
    }

    #[test]
    fn test_explicit_setpoint_overrides_detection() {
        let m = merged("Time,Valve,CW Flow Setpoint\n2024-01-01 00:00:00,1,2\n");
        let options = ChartOptions {
            setpoint_name: Some("Valve".into()),
            ..Default::default()
        };
        let fig = build_figure(&m, &options);
        assert_eq!(fig["data"][0]["yaxis"], "y2");
        assert_eq!(fig["data"][1]["yaxis"], "y");
        assert_eq!(fig["layout"]["yaxis2"]["title"]["text"], "Valve");
    }

    #[test]
    fn test_render_escapes_title_and_script_breakout() {
        let m = merged("Time,</script><b>\n2024-01-01 00:00:00,1\n");
        let options = ChartOptions {
            title: "A & <B>".into(),
            ..Default::default()
        };
        let html = render_chart(&m, &options);
        assert!(html.contains("<title>A &amp; &lt;B&gt;</title>"));
        assert!(!html.contains("</script><b>"));
        assert!(html.contains(PLOTLY_CDN));
        assert!(html.starts_with("<!DOCTYPE html>"));
    }
}
