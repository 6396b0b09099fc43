//! UI serving routes
//!
//! The index page is rendered server-side with the upload form, the last
//! published links, and recent local exports. The theme bootstrap script is
//! inlined in `<head>` so the page never flashes the wrong palette.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};

use super::exports::{collect, ExportsResponse};
use crate::chart::{escape_html, DEFAULT_TITLE, DEFAULT_Y1_MAX, DEFAULT_Y1_MIN};
use crate::merge::DEFAULT_TOLERANCE_SECS;
use crate::publish::LinkPair;
use crate::AppState;

pub const THEME_JS: &str = include_str!("../../static/theme.js");

const PAGE_STYLE: &str = r#"
        :root {
            --bg: #f5f5f5;
            --panel: #ffffff;
            --border: #d0d0d0;
            --text: #1a1a1a;
            --muted: #666;
            --accent: #2a7ae2;
        }
        html.dark {
            --bg: #1a1a1a;
            --panel: #2a2a2a;
            --border: #3a3a3a;
            --text: #e0e0e0;
            --muted: #888;
            --accent: #4a9eff;
        }
        * { box-sizing: border-box; }
        body {
            margin: 0;
            font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;
            background-color: var(--bg);
            color: var(--text);
            line-height: 1.6;
        }
        header {
            display: flex;
            justify-content: space-between;
            align-items: center;
            background-color: var(--panel);
            border-bottom: 1px solid var(--border);
            padding: 16px 20px;
        }
        h1, h2 { color: var(--accent); margin: 0 0 8px 0; }
        .build-info { font-family: 'Courier New', monospace; color: var(--muted); font-size: 13px; text-align: right; }
        .content { padding: 20px; max-width: 960px; }
        .panel { background: var(--panel); border: 1px solid var(--border); border-radius: 6px; padding: 16px; margin-bottom: 20px; }
        label { display: block; margin-top: 10px; font-weight: 600; }
        input[type=text], input[type=number], select {
            width: 100%; padding: 6px; background: var(--bg); color: var(--text);
            border: 1px solid var(--border); border-radius: 4px;
        }
        .row { display: flex; gap: 12px; }
        .row > div { flex: 1; }
        button {
            padding: 8px 18px; background: var(--accent); color: #fff; border: none;
            border-radius: 4px; font-weight: 600; cursor: pointer; margin-top: 14px;
        }
        button.small { padding: 2px 8px; margin: 0 0 0 6px; font-size: 12px; }
        a { color: var(--accent); }
        .muted { color: var(--muted); }
        ul { padding-left: 20px; }
"#;

const COPY_SCRIPT: &str = r#"
        function copyLink(url, btn) {
            navigator.clipboard.writeText(url).then(function () {
                var old = btn.textContent;
                btn.textContent = 'Copied';
                setTimeout(function () { btn.textContent = old; }, 1200);
            });
        }
"#;

/// GET /
pub async fn serve_index(State(state): State<AppState>) -> Html<String> {
    let listing = collect(&state).await;
    Html(render_index(&listing))
}

/// GET /static/theme.js
pub async fn serve_theme_js() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/javascript")],
        THEME_JS,
    )
        .into_response()
}

pub fn ui_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(serve_index))
        .route("/static/theme.js", get(serve_theme_js))
}

fn link_item(label: &str, url: &str) -> String {
    let url = escape_html(url);
    format!(
        "<li>{label}: <a href=\"{url}\" target=\"_blank\">{url}</a>\
         <button class=\"small\" type=\"button\" data-url=\"{url}\" \
         onclick=\"copyLink(this.dataset.url, this)\">Copy</button></li>",
        label = label,
        url = url
    )
}

fn pushed_items(target: &str, links: &LinkPair) -> String {
    let mut out = String::new();
    if let Some(html) = &links.html {
        out.push_str(&link_item(&format!("{} viewer", target), html));
    }
    if let Some(csv) = &links.csv {
        out.push_str(&link_item(&format!("{} CSV", target), csv));
    }
    out
}

/// Render the index page for the given listing.
pub fn render_index(listing: &ExportsResponse) -> String {
    let git_hash = env!("GIT_HASH");
    let short_hash = git_hash.get(..8).unwrap_or(git_hash);

    let pushed = if listing.pushed.is_empty() && listing.pushed.warnings.is_empty() {
        "<p class=\"muted\">Nothing published yet.</p>".to_string()
    } else {
        let mut items = pushed_items("GitHub", &listing.pushed.github);
        items.push_str(&pushed_items("Drive", &listing.pushed.gdrive));
        for warning in &listing.pushed.warnings {
            items.push_str(&format!(
                "<li class=\"muted\">{}</li>",
                escape_html(warning)
            ));
        }
        format!("<ul>{}</ul>", items)
    };

    let site = match &listing.site_base {
        Some(base) => format!(
            "<p>Static site: <a href=\"{0}\" target=\"_blank\">{0}</a></p>",
            escape_html(base)
        ),
        None => String::new(),
    };

    let recent = if listing.exports.is_empty() {
        "<p class=\"muted\">No exports yet.</p>".to_string()
    } else {
        let items: String = listing
            .exports
            .iter()
            .map(|e| {
                let csv = e
                    .csv
                    .as_deref()
                    .map(|c| format!(" (<a href=\"{}\">csv</a>)", escape_html(c)))
                    .unwrap_or_default();
                format!(
                    "<li><a href=\"{}\" target=\"_blank\">{}</a>{}</li>",
                    escape_html(&e.html),
                    escape_html(&e.slug),
                    csv
                )
            })
            .collect();
        format!("<ul>{}</ul>", items)
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Trend Merge</title>
    <script>{theme}</script>
    <style>{style}</style>
</head>
<body>
    <header>
        <div>
            <h1>Trend Merge</h1>
            <div class="muted">Align CSV time series onto one timeline and chart them</div>
        </div>
        <div class="build-info">
            <div>trend-server v{version}</div>
            <div>{hash} ({profile})</div>
            <div>{built}</div>
            <button class="small" type="button" onclick="toggleTheme()">Toggle theme</button>
        </div>
    </header>
    <div class="content">
        <form class="panel" action="/process" method="post" enctype="multipart/form-data">
            <h2>Merge</h2>
            <label for="original_csv">Original CSV</label>
            <input type="file" id="original_csv" name="original_csv" accept=".csv" required>
            <label for="other_csvs">Additional CSVs</label>
            <input type="file" id="other_csvs" name="other_csvs" accept=".csv" multiple>
            <div class="row">
                <div>
                    <label for="tolerance">Tolerance (seconds)</label>
                    <input type="number" id="tolerance" name="tolerance" min="0" step="1" value="{tolerance}">
                </div>
                <div>
                    <label for="cutoff">Cutoff (optional)</label>
                    <input type="text" id="cutoff" name="cutoff" placeholder="2024-01-01 06:00">
                </div>
            </div>
            <label for="title">Chart title</label>
            <input type="text" id="title" name="title" value="{title}">
            <div class="row">
                <div>
                    <label for="y1_min">Left axis min</label>
                    <input type="number" id="y1_min" name="y1_min" step="any" value="{y1_min}">
                </div>
                <div>
                    <label for="y1_max">Left axis max</label>
                    <input type="number" id="y1_max" name="y1_max" step="any" value="{y1_max}">
                </div>
                <div>
                    <label for="setpoint_name">Setpoint column (optional)</label>
                    <input type="text" id="setpoint_name" name="setpoint_name" placeholder="auto-detect">
                </div>
            </div>
            <label for="output">Download</label>
            <select id="output" name="output">
                <option value="zip" selected>ZIP (CSV + chart)</option>
                <option value="csv">Merged CSV</option>
                <option value="html">Chart page</option>
            </select>
            <button type="submit">Merge and download</button>
        </form>
        <div class="panel">
            <h2>Latest published</h2>
            {site}
            {pushed}
        </div>
        <div class="panel">
            <h2>Recent exports</h2>
            {recent}
        </div>
    </div>
    <script>{copy}</script>
</body>
</html>"#,
        theme = THEME_JS,
        style = PAGE_STYLE,
        version = env!("CARGO_PKG_VERSION"),
        hash = short_hash,
        profile = env!("BUILD_PROFILE"),
        built = env!("BUILD_TIMESTAMP"),
        tolerance = DEFAULT_TOLERANCE_SECS,
        title = DEFAULT_TITLE,
        y1_min = DEFAULT_Y1_MIN,
        y1_max = DEFAULT_Y1_MAX,
        site = site,
        pushed = pushed,
        recent = recent,
        copy = COPY_SCRIPT,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exports::ExportEntry;
    use crate::publish::PublishedLinks;

    fn empty_listing() -> ExportsResponse {
        ExportsResponse {
            exports: Vec::new(),
            pushed: PublishedLinks::default(),
            site_base: None,
        }
    }

    #[test]
    fn test_index_has_form_and_theme_bootstrap() {
        let page = render_index(&empty_listing());
        assert!(page.contains("action=\"/process\""));
        assert!(page.contains("name=\"original_csv\""));
        assert!(page.contains("name=\"output\""));
        for format in ["zip", "csv", "html"] {
            assert!(page.contains(&format!("<option value=\"{}\"", format)));
            assert!(format.parse::<crate::api::process::OutputFormat>().is_ok());
        }
        assert!(page.contains("toggleTheme"));
        assert!(page.contains("Nothing published yet."));
        assert!(page.contains("No exports yet."));
    }

    #[test]
    fn test_index_lists_links_escaped() {
        let mut listing = empty_listing();
        listing.exports.push(ExportEntry {
            slug: "loop-1".to_string(),
            html: "/static/exports/loop-1.html".to_string(),
            csv: None,
        });
        listing.pushed.github.html = Some("https://x.github.io/a.html?b=1&c=2".to_string());
        listing.pushed.warnings.push("Drive upload warning: <boom>".to_string());

        let page = render_index(&listing);
        assert!(page.contains("/static/exports/loop-1.html"));
        assert!(page.contains("a.html?b=1&amp;c=2"));
        assert!(page.contains("&lt;boom&gt;"));
        assert!(page.contains("copyLink("));
    }
}
