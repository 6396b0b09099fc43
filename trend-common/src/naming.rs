//! Naming helpers for uploaded files and exported artifacts

use chrono::{DateTime, Utc};

/// Slug used for export file names when the title reduces to nothing.
pub const DEFAULT_SLUG: &str = "viewer";

/// Turn a chart title into a lowercase file-name slug.
///
/// # Examples
/// ```
/// use trend_common::naming::slugify;
///
/// assert_eq!(slugify("CW Loop"), "cw-loop");
/// assert_eq!(slugify("  Pump #3 / North  "), "pump-3-north");
/// assert_eq!(slugify("!!!"), "viewer");
/// ```
pub fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_dash = false;
    for c in s.trim().chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if out.is_empty() {
        DEFAULT_SLUG.to_string()
    } else {
        out
    }
}

/// Upload names are accepted only with a `.csv` extension.
pub fn is_csv_filename(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((_, ext)) => ext.eq_ignore_ascii_case("csv"),
        None => false,
    }
}

/// Reduce a client-supplied file name to a safe base name.
pub fn safe_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload.csv".to_string()
    } else {
        cleaned
    }
}

/// File stem of an upload, used to disambiguate colliding column names.
pub fn file_stem(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

/// Timestamp suffix for export names: `YYYYMMDD-HHMMSS`
pub fn export_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d-%H%M%S").to_string()
}

/// Dated subfolder for published artifacts: `YYYY/MM/DD`
pub fn dated_path(at: DateTime<Utc>) -> String {
    at.format("%Y/%m/%d").to_string()
}

/// Join non-empty path segments with `/`.
pub fn join_path(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("/")
}
