//! ZIP bundle returned to the browser

use std::io::{Cursor, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Entry names inside the results bundle
pub fn merged_csv_name(title: &str) -> String {
    format!("{} - merged.csv", title)
}

pub fn viewer_html_name(title: &str) -> String {
    format!("{} - Trend Viewer.html", title)
}

pub fn bundle_name(title: &str) -> String {
    format!("{} - results.zip", title)
}

/// Pack the merged CSV and chart page into a deflated ZIP.
pub fn bundle(title: &str, csv: &[u8], html: &[u8]) -> zip::result::ZipResult<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    zip.start_file(merged_csv_name(title), options)?;
    zip.write_all(csv)?;
    zip.start_file(viewer_html_name(title), options)?;
    zip.write_all(html)?;

    Ok(zip.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_bundle_contains_both_entries() {
        let bytes = bundle("CW Loop", b"Time,Flow\n", b"<html></html>").unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);

        let mut csv = String::new();
        archive
            .by_name("CW Loop - merged.csv")
            .unwrap()
            .read_to_string(&mut csv)
            .unwrap();
        assert_eq!(csv, "Time,Flow\n");

        let mut html = String::new();
        archive
            .by_name("CW Loop - Trend Viewer.html")
            .unwrap()
            .read_to_string(&mut html)
            .unwrap();
        assert_eq!(html, "<html></html>");
    }

    #[test]
    fn test_names() {
        assert_eq!(bundle_name("Loop 2"), "Loop 2 - results.zip");
    }
}
