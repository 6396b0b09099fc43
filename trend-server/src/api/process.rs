//! Upload processing endpoint
//!
//! POST /process takes a multipart form with the original CSV, any number of
//! additional CSVs, and chart options. The merge and chart rendering run on
//! the blocking pool; the result is saved locally, published to the enabled
//! targets, and returned as a download.

use axum::{
    body::{Body, Bytes},
    extract::{multipart::MultipartError, DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    response::Response,
    routing::post,
    Router,
};
use std::str::FromStr;
use tracing::{info, warn};
use trend_common::naming::{export_stamp, is_csv_filename, safe_filename, slugify};
use trend_common::time::{now, parse_cutoff};

use crate::archive;
use crate::chart::{self, ChartOptions, DEFAULT_TITLE, DEFAULT_Y1_MAX, DEFAULT_Y1_MIN};
use crate::error::{ApiError, ApiResult};
use crate::merge::{merge_align, MergeOptions, NamedTable, DEFAULT_TOLERANCE_SECS};
use crate::publish::Artifacts;
use crate::AppState;

pub const ORIGINAL_FIELD: &str = "original_csv";
pub const OTHERS_FIELD: &str = "other_csvs";

/// Response headers describing the result
pub const MERGED_ROWS_HEADER: &str = "x-merged-rows";
pub const EXPORT_NAME_HEADER: &str = "x-export-name";

/// What the browser downloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// ZIP with both the CSV and the chart page
    #[default]
    Zip,
    Csv,
    Html,
}

impl FromStr for OutputFormat {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "zip" => Ok(OutputFormat::Zip),
            "csv" => Ok(OutputFormat::Csv),
            "html" => Ok(OutputFormat::Html),
            other => Err(ApiError::BadRequest(format!(
                "Unknown output format '{}' (expected zip, csv or html)",
                other
            ))),
        }
    }
}

/// One uploaded file
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub data: Bytes,
}

/// Raw multipart fields, before validation
#[derive(Debug, Default)]
pub struct ProcessForm {
    pub original: Option<Upload>,
    pub others: Vec<Upload>,
    pub tolerance: String,
    pub title: String,
    pub setpoint_name: String,
    pub y1_min: String,
    pub y1_max: String,
    pub cutoff: String,
    pub output: String,
}

/// Validated processing parameters
#[derive(Debug, Clone)]
pub struct ProcessParams {
    pub merge: MergeOptions,
    pub chart: ChartOptions,
    pub output: OutputFormat,
}

impl ProcessForm {
    /// Drain a multipart stream into the form.
    pub async fn from_multipart(mut multipart: Multipart) -> ApiResult<Self> {
        let mut form = ProcessForm::default();

        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                ORIGINAL_FIELD | OTHERS_FIELD => {
                    let filename = field.file_name().unwrap_or_default().to_string();
                    let data = field.bytes().await.map_err(multipart_error)?;
                    let upload = Upload { filename, data };
                    if name == ORIGINAL_FIELD {
                        form.original = Some(upload);
                    } else {
                        form.others.push(upload);
                    }
                }
                _ => {
                    let value = field.text().await.map_err(multipart_error)?;
                    let slot = match name.as_str() {
                        "tolerance" => &mut form.tolerance,
                        "title" => &mut form.title,
                        "setpoint_name" => &mut form.setpoint_name,
                        "y1_min" => &mut form.y1_min,
                        "y1_max" => &mut form.y1_max,
                        "cutoff" => &mut form.cutoff,
                        "output" => &mut form.output,
                        _ => continue,
                    };
                    *slot = value;
                }
            }
        }

        Ok(form)
    }

    /// Validate the option fields; blank fields take their defaults.
    pub fn params(&self) -> ApiResult<ProcessParams> {
        let tolerance = self.tolerance.trim();
        let tolerance_secs = if tolerance.is_empty() {
            DEFAULT_TOLERANCE_SECS
        } else {
            tolerance.parse::<u32>().map_err(|_| {
                ApiError::BadRequest(format!(
                    "Tolerance must be a whole number of seconds, got '{}'",
                    tolerance
                ))
            })?
        };

        let cutoff = match self.cutoff.trim() {
            "" => None,
            raw => {
                let parsed = parse_cutoff(raw);
                if parsed.is_none() {
                    warn!("Ignoring unparseable cutoff '{}'", raw);
                }
                parsed
            }
        };

        let title = match self.title.trim() {
            "" => DEFAULT_TITLE.to_string(),
            t => t.to_string(),
        };
        let y1_min = parse_axis_bound("y1_min", &self.y1_min, DEFAULT_Y1_MIN)?;
        let y1_max = parse_axis_bound("y1_max", &self.y1_max, DEFAULT_Y1_MAX)?;
        if y1_min >= y1_max {
            return Err(ApiError::BadRequest(format!(
                "y1_min ({}) must be less than y1_max ({})",
                y1_min, y1_max
            )));
        }
        let setpoint_name = match self.setpoint_name.trim() {
            "" => None,
            s => Some(s.to_string()),
        };

        Ok(ProcessParams {
            merge: MergeOptions {
                tolerance_secs,
                cutoff,
            },
            chart: ChartOptions {
                title,
                y1_min,
                y1_max,
                setpoint_name,
            },
            output: self.output.parse()?,
        })
    }

    /// The original upload plus the usable additional uploads.
    ///
    /// Additional parts without a `.csv` name are skipped, which also covers
    /// the empty part a browser sends when no file was chosen.
    pub fn into_uploads(self) -> ApiResult<(Upload, Vec<Upload>)> {
        let original = self
            .original
            .filter(|u| !u.filename.is_empty() || !u.data.is_empty())
            .ok_or_else(|| ApiError::BadRequest("Please upload the Original CSV.".to_string()))?;
        if !is_csv_filename(&original.filename) {
            return Err(ApiError::BadRequest(format!(
                "Invalid Original CSV '{}': expected a .csv file",
                original.filename
            )));
        }

        let others = self
            .others
            .into_iter()
            .filter(|u| {
                let keep = is_csv_filename(&u.filename);
                if !keep && !u.filename.is_empty() {
                    warn!("Skipping non-CSV upload '{}'", u.filename);
                }
                keep
            })
            .collect();

        Ok((original, others))
    }
}

fn parse_axis_bound(field: &str, raw: &str, default: f64) -> ApiResult<f64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(default);
    }
    raw.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ApiError::BadRequest(format!("{} must be a number, got '{}'", field, raw)))
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::BadRequest(format!("Malformed upload: {}", err.body_text()))
    }
}

/// Everything produced by one merge run
#[derive(Debug)]
pub struct Rendered {
    pub csv: Vec<u8>,
    pub html: String,
    /// Bytes for the requested [`OutputFormat`]
    pub download: Vec<u8>,
    pub rows: usize,
    pub skipped: Vec<String>,
}

/// Parse, merge, and render. CPU-bound; call from the blocking pool.
pub fn render_outputs(
    original: Upload,
    others: Vec<Upload>,
    params: &ProcessParams,
) -> ApiResult<Rendered> {
    let original = NamedTable::parse(safe_filename(&original.filename), &original.data)?;
    let others = others
        .iter()
        .map(|u| NamedTable::parse(safe_filename(&u.filename), &u.data))
        .collect::<trend_common::Result<Vec<_>>>()?;

    let merged = merge_align(&original, &others, &params.merge)?;
    let csv = merged.to_csv_bytes()?;
    let html = chart::render_chart(&merged, &params.chart);

    let download = match params.output {
        OutputFormat::Zip => {
            let title = file_title(&params.chart.title);
            archive::bundle(&title, &csv, html.as_bytes())
                .map_err(|e| ApiError::Internal(format!("failed to build ZIP: {}", e)))?
        }
        OutputFormat::Csv => csv.clone(),
        OutputFormat::Html => html.clone().into_bytes(),
    };

    Ok(Rendered {
        rows: merged.row_count(),
        skipped: merged.skipped,
        csv,
        html,
        download,
    })
}

/// Title with path separators and quotes replaced, for use in file names
pub fn file_title(title: &str) -> String {
    title.replace(['/', '\\', '"', '\r', '\n'], "_")
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987 UTF-8 name
pub fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
        .collect();
    let mut encoded = String::with_capacity(filename.len());
    for b in filename.bytes() {
        if b.is_ascii_alphanumeric() || b"-._~".contains(&b) {
            encoded.push(b as char);
        } else {
            encoded.push_str(&format!("%{:02X}", b));
        }
    }
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback, encoded
    )
}

/// POST /process
pub async fn process_upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Response> {
    let form = ProcessForm::from_multipart(multipart).await?;
    let params = form.params()?;
    let (original, others) = form.into_uploads()?;

    info!(
        original = %original.filename,
        additional = others.len(),
        tolerance_secs = params.merge.tolerance_secs,
        "Processing upload"
    );

    let task_params = params.clone();
    let rendered = tokio::task::spawn_blocking(move || {
        render_outputs(original, others, &task_params)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("merge task failed: {}", e)))??;

    for name in &rendered.skipped {
        warn!("Skipped '{}': no numeric columns", name);
    }

    let created_at = now();
    let base_name = format!(
        "{}-{}",
        slugify(&params.chart.title),
        export_stamp(created_at)
    );

    if let Err(e) = state
        .exports
        .save(&base_name, rendered.html.as_bytes(), &rendered.csv)
        .await
    {
        warn!("Failed to save local export {}: {}", base_name, e);
    }

    let links = state
        .publishers
        .publish_all(Artifacts {
            base_name: &base_name,
            html: rendered.html.as_bytes(),
            csv: &rendered.csv,
            created_at,
        })
        .await;
    if let Err(e) = state.exports.write_latest(&links).await {
        warn!("Failed to record published links: {}", e);
    }

    info!(rows = rendered.rows, export = %base_name, "Merge complete");

    let title = file_title(&params.chart.title);
    let (content_type, filename) = match params.output {
        OutputFormat::Zip => ("application/zip", archive::bundle_name(&title)),
        OutputFormat::Csv => ("text/csv; charset=utf-8", archive::merged_csv_name(&title)),
        OutputFormat::Html => ("text/html; charset=utf-8", archive::viewer_html_name(&title)),
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_DISPOSITION, content_disposition(&filename))
        .header(MERGED_ROWS_HEADER, rendered.rows.to_string())
        .header(EXPORT_NAME_HEADER, base_name)
        .body(Body::from(rendered.download))
        .map_err(|e| ApiError::Internal(format!("failed to build response: {}", e)))
}

/// Build processing routes; the body limit applies to uploads only.
pub fn process_routes(body_limit: usize) -> Router<AppState> {
    Router::new()
        .route("/process", post(process_upload))
        .layer(DefaultBodyLimit::max(body_limit))
}
