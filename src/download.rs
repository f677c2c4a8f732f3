//! Downloading owned products in the requested formats.
//!
//! Each file is resolved through the signed-URL indirection endpoint, then
//! streamed in fixed-size chunks to a temp file that is renamed into place
//! on completion. A crash or failure mid-download never leaves a partial
//! file at the final path. Failures are isolated per product/format; the
//! batch always runs to the end.

use std::fs;
use std::io::{IsTerminal, Read, Write};
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use serde::Deserialize;
use thiserror::Error;

use crate::api::{
    product_file_download_url, product_file_types_url, ApiClient, ApiError, Transport,
};
use crate::model::{DownloadFormat, Product};

const CHUNK_SIZE: usize = 8192;

/// Error raised while downloading a single file.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("IO error writing to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Outcome of a batch download: how many files were newly fetched and where
/// they were written. Already-present files count as success but appear in
/// neither field.
#[derive(Debug, Default)]
pub struct DownloadReport {
    pub downloaded: usize,
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct FileTypesEnvelope {
    data: Vec<FileTypesEntry>,
}

#[derive(Debug, Deserialize)]
struct FileTypesEntry {
    #[serde(rename = "fileTypes")]
    file_types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SignedUrlEnvelope {
    data: String,
}

/// Filesystem-safe file name derived from a product title: whitespace
/// becomes `_`, anything outside alphanumerics and `-_.#` is dropped, case
/// is preserved.
pub fn slugify_title(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.trim().chars() {
        if c.is_whitespace() {
            out.push('_');
        } else if c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '#') {
            out.push(c);
        }
    }
    while out.contains("__") {
        out = out.replace("__", "_");
    }
    let out = out.trim_matches('_').to_string();
    if out.is_empty() {
        "ebook".to_string()
    } else {
        out
    }
}

/// Download every requested format of every given product into
/// `download_directory`, optionally grouping each product into its own
/// subfolder. Returns the batch report; individual failures are logged and
/// skipped.
pub fn download_products<T: Transport>(
    client: &mut ApiClient<T>,
    download_directory: &Path,
    formats: &[DownloadFormat],
    products: &[Product],
    into_folder: bool,
) -> DownloadReport {
    let mut report = DownloadReport::default();
    let interactive = std::io::stderr().is_terminal();
    for product in products {
        let available = match fetch_available_formats(client, &product.id) {
            Ok(available) => available,
            Err(e) => {
                info!(
                    "Couldn't fetch download URLs for product {}: {}",
                    product.id, e
                );
                continue;
            }
        };
        for &format in formats {
            if !available.contains(&format) {
                continue;
            }
            // The video package already bundles the code files.
            if format == DownloadFormat::Code
                && available.contains(&DownloadFormat::Video)
                && formats.contains(&DownloadFormat::Video)
            {
                continue;
            }
            match download_single(
                client,
                download_directory,
                format,
                product,
                into_folder,
                interactive,
            ) {
                Ok(Some(path)) => {
                    report.downloaded += 1;
                    report.paths.push(path);
                }
                Ok(None) => {}
                Err(e) => {
                    error!(
                        "Couldn't download \"{}\" in {} format: {}",
                        product.display_title(),
                        format,
                        e
                    );
                }
            }
        }
    }
    info!("{} ebooks have been downloaded!", report.downloaded);
    report
}

/// Formats the platform offers for this product. Non-success or a malformed
/// payload means zero available formats for this product only.
fn fetch_available_formats<T: Transport>(
    client: &mut ApiClient<T>,
    product_id: &str,
) -> Result<Vec<DownloadFormat>, ApiError> {
    let url = product_file_types_url(product_id);
    let response = client.get(&url)?;
    if !response.is_success() {
        return Err(ApiError::HttpStatus {
            status: response.status(),
            url,
            context: Some("file types".to_string()),
        });
    }
    let envelope: FileTypesEnvelope = response.json()?;
    let entry = envelope
        .data
        .first()
        .ok_or_else(|| ApiError::shape(&url, "file types data is empty"))?;
    Ok(entry
        .file_types
        .iter()
        .filter_map(|name| DownloadFormat::parse(name).ok())
        .collect())
}

/// Download one product/format. `Ok(None)` means the destination already
/// existed and nothing was fetched.
fn download_single<T: Transport>(
    client: &mut ApiClient<T>,
    download_directory: &Path,
    format: DownloadFormat,
    product: &Product,
    into_folder: bool,
    interactive: bool,
) -> Result<Option<PathBuf>, DownloadError> {
    let file_name = slugify_title(product.display_title());
    let target_dir = if into_folder {
        download_directory.join(&file_name)
    } else {
        download_directory.to_path_buf()
    };
    if !target_dir.is_dir() {
        fs::create_dir_all(&target_dir).map_err(|e| DownloadError::Io {
            path: target_dir.clone(),
            source: e,
        })?;
    }

    let full_name = format!("{}.{}", file_name, format.extension());
    let full_path = target_dir.join(&full_name);
    if full_path.is_file() {
        info!("\"{}\" already exists under the given path.", full_name);
        return Ok(None);
    }

    match format {
        DownloadFormat::Code => {
            info!("Downloading code for ebook \"{}\"...", product.display_title())
        }
        DownloadFormat::Video => info!("Downloading \"{}\" video...", product.display_title()),
        _ => info!(
            "Downloading ebook \"{}\" in {} format...",
            product.display_title(),
            format
        ),
    }

    let signed_url = resolve_signed_url(client, &product.id, format)?;
    let temp_path = target_dir.join(format!("{}.tmp", full_name));
    let streamed = stream_to_file(client, &signed_url, &temp_path, interactive).and_then(|()| {
        fs::rename(&temp_path, &full_path).map_err(|e| DownloadError::Io {
            path: full_path.clone(),
            source: e,
        })
    });
    // The temp file must never survive, whichever way the download went.
    if temp_path.is_file() {
        let _ = fs::remove_file(&temp_path);
    }
    streamed?;

    info!(
        "\"{}\" in {} format downloaded successfully!",
        product.display_title(),
        format
    );
    Ok(Some(full_path))
}

/// The download endpoint is an indirection: it answers with the actual
/// signed file URL.
fn resolve_signed_url<T: Transport>(
    client: &mut ApiClient<T>,
    product_id: &str,
    format: DownloadFormat,
) -> Result<String, DownloadError> {
    let url = product_file_download_url(product_id, format.as_str());
    let response = client.get(&url)?;
    if !response.is_success() {
        return Err(DownloadError::Api(ApiError::HttpStatus {
            status: response.status(),
            url,
            context: Some("download url".to_string()),
        }));
    }
    let envelope: SignedUrlEnvelope = response.json()?;
    Ok(envelope.data)
}

/// Stream a response body to `path` in fixed-size chunks, reporting progress
/// when attached to a terminal.
fn stream_to_file<T: Transport>(
    client: &mut ApiClient<T>,
    url: &str,
    path: &Path,
    interactive: bool,
) -> Result<(), DownloadError> {
    let response = client.get(url)?;
    if !response.is_success() {
        return Err(DownloadError::Api(ApiError::HttpStatus {
            status: response.status(),
            url: url.to_string(),
            context: Some("file download".to_string()),
        }));
    }

    let progress = if interactive {
        Some(make_progress_bar(response.content_length()))
    } else {
        None
    };

    let mut reader = response.into_body();
    let mut file = fs::File::create(path).map_err(|e| DownloadError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut buf = [0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf).map_err(|e| ApiError::BodyRead {
            url: url.to_string(),
            source: Box::new(e),
        })?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(|e| DownloadError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        if let Some(ref bar) = progress {
            bar.inc(n as u64);
        }
    }
    file.flush().map_err(|e| DownloadError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }
    Ok(())
}

fn make_progress_bar(total: Option<u64>) -> ProgressBar {
    match total {
        Some(len) => {
            let bar = ProgressBar::new(len);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("[{bar:50}] {bytes}/{total_bytes} ({bytes_per_sec})")
                    .unwrap()
                    .progress_chars("#> "),
            );
            bar
        }
        None => ProgressBar::new_spinner(),
    }
}
