//! Canonical data model: account credentials, products, and download formats.
//!
//! The API client, claimer, catalog, and downloader all use these shapes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Packt account credentials. Immutable for a session.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// One item in the user's library or in the daily offer.
///
/// Identity is `id`. `title` is display/filename material only, best-effort:
/// it is `None` when the summary lookup does not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub title: Option<String>,
}

impl Product {
    /// Title for log lines and filenames; falls back to the product id.
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.id)
    }
}

/// File format offered per product by the file-types endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DownloadFormat {
    Pdf,
    Mobi,
    Epub,
    Video,
    Code,
}

impl DownloadFormat {
    /// Name used by the API in file-type lists and download paths.
    pub fn as_str(self) -> &'static str {
        match self {
            DownloadFormat::Pdf => "pdf",
            DownloadFormat::Mobi => "mobi",
            DownloadFormat::Epub => "epub",
            DownloadFormat::Video => "video",
            DownloadFormat::Code => "code",
        }
    }

    /// Extension of the file written to disk. Video and code packages arrive
    /// as zip archives regardless of the format name.
    pub fn extension(self) -> &'static str {
        match self {
            DownloadFormat::Video | DownloadFormat::Code => "zip",
            other => other.as_str(),
        }
    }

    /// Parse an API file-type or config/CLI value.
    pub fn parse(s: &str) -> Result<DownloadFormat, String> {
        match s.trim().to_lowercase().as_str() {
            "pdf" => Ok(DownloadFormat::Pdf),
            "mobi" => Ok(DownloadFormat::Mobi),
            "epub" => Ok(DownloadFormat::Epub),
            "video" => Ok(DownloadFormat::Video),
            "code" => Ok(DownloadFormat::Code),
            _ => Err(format!(
                "Invalid format: '{}'. Use pdf, mobi, epub, video, or code.",
                s
            )),
        }
    }
}

impl fmt::Display for DownloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_format_all() {
        assert_eq!(DownloadFormat::parse("pdf").unwrap(), DownloadFormat::Pdf);
        assert_eq!(DownloadFormat::parse("mobi").unwrap(), DownloadFormat::Mobi);
        assert_eq!(DownloadFormat::parse("epub").unwrap(), DownloadFormat::Epub);
        assert_eq!(
            DownloadFormat::parse("video").unwrap(),
            DownloadFormat::Video
        );
        assert_eq!(DownloadFormat::parse("code").unwrap(), DownloadFormat::Code);
        assert_eq!(DownloadFormat::parse(" PDF ").unwrap(), DownloadFormat::Pdf);
    }

    #[test]
    fn parse_format_invalid() {
        assert!(DownloadFormat::parse("azw3").is_err());
        assert!(DownloadFormat::parse("").is_err());
    }

    #[test]
    fn extension_zip_for_packages() {
        assert_eq!(DownloadFormat::Video.extension(), "zip");
        assert_eq!(DownloadFormat::Code.extension(), "zip");
        assert_eq!(DownloadFormat::Pdf.extension(), "pdf");
        assert_eq!(DownloadFormat::Epub.extension(), "epub");
        assert_eq!(DownloadFormat::Mobi.extension(), "mobi");
    }

    #[test]
    fn display_title_falls_back_to_id() {
        let with_title = Product {
            id: "9781788".to_string(),
            title: Some("Rust Essentials".to_string()),
        };
        let without_title = Product {
            id: "9781788".to_string(),
            title: None,
        };
        assert_eq!(with_title.display_title(), "Rust Essentials");
        assert_eq!(without_title.display_title(), "9781788");
    }

    #[test]
    fn product_round_trips_json() {
        let product = Product {
            id: "9781801".to_string(),
            title: Some("Effective Concurrency".to_string()),
        };
        let json = serde_json::to_string(&product).unwrap();
        let back: Product = serde_json::from_str(&json).unwrap();
        assert_eq!(back, product);
    }
}
