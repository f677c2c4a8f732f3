//! packtgrab: CLI that claims the Packt Free Learning daily ebook and
//! downloads owned titles in the requested formats.

pub mod api;
pub mod captcha;
pub mod claim;
pub mod cli;
pub mod config;
pub mod download;
pub mod library;
pub mod model;
pub mod notify;

// Re-exports for CLI and consumers.
pub use api::{ApiClient, ApiError, ReqwestTransport, Transport};
pub use captcha::{CaptchaError, CaptchaSolver};
pub use claim::{claim_offer, ClaimError};
pub use download::{download_products, DownloadError, DownloadReport};
pub use model::{Credentials, DownloadFormat, Product};
