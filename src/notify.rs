//! Email notification: reports the outcome of a run to the configured
//! recipients through an HTTP email API (Resend-style JSON POST).
//!
//! This is a thin collaborator around the core flows: it only ever receives
//! the claimed product and the paths the downloader wrote.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use log::info;
use serde_json::json;

use crate::config::NotifyConfig;
use crate::model::Product;

const DEFAULT_API_URL: &str = "https://api.resend.com/emails";
const SEND_TIMEOUT_SECS: u64 = 30;
const DATE_FORMAT: &str = "%Y/%m/%d";

fn success_subject(date: &str, title: &str) -> String {
    format!("{} New free Packt ebook: \"{}\"", date, title)
}

fn success_body(title: &str, paths: &[PathBuf]) -> String {
    let mut body = format!(
        "A new free Packt ebook \"{}\" was successfully grabbed. Enjoy!\n",
        title
    );
    if !paths.is_empty() {
        body.push_str("\nDownloaded files:\n");
        for path in paths {
            body.push_str(&format!("  {}\n", path.display()));
        }
    }
    body
}

fn failure_subject(date: &str) -> String {
    format!("{} Grabbing a new free Packt ebook failed", date)
}

fn failure_body(error: &str) -> String {
    format!(
        "Today's free Packt ebook grabbing has failed with: {}\n\nCheck this out!",
        error
    )
}

/// Sends notification emails. Built from the optional `[notify]` config
/// section; absent section means notifications are disabled.
pub struct EmailNotifier {
    api_url: String,
    api_key: String,
    from: String,
    to: Vec<String>,
    client: reqwest::blocking::Client,
}

impl EmailNotifier {
    pub fn from_config(config: &NotifyConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(SEND_TIMEOUT_SECS))
            .build()
            .context("Failed to create the notification HTTP client")?;
        Ok(EmailNotifier {
            api_url: config
                .api_url
                .clone()
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_key: config.api_key.clone(),
            from: config.from.clone(),
            to: config.to.clone(),
            client,
        })
    }

    pub fn send_grab_success(&self, product: &Product, paths: &[PathBuf]) -> Result<()> {
        let date = Utc::now().format(DATE_FORMAT).to_string();
        self.send(
            &success_subject(&date, product.display_title()),
            &success_body(product.display_title(), paths),
        )
    }

    pub fn send_grab_failure(&self, error: &str) -> Result<()> {
        let date = Utc::now().format(DATE_FORMAT).to_string();
        self.send(&failure_subject(&date), &failure_body(error))
    }

    fn send(&self, subject: &str, body: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": self.to,
                "subject": subject,
                "text": body,
            }))
            .send()
            .with_context(|| format!("Could not reach the email API at {}", self.api_url))?;
        if !response.status().is_success() {
            bail!(
                "Email API at {} answered HTTP {}",
                self.api_url,
                response.status().as_u16()
            );
        }
        info!("Notification email \"{}\" has been sent.", subject);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_subject_carries_date_and_title() {
        assert_eq!(
            success_subject("2020/08/07", "Rust Essentials"),
            "2020/08/07 New free Packt ebook: \"Rust Essentials\""
        );
    }

    #[test]
    fn success_body_lists_downloaded_paths() {
        let paths = vec![
            PathBuf::from("/books/Rust_Essentials.pdf"),
            PathBuf::from("/books/Rust_Essentials.epub"),
        ];
        let body = success_body("Rust Essentials", &paths);
        assert!(body.contains("\"Rust Essentials\" was successfully grabbed"));
        assert!(body.contains("/books/Rust_Essentials.pdf"));
        assert!(body.contains("/books/Rust_Essentials.epub"));
    }

    #[test]
    fn success_body_without_paths_has_no_file_section() {
        let body = success_body("Rust Essentials", &[]);
        assert!(!body.contains("Downloaded files"));
    }

    #[test]
    fn failure_messages_name_the_error() {
        assert_eq!(
            failure_subject("2020/08/07"),
            "2020/08/07 Grabbing a new free Packt ebook failed"
        );
        assert!(failure_body("no offer").contains("failed with: no offer"));
    }
}
