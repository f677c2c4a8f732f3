//! Configuration file loading. Search order: ./packtgrab.toml, then
//! $XDG_CONFIG_HOME/packtgrab/config.toml (or ~/.config/packtgrab/config.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file contents. Sections are optional; operations that need a
/// missing section fail with a pointed message at run time.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub login: Option<LoginConfig>,
    pub anticaptcha: Option<AnticaptchaConfig>,
    pub download: DownloadConfig,
    pub notify: Option<NotifyConfig>,
}

/// `[login]`: Packt account credentials.
#[derive(Debug, Deserialize)]
pub struct LoginConfig {
    pub email: String,
    pub password: String,
}

/// `[anticaptcha]`: anti-captcha.com client key, required for claiming.
#[derive(Debug, Deserialize)]
pub struct AnticaptchaConfig {
    pub key: String,
}

/// `[download]`: where and what to download.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Target directory; must exist. Defaults to the current directory.
    pub directory: Option<PathBuf>,
    /// Formats to download, e.g. ["pdf", "epub"]. Defaults to
    /// pdf, mobi, epub, code.
    pub formats: Option<Vec<String>>,
    /// Group each product into its own subfolder.
    pub into_folder: Option<bool>,
}

/// `[notify]`: HTTP email API settings. Absent section disables email.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    /// Email API endpoint; defaults to the Resend API.
    pub api_url: Option<String>,
    pub api_key: String,
    pub from: String,
    pub to: Vec<String>,
}

/// Load config from an explicit path. The file must exist and parse.
pub fn load_config_from(path: &Path) -> Result<Config, String> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
    toml::from_str(&s).map_err(|e| format!("Invalid config {}: {}", path.display(), e))
}

/// Search order: (1) ./packtgrab.toml, (2) $XDG_CONFIG_HOME/packtgrab/config.toml.
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present
/// file returns Err.
pub fn load_config() -> Result<Option<Config>, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    let mut paths = vec![cwd.join("packtgrab.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("packtgrab").join("config.toml"));
    }
    for path in &paths {
        if path.exists() {
            return load_config_from(path).map(Some);
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_config() {
        let c: Config = toml::from_str("").unwrap();
        assert!(c.login.is_none());
        assert!(c.anticaptcha.is_none());
        assert!(c.download.directory.is_none());
        assert!(c.download.formats.is_none());
        assert!(c.notify.is_none());
    }

    #[test]
    fn parse_full_config() {
        let s = r#"
            [login]
            email = "user@example.com"
            password = "hunter2"

            [anticaptcha]
            key = "anticaptcha-key"

            [download]
            directory = "books"
            formats = ["pdf", "epub"]
            into_folder = true

            [notify]
            api_key = "re_123"
            from = "grabber@example.com"
            to = ["me@example.com"]
        "#;
        let c: Config = toml::from_str(s).unwrap();
        let login = c.login.unwrap();
        assert_eq!(login.email, "user@example.com");
        assert_eq!(login.password, "hunter2");
        assert_eq!(c.anticaptcha.unwrap().key, "anticaptcha-key");
        assert_eq!(
            c.download.directory.as_deref(),
            Some(Path::new("books"))
        );
        assert_eq!(
            c.download.formats.as_deref(),
            Some(["pdf".to_string(), "epub".to_string()].as_slice())
        );
        assert_eq!(c.download.into_folder, Some(true));
        let notify = c.notify.unwrap();
        assert!(notify.api_url.is_none());
        assert_eq!(notify.to, vec!["me@example.com".to_string()]);
    }

    #[test]
    fn parse_partial_config() {
        let s = r#"
            [download]
            directory = "out"
        "#;
        let c: Config = toml::from_str(s).unwrap();
        assert!(c.login.is_none());
        assert_eq!(c.download.directory.as_deref(), Some(Path::new("out")));
        assert!(c.download.into_folder.is_none());
    }

    #[test]
    fn invalid_toml_errors() {
        assert!(toml::from_str::<Config>("[download\ndirectory = 1").is_err());
    }

    #[test]
    fn load_config_from_missing_file_errors() {
        let result = load_config_from(Path::new("/nonexistent_packtgrab_xyz/config.toml"));
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("Cannot read config"));
    }
}
