//! Configuration for Mailstead
//!
//! Every component receives its settings from here at construction time.
//! Nothing reads ambient process state mid-operation.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Mail server identity and local table paths
    #[serde(default)]
    pub mail_server: MailServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Domain registrar API configuration
    #[serde(default)]
    pub registrar: RegistrarConfig,

    /// Mailbox retrieval protocol (IMAP) configuration
    #[serde(default)]
    pub imap: ImapConfig,

    /// Mail submission (SMTP) configuration
    #[serde(default)]
    pub submission: SubmissionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Mail server identity plus the transfer-agent and mailbox-server
/// resources this system manages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailServerConfig {
    /// Public FQDN of the mail server (MX target, SPF `a:` host)
    #[serde(default = "default_mail_hostname")]
    pub hostname: String,

    /// Public IPv4 of the mail server (SPF `ip4:`, mail A record)
    #[serde(default = "default_mail_ip")]
    pub ip: String,

    /// Transfer-agent virtual domain table (append-only)
    #[serde(default = "default_virtual_domains_file")]
    pub virtual_domains_file: PathBuf,

    /// Transfer-agent virtual mailbox table (append-only)
    #[serde(default = "default_virtual_mailboxes_file")]
    pub virtual_mailboxes_file: PathBuf,

    /// Base directory of the per-domain Maildir tree
    #[serde(default = "default_maildir_base")]
    pub maildir_base: PathBuf,

    /// Command run after table changes so the transfer agent picks them up
    #[serde(default = "default_reload_command")]
    pub reload_command: Vec<String>,
}

impl Default for MailServerConfig {
    fn default() -> Self {
        Self {
            hostname: default_mail_hostname(),
            ip: default_mail_ip(),
            virtual_domains_file: default_virtual_domains_file(),
            virtual_mailboxes_file: default_virtual_mailboxes_file(),
            maildir_base: default_maildir_base(),
            reload_command: default_reload_command(),
        }
    }
}

fn default_mail_hostname() -> String {
    "mail.localhost".to_string()
}

fn default_mail_ip() -> String {
    "127.0.0.1".to_string()
}

fn default_virtual_domains_file() -> PathBuf {
    PathBuf::from("/etc/postfix/virtual_mailbox_domains")
}

fn default_virtual_mailboxes_file() -> PathBuf {
    PathBuf::from("/etc/postfix/virtual_mailboxes")
}

fn default_maildir_base() -> PathBuf {
    PathBuf::from("/var/mail/vhosts")
}

fn default_reload_command() -> Vec<String> {
    vec!["postfix".to_string(), "reload".to_string()]
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL (PostgreSQL)
    pub url: Option<String>,

    /// Maximum connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

/// Registrar API configuration
///
/// The registrar only exposes bulk zone reads and full-replace zone
/// writes, authenticated by API key plus an allow-listed caller IP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrarConfig {
    /// API base URL
    #[serde(default = "default_registrar_url")]
    pub base_url: String,

    /// API user name
    #[serde(default)]
    pub api_user: String,

    /// API key
    #[serde(default)]
    pub api_key: String,

    /// Caller IP; must match the registrar's allow-list
    #[serde(default)]
    pub client_ip: String,

    /// Use the registrar's sandbox endpoint
    #[serde(default)]
    pub sandbox: bool,

    /// Request timeout in seconds
    #[serde(default = "default_registrar_timeout")]
    pub timeout_secs: u64,
}

impl Default for RegistrarConfig {
    fn default() -> Self {
        Self {
            base_url: default_registrar_url(),
            api_user: String::new(),
            api_key: String::new(),
            client_ip: String::new(),
            sandbox: false,
            timeout_secs: default_registrar_timeout(),
        }
    }
}

fn default_registrar_url() -> String {
    "https://api.registrar.example".to_string()
}

fn default_registrar_timeout() -> u64 {
    15
}

impl RegistrarConfig {
    /// Whether the credentials needed for zone writes are present
    pub fn is_configured(&self) -> bool {
        !self.api_user.is_empty() && !self.api_key.is_empty() && !self.client_ip.is_empty()
    }
}

/// IMAP (retrieval protocol) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImapConfig {
    /// IMAP server host
    #[serde(default = "default_imap_host")]
    pub host: String,

    /// IMAP server port
    #[serde(default = "default_imap_port")]
    pub port: u16,

    /// Per-operation timeout in seconds
    #[serde(default = "default_session_timeout")]
    pub timeout_secs: u64,
}

impl Default for ImapConfig {
    fn default() -> Self {
        Self {
            host: default_imap_host(),
            port: default_imap_port(),
            timeout_secs: default_session_timeout(),
        }
    }
}

fn default_imap_host() -> String {
    "localhost".to_string()
}

fn default_imap_port() -> u16 {
    993
}

/// SMTP submission configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionConfig {
    /// Submission server host
    #[serde(default = "default_imap_host")]
    pub host: String,

    /// Submission port
    #[serde(default = "default_submission_port")]
    pub port: u16,

    /// Per-operation timeout in seconds
    #[serde(default = "default_session_timeout")]
    pub timeout_secs: u64,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            host: default_imap_host(),
            port: default_submission_port(),
            timeout_secs: default_session_timeout(),
        }
    }
}

fn default_submission_port() -> u16 {
    587
}

fn default_session_timeout() -> u64 {
    30
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "json" or "text"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Load configuration from the default locations
    pub fn load() -> crate::Result<Self> {
        let paths = [
            std::path::PathBuf::from("./config.toml"),
            std::path::PathBuf::from("/etc/mailstead/config.toml"),
        ];

        for path in paths {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        Err(crate::Error::Config(
            "No configuration file found".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let mail = MailServerConfig::default();
        assert_eq!(mail.hostname, "mail.localhost");
        assert_eq!(mail.reload_command, vec!["postfix", "reload"]);

        let registrar = RegistrarConfig::default();
        assert!(!registrar.is_configured());
        assert_eq!(registrar.timeout_secs, 15);
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[mail_server]
hostname = "mail.example.com"
ip = "192.0.2.25"

[database]
url = "postgres://localhost/mailstead"

[registrar]
api_user = "acme"
api_key = "secret"
client_ip = "192.0.2.25"

[imap]
host = "mail.example.com"
port = 993
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.mail_server.hostname, "mail.example.com");
        assert!(config.registrar.is_configured());
        assert_eq!(config.imap.port, 993);
        assert_eq!(config.submission.port, 587);
    }
}
