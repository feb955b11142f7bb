//! Runtime configuration, read once at startup from the environment.
//!
//! A `.env` file in the working directory is loaded first (if present) so
//! local development does not need exported variables.

use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub converter: ConverterConfig,
    pub mail: MailConfig,
    pub log_level: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub database: PathBuf,
    pub media_root: PathBuf,
    /// Public prefix under which files in `media_root` are served.
    pub media_url: String,
}

/// Which external tool turns a rendered DOCX into a PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConverterKind {
    /// `libreoffice --headless --convert-to pdf` as a subprocess.
    Headless,
    /// Office automation on the host (e.g. Word through `docx2pdf`).
    Native,
}

#[derive(Debug, Clone)]
pub struct ConverterConfig {
    pub kind: ConverterKind,
    pub program: String,
    /// Command line run when the last automation session on a thread ends.
    pub teardown: Option<Vec<String>>,
    /// Parent directory for per-conversion scratch directories.
    pub work_dir: Option<PathBuf>,
    pub readiness: ReadinessPolicy,
}

/// Bounded wait for the converter's output file to appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            interval: Duration::from_millis(500),
        }
    }
}

impl ReadinessPolicy {
    /// Longest time a poll can take before giving up.
    pub fn bound(&self) -> Duration {
        self.interval * self.attempts
    }
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub from: String,
    pub institution: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a valid {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("PORTAL_HOST must parse to an IPv4 or IPv6 address")]
    InvalidHost(#[source] std::net::AddrParseError),
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: std::str::FromStr>(
    name: &'static str,
    default: &str,
    expected: &'static str,
) -> Result<T, ConfigError> {
    let value = var_or(name, default);
    value.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
        name,
        expected,
        value,
    })
}

fn split_command(raw: &str) -> Option<Vec<String>> {
    let parts: Vec<String> = raw.split_whitespace().map(str::to_string).collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port = parse_var::<u16>("PORTAL_PORT", "8080", "port number")?;
        let attempts = parse_var::<u32>("OFFER_READINESS_ATTEMPTS", "10", "attempt count")?;
        if attempts == 0 {
            return Err(ConfigError::Invalid {
                name: "OFFER_READINESS_ATTEMPTS",
                expected: "attempt count of at least 1",
                value: attempts.to_string(),
            });
        }
        let interval_ms =
            parse_var::<u64>("OFFER_READINESS_INTERVAL_MS", "500", "interval in milliseconds")?;

        let kind = match var_or("OFFER_CONVERTER", "headless")
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "headless" | "libreoffice" => ConverterKind::Headless,
            "native" | "word" => ConverterKind::Native,
            other => {
                return Err(ConfigError::Invalid {
                    name: "OFFER_CONVERTER",
                    expected: "converter ('headless' or 'native')",
                    value: other.to_string(),
                })
            }
        };
        let default_program = match kind {
            ConverterKind::Headless => "libreoffice",
            ConverterKind::Native => "docx2pdf",
        };

        Ok(Self {
            server: ServerConfig {
                host: var_or("PORTAL_HOST", "127.0.0.1"),
                port,
            },
            storage: StorageConfig {
                database: PathBuf::from(var_or("PORTAL_DATABASE", "portal.sqlite")),
                media_root: PathBuf::from(var_or("PORTAL_MEDIA_ROOT", "media")),
                media_url: var_or("PORTAL_MEDIA_URL", "/media"),
            },
            converter: ConverterConfig {
                kind,
                program: var_or("OFFER_CONVERTER_BIN", default_program),
                teardown: env::var("OFFER_CONVERTER_TEARDOWN")
                    .ok()
                    .and_then(|raw| split_command(&raw)),
                work_dir: env::var("OFFER_WORK_DIR").ok().map(PathBuf::from),
                readiness: ReadinessPolicy {
                    attempts,
                    interval: Duration::from_millis(interval_ms),
                },
            },
            mail: MailConfig {
                from: var_or("PORTAL_MAIL_FROM", "admissions@university.example"),
                institution: var_or("PORTAL_INSTITUTION", "the University"),
            },
            log_level: var_or("PORTAL_LOG_LEVEL", "info"),
        })
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }
        let ip: IpAddr = self.host.parse().map_err(ConfigError::InvalidHost)?;
        Ok(SocketAddr::new(ip, self.port))
    }
}
