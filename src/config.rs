//! Configuration.
//!
//! Every section has working defaults, so an empty file is a valid config:
//!
//! ```toml
//! [server]
//! addr = "0.0.0.0:8080"
//! handle_signals = true
//! on_handler_error = "internal-server-error"
//!
//! [router]
//! duplicate_routes = "reject"
//! max_middleware = 16
//!
//! [templates]
//! resources_dir = "resources"
//! template_prefix = "templates"
//! extension = "html"
//!
//! [log]
//! filter = "info,ferrule=debug"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Error;
use crate::handler::DEFAULT_MAX_MIDDLEWARE;

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub router: RouterConfig,
    pub templates: TemplateConfig,
    pub log: LogConfig,
}

impl Config {
    pub fn from_toml_str(s: &str) -> Result<Self, Error> {
        Ok(toml::from_str(s)?)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address used by [`Server::run`](crate::Server::run).
    pub addr: String,
    /// React to SIGTERM / Ctrl-C with a graceful shutdown.
    pub handle_signals: bool,
    pub on_handler_error: FailurePolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:3000".to_owned(),
            handle_signals: true,
            on_handler_error: FailurePolicy::default(),
        }
    }
}

/// What the server sends when a handler returns an error.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Log it and send whatever the handler wrote.
    #[default]
    Ignore,
    /// Log it and replace the response with a bare `500`.
    InternalServerError,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub duplicate_routes: DuplicateRoutes,
    /// Longest middleware chain a single handler may carry.
    pub max_middleware: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            duplicate_routes: DuplicateRoutes::default(),
            max_middleware: DEFAULT_MAX_MIDDLEWARE,
        }
    }
}

/// What registering an existing (method, path) pair does.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicateRoutes {
    /// The newest registration wins.
    #[default]
    Replace,
    /// Fail with [`Error::DuplicateRoute`].
    Reject,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    pub resources_dir: PathBuf,
    /// Directory under `resources_dir` holding views.
    pub template_prefix: String,
    /// File extension appended to view names.
    pub extension: String,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            resources_dir: PathBuf::from("resources"),
            template_prefix: "templates".to_owned(),
            extension: "html".to_owned(),
        }
    }
}

impl TemplateConfig {
    /// Absolute-or-relative root every view is resolved against.
    pub fn template_dir(&self) -> PathBuf {
        self.resources_dir.join(&self.template_prefix)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence when set.
    pub filter: String,
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { filter: "info".to_owned(), ansi: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.server.addr, "0.0.0.0:3000");
        assert_eq!(config.router.duplicate_routes, DuplicateRoutes::Replace);
        assert_eq!(config.router.max_middleware, DEFAULT_MAX_MIDDLEWARE);
        assert_eq!(config.templates.template_dir(), PathBuf::from("resources/templates"));
    }

    #[test]
    fn sections_override_defaults() {
        let config = Config::from_toml_str(
            r#"
            [server]
            addr = "127.0.0.1:9000"
            on_handler_error = "internal-server-error"

            [router]
            duplicate_routes = "reject"
            max_middleware = 4
            "#,
        )
        .unwrap();
        assert_eq!(config.server.addr, "127.0.0.1:9000");
        assert!(config.server.handle_signals);
        assert_eq!(config.server.on_handler_error, FailurePolicy::InternalServerError);
        assert_eq!(config.router.duplicate_routes, DuplicateRoutes::Reject);
        assert_eq!(config.router.max_middleware, 4);
    }

    #[test]
    fn unknown_policy_is_a_config_error() {
        let err = Config::from_toml_str("[router]\nduplicate_routes = \"merge\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
