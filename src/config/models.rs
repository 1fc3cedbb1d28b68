//! Configuration data structures for the edge forwarder.
//!
//! These types map directly to TOML (also JSON / YAML) configuration files and to
//! `FORWARDER_*` environment variables. Every struct carries serde defaults so an
//! empty configuration still yields a runnable (if backend-less) forwarder.
use serde::{Deserialize, Serialize};

/// Default inbound mount path, the location of the serverless proxy function.
pub const DEFAULT_MOUNT_PATH: &str = "/api/proxy";
/// Default name of the query parameter that carries the virtual path.
pub const DEFAULT_PATH_PARAM: &str = "path";
/// Default prefix prepended to the virtual path on the upstream side.
pub const DEFAULT_UPSTREAM_PREFIX: &str = "/api";
/// Default cap on inbound request bodies (4.5 MiB, the serverless payload limit).
pub const DEFAULT_MAX_BODY_BYTES: usize = 4_718_592;

/// Which inbound request headers travel upstream.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum HeaderPolicy {
    /// Forward only `Authorization` and `Content-Type`.
    #[default]
    AllowList,
    /// Forward everything except `Host`, `Connection` and `Content-Length`.
    PassThrough,
}

/// Output format of the tracing subscriber.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

/// Backend origins in priority order.
///
/// Blank entries are ignored, so a deployment can leave `primary` unset and rely on
/// the literal fallbacks shipped in the configuration file.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct BackendsConfig {
    pub primary: Option<String>,
    pub fallback: Option<String>,
    pub dns_fallback: Option<String>,
    pub ip_fallback: Option<String>,
}

impl BackendsConfig {
    /// Configured origins in the order they must be attempted.
    pub fn ordered(&self) -> impl Iterator<Item = (&'static str, &str)> + '_ {
        [
            ("primary", &self.primary),
            ("fallback", &self.fallback),
            ("dns_fallback", &self.dns_fallback),
            ("ip_fallback", &self.ip_fallback),
        ]
        .into_iter()
        .filter_map(|(slot, origin)| {
            origin
                .as_deref()
                .filter(|value| is_configured(value))
                .map(|value| (slot, value.trim()))
        })
    }
}

/// An origin counts as configured only when it holds a non-blank string.
pub fn is_configured(origin: &str) -> bool {
    !origin.trim().is_empty()
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Inbound route that accepts forwarded calls
    pub mount_path: String,
    /// Query parameter holding the virtual path
    pub path_param: String,
    /// Prefix inserted between the origin and the virtual path
    pub upstream_prefix: String,
    pub header_policy: HeaderPolicy,
    pub max_body_bytes: usize,
    /// Connect timeout for each backend attempt; the transport default applies when unset
    pub connect_timeout_secs: Option<u64>,
    pub backends: BackendsConfig,
    pub logging: LoggingConfig,
}

impl ServerConfig {
    /// Create a new server configuration builder
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            mount_path: DEFAULT_MOUNT_PATH.to_string(),
            path_param: DEFAULT_PATH_PARAM.to_string(),
            upstream_prefix: DEFAULT_UPSTREAM_PREFIX.to_string(),
            header_policy: HeaderPolicy::default(),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            connect_timeout_secs: None,
            backends: BackendsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Builder for ServerConfig, mostly used by tests and embedders
#[derive(Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    pub fn mount_path(mut self, path: impl Into<String>) -> Self {
        self.config.mount_path = path.into();
        self
    }

    pub fn path_param(mut self, name: impl Into<String>) -> Self {
        self.config.path_param = name.into();
        self
    }

    pub fn upstream_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.upstream_prefix = prefix.into();
        self
    }

    pub fn header_policy(mut self, policy: HeaderPolicy) -> Self {
        self.config.header_policy = policy;
        self
    }

    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.config.max_body_bytes = limit;
        self
    }

    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connect_timeout_secs = Some(secs);
        self
    }

    pub fn primary(mut self, origin: impl Into<String>) -> Self {
        self.config.backends.primary = Some(origin.into());
        self
    }

    pub fn fallback(mut self, origin: impl Into<String>) -> Self {
        self.config.backends.fallback = Some(origin.into());
        self
    }

    pub fn dns_fallback(mut self, origin: impl Into<String>) -> Self {
        self.config.backends.dns_fallback = Some(origin.into());
        self
    }

    pub fn ip_fallback(mut self, origin: impl Into<String>) -> Self {
        self.config.backends.ip_fallback = Some(origin.into());
        self
    }

    pub fn build(self) -> ServerConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordered_skips_blank_origins() {
        let backends = BackendsConfig {
            primary: Some("   ".to_string()),
            fallback: None,
            dns_fallback: Some("http://backend.example.com".to_string()),
            ip_fallback: Some(" http://52.91.158.161 ".to_string()),
        };

        let ordered: Vec<_> = backends.ordered().collect();
        assert_eq!(
            ordered,
            vec![
                ("dns_fallback", "http://backend.example.com"),
                ("ip_fallback", "http://52.91.158.161"),
            ]
        );
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.mount_path, "/api/proxy");
        assert_eq!(config.path_param, "path");
        assert_eq!(config.upstream_prefix, "/api");
        assert_eq!(config.header_policy, HeaderPolicy::AllowList);
        assert!(config.connect_timeout_secs.is_none());
        assert_eq!(config.backends.ordered().count(), 0);
    }

    #[test]
    fn test_builder() {
        let config = ServerConfig::builder()
            .listen_addr("0.0.0.0:3000")
            .primary("https://api.example.com")
            .ip_fallback("http://10.0.0.1")
            .header_policy(HeaderPolicy::PassThrough)
            .build();

        assert_eq!(config.listen_addr, "0.0.0.0:3000");
        assert_eq!(config.header_policy, HeaderPolicy::PassThrough);
        assert_eq!(config.backends.ordered().count(), 2);
    }
}
