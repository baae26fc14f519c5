//! Transfer client configuration.

use crate::transfer::framer::DEFAULT_MAX_LINE_BYTES;

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "http://localhost:5030";

/// Default path of the streaming download endpoint.
pub const DEFAULT_DOWNLOAD_PATH: &str = "/api/transfers/download";

/// Environment variable overriding the API base URL.
pub const ENV_API_URL: &str = "TRACKDECK_API_URL";

/// Environment variable overriding the per-line byte limit.
pub const ENV_MAX_LINE_BYTES: &str = "TRACKDECK_MAX_LINE_BYTES";

/// Configuration for a [`SessionRegistry`](crate::transfer::SessionRegistry).
///
/// Use the builder methods to customize it.
///
/// # Example
///
/// ```ignore
/// use trackdeck::config::TransferConfig;
///
/// let config = TransferConfig::default()
///     .with_base_url("http://media-box:5030")
///     .with_max_line_bytes(64 * 1024);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TransferConfig {
    /// Scheme, host and port of the API (no trailing path)
    pub base_url: String,
    /// Path of the streaming download endpoint
    pub download_path: String,
    /// Longest accepted event line in bytes
    pub max_line_bytes: usize,
    /// Capacity of the diagnostics broadcast channel (0 disables it)
    pub diagnostics_capacity: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            download_path: DEFAULT_DOWNLOAD_PATH.to_string(),
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            diagnostics_capacity: 256,
        }
    }
}

impl TransferConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `TRACKDECK_API_URL` and `TRACKDECK_MAX_LINE_BYTES`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            config.base_url = url.trim().to_string();
        }

        if let Some(raw) = lookup(ENV_MAX_LINE_BYTES) {
            match raw.trim().parse::<usize>() {
                Ok(limit) if limit > 0 => config.max_line_bytes = limit,
                _ => tracing::warn!(
                    "Ignoring invalid {}={:?}, using {}",
                    ENV_MAX_LINE_BYTES,
                    raw,
                    config.max_line_bytes
                ),
            }
        }

        config
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_download_path(mut self, path: impl Into<String>) -> Self {
        self.download_path = path.into();
        self
    }

    pub fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    pub fn with_diagnostics_capacity(mut self, capacity: usize) -> Self {
        self.diagnostics_capacity = capacity;
        self
    }

    /// Full URL of the download endpoint.
    pub fn download_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.download_path.trim_start_matches('/')
        )
    }
}
