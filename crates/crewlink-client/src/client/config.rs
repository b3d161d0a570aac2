//! Configuration for the CrewLink API client.

use crate::routing::Site;

/// Configuration for the CrewLink API client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Proxy URL (optional, empty = direct).
    pub proxy_url: String,
    /// User agent sent with every request.
    pub user_agent: String,
    /// Enable request/response logging.
    pub enable_logging: bool,
    /// How long a settled refresh attempt stays joinable before the
    /// in-flight reference is released, in milliseconds. Preserved
    /// from the original behavior; no stricter semantics intended.
    pub refresh_grace_ms: u64,
    /// Site used until a persisted selection is restored.
    pub default_site: Site,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            request_timeout_ms: 30000,
            proxy_url: String::new(),
            user_agent: "crewlink-client/0.1".to_string(),
            enable_logging: false,
            refresh_grace_ms: 1000,
            default_site: Site::DEFAULT,
        }
    }
}
