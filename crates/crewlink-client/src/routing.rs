//! Site routing: which backend endpoint pair a call should target.
//!
//! A site is a deployment region/tenant; each one carries a pair of
//! base URLs, one for the primary API group and one for the chat API
//! group. The active site is a persisted pointer, independent of the
//! token lifecycle: switching site never invalidates the session.

use crate::error::Result;
use crate::traits::SessionStorage;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Storage key for the persisted active site.
pub(crate) const KEY_SELECTED_SITE: &str = "selectedSite";

/// A deployment site.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Site {
    Production,
    Qa,
    Dev,
}

impl Site {
    pub const DEFAULT: Site = Site::Production;

    pub fn as_str(&self) -> &'static str {
        match self {
            Site::Production => "production",
            Site::Qa => "qa",
            Site::Dev => "dev",
        }
    }

    /// Parse a persisted site identifier. Unknown values map to `None`
    /// so callers can fall back to the default instead of failing.
    pub fn parse(value: &str) -> Option<Site> {
        match value.trim() {
            "production" => Some(Site::Production),
            "qa" => Some(Site::Qa),
            "dev" => Some(Site::Dev),
            _ => None,
        }
    }
}

impl std::fmt::Display for Site {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which backend group a request targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backend {
    /// Primary REST API (auth, directory, administration).
    Api,
    /// Chat/real-time REST API (conversations, messages).
    Chat,
}

/// The pair of base URLs for one site.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointSet {
    pub api_base: &'static str,
    pub chat_base: &'static str,
}

impl EndpointSet {
    pub fn base_for(&self, backend: Backend) -> &'static str {
        match backend {
            Backend::Api => self.api_base,
            Backend::Chat => self.chat_base,
        }
    }
}

fn endpoints_for(site: Site) -> EndpointSet {
    match site {
        Site::Production => EndpointSet {
            api_base: "https://api.crewlink.app/v1",
            chat_base: "https://chat.crewlink.app/v1",
        },
        Site::Qa => EndpointSet {
            api_base: "https://api-qa.crewlink.app/v1",
            chat_base: "https://chat-qa.crewlink.app/v1",
        },
        Site::Dev => EndpointSet {
            api_base: "https://api-dev.crewlink.app/v1",
            chat_base: "https://chat-dev.crewlink.app/v1",
        },
    }
}

/// Resolves base URLs per site and tracks the persisted active site.
#[derive(Clone)]
pub struct BackendRouter {
    storage: Arc<dyn SessionStorage>,
    active: Arc<RwLock<Site>>,
}

impl BackendRouter {
    pub fn new(storage: Arc<dyn SessionStorage>, default_site: Site) -> Self {
        BackendRouter {
            storage,
            active: Arc::new(RwLock::new(default_site)),
        }
    }

    /// Restore the persisted active site, if any. Unknown persisted
    /// values are ignored and the current default stays active.
    pub async fn load(&self) -> Result<()> {
        if let Some(raw) = self.storage.get(KEY_SELECTED_SITE).await? {
            match Site::parse(&raw) {
                Some(site) => self.set_in_memory(site),
                None => warn!("ignoring unknown persisted site {:?}", raw),
            }
        }
        Ok(())
    }

    /// Resolve the endpoint set for `site`, falling back to the active
    /// site when `site` is `None`. Total: never fails.
    pub fn resolve(&self, site: Option<Site>) -> EndpointSet {
        endpoints_for(site.unwrap_or_else(|| self.active_site()))
    }

    pub fn active_site(&self) -> Site {
        self.active.read().map(|s| *s).unwrap_or(Site::DEFAULT)
    }

    /// Persist `site` as the active site for subsequent resolutions.
    pub async fn set_active_site(&self, site: Site) -> Result<()> {
        self.set_in_memory(site);
        self.storage
            .set(KEY_SELECTED_SITE, site.as_str().to_string())
            .await?;
        debug!(site = site.as_str(), "active site updated");
        Ok(())
    }

    /// Drop back to the default site (used on session invalidation).
    pub async fn reset_to_default(&self) -> Result<()> {
        self.set_in_memory(Site::DEFAULT);
        self.storage.remove(KEY_SELECTED_SITE).await?;
        Ok(())
    }

    fn set_in_memory(&self, site: Site) {
        if let Ok(mut guard) = self.active.write() {
            *guard = site;
        }
    }
}
