//! Request parameters for a single API call.

use crate::routing::Backend;
use std::collections::BTreeMap;

/// Parameters for a single API call.
///
/// `path` is relative to the base URL of the selected backend group;
/// the gateway resolves the full URL through the router.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    pub method: String,
    pub path: String,
    pub backend: Backend,
    pub body: bytes::Bytes,
    pub content_type: Option<String>,
    /// Skip the Authorization header entirely. Used for endpoints that
    /// must not receive custom headers (avoids CORS preflight) and for
    /// the credential endpoints themselves.
    pub no_auth: bool,
    pub extra_headers: BTreeMap<String, String>,
}

impl ApiRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            path: path.into(),
            backend: Backend::Api,
            body: bytes::Bytes::new(),
            content_type: None,
            no_auth: false,
            extra_headers: BTreeMap::new(),
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_body(mut self, body: impl Into<bytes::Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Serialize `value` as the JSON request body.
    pub fn with_json<T: serde::Serialize>(self, value: &T) -> crate::error::Result<Self> {
        let body = serde_json::to_vec(value)?;
        Ok(self
            .with_body(body)
            .with_content_type("application/json"))
    }

    pub fn no_auth(mut self) -> Self {
        self.no_auth = true;
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.insert(key.into(), value.into());
        self
    }
}
