//! Trait seams for network and persistence.
//!
//! Both seams exist so the session manager stays headlessly testable:
//! integration tests drive the gateway against a scripted [`Transport`]
//! and an in-memory [`SessionStorage`] without touching the network or
//! the filesystem.

use crate::error::Result;
use crate::types::{ApiRequest, ApiResponse};
use async_trait::async_trait;

/// Abstraction for HTTP dispatch.
///
/// The transport sends exactly what it is given. Authorization headers,
/// retries and response classification live above this seam.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn fetch(&self, url: &str, request: ApiRequest) -> Result<ApiResponse>;
}

/// Abstraction for durable key/value persistence of session state.
///
/// Implementable over a file, an OS keychain, or plain memory. Values
/// are opaque strings; callers own the encoding.
#[async_trait]
pub trait SessionStorage: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: String) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}
