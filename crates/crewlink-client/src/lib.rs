//! Headless API client for the CrewLink corporate chat platform.
//!
//! Talks to two cooperating backend groups (the primary REST API and
//! the chat/real-time REST API) across multiple deployment sites. The
//! heart of the crate is the authenticated session manager: the
//! [`ApiClient`] gateway attaches bearer tokens, classifies auth
//! failures, collapses concurrent token refreshes into a single-flight
//! round trip through the [`SessionCoordinator`], retries the failed
//! call exactly once, and emits a typed [`SessionEvent`] when the
//! session becomes unrecoverable. UI concerns (navigation, rendering)
//! live outside; subscribe to the event bus to react to invalidation.

pub mod client;
pub mod error;
pub mod routing;
pub mod session;
pub mod storage;
pub mod traits;
pub mod types;

pub use client::{ApiClient, ClientConfig, NativeTransport};
pub use error::{ClientError, Result};
pub use routing::{Backend, BackendRouter, EndpointSet, Site};
pub use session::{
    InvalidationReason, RefreshError, SessionCoordinator, SessionEvent, SessionEvents, TokenStore,
};
pub use storage::{FileStorage, MemoryStorage};
pub use types::{ApiRequest, ApiResponse, Envelope, Session, UserProfile};
