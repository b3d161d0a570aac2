//! Session lifetime: durable token store, invalidation events, and the
//! refresh coordinator.

mod coordinator;
mod events;
mod store;

pub use coordinator::{RefreshError, SessionCoordinator};
pub use events::{InvalidationReason, SessionEvent, SessionEvents};
pub use store::TokenStore;
