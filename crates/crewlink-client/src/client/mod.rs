//! CrewLink API client implementation.

pub mod classify;
mod config;
mod gateway;
mod native_transport;

pub use config::ClientConfig;
pub use gateway::ApiClient;
pub use native_transport::NativeTransport;
