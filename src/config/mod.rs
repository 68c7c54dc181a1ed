//! Configuration Management
//!
//! Environment-driven configuration for the HTTP server and the
//! pricing snapshot store.

pub mod http;
pub mod store;

// Re-export
pub use http::HttpConfig;
pub use store::StoreConfig;
