// Library exports for terracost

pub mod error;

// Estimation core
pub mod confidence; // Pessimistic confidence algebra
pub mod graph; // Dependency / asset / cost graphs
pub mod mapper; // Resource mapper protocol, registry and catalog
pub mod money; // Exact decimal money arithmetic

// Pricing and policy
pub mod coverage; // Spend-weighted coverage and policy enforcement
pub mod pricing; // Rate resolution against pinned snapshots

// Input handling
pub mod scan; // Plan scanning, canonical JSON, input hashing

// Orchestration
pub mod config; // Configuration management
pub mod engine; // Estimation pipeline and diff

#[cfg(feature = "http_transport")]
pub mod transport; // HTTP transport layer (axum)
