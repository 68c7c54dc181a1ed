//! HTTP Server Configuration
//!
//! ## Environment Variables
//!
//! - `TERRACOST_HOST`: Server bind address (default: 127.0.0.1)
//! - `TERRACOST_PORT`: Server port (default: 8080)
//! - `TERRACOST_UI_DIR`: Directory of static UI files (optional)

use std::net::SocketAddr;
use std::path::PathBuf;

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Server bind address
    pub addr: SocketAddr,

    /// Static UI directory, served at `/` when set
    pub ui_dir: Option<PathBuf>,
}

impl HttpConfig {
    /// Load HTTP configuration from environment variables
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let host = std::env::var("TERRACOST_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port: u16 = std::env::var("TERRACOST_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()?;
        let ui_dir = std::env::var("TERRACOST_UI_DIR").ok().map(PathBuf::from);

        Ok(Self {
            addr: format!("{}:{}", host, port).parse()?,
            ui_dir,
        })
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".parse().expect("static addr"),
            ui_dir: None,
        }
    }
}
