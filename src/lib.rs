//! # remoclip
//!
//! Shared clipboard for several hosts. A server keeps one clipboard and an
//! append-only log of every operation; clients copy to it, paste from it and
//! browse its history over HTTP or a local Unix socket.

pub mod auth;
pub mod cli;
pub mod client;
pub mod clipboard;
pub mod config;
pub mod history;
pub mod server;
pub mod store;

pub use config::Config;

/// Result type alias for remoclip operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for remoclip operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Authentication error
    #[error("Authentication error: {0}")]
    Auth(#[from] auth::AuthError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Clipboard operation error
    #[error("Clipboard error: {0}")]
    Clipboard(#[from] clipboard::ClipboardError),

    /// Event store error
    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    /// Request handling error
    #[error("Action error: {0}")]
    Action(#[from] server::ActionError),

    /// Client error
    #[error("Client error: {0}")]
    Client(#[from] client::ClientError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
