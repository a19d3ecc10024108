//! Errors - エラー型
//!
//! ports の実装が返すエラーです。app 層はこれらを吸収し、
//! ストリームの利用者（UI）には一切伝播させません。

use thiserror::Error;

/// Durable store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open log store: {0}")]
    Open(String),

    #[error("write rejected for tid={0}")]
    WriteRejected(String),

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Message bus errors.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("message bus is closed")]
    Closed,
}

/// Inbound frame could not be decoded into a known message shape.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
