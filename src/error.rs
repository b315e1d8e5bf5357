//! # Error Types
//!
//! This module defines error types used throughout the docthumb library.
//!
//! Most failures during a render never reach the caller: a missing schema or
//! a broken image is painted over with a placeholder. Only the variants that
//! leave no image to return (invalid output size, encoding failure) are
//! surfaced by [`crate::render::Rasterizer::render_thumbnail`].

use thiserror::Error;

/// Main error type for docthumb operations
#[derive(Debug, Error)]
pub enum ThumbnailError {
    /// Template schema could not be fetched or parsed
    #[error("Schema unavailable: {0}")]
    SchemaUnavailable(String),

    /// An image asset could not be fetched or decoded
    #[error("Asset unavailable: {0}")]
    AssetUnavailable(String),

    /// The drawing surface could not be encoded into the requested format
    #[error("Encode error: {0}")]
    Encode(String),

    /// Output options that cannot describe an image (e.g. zero width)
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// Configuration file or font loading error
    #[error("Config error: {0}")]
    Config(String),

    /// The rasterizer pool was shut down while waiting for a checkout
    #[error("Rasterizer pool closed")]
    PoolClosed,

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
