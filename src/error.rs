//! Error type shared by the library and the CLI.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("cannot resample {from} Hz up to {to} Hz")]
    Upsampling { from: u32, to: u32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid song id {0:?}: must be non-empty, single-line and without surrounding whitespace")]
    InvalidSongId(String),
}
