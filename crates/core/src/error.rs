/// Result alias that carries the custom [`SpectrographError`] type.
pub type Result<T> = std::result::Result<T, SpectrographError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum SpectrographError {
    /// The waveform source could not be opened or reported an unusable
    /// channel layout. A session is never created from such a source.
    #[error("waveform source unavailable: {0}")]
    SourceUnavailable(String),
    /// A requested sample range could not be supplied by the source.
    #[error("failed to read {count} samples at {start} from channel {channel}: {reason}")]
    ReadFailure {
        channel: usize,
        start: u64,
        count: usize,
        reason: String,
    },
    /// An operation was invoked out of its allowed order.
    #[error("invalid sequencing: {0}")]
    InvalidSequencing(&'static str),
    /// The forward transform rejected its buffers.
    #[error("transform failed: {0}")]
    Transform(String),
    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Malformed configuration file.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// Image encoding failure.
    #[error("{0}")]
    Image(#[from] image::ImageError),
}

impl SpectrographError {
    /// Creates a [`SpectrographError::SourceUnavailable`] from any message.
    pub fn unavailable<T: Into<String>>(msg: T) -> Self {
        Self::SourceUnavailable(msg.into())
    }

    /// Returns `true` for failures that leave a session intact and may be
    /// retried by stepping again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ReadFailure { .. })
    }
}

impl From<realfft::FftError> for SpectrographError {
    fn from(value: realfft::FftError) -> Self {
        Self::Transform(value.to_string())
    }
}
