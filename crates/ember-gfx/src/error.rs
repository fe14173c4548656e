//! Error taxonomy.
//!
//! Environmental failures are returned as [`GfxError`]. Invariant violations
//! (disposed-image use, source == destination, oversized images) panic.

pub type GfxResult<T> = Result<T, GfxError>;

#[derive(thiserror::Error, Debug)]
pub enum GfxError {
    /// Pixel buffer length mismatch, zero dimensions, region outside image.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The underlying GPU rejected a command or failed to compile a shader.
    #[error("driver failure: {0}")]
    DriverFailure(String),

    /// A requested dimension exceeds the driver's maximum image size.
    #[error("resource exceeded: {0}")]
    ResourceExceeded(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GfxError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn driver_failure(msg: impl Into<String>) -> Self {
        Self::DriverFailure(msg.into())
    }

    pub fn resource_exceeded(msg: impl Into<String>) -> Self {
        Self::ResourceExceeded(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes_are_stable() {
        assert!(
            GfxError::invalid_argument("x")
                .to_string()
                .contains("invalid argument:")
        );
        assert!(
            GfxError::driver_failure("x")
                .to_string()
                .contains("driver failure:")
        );
        assert!(
            GfxError::resource_exceeded("x")
                .to_string()
                .contains("resource exceeded:")
        );
    }

    #[test]
    fn other_preserves_source() {
        let base = std::io::Error::other("device lost");
        let err = GfxError::Other(anyhow::Error::new(base));
        assert!(err.to_string().contains("device lost"));
    }
}
