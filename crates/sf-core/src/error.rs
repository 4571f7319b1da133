//! Unified error type for storyforge.
//!
//! All crates funnel their failures into [`Error`]. The binary maps it to a
//! process exit status via [`Error::exit_code`].

/// Unified error type covering all failure modes in storyforge.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A chain or request failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Application configuration could not be loaded or parsed.
    #[error("Config error: {0}")]
    Config(String),

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// A generation provider could not be reached or misbehaved.
    #[error("Generator error [{provider}]: {message}")]
    Generator {
        /// Name of the provider that failed.
        provider: String,
        /// Human-readable error description.
        message: String,
    },

    /// A pipeline step failed.
    #[error("Pipeline error [{step}]: {message}")]
    Pipeline {
        /// The pipeline step that failed.
        step: String,
        /// Human-readable error description.
        message: String,
    },

    /// Decoding or encoding an image failed.
    #[error("Image error: {0}")]
    Image(String),

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Process exit status the CLI should use for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Validation(_) | Error::Config(_) => 2,
            _ => 1,
        }
    }

    /// Convenience constructor for [`Error::Generator`].
    pub fn generator(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Generator {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::Pipeline`].
    pub fn pipeline(step: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Pipeline {
            step: step.into(),
            message: message.into(),
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_display() {
        let err = Error::Validation("chain has no enabled steps".into());
        assert_eq!(
            err.to_string(),
            "Validation error: chain has no enabled steps"
        );
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn config_display() {
        let err = Error::Config("bad toml".into());
        assert_eq!(err.to_string(), "Config error: bad toml");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn io_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io { .. }));
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn generator_display() {
        let err = Error::generator("fal", "connection reset");
        assert_eq!(err.to_string(), "Generator error [fal]: connection reset");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn pipeline_display() {
        let err = Error::pipeline("split_image", "grid 0x2 is empty");
        assert_eq!(
            err.to_string(),
            "Pipeline error [split_image]: grid 0x2 is empty"
        );
    }

    #[test]
    fn only_input_problems_are_usage_errors() {
        assert_eq!(Error::Image("truncated PNG".into()).exit_code(), 1);
        assert_eq!(Error::Internal("join failed".into()).exit_code(), 1);
        assert_eq!(Error::pipeline("clip", "no image").exit_code(), 1);
    }
}
