//! Generation error types

use thiserror::Error;

use crate::domain::MediaKind;

/// Errors delivered to a request's error callback
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("No {0} generator registered")]
    MissingGenerator(MediaKind),

    #[error("Generation failed: {0}")]
    Failed(String),

    #[error("Backend error {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("Generator panicked: {0}")]
    Panicked(String),
}

impl GenerationError {
    /// Shorthand for a plain failure message
    pub fn failed(message: impl Into<String>) -> Self {
        GenerationError::Failed(message.into())
    }

    /// Check if this error comes from missing wiring rather than the backend
    pub fn is_configuration(&self) -> bool {
        matches!(self, GenerationError::MissingGenerator(_))
    }

    /// Build an error from a caught panic payload
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic".to_string()
        };
        GenerationError::Panicked(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_configuration() {
        assert!(GenerationError::MissingGenerator(MediaKind::Model).is_configuration());
        assert!(!GenerationError::failed("boom").is_configuration());
        assert!(
            !GenerationError::Backend {
                status: 429,
                message: "slow down".to_string()
            }
            .is_configuration()
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(
            GenerationError::MissingGenerator(MediaKind::Image).to_string(),
            "No image generator registered"
        );
        assert_eq!(
            GenerationError::Backend {
                status: 503,
                message: "busy".to_string()
            }
            .to_string(),
            "Backend error 503: busy"
        );
    }

    #[test]
    fn test_from_panic() {
        let err = GenerationError::from_panic(Box::new("exploded"));
        assert_eq!(err, GenerationError::Panicked("exploded".to_string()));

        let err = GenerationError::from_panic(Box::new(String::from("owned")));
        assert_eq!(err, GenerationError::Panicked("owned".to_string()));

        let err = GenerationError::from_panic(Box::new(42u32));
        assert_eq!(err, GenerationError::Panicked("unknown panic".to_string()));
    }
}
